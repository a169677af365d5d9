#![allow(dead_code)]

use std::time::Duration;

use axum::Router;
use fanfeed::{
    config::Config,
    spotify::client::{Client, RetryPolicy},
    types::Token,
};
use reqwest::Url;

/// Serves `router` on an ephemeral local port and returns its base URL.
pub async fn serve(router: Router) -> Url {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    Url::parse(&format!("http://{}/", addr)).unwrap()
}

pub fn token() -> Token {
    Token {
        access_token: "test-token".to_string(),
        token_type: "Bearer".to_string(),
        refresh_token: None,
        scope: String::new(),
        expires_in: 3600,
        obtained_at: chrono::Utc::now().timestamp() as u64,
    }
}

pub fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        enabled: true,
        max_retries: 2,
        base_delay: Duration::from_millis(10),
        max_delay: Duration::from_secs(5),
    }
}

pub fn client(base: &Url) -> Client {
    Client::new(base.clone(), token(), fast_retry()).unwrap()
}

pub fn config(vars: &[(&str, &str)]) -> Config {
    let vars: Vec<(String, String)> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    Config::from_lookup(move |name| {
        vars.iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.clone())
    })
    .unwrap()
}
