mod common;

use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use axum::{
    Form, Json, Router,
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
    routing::post,
};
use fanfeed::{
    config::Config,
    error::AuthError,
    server::CallbackServer,
    spotify::auth::Authenticator,
    types::CallbackParams,
    utils,
};
use reqwest::Url;
use serde_json::json;

/// Token endpoint that accepts the code `good-code` and the refresh token
/// `refresh-1`, and insists on HTTP Basic client credentials. Every request
/// bumps `hits`.
fn token_app(hits: Arc<AtomicUsize>) -> Router {
    Router::new().route(
        "/api/token",
        post(
            move |headers: HeaderMap, Form(form): Form<HashMap<String, String>>| async move {
                hits.fetch_add(1, Ordering::SeqCst);
                let basic = headers
                    .get(header::AUTHORIZATION)
                    .and_then(|v| v.to_str().ok())
                    .is_some_and(|v| v.starts_with("Basic "));
                if !basic {
                    return (StatusCode::UNAUTHORIZED, Json(json!({"error": "invalid_client"})))
                        .into_response();
                }

                let ok = match form.get("grant_type").map(String::as_str) {
                    Some("authorization_code") => {
                        form.get("code").map(String::as_str) == Some("good-code")
                            && form.get("code_verifier").is_some_and(|v| v.len() == 128)
                    }
                    Some("refresh_token") => {
                        form.get("refresh_token").map(String::as_str) == Some("refresh-1")
                    }
                    _ => false,
                };

                if ok {
                    Json(json!({
                        "access_token": "access-1",
                        "token_type": "Bearer",
                        "scope": "user-follow-read",
                        "expires_in": 3600,
                        "refresh_token": "refresh-1"
                    }))
                    .into_response()
                } else {
                    (
                        StatusCode::BAD_REQUEST,
                        Json(json!({
                            "error": "invalid_grant",
                            "error_description": "Invalid authorization code"
                        })),
                    )
                        .into_response()
                }
            },
        ),
    )
}

async fn counting_token_server() -> (Config, Arc<AtomicUsize>) {
    let hits = Arc::new(AtomicUsize::new(0));
    let base = common::serve(token_app(hits.clone())).await;
    let token_url = base.join("api/token").unwrap();
    let config = common::config(&[
        ("SPOTIFY_CLIENT_ID", "client-1"),
        ("SPOTIFY_CLIENT_SECRET", "secret-1"),
        ("SPOTIFY_API_TOKEN_URL", token_url.as_str()),
    ]);
    (config, hits)
}

async fn config_with_token_server() -> Config {
    counting_token_server().await.0
}

fn callback(code: Option<&str>, state: Option<&str>, error: Option<&str>) -> CallbackParams {
    CallbackParams {
        code: code.map(str::to_string),
        state: state.map(str::to_string),
        error: error.map(str::to_string),
    }
}

fn local() -> SocketAddr {
    "127.0.0.1:0".parse().unwrap()
}

fn http() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .build()
        .unwrap()
}

#[test]
fn authorization_url_embeds_everything() {
    let config = common::config(&[("SPOTIFY_CLIENT_ID", "client-1")]);
    let auth = Authenticator::new(&config).unwrap();

    let url = auth.authorization_url("abc123");
    assert_eq!(url, auth.authorization_url("abc123"));
    assert!(url.as_str().starts_with("https://accounts.spotify.com/authorize?"));

    let query: HashMap<String, String> = url.query_pairs().into_owned().collect();
    assert_eq!(query["response_type"], "code");
    assert_eq!(query["client_id"], "client-1");
    assert_eq!(query["redirect_uri"], "http://localhost:8080/callback");
    assert_eq!(query["state"], "abc123");
    assert_eq!(query["scope"], config.scopes.join(" "));
    assert_eq!(query["code_challenge_method"], "S256");
    assert_eq!(
        query["code_challenge"],
        utils::generate_code_challenge(&auth.pkce().code_verifier)
    );
}

#[tokio::test]
async fn exchange_returns_token() {
    let config = config_with_token_server().await;
    let auth = Authenticator::new(&config).unwrap();

    let token = auth
        .complete_exchange("s1", &callback(Some("good-code"), Some("s1"), None))
        .await
        .unwrap();

    assert_eq!(token.access_token, "access-1");
    assert_eq!(token.refresh_token.as_deref(), Some("refresh-1"));
    assert_eq!(token.expires_in, 3600);
    assert!(token.obtained_at > 0);
}

#[tokio::test]
async fn rejected_code_is_exchange_error() {
    let config = config_with_token_server().await;
    let auth = Authenticator::new(&config).unwrap();

    let err = auth
        .complete_exchange("s1", &callback(Some("bad-code"), Some("s1"), None))
        .await
        .unwrap_err();

    match err {
        AuthError::Exchange(e) => {
            assert_eq!(e.status(), Some(400));
            assert!(e.to_string().contains("invalid_grant"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn state_mismatch_never_reaches_token_endpoint() {
    let config = common::config(&[
        ("SPOTIFY_CLIENT_ID", "client-1"),
        // nothing listens here; a request would be a transport error
        ("SPOTIFY_API_TOKEN_URL", "http://127.0.0.1:9/api/token"),
    ]);
    let auth = Authenticator::new(&config).unwrap();

    let err = auth
        .complete_exchange("s1", &callback(Some("good-code"), Some("s2"), None))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::StateMismatch { .. }));
}

#[tokio::test]
async fn refresh_grant_yields_fresh_access_token() {
    let config = config_with_token_server().await;
    let auth = Authenticator::new(&config).unwrap();

    let token = auth.refresh("refresh-1").await.unwrap();
    assert_eq!(token.access_token, "access-1");
    assert_eq!(token.refresh_token.as_deref(), Some("refresh-1"));
}

#[tokio::test]
async fn callback_server_hands_over_one_token_and_shuts_down() {
    let config = config_with_token_server().await;
    let auth = Authenticator::new(&config).unwrap();
    let server = CallbackServer::start(local(), auth, "s1".to_string())
        .await
        .unwrap();
    let base = Url::parse(&format!("http://{}/", server.local_addr())).unwrap();

    let health: serde_json::Value = http()
        .get(base.join("health").unwrap())
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");

    let response = http()
        .get(base.join("callback?code=good-code&state=s1").unwrap())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    let token = server.wait_for_token(Duration::from_secs(5)).await.unwrap();
    assert_eq!(token.access_token, "access-1");

    assert!(http().get(base.join("health").unwrap()).send().await.is_err());
}

#[tokio::test]
async fn forged_state_gets_not_found_and_keeps_waiting() {
    let config = config_with_token_server().await;
    let auth = Authenticator::new(&config).unwrap();
    let server = CallbackServer::start(local(), auth, "s1".to_string())
        .await
        .unwrap();
    let base = Url::parse(&format!("http://{}/", server.local_addr())).unwrap();

    let response = http()
        .get(base.join("callback?code=good-code&state=forged").unwrap())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);

    let err = server
        .wait_for_token(Duration::from_millis(300))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Timeout(_)));
}

#[tokio::test]
async fn forged_denial_does_not_end_the_login() {
    let (config, hits) = counting_token_server().await;
    let auth = Authenticator::new(&config).unwrap();
    let server = CallbackServer::start(local(), auth, "s1".to_string())
        .await
        .unwrap();
    let base = Url::parse(&format!("http://{}/", server.local_addr())).unwrap();

    for forged in ["callback?error=x&state=forged", "callback?state=forged", "callback?error=x"] {
        let response = http().get(base.join(forged).unwrap()).send().await.unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND, "{}", forged);
    }
    assert_eq!(hits.load(Ordering::SeqCst), 0);

    let response = http()
        .get(base.join("callback?code=good-code&state=s1").unwrap())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    let token = server.wait_for_token(Duration::from_secs(5)).await.unwrap();
    assert_eq!(token.access_token, "access-1");
}

#[tokio::test]
async fn repeated_callback_is_gone_without_second_exchange() {
    let (config, hits) = counting_token_server().await;
    let auth = Authenticator::new(&config).unwrap();
    let server = CallbackServer::start(local(), auth, "s1".to_string())
        .await
        .unwrap();
    let url = Url::parse(&format!("http://{}/", server.local_addr()))
        .unwrap()
        .join("callback?code=good-code&state=s1")
        .unwrap();

    let first = http().get(url.clone()).send().await.unwrap();
    assert_eq!(first.status(), reqwest::StatusCode::OK);
    let second = http().get(url).send().await.unwrap();
    assert_eq!(second.status(), reqwest::StatusCode::GONE);
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    let token = server.wait_for_token(Duration::from_secs(5)).await.unwrap();
    assert_eq!(token.access_token, "access-1");
}

#[tokio::test]
async fn denied_consent_is_forbidden_and_reported() {
    let config = config_with_token_server().await;
    let auth = Authenticator::new(&config).unwrap();
    let server = CallbackServer::start(local(), auth, "s1".to_string())
        .await
        .unwrap();
    let base = Url::parse(&format!("http://{}/", server.local_addr())).unwrap();

    let response = http()
        .get(base.join("callback?error=access_denied&state=s1").unwrap())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::FORBIDDEN);
    assert_eq!(response.text().await.unwrap(), "Couldn't get token.");

    let err = server
        .wait_for_token(Duration::from_secs(5))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::ProviderDenied(e) if e == "access_denied"));
}
