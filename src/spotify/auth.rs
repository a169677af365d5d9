use chrono::Utc;
use log::debug;
use reqwest::{StatusCode, Url};
use serde::Deserialize;

use crate::{
    config::Config,
    error::{ApiError, AuthError},
    server::CallbackServer,
    spotify::client::{self, Client, RetryPolicy},
    success,
    types::{CallbackParams, PkceToken, Token},
    utils, warning,
};

/// OAuth2 authorization-code settings plus the HTTP transport used to talk
/// to the accounts service.
///
/// Every authenticator carries its own PKCE verifier; the matching challenge
/// is embedded in the consent URL and the verifier is sent with the code
/// exchange.
#[derive(Debug, Clone)]
pub struct Authenticator {
    client_id: String,
    client_secret: Option<String>,
    redirect_uri: Url,
    scopes: Vec<String>,
    auth_url: Url,
    token_url: Url,
    pkce: PkceToken,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct OAuthErrorBody {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

impl Authenticator {
    pub fn new(config: &Config) -> Result<Self, ApiError> {
        // HTTP/2 disabled, see `Client::new`.
        let http = reqwest::Client::builder().http1_only().build()?;
        let code_verifier = utils::generate_code_verifier();
        let code_challenge = utils::generate_code_challenge(&code_verifier);

        Ok(Self {
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            redirect_uri: config.redirect_uri.clone(),
            scopes: config.scopes.clone(),
            auth_url: config.auth_url.clone(),
            token_url: config.token_url.clone(),
            pkce: PkceToken {
                code_verifier,
                code_challenge,
            },
            http,
        })
    }

    pub fn pkce(&self) -> &PkceToken {
        &self.pkce
    }

    /// Builds the consent page URL for `state`.
    ///
    /// The result only depends on the configuration, the PKCE challenge and
    /// `state`, so calling it twice yields the same URL.
    pub fn authorization_url(&self, state: &str) -> Url {
        let mut url = self.auth_url.clone();
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", self.redirect_uri.as_str())
            .append_pair("scope", &self.scopes.join(" "))
            .append_pair("state", state)
            .append_pair("code_challenge", &self.pkce.code_challenge)
            .append_pair("code_challenge_method", "S256");
        url
    }

    /// Validates the redirect and exchanges its code for a token.
    pub async fn complete_exchange(
        &self,
        state: &str,
        params: &CallbackParams,
    ) -> Result<Token, AuthError> {
        let code = validate_callback(state, params)?;
        Ok(self.exchange_code(code).await?)
    }

    pub async fn exchange_code(&self, code: &str) -> Result<Token, ApiError> {
        let mut form = vec![
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("code_verifier", self.pkce.code_verifier.as_str()),
        ];
        if self.client_secret.is_none() {
            form.push(("client_id", self.client_id.as_str()));
        }

        self.request_token(&form).await
    }

    /// Exchanges a refresh token for a fresh access token. The provider may
    /// omit a new refresh token, in which case the old one is kept.
    pub async fn refresh(&self, refresh_token: &str) -> Result<Token, ApiError> {
        let mut form = vec![
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ];
        if self.client_secret.is_none() {
            form.push(("client_id", self.client_id.as_str()));
        }

        let mut token = self.request_token(&form).await?;
        if token.refresh_token.is_none() {
            token.refresh_token = Some(refresh_token.to_string());
        }
        Ok(token)
    }

    async fn request_token(&self, form: &[(&str, &str)]) -> Result<Token, ApiError> {
        debug!("POST {}", self.token_url);

        let mut request = self.http.post(self.token_url.clone()).form(form);
        if let Some(secret) = &self.client_secret {
            request = request.basic_auth(&self.client_id, Some(secret));
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            return Err(token_error(status, &body));
        }

        let mut token: Token = serde_json::from_slice(&body)?;
        token.obtained_at = Utc::now().timestamp().max(0) as u64;
        Ok(token)
    }

    /// Wraps `token` in a client for the Web API at `api_url`. The client
    /// refreshes the token through this authenticator when it runs stale.
    pub fn new_session(
        &self,
        token: Token,
        api_url: Url,
        retry: RetryPolicy,
    ) -> Result<Client, ApiError> {
        Ok(Client::new(api_url, token, retry)?.with_refresh(self.clone()))
    }
}

/// Checks the redirect parameters and returns the authorization code.
pub fn validate_callback<'a>(
    expected_state: &str,
    params: &'a CallbackParams,
) -> Result<&'a str, AuthError> {
    if let Some(e) = params.error.as_deref().filter(|e| !e.is_empty()) {
        return Err(AuthError::ProviderDenied(e.to_string()));
    }

    let code = params
        .code
        .as_deref()
        .filter(|c| !c.is_empty())
        .ok_or(AuthError::MissingCode)?;

    let actual = params.state.as_deref().unwrap_or_default();
    if actual != expected_state {
        return Err(AuthError::StateMismatch {
            expected: expected_state.to_string(),
            actual: actual.to_string(),
        });
    }

    Ok(code)
}

fn token_error(status: StatusCode, body: &[u8]) -> ApiError {
    match serde_json::from_slice::<OAuthErrorBody>(body) {
        Ok(e) => ApiError::Provider {
            status: status.as_u16(),
            message: match e.error_description {
                Some(description) => format!("{}: {}", e.error, description),
                None => e.error,
            },
        },
        Err(_) => client::decode_error(status, body),
    }
}

/// Runs the complete authorization-code flow and returns a ready session.
///
/// 1. Starts the local callback listener on `config.server_addr`
/// 2. Prints the consent URL and tries to open it in the default browser
/// 3. Waits for exactly one successful redirect, or `config.callback_timeout`
/// 4. Shuts the listener down and wraps the token in a [`Client`]
pub async fn authorize(config: &Config) -> Result<Client, AuthError> {
    let authenticator = Authenticator::new(config)?;
    let state = config.state.clone().unwrap_or_else(utils::generate_state);

    let server = CallbackServer::start(config.server_addr, authenticator.clone(), state.clone()).await?;

    let auth_url = authenticator.authorization_url(&state);
    println!("Please log in to Spotify: {}", auth_url);
    if webbrowser::open(auth_url.as_str()).is_err() {
        warning!("Failed to open browser. Please navigate to the URL above manually.");
    }

    let token = server.wait_for_token(config.callback_timeout).await?;
    success!("Authentication successful!");

    Ok(authenticator.new_session(token, config.api_url.clone(), config.retry)?)
}
