use std::time::Duration;

use chrono::Utc;
use log::{debug, warn};
use reqwest::{
    Method, RequestBuilder, Response, StatusCode, Url,
    header::{HeaderMap, RETRY_AFTER},
};
use serde::{Serialize, de::DeserializeOwned};
use tokio::{sync::Mutex, time::sleep};

use crate::{
    error::ApiError,
    spotify::auth::Authenticator,
    types::{ProviderErrorBody, Token},
};

/// How rate-limited requests are retried.
///
/// The wait before retry `n` (zero based) is the `Retry-After` header when the
/// provider sends a parsable one, otherwise `base_delay * 2^n`. Every wait is
/// capped at `max_delay`. After `max_retries` retries the call fails with
/// [`ApiError::RetryExhausted`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub enabled: bool,
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            max_retries: 5,
            base_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Rate limit responses are surfaced as provider errors right away.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Wait before retry number `attempt`, honoring `Retry-After`.
    pub fn delay(&self, headers: &HeaderMap, attempt: u32) -> Duration {
        let advised = headers
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs);

        let delay = advised.unwrap_or_else(|| {
            self.base_delay
                .checked_mul(2u32.saturating_pow(attempt))
                .unwrap_or(self.max_delay)
        });
        delay.min(self.max_delay)
    }
}

/// An authenticated connection to the Web API.
///
/// Holds the HTTP transport, the base address every path is resolved
/// against, and the bearer token. When built with [`Client::with_refresh`]
/// the token is renewed shortly before it expires.
pub struct Client {
    http: reqwest::Client,
    base_url: Url,
    token: Mutex<Token>,
    authenticator: Option<Authenticator>,
    retry: RetryPolicy,
}

impl Client {
    /// Creates a client that sends `token` as bearer credential.
    ///
    /// The transport negotiates HTTP/1.1 only; the provider's HTTP/2 endpoint
    /// has a history of breaking default client stacks.
    pub fn new(base_url: Url, token: Token, retry: RetryPolicy) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .http1_only()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url,
            token: Mutex::new(token),
            authenticator: None,
            retry,
        })
    }

    pub fn with_refresh(mut self, authenticator: Authenticator) -> Self {
        self.authenticator = Some(authenticator);
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{base}{path}",
            base = self.base_url,
            path = path.trim_start_matches('/')
        )
    }

    async fn bearer(&self) -> String {
        let mut token = self.token.lock().await;
        let now = Utc::now().timestamp().max(0) as u64;

        if token.is_expired_at(now) {
            if let (Some(auth), Some(refresh)) = (&self.authenticator, token.refresh_token.clone()) {
                match auth.refresh(&refresh).await {
                    Ok(fresh) => {
                        debug!("access token refreshed");
                        *token = fresh;
                    }
                    Err(e) => warn!("token refresh failed, keeping the old token: {}", e),
                }
            }
        }

        token.access_token.clone()
    }

    /// Issues an authenticated GET for `path` and decodes the body into `T`.
    ///
    /// Returns `Ok(None)` for `204 No Content`. Rate limiting is handled per
    /// [`RetryPolicy`]; every other non-2xx status is turned into
    /// [`ApiError::Provider`].
    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Option<T>, ApiError> {
        let url = self.endpoint(path);
        debug!("GET {} {:?}", url, query);

        let response = self
            .send_with_retry(|| self.http.get(&url).query(query), is_rate_limited)
            .await?;

        let status = response.status();
        if status == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(error_from_response(response).await);
        }

        decode_body(response).await.map(Some)
    }

    /// Issues a non-GET request with an optional JSON body.
    ///
    /// Any 2xx status is a success, as is every status in `accepted`.
    /// `202 Accepted` and `429 Too Many Requests` are retried.
    pub async fn execute<T, B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        accepted: &[StatusCode],
    ) -> Result<Option<T>, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let url = self.endpoint(path);
        debug!("{} {}", method, url);

        let response = self
            .send_with_retry(
                || {
                    let req = self.http.request(method.clone(), &url);
                    match body {
                        Some(b) => req.json(b),
                        None => req,
                    }
                },
                should_retry_write,
            )
            .await?;

        let status = response.status();
        if status == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        if !status.is_success() && !accepted.contains(&status) {
            return Err(error_from_response(response).await);
        }

        decode_body(response).await.map(Some)
    }

    async fn send_with_retry<F>(
        &self,
        build: F,
        retryable: fn(StatusCode) -> bool,
    ) -> Result<Response, ApiError>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut attempt: u32 = 0;

        loop {
            let token = self.bearer().await;
            let response = build().bearer_auth(token).send().await?;
            let status = response.status();

            if !self.retry.enabled || !retryable(status) {
                return Ok(response);
            }

            if attempt >= self.retry.max_retries {
                return Err(ApiError::RetryExhausted {
                    attempts: attempt + 1,
                    status,
                });
            }

            let wait = self.retry.delay(response.headers(), attempt);
            warn!(
                "HTTP {} from {}, retrying in {:?} ({}/{})",
                status.as_u16(),
                response.url().path(),
                wait,
                attempt + 1,
                self.retry.max_retries
            );
            drop(response);
            sleep(wait).await;
            attempt += 1;
        }
    }
}

fn is_rate_limited(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS
}

fn should_retry_write(status: StatusCode) -> bool {
    status == StatusCode::ACCEPTED || status == StatusCode::TOO_MANY_REQUESTS
}

async fn decode_body<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let bytes = response.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}

async fn error_from_response(response: Response) -> ApiError {
    let status = response.status();
    match response.bytes().await {
        Ok(body) => decode_error(status, &body),
        Err(e) => ApiError::Transport(e),
    }
}

/// Turns a failed response into an [`ApiError::Provider`].
///
/// An empty body, an undecodable body and a decoded error without a message
/// all get a synthesized message so the caller never sees a blank error.
pub fn decode_error(status: StatusCode, body: &[u8]) -> ApiError {
    let reason = status.canonical_reason().unwrap_or("Unknown");

    if body.is_empty() {
        return ApiError::Provider {
            status: status.as_u16(),
            message: format!("HTTP {}: {} (body empty)", status.as_u16(), reason),
        };
    }

    let Ok(envelope) = serde_json::from_slice::<ProviderErrorBody>(body) else {
        return ApiError::Provider {
            status: status.as_u16(),
            message: format!(
                "couldn't decode error: ({}) [{}]",
                body.len(),
                String::from_utf8_lossy(body)
            ),
        };
    };

    let detail = envelope.error;
    let message = if detail.message.is_empty() {
        format!(
            "unexpected HTTP {}: {} (empty error)",
            status.as_u16(),
            reason
        )
    } else {
        detail.message
    };

    ApiError::Provider {
        status: if detail.status == 0 {
            status.as_u16()
        } else {
            detail.status
        },
        message,
    }
}

#[cfg(test)]
mod tests {
    use reqwest::header::HeaderValue;

    use super::*;

    fn headers_with_retry_after(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn retry_after_header_wins() {
        let policy = RetryPolicy::default();
        assert_eq!(
            policy.delay(&headers_with_retry_after("2"), 3),
            Duration::from_secs(2)
        );
    }

    #[test]
    fn missing_or_garbage_header_falls_back_to_backoff() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay(&HeaderMap::new(), 0), Duration::from_secs(5));
        assert_eq!(policy.delay(&HeaderMap::new(), 1), Duration::from_secs(10));
        assert_eq!(
            policy.delay(&headers_with_retry_after("soon"), 2),
            Duration::from_secs(20)
        );
    }

    #[test]
    fn delay_is_capped() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay(&HeaderMap::new(), 10), Duration::from_secs(60));
        assert_eq!(
            policy.delay(&headers_with_retry_after("3600"), 0),
            Duration::from_secs(60)
        );
    }

    #[test]
    fn provider_error_is_decoded_verbatim() {
        let err = decode_error(
            StatusCode::BAD_REQUEST,
            br#"{"error":{"status":400,"message":"invalid id"}}"#,
        );
        match err {
            ApiError::Provider { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "invalid id");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn empty_body_mentions_status_text() {
        let err = decode_error(StatusCode::INTERNAL_SERVER_ERROR, b"");
        match err {
            ApiError::Provider { status, message } => {
                assert_eq!(status, 500);
                assert!(message.contains("Internal Server Error"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn undecodable_body_reports_length_and_content() {
        let err = decode_error(StatusCode::BAD_GATEWAY, b"<html>oops</html>");
        match err {
            ApiError::Provider { status, message } => {
                assert_eq!(status, 502);
                assert!(message.contains("(17)"));
                assert!(message.contains("<html>oops</html>"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn empty_message_is_synthesized() {
        let err = decode_error(StatusCode::URI_TOO_LONG, br#"{"error":{"status":414}}"#);
        match err {
            ApiError::Provider { status, message } => {
                assert_eq!(status, 414);
                assert!(message.contains("empty error"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
