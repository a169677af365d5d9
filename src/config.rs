//! Configuration management for fanfeed.
//!
//! Values are read from environment variables, optionally seeded from a
//! `.env` file in the local data directory, and collected into an explicit
//! [`Config`] that is handed to every operation that needs it.
//!
//! The lookup order is:
//! 1. Environment variables (highest priority)
//! 2. `.env` file in the local data directory
//! 3. Application defaults (where applicable)

use std::{env, net::SocketAddr, path::PathBuf, str::FromStr, time::Duration};

use reqwest::Url;

use crate::{error::ConfigError, spotify::client::RetryPolicy, spotify::releases::UnparsableDatePolicy, utils};

pub const DEFAULT_REDIRECT_URI: &str = "http://localhost:8080/callback";
pub const DEFAULT_SERVER_ADDRESS: &str = "127.0.0.1:8080";
pub const DEFAULT_AUTH_URL: &str = "https://accounts.spotify.com/authorize";
pub const DEFAULT_TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
pub const DEFAULT_API_URL: &str = "https://api.spotify.com/v1/";
pub const DEFAULT_SCOPE: &str =
    "user-read-private user-follow-read user-follow-modify playlist-modify-private";

/// Releases younger than this count as recent (730 hours, roughly a month).
pub const DEFAULT_RECENT_WINDOW: Duration = Duration::from_secs(730 * 3600);

/// Loads environment variables from a `.env` file in the local data directory.
///
/// The file lives at `<data_local_dir>/fanfeed/.env`:
/// - Linux: `~/.local/share/fanfeed/.env`
/// - macOS: `~/Library/Application Support/fanfeed/.env`
/// - Windows: `%LOCALAPPDATA%/fanfeed/.env`
///
/// The parent directory is created if needed. A missing file is not an
/// error; variables already present in the process environment are kept.
pub async fn load_env() -> Result<(), ConfigError> {
    let path = env_file_path();
    if let Some(parent) = path.parent() {
        async_fs::create_dir_all(parent)
            .await
            .map_err(|e| ConfigError::EnvFile(e.to_string()))?;
    }

    match dotenv::from_path(&path) {
        Ok(()) => Ok(()),
        Err(dotenv::Error::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(ConfigError::EnvFile(e.to_string())),
    }
}

pub fn env_file_path() -> PathBuf {
    let mut path = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push("fanfeed/.env");
    path
}

/// Everything a run needs to know, resolved once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub client_id: String,
    /// When absent the code exchange relies on PKCE alone.
    pub client_secret: Option<String>,
    pub redirect_uri: Url,
    pub server_addr: SocketAddr,
    pub auth_url: Url,
    pub token_url: Url,
    pub api_url: Url,
    pub scopes: Vec<String>,
    /// Fixed anti-forgery state; a random one is generated when `None`.
    pub state: Option<String>,
    pub playlist_id: Option<String>,
    pub page_size: Option<u32>,
    pub recent_window: Duration,
    pub unparsable_dates: UnparsableDatePolicy,
    pub release_kinds: utils::ReleaseKinds,
    pub retry: RetryPolicy,
    pub callback_timeout: Duration,
}

impl Config {
    /// Builds a configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds a configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let client_id = get("SPOTIFY_CLIENT_ID").ok_or(ConfigError::Missing("SPOTIFY_CLIENT_ID"))?;
        let scope = get("SPOTIFY_API_AUTH_SCOPE").unwrap_or_else(|| DEFAULT_SCOPE.to_string());

        Ok(Config {
            client_id,
            client_secret: get("SPOTIFY_CLIENT_SECRET"),
            redirect_uri: parse_url(
                "SPOTIFY_REDIRECT_URI",
                get("SPOTIFY_REDIRECT_URI").as_deref().unwrap_or(DEFAULT_REDIRECT_URI),
            )?,
            server_addr: parse_addr(
                "SERVER_ADDRESS",
                get("SERVER_ADDRESS").as_deref().unwrap_or(DEFAULT_SERVER_ADDRESS),
            )?,
            auth_url: parse_url(
                "SPOTIFY_API_AUTH_URL",
                get("SPOTIFY_API_AUTH_URL").as_deref().unwrap_or(DEFAULT_AUTH_URL),
            )?,
            token_url: parse_url(
                "SPOTIFY_API_TOKEN_URL",
                get("SPOTIFY_API_TOKEN_URL").as_deref().unwrap_or(DEFAULT_TOKEN_URL),
            )?,
            api_url: parse_base_url(
                "SPOTIFY_API_URL",
                get("SPOTIFY_API_URL").as_deref().unwrap_or(DEFAULT_API_URL),
            )?,
            scopes: scope.split_whitespace().map(str::to_string).collect(),
            state: get("FANFEED_STATE"),
            playlist_id: get("FANFEED_PLAYLIST_ID"),
            page_size: Some(utils::MAX_PAGE_SIZE),
            recent_window: DEFAULT_RECENT_WINDOW,
            unparsable_dates: UnparsableDatePolicy::default(),
            release_kinds: utils::ReleaseKinds::default(),
            retry: RetryPolicy::default(),
            callback_timeout: Duration::from_secs(120),
        })
    }
}

fn parse_url(name: &'static str, value: &str) -> Result<Url, ConfigError> {
    Url::parse(value).map_err(|e| ConfigError::Invalid {
        name,
        reason: e.to_string(),
    })
}

/// Base URLs are joined with relative paths, so they must end in `/`.
fn parse_base_url(name: &'static str, value: &str) -> Result<Url, ConfigError> {
    if value.ends_with('/') {
        parse_url(name, value)
    } else {
        parse_url(name, &format!("{}/", value))
    }
}

fn parse_addr(name: &'static str, value: &str) -> Result<SocketAddr, ConfigError> {
    SocketAddr::from_str(value).map_err(|e| ConfigError::Invalid {
        name,
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_apply_when_only_client_id_is_set() {
        let config = Config::from_lookup(lookup(&[("SPOTIFY_CLIENT_ID", "abc")])).unwrap();

        assert_eq!(config.client_id, "abc");
        assert_eq!(config.client_secret, None);
        assert_eq!(config.redirect_uri.as_str(), DEFAULT_REDIRECT_URI);
        assert_eq!(config.api_url.as_str(), DEFAULT_API_URL);
        assert_eq!(config.server_addr.port(), 8080);
        assert_eq!(config.recent_window, Duration::from_secs(730 * 3600));
        assert!(config.scopes.contains(&"user-follow-read".to_string()));
    }

    #[test]
    fn missing_client_id_is_reported() {
        let err = Config::from_lookup(lookup(&[])).unwrap_err();
        assert_eq!(err, ConfigError::Missing("SPOTIFY_CLIENT_ID"));
    }

    #[test]
    fn api_url_gets_trailing_slash() {
        let config = Config::from_lookup(lookup(&[
            ("SPOTIFY_CLIENT_ID", "abc"),
            ("SPOTIFY_API_URL", "http://127.0.0.1:9000/v1"),
        ]))
        .unwrap();
        assert_eq!(config.api_url.as_str(), "http://127.0.0.1:9000/v1/");
    }

    #[test]
    fn bad_server_address_is_invalid() {
        let err = Config::from_lookup(lookup(&[
            ("SPOTIFY_CLIENT_ID", "abc"),
            ("SERVER_ADDRESS", "not an address"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "SERVER_ADDRESS", .. }));
    }
}
