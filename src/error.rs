//! Error types shared across the crate.
//!
//! Every fallible library operation returns one of the enums below; only the
//! binary decides whether an error ends the process.

use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;

/// Failures of the authorization-code flow.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("spotify: auth failed - {0}")]
    ProviderDenied(String),

    #[error("spotify: didn't get access code")]
    MissingCode,

    #[error("spotify: redirect state parameter doesn't match (expected {expected}, got {actual})")]
    StateMismatch { expected: String, actual: String },

    #[error("token exchange failed: {0}")]
    Exchange(#[from] ApiError),

    #[error("no authorization callback received within {0:?}")]
    Timeout(Duration),

    #[error("callback server error: {0}")]
    Server(String),
}

/// Failures of a single Web API call.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("spotify: HTTP {status}: {message}")]
    Provider { status: u16, message: String },

    #[error("cannot decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("gave up after {attempts} attempts, last status {status}")]
    RetryExhausted { attempts: u32, status: StatusCode },
}

impl ApiError {
    /// HTTP status carried by a provider error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Provider { status, .. } => Some(*status),
            ApiError::RetryExhausted { status, .. } => Some(status.as_u16()),
            ApiError::Transport(e) => e.status().map(|s| s.as_u16()),
            ApiError::Decode(_) => None,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unrecognized release date '{value}' (precision '{precision}')")]
pub struct DateParseError {
    pub value: String,
    pub precision: String,
}

#[derive(Error, Debug)]
pub enum PlaylistError {
    /// Batch `batch` (zero based) failed. `committed` tracks were written by
    /// earlier batches; passing `resume_from` as the offset retries from the
    /// first uncommitted track.
    #[error("batch {batch} failed after {committed} tracks were committed: {source}")]
    Batch {
        batch: usize,
        committed: usize,
        resume_from: usize,
        #[source]
        source: ApiError,
    },
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },

    #[error("cannot load environment file: {0}")]
    EnvFile(String),
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    DateParse(#[from] DateParseError),

    #[error(transparent)]
    Playlist(#[from] PlaylistError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type Result<T> = std::result::Result<T, Error>;
