//! # API Module
//!
//! HTTP endpoints served by the short-lived local listener that receives the
//! OAuth redirect.
//!
//! ## Endpoints
//!
//! - [`callback`] - Validates the redirect (`code`, `state`, optional
//!   `error`), exchanges the code for a token and hands the result to the
//!   waiting flow. Responds `200` on success, `404` when the state does not
//!   match, `403 Couldn't get token.` on any other failure and `410` once a
//!   result has already been delivered.
//! - [`health`] - Reports name and version; handy to check that the listener
//!   is up.
//!
//! ## Usage Example
//!
//! ```rust,ignore
//! use axum::{Router, routing::get};
//! use fanfeed::api::{callback, health};
//!
//! let app = Router::new()
//!     .route("/callback", get(callback))
//!     .route("/health", get(health));
//! ```
//!
//! See [`crate::server`] for the listener lifecycle.

mod callback;
mod health;

pub use callback::callback;
pub use health::health;
