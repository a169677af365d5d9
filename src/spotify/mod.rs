//! # Spotify Integration Module
//!
//! Interface to the parts of the Spotify Web API fanfeed needs: the OAuth2
//! authorization-code flow, the followed-artists collection, artist albums,
//! album tracks and playlist appends.
//!
//! ## Architecture
//!
//! ```text
//! CLI Layer (run, artists, releases)
//!          ↓
//! Spotify Integration Layer
//!     ├── auth      (consent URL, code exchange, refresh, session)
//!     ├── client    (authenticated GET/POST, error decoding, rate-limit retry)
//!     ├── artists   (cursor pagination over followed artists)
//!     ├── releases  (artist albums, album tracks, recency filter)
//!     ├── playlist  (batched appends)
//!     └── user      (current profile)
//!          ↓
//! HTTP Layer (reqwest, HTTP/1.1 only)
//! ```
//!
//! ## Error Handling
//!
//! Every call returns a typed error from [`crate::error`]:
//! - **Transport** - network or TLS failures from reqwest
//! - **Provider** - non-success HTTP status with the provider's message, or a
//!   synthesized one when the body is empty or not the expected shape
//! - **Decode** - a success body that is not the expected JSON
//! - **RetryExhausted** - still rate limited after the configured retries
//!
//! ## Rate Limiting
//!
//! `429 Too Many Requests` is retried with the wait the provider advises in
//! `Retry-After`, falling back to exponential backoff from 5 seconds. Waits
//! are capped and the number of retries is bounded, see
//! [`client::RetryPolicy`].
//!
//! ## API Coverage
//!
//! - `GET me` - Current user profile
//! - `GET me/following?type=artist` - Followed artists, cursor paginated
//! - `GET artists/{id}/albums` - Artist albums filtered by `include_groups`
//! - `GET albums/{id}/tracks` - Album track listing
//! - `POST playlists/{id}/tracks` - Append up to 100 track URIs
//! - `POST /api/token` - Code exchange and token refresh
//!
//! ## Usage Patterns
//!
//! ```rust
//! let client = spotify::auth::authorize(&config).await?;
//! let me = spotify::user::current_user(&client).await?;
//! let artists = spotify::artists::fetch_all_followed_artists(&client, Some(50), |_, _| {}).await?;
//! ```

pub mod artists;
pub mod auth;
pub mod client;
pub mod playlist;
pub mod releases;
pub mod user;
