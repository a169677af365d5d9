//! # CLI Module
//!
//! User-facing commands. Each command resolves a session through
//! [`crate::spotify::auth::authorize`], drives the Spotify layer and renders
//! progress and results; errors are returned to the binary, which alone
//! decides to exit.
//!
//! ## Commands
//!
//! - [`run`] - Followed artists, recent releases and the playlist append
//! - [`list_artists`] - Table of followed artists with optional search
//! - [`list_releases`] - Table of recent releases, no playlist writes
//!
//! ## Data Flow
//!
//! ```text
//! authorize → current user → followed artists (paginated)
//!           → albums per artist → recency filter
//!           → album tracks → playlist append (batches of 100)
//! ```
//!
//! Everything runs sequentially, one request at a time.

mod artists;
mod releases;
mod run;

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

pub use artists::followed_artists;
pub use artists::list_artists;
pub use releases::collect_recent_releases;
pub use releases::list_releases;
pub use run::RunSummary;
pub use run::run;
pub use run::run_with_client;

pub(crate) fn spinner(message: &'static str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(100));
    if let Ok(style) = ProgressStyle::with_template("{spinner:.blue} {msg}") {
        pb.set_style(style.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"));
    }
    pb
}
