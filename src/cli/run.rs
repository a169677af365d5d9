use chrono::{DateTime, Utc};

use crate::{
    cli::{
        artists::followed_artists,
        releases::{collect_recent_releases, print_releases},
        spinner,
    },
    config::Config,
    error::Result,
    info,
    spotify::{self, client::Client, playlist::PlaylistUpdate},
    success,
    types::{Album, Track},
};

/// Page size for album track listings; the provider maximum.
const TRACKS_PAGE_SIZE: u32 = 50;

#[derive(Debug, Default)]
pub struct RunSummary {
    pub user: String,
    pub artists: usize,
    pub recent: Vec<Album>,
    pub tracks: Vec<Track>,
    /// `None` when no playlist was configured or the run was a dry run.
    pub playlist: Option<PlaylistUpdate>,
}

/// Authenticates and runs the whole pipeline.
pub async fn run(config: &Config, dry_run: bool) -> Result<RunSummary> {
    let client = spotify::auth::authorize(config).await?;
    run_with_client(&client, config, Utc::now(), dry_run).await
}

/// Followed artists, their recent releases and, when a playlist is
/// configured, the tracks of those releases appended to it.
pub async fn run_with_client(
    client: &Client,
    config: &Config,
    reference: DateTime<Utc>,
    dry_run: bool,
) -> Result<RunSummary> {
    let user = spotify::user::current_user(client).await?;
    info!("Logged in as {}", user.label());

    let artists = followed_artists(client, config.page_size).await?;
    let recent = collect_recent_releases(client, config, &artists, reference).await?;
    print_releases(&recent);

    let mut summary = RunSummary {
        user: user.label().to_string(),
        artists: artists.len(),
        recent,
        ..Default::default()
    };

    let Some(playlist_id) = config.playlist_id.as_deref() else {
        return Ok(summary);
    };

    summary.tracks = collect_tracks(client, &summary.recent).await?;
    if dry_run {
        info!(
            "Dry run: {} tracks would be added to playlist {}",
            summary.tracks.len(),
            playlist_id
        );
        return Ok(summary);
    }

    info!(
        "Adding {} tracks to playlist {}",
        summary.tracks.len(),
        playlist_id
    );
    let update =
        spotify::playlist::append_tracks_to_playlist(client, playlist_id, &summary.tracks).await?;
    success!(
        "Added {} tracks in {} batches",
        update.tracks_written,
        update.snapshot_ids.len()
    );
    summary.playlist = Some(update);

    Ok(summary)
}

async fn collect_tracks(client: &Client, albums: &[Album]) -> Result<Vec<Track>> {
    let pb = spinner("Fetching tracks of recent releases...");
    let mut tracks = Vec::new();

    for album in albums {
        pb.set_message(format!("Fetching tracks of {}", album.name));
        match spotify::releases::fetch_album_tracks(client, &album.id, Some(TRACKS_PAGE_SIZE)).await {
            Ok(album_tracks) => tracks.extend(album_tracks),
            Err(e) => {
                pb.finish_and_clear();
                return Err(e.into());
            }
        }
    }

    pb.finish_and_clear();
    Ok(tracks)
}
