use log::debug;
use reqwest::{Method, StatusCode};

use crate::{
    error::PlaylistError,
    spotify::client::Client,
    types::{AddTrackToPlaylistRequest, AddTrackToPlaylistResponse, Track},
};

/// Most URIs the playlist-append endpoint accepts in one request.
pub const MAX_TRACKS_PER_REQUEST: usize = 100;

/// Outcome of a completed append.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaylistUpdate {
    /// Snapshot ID returned for each batch, in write order.
    pub snapshot_ids: Vec<String>,
    pub tracks_written: usize,
}

/// Splits `uris` into consecutive batches of at most
/// [`MAX_TRACKS_PER_REQUEST`]; the last batch holds the remainder.
pub fn plan_batches(uris: &[String]) -> Vec<&[String]> {
    uris.chunks(MAX_TRACKS_PER_REQUEST).collect()
}

/// Appends `tracks` to a playlist, one `POST playlists/{id}/tracks` per batch.
///
/// Batches are written strictly in order. The first failing batch stops the
/// operation; the returned [`PlaylistError::Batch`] tells how many tracks
/// were already committed so the caller can resume with
/// [`append_tracks_to_playlist_from`].
///
/// # Example
///
/// ```
/// let update = append_tracks_to_playlist(&client, "7bs6NLtazYeLmf7uqYs9he", &tracks).await?;
/// println!("{} tracks added", update.tracks_written);
/// ```
pub async fn append_tracks_to_playlist(
    client: &Client,
    playlist_id: &str,
    tracks: &[Track],
) -> Result<PlaylistUpdate, PlaylistError> {
    append_tracks_to_playlist_from(client, playlist_id, tracks, 0).await
}

/// Like [`append_tracks_to_playlist`] but skips the first `offset` tracks.
pub async fn append_tracks_to_playlist_from(
    client: &Client,
    playlist_id: &str,
    tracks: &[Track],
    offset: usize,
) -> Result<PlaylistUpdate, PlaylistError> {
    let uris: Vec<String> = tracks
        .iter()
        .skip(offset)
        .map(|t| t.uri.clone())
        .collect();
    let path = format!("playlists/{id}/tracks", id = playlist_id);

    let mut update = PlaylistUpdate::default();

    for (batch, chunk) in plan_batches(&uris).into_iter().enumerate() {
        debug!(
            "adding batch {} ({} tracks) to playlist {}",
            batch,
            chunk.len(),
            playlist_id
        );

        let body = AddTrackToPlaylistRequest {
            uris: chunk.to_vec(),
        };
        let response = client
            .execute::<AddTrackToPlaylistResponse, _>(
                Method::POST,
                &path,
                Some(&body),
                &[StatusCode::CREATED],
            )
            .await
            .map_err(|source| PlaylistError::Batch {
                batch,
                committed: update.tracks_written,
                resume_from: offset + update.tracks_written,
                source,
            })?;

        if let Some(r) = response {
            update.snapshot_ids.push(r.snapshot_id);
        }
        update.tracks_written += chunk.len();
    }

    Ok(update)
}
