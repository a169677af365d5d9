use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use log::debug;

use crate::{
    error::{ApiError, DateParseError},
    spotify::client::Client,
    types::{Album, AlbumResponse, Track, TracksResponse},
    utils,
};

/// What to do with albums whose release date cannot be parsed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UnparsableDatePolicy {
    /// Drop the album from the result.
    #[default]
    Exclude,
    /// Keep the album as if it were recent.
    Include,
    /// Abort filtering with the parse error.
    Fail,
}

/// Retrieves albums/releases for an artist via `GET artists/{id}/albums`.
///
/// Only the first page is requested, so artists with very large catalogs
/// are truncated to whatever the provider puts on it.
///
/// # Arguments
///
/// * `client` - Authenticated Web API client
/// * `artist_id` - Spotify ID of the artist
/// * `release_types` - Album groups to include (album, single, ...)
///
/// # Returns
///
/// The albums on the first page, in provider order. A `204 No Content`
/// yields an empty list.
///
/// # Example
///
/// ```
/// let albums = fetch_albums_for_artist(&client, "4NHQUGzhtTLFvgF5SZesLK", &ReleaseKinds::default()).await?;
/// println!("Found {} releases", albums.len());
/// ```
pub async fn fetch_albums_for_artist(
    client: &Client,
    artist_id: &str,
    release_types: &utils::ReleaseKinds,
) -> Result<Vec<Album>, ApiError> {
    let path = format!("artists/{id}/albums", id = artist_id);
    let query = [
        ("include_groups", release_types.to_string()),
        ("limit", utils::MAX_PAGE_SIZE.to_string()),
    ];

    let response: Option<AlbumResponse> = client.get(&path, &query).await?;
    Ok(response.map(|r| r.items).unwrap_or_default())
}

/// Retrieves every track of one album via `GET albums/{id}/tracks`.
///
/// Pages are requested with `limit` (clamped to 1-50; `None` uses the
/// provider default) and an increasing `offset` until the provider stops
/// handing out a `next` link. Every returned track carries `album_id`.
pub async fn fetch_album_tracks(
    client: &Client,
    album_id: &str,
    limit: Option<u32>,
) -> Result<Vec<Track>, ApiError> {
    let path = format!("albums/{id}/tracks", id = album_id);
    let limit = utils::clamp_page_size(limit);
    let mut tracks: Vec<Track> = Vec::new();

    loop {
        let mut query = vec![("offset", tracks.len().to_string())];
        if let Some(limit) = limit {
            query.push(("limit", limit.to_string()));
        }

        let Some(page) = client.get::<TracksResponse>(&path, &query).await? else {
            break;
        };
        let received = page.items.len();
        tracks.extend(page.items);

        if page.next.is_none() || received == 0 {
            break;
        }
        debug!("album {} has more tracks after {}", album_id, tracks.len());
    }

    for track in &mut tracks {
        track.album_id = Some(album_id.to_string());
    }
    Ok(tracks)
}

/// Parses a release date into the first day it covers.
///
/// Dates with `year` or `month` precision (`2023`, `2023-07`) resolve to the
/// first day of that year or month. The string itself decides the layout;
/// `precision` is only reported back in errors.
pub fn parse_release_date(value: &str, precision: &str) -> Result<NaiveDate, DateParseError> {
    let value = value.trim();
    let err = || DateParseError {
        value: value.to_string(),
        precision: precision.to_string(),
    };

    let parsed = match value.len() {
        4 => value
            .parse::<i32>()
            .ok()
            .and_then(|year| NaiveDate::from_ymd_opt(year, 1, 1)),
        7 => NaiveDate::parse_from_str(&format!("{}-01", value), "%Y-%m-%d").ok(),
        10 => NaiveDate::parse_from_str(value, "%Y-%m-%d").ok(),
        _ => None,
    };

    parsed.ok_or_else(err)
}

/// Tells whether `album` was released less than `window` before `reference`.
///
/// The release instant is midnight UTC of the release date. The comparison
/// is strict: an album released exactly `window` ago is not recent. Dates in
/// the future count as recent.
pub fn is_recent_release(
    album: &Album,
    reference: DateTime<Utc>,
    window: Duration,
) -> Result<bool, DateParseError> {
    let released = parse_release_date(&album.release_date, &album.release_date_precision)?
        .and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc())
        .ok_or_else(|| DateParseError {
            value: album.release_date.clone(),
            precision: album.release_date_precision.clone(),
        })?;

    let elapsed = reference.signed_duration_since(released);
    Ok(match elapsed.to_std() {
        Ok(elapsed) => elapsed < window,
        // negative: released after the reference instant
        Err(_) => true,
    })
}

/// Keeps the albums released within `window` of `reference`.
pub fn filter_recent_releases(
    albums: Vec<Album>,
    reference: DateTime<Utc>,
    window: Duration,
    policy: UnparsableDatePolicy,
) -> Result<Vec<Album>, DateParseError> {
    let mut recent = Vec::new();

    for album in albums {
        let keep = match is_recent_release(&album, reference, window) {
            Ok(keep) => keep,
            Err(e) => match policy {
                UnparsableDatePolicy::Exclude => {
                    debug!("skipping {}: {}", album.name, e);
                    false
                }
                UnparsableDatePolicy::Include => true,
                UnparsableDatePolicy::Fail => return Err(e),
            },
        };

        if keep {
            recent.push(album);
        }
    }

    Ok(recent)
}
