use std::future::Future;

use log::{debug, warn};

use crate::{
    error::ApiError,
    spotify::client::Client,
    types::{Artist, CursorPage, FollowedArtistsResponse},
    utils,
};

/// Anything that can serve pages of the "followed artists" collection.
///
/// [`Client`] is the real implementation; tests plug in canned pages.
pub trait FollowedArtistsSource {
    fn followed_artists_page(
        &self,
        limit: Option<u32>,
        after: Option<&str>,
    ) -> impl Future<Output = Result<CursorPage<Artist>, ApiError>>;
}

impl FollowedArtistsSource for Client {
    /// Retrieves one page of followed artists via `GET me/following`.
    ///
    /// * `limit` - Page size (1-50); `None` leaves the choice to the provider
    /// * `after` - Cursor of the previous page, `None` for the first page
    async fn followed_artists_page(
        &self,
        limit: Option<u32>,
        after: Option<&str>,
    ) -> Result<CursorPage<Artist>, ApiError> {
        let mut query = vec![("type", "artist".to_string())];
        if let Some(limit) = limit {
            query.push(("limit", limit.to_string()));
        }
        if let Some(after) = after {
            query.push(("after", after.to_string()));
        }

        let response: Option<FollowedArtistsResponse> = self.get("me/following", &query).await?;

        Ok(response.map(|r| r.artists).unwrap_or_else(|| CursorPage {
            items: Vec::new(),
            next: None,
            cursors: None,
            total: Some(0),
            limit,
        }))
    }
}

/// Walks the followed-artists collection until the provider stops handing
/// out a `next` link.
///
/// Items of every page are appended before the termination check, so the
/// last page is always included. The cursor for the following request is
/// the provider's `cursors.after` when present, otherwise the ID of the last
/// artist collected so far.
///
/// # Arguments
///
/// * `source` - Where pages come from, usually an authenticated [`Client`]
/// * `page_size` - Requested page size, clamped to 1-50; `None` uses the
///   provider default
/// * `on_page` - Called after every page with the number of artists collected
///   so far and the total the provider reports
///
/// # Returns
///
/// All followed artists in provider order. The walk is not restartable; a
/// failing page aborts it with the page's error.
///
/// # Example
///
/// ```
/// let artists = fetch_all_followed_artists(&client, Some(50), |_, _| {}).await?;
/// println!("You follow {} artists", artists.len());
/// ```
pub async fn fetch_all_followed_artists<S, F>(
    source: &S,
    page_size: Option<u32>,
    mut on_page: F,
) -> Result<Vec<Artist>, ApiError>
where
    S: FollowedArtistsSource,
    F: FnMut(usize, Option<u64>),
{
    let limit = utils::clamp_page_size(page_size);
    let mut artists: Vec<Artist> = Vec::new();
    let mut after: Option<String> = None;

    loop {
        let page = source.followed_artists_page(limit, after.as_deref()).await?;
        let last_page = page.is_last();
        let provider_cursor = page.after().map(str::to_string);

        artists.extend(page.items);
        on_page(artists.len(), page.total);

        if last_page {
            break;
        }

        let next_after = provider_cursor.or_else(|| artists.last().map(|a| a.id.clone()));
        if next_after.is_none() || next_after == after {
            warn!(
                "pagination cursor did not advance after {} artists, stopping",
                artists.len()
            );
            break;
        }

        debug!("next followed-artists page after {:?}", next_after);
        after = next_after;
    }

    Ok(artists)
}
