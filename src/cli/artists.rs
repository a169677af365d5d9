use indicatif::ProgressBar;
use tabled::Table;

use crate::{
    cli::spinner,
    config::Config,
    error::Result,
    spotify::{self, client::Client},
    success,
    types::{Artist, ArtistTableRow},
    warning,
};

pub async fn list_artists(config: &Config, search: Option<String>) -> Result<()> {
    let client = spotify::auth::authorize(config).await?;
    let mut artists = followed_artists(&client, config.page_size).await?;

    artists.sort_by_key(|a| a.name.to_lowercase());
    if let Some(search) = search {
        let term = search.to_lowercase();
        artists.retain(|a| a.name.to_lowercase().contains(&term));
    }

    if artists.is_empty() {
        warning!("No followed artists found.");
        return Ok(());
    }

    let rows: Vec<ArtistTableRow> = artists
        .into_iter()
        .map(|a| ArtistTableRow {
            name: a.name,
            followers: a.followers.total,
            genres: a.genres.iter().take(3).cloned().collect::<Vec<_>>().join(","),
        })
        .collect();

    println!("{}", Table::new(rows));
    Ok(())
}

/// Walks the followed-artists collection behind a spinner.
pub async fn followed_artists(client: &Client, page_size: Option<u32>) -> Result<Vec<Artist>> {
    let pb: ProgressBar = spinner("Fetching followed artists...");

    let result = spotify::artists::fetch_all_followed_artists(client, page_size, |count, total| {
        pb.set_message(match total {
            Some(total) => format!("Fetched {count}/{total} followed artists..."),
            None => format!("Fetched {count} followed artists..."),
        });
    })
    .await;

    pb.finish_and_clear();
    let artists = result?;
    success!("Found {} followed artists", artists.len());
    Ok(artists)
}
