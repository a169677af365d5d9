use chrono::{DateTime, Utc};
use tabled::Table;

use crate::{
    cli::{artists::followed_artists, spinner},
    config::Config,
    error::Result,
    spotify::{self, client::Client},
    types::{Album, Artist},
    utils, warning,
};

pub async fn list_releases(config: &Config) -> Result<()> {
    let client = spotify::auth::authorize(config).await?;
    let artists = followed_artists(&client, config.page_size).await?;
    let recent = collect_recent_releases(&client, config, &artists, Utc::now()).await?;
    print_releases(&recent);
    Ok(())
}

/// Fetches the albums of every artist, one request at a time, and keeps the
/// ones released within `config.recent_window` of `reference`.
///
/// Albums shared by several followed artists are reported once.
pub async fn collect_recent_releases(
    client: &Client,
    config: &Config,
    artists: &[Artist],
    reference: DateTime<Utc>,
) -> Result<Vec<Album>> {
    let pb = spinner("Fetching releases for followed artists...");
    let total = artists.len();
    let mut recent: Vec<Album> = Vec::new();

    for (i, artist) in artists.iter().enumerate() {
        pb.set_message(format!(
            "Fetching releases of {name} ({current}/{total})",
            name = artist.name,
            current = i + 1,
        ));

        let albums =
            match spotify::releases::fetch_albums_for_artist(client, &artist.id, &config.release_kinds)
                .await
            {
                Ok(albums) => albums,
                Err(e) => {
                    pb.finish_and_clear();
                    return Err(e.into());
                }
            };

        let filtered = match spotify::releases::filter_recent_releases(
            albums,
            reference,
            config.recent_window,
            config.unparsable_dates,
        ) {
            Ok(filtered) => filtered,
            Err(e) => {
                pb.finish_and_clear();
                return Err(e.into());
            }
        };

        recent.extend(filtered);
    }

    pb.finish_and_clear();
    utils::remove_duplicate_albums(&mut recent);
    Ok(recent)
}

pub fn print_releases(albums: &[Album]) {
    if albums.is_empty() {
        warning!("No recent releases found.");
        return;
    }

    let table = Table::new(utils::release_table_rows(albums));
    println!("{}", table);
}
