use std::{cmp::Ordering, collections::BTreeSet, collections::HashSet, fmt};

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::{Rng, distr::Alphanumeric};
use sha2::{Digest, Sha256};

use crate::types::{Album, ReleaseTableRow};

/// Upper bound the Web API accepts for `limit` on cursor and album pages.
pub const MAX_PAGE_SIZE: u32 = 50;

fn random_alphanumeric(len: usize) -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

pub fn generate_code_verifier() -> String {
    random_alphanumeric(128)
}

pub fn generate_code_challenge(verifier: &str) -> String {
    let hash = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hash)
}

/// Anti-forgery token for the `state` parameter of the consent URL.
pub fn generate_state() -> String {
    random_alphanumeric(16)
}

/// Clamps a requested page size into `1..=50`. `None` asks the provider for
/// its own default and is passed through untouched.
pub fn clamp_page_size(requested: Option<u32>) -> Option<u32> {
    requested.map(|n| n.clamp(1, MAX_PAGE_SIZE))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ReleaseKind {
    Album,
    Single,
    AppearsOn,
    Compilation,
}

impl ReleaseKind {
    pub const ALL: [ReleaseKind; 4] = [
        ReleaseKind::Album,
        ReleaseKind::Single,
        ReleaseKind::AppearsOn,
        ReleaseKind::Compilation,
    ];

    fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().replace('-', "_").as_str() {
            "album" => Some(ReleaseKind::Album),
            "single" => Some(ReleaseKind::Single),
            "appears_on" => Some(ReleaseKind::AppearsOn),
            "compilation" => Some(ReleaseKind::Compilation),
            _ => None,
        }
    }
}

impl fmt::Display for ReleaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ReleaseKind::Album => "album",
            ReleaseKind::Single => "single",
            ReleaseKind::AppearsOn => "appears_on",
            ReleaseKind::Compilation => "compilation",
        };
        f.write_str(s)
    }
}

/// Set of album groups sent as `include_groups`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseKinds(pub BTreeSet<ReleaseKind>);

impl Default for ReleaseKinds {
    fn default() -> Self {
        ReleaseKinds(BTreeSet::from([ReleaseKind::Album, ReleaseKind::Single]))
    }
}

impl ReleaseKinds {
    pub fn iter(&self) -> impl Iterator<Item = ReleaseKind> + '_ {
        self.0.iter().copied()
    }
}

impl fmt::Display for ReleaseKinds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self
            .0
            .iter()
            .map(ReleaseKind::to_string)
            .collect::<Vec<_>>()
            .join(",");
        f.write_str(&joined)
    }
}

/// Parses a comma separated list of album groups; `all` selects every group.
pub fn parse_release_kinds(input: &str) -> Result<ReleaseKinds, String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err("release type list cannot be empty".to_string());
    }

    let mut kinds = BTreeSet::new();
    for segment in trimmed.split(',') {
        let segment = segment.trim();
        if segment.is_empty() {
            return Err(format!("empty segment in '{}'", input));
        }
        if segment.eq_ignore_ascii_case("all") {
            kinds.extend(ReleaseKind::ALL);
            continue;
        }
        match ReleaseKind::parse(segment) {
            Some(kind) => {
                kinds.insert(kind);
            }
            None => {
                return Err(format!(
                    "invalid value '{}', expected one of album, single, appears_on, compilation, all",
                    segment
                ));
            }
        }
    }

    Ok(ReleaseKinds(kinds))
}

pub fn remove_duplicate_albums(albums: &mut Vec<Album>) {
    let mut seen_ids = HashSet::new();
    albums.retain(|album| seen_ids.insert(album.id.clone()));
}

pub fn sort_release_table_rows(rows: &mut [ReleaseTableRow]) {
    rows.sort_by(|a, b| {
        match b.date.cmp(&a.date) {
            Ordering::Equal => a.artists.cmp(&b.artists), // secondary sort: artist ascending
            other => other,
        }
    });
}

pub fn release_table_rows(albums: &[Album]) -> Vec<ReleaseTableRow> {
    let mut rows: Vec<ReleaseTableRow> = albums
        .iter()
        .map(|a| ReleaseTableRow {
            date: a.release_date.clone(),
            name: a.name.clone(),
            artists: a
                .artists
                .iter()
                .map(|artist| artist.name.as_str())
                .collect::<Vec<_>>()
                .join(", "),
            kind: a.album_group.clone().unwrap_or_else(|| a.album_type.clone()),
        })
        .collect();
    sort_release_table_rows(&mut rows);
    rows
}
