use std::time::Duration;

use clap::{
    CommandFactory, Parser, Subcommand,
    builder::{
        Styles,
        styling::{AnsiColor, Effects},
    },
};
use clap_complete::{Shell, generate};

use fanfeed::{
    cli,
    config::{self, Config},
    error,
    spotify::releases::UnparsableDatePolicy,
    success, utils, warning,
};

fn styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::White.on_default() | Effects::BOLD)
        .usage(AnsiColor::White.on_default() | Effects::BOLD)
        .literal(AnsiColor::BrightBlue.on_default())
        .placeholder(AnsiColor::BrightGreen.on_default())
}

#[derive(Parser, Debug, Clone)]
#[clap(
  version = env!("CARGO_PKG_VERSION"),
  name=env!("CARGO_PKG_NAME"),
  bin_name=env!("CARGO_PKG_NAME"),
  author=env!("CARGO_PKG_AUTHORS"),
  about=env!("CARGO_PKG_DESCRIPTION"),
  styles=styles(),
)]
struct Cli {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Collect recent releases and append their tracks to a playlist
    Run(RunOptions),

    /// List followed artists
    Artists(ArtistsOptions),

    /// List recent releases of followed artists
    Releases(ReleasesOptions),

    /// Get shell completions
    Completions(CompletionsOption),
}

#[derive(Parser, Debug, Clone)]
pub struct FilterOptions {
    /// Releases younger than this many hours count as recent
    #[clap(long)]
    pub window_hours: Option<u64>,

    /// Release type(s) to include, comma separated (album, single, appears_on, compilation, all)
    #[clap(long = "type", value_parser = utils::parse_release_kinds)]
    pub release_types: Option<utils::ReleaseKinds>,

    /// Keep releases whose date cannot be parsed instead of dropping them
    #[clap(long, conflicts_with = "strict_dates")]
    pub include_unparsable: bool,

    /// Fail on the first release whose date cannot be parsed
    #[clap(long)]
    pub strict_dates: bool,

    /// Followed artists per page (1-50)
    #[clap(long)]
    pub page_size: Option<u32>,

    /// Give up on rate limited requests after this many retries
    #[clap(long)]
    pub max_retries: Option<u32>,
}

#[derive(Parser, Debug, Clone)]
pub struct RunOptions {
    /// Target playlist; overrides FANFEED_PLAYLIST_ID
    #[clap(long)]
    pub playlist: Option<String>,

    /// Collect tracks but do not write to the playlist
    #[clap(long)]
    pub dry_run: bool,

    #[clap(flatten)]
    pub filter: FilterOptions,
}

#[derive(Parser, Debug, Clone)]
pub struct ArtistsOptions {
    /// Search for artists
    #[clap(long)]
    pub search: Option<String>,

    /// Followed artists per page (1-50)
    #[clap(long)]
    pub page_size: Option<u32>,
}

#[derive(Parser, Debug, Clone)]
pub struct ReleasesOptions {
    #[clap(flatten)]
    pub filter: FilterOptions,
}

#[derive(Parser, Debug, Clone)]
pub struct CompletionsOption {
    shell: Shell,
}

fn apply_filter(config: &mut Config, filter: FilterOptions) {
    if let Some(hours) = filter.window_hours {
        config.recent_window = Duration::from_secs(hours.saturating_mul(3600));
    }
    if let Some(kinds) = filter.release_types {
        config.release_kinds = kinds;
    }
    if filter.include_unparsable {
        config.unparsable_dates = UnparsableDatePolicy::Include;
    }
    if filter.strict_dates {
        config.unparsable_dates = UnparsableDatePolicy::Fail;
    }
    if filter.page_size.is_some() {
        config.page_size = filter.page_size;
    }
    if let Some(retries) = filter.max_retries {
        config.retry.max_retries = retries;
    }
}

fn load_config() -> Config {
    match Config::from_env() {
        Ok(config) => config,
        Err(e) => error!(
            "Invalid configuration: {}\nSee {}",
            e,
            config::env_file_path().display()
        ),
    }
}

#[tokio::main]
async fn main() {
    env_logger::init();

    if let Err(e) = config::load_env().await {
        warning!("Cannot load environment file. Err: {}", e);
    }

    let cli = Cli::parse();

    match cli.command {
        Command::Run(opt) => {
            let mut config = load_config();
            apply_filter(&mut config, opt.filter);
            if opt.playlist.is_some() {
                config.playlist_id = opt.playlist;
            }

            match cli::run(&config, opt.dry_run).await {
                Ok(summary) => success!(
                    "{} recent releases from {} followed artists",
                    summary.recent.len(),
                    summary.artists
                ),
                Err(e) => error!("Run failed: {}", e),
            }
        }
        Command::Artists(opt) => {
            let mut config = load_config();
            if opt.page_size.is_some() {
                config.page_size = opt.page_size;
            }
            if let Err(e) = cli::list_artists(&config, opt.search).await {
                error!("Cannot list artists: {}", e);
            }
        }
        Command::Releases(opt) => {
            let mut config = load_config();
            apply_filter(&mut config, opt.filter);
            if let Err(e) = cli::list_releases(&config).await {
                error!("Cannot list releases: {}", e);
            }
        }
        Command::Completions(opt) => {
            let mut cmd = Cli::command_for_update();
            let name = cmd.get_name().to_string();
            generate(opt.shell, &mut cmd, name, &mut std::io::stdout())
        }
    }
}
