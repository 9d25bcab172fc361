mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mediagrab_core::MediaMode;

/// Wanted-list driven torrent grabber.
#[derive(Parser)]
#[command(name = "mediagrab")]
#[command(about = "Search a forum indexer for wanted movies and episodes and fetch their torrents")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file
    #[arg(short, long, env = "MEDIAGRAB_CONFIG", default_value = "config.toml")]
    config: PathBuf,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch every wanted movie from the library
    Movies,
    /// Fetch the first missing episode of every wanted series
    Tv,
    /// Search the site and list results in the configured resolutions
    Search {
        keyword: String,
        /// Append a year to the query
        #[arg(short, long)]
        year: Option<String>,
        /// Use the TV section
        #[arg(long)]
        tv: bool,
    },
    /// Download the torrent attached to a detail page, without recording it
    Fetch {
        link: String,
        /// Use the TV section
        #[arg(long)]
        tv: bool,
    },
    /// Print the loaded configuration with secrets hidden
    Config,
}

fn section(tv: bool) -> MediaMode {
    if tv {
        MediaMode::Tv
    } else {
        MediaMode::Movie
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format);

    if let Err(e) = run(cli).await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

fn init_logging(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = commands::load(&cli.config)?;

    match cli.command {
        Commands::Movies => commands::grab(&config, MediaMode::Movie).await,
        Commands::Tv => commands::grab(&config, MediaMode::Tv).await,
        Commands::Search { keyword, year, tv } => {
            commands::search(&config, section(tv), &keyword, year.as_deref()).await
        }
        Commands::Fetch { link, tv } => commands::fetch(&config, section(tv), &link).await,
        Commands::Config => commands::show_config(&config),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_search_with_year() {
        let cli = Cli::try_parse_from(["mediagrab", "search", "Bar", "--year", "2019"]).unwrap();
        match cli.command {
            Commands::Search { keyword, year, tv } => {
                assert_eq!(keyword, "Bar");
                assert_eq!(year.as_deref(), Some("2019"));
                assert!(!tv);
            }
            _ => panic!("expected search"),
        }
    }

    #[test]
    fn test_parse_global_options() {
        let cli = Cli::try_parse_from([
            "mediagrab",
            "--config",
            "/config/mediagrab.toml",
            "--log-format",
            "json",
            "tv",
        ])
        .unwrap();
        assert_eq!(cli.config, PathBuf::from("/config/mediagrab.toml"));
        assert!(matches!(cli.log_format, LogFormat::Json));
        assert!(matches!(cli.command, Commands::Tv));
    }
}
