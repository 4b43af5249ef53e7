//! TourCache CLI - Command-line interface
//!
//! Lists photos near a map location, downloads them on demand and keeps
//! them in a local store.

mod commands;
mod error;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tourcache::cache::EntryId;
use tourcache::config::{default_config_path, ConfigFile};
use tourcache::coord::LocationKey;
use tourcache::logging::init_logging;
use tracing::debug;

use commands::common::{apply_overrides, build_cache, Overrides};
use commands::config::ConfigCommands;
use error::CliError;

#[derive(Debug, Parser)]
#[command(name = "tourcache", version, about = "On-demand photo cache for map locations")]
struct Cli {
    /// Config file to use instead of ~/.tourcache/config.ini
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Flickr API key (overrides config and TOURCACHE_API_KEY)
    #[arg(long, global = true)]
    api_key: Option<String>,

    /// Store directory (overrides config)
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    /// Log level: error, warn, info, debug, trace
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// List the photos near a location, fetching them on first use
    Entries {
        /// Location as "lat,lon", e.g. 51.5,-0.12
        #[arg(allow_hyphen_values = true)]
        location: LocationKey,
    },

    /// Delete a location's photos and fetch a fresh set
    Refresh {
        /// Location as "lat,lon"
        #[arg(allow_hyphen_values = true)]
        location: LocationKey,
    },

    /// Download every photo near a location
    Download {
        /// Location as "lat,lon"
        #[arg(allow_hyphen_values = true)]
        location: LocationKey,

        /// Directory to write the photos to
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Download one photo and write its bytes
    Resolve {
        /// Entry id as shown by `entries`
        id: u64,

        /// File to write to; stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show one stored entry
    Show {
        /// Entry id
        id: u64,
    },

    /// Delete one photo from the store
    Delete {
        /// Entry id
        id: u64,
    },

    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        e.exit();
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    let mut config = if config_path.exists() {
        ConfigFile::load_from(&config_path)?
    } else {
        ConfigFile::default()
    };
    config.apply_env();

    let overrides = Overrides {
        api_key: cli.api_key,
        store: cli.store,
    };
    let mut config = apply_overrides(config, &overrides);
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }

    let _log_guard = init_logging(&config.logging)?;
    debug!(config = %config_path.display(), "Configuration loaded");

    match cli.command {
        Commands::Config { command } => commands::config::run(command, &config_path, &config),
        Commands::Entries { location } => {
            let cache = build_cache(&config)?;
            commands::location::run_entries(&cache, location).await
        }
        Commands::Refresh { location } => {
            let cache = build_cache(&config)?;
            commands::location::run_refresh(&cache, location).await
        }
        Commands::Download { location, output } => {
            let cache = build_cache(&config)?;
            commands::location::run_download(&cache, location, output).await
        }
        Commands::Resolve { id, output } => {
            let cache = build_cache(&config)?;
            commands::entry::run_resolve(&cache, EntryId(id), output).await
        }
        Commands::Show { id } => {
            let cache = build_cache(&config)?;
            commands::entry::run_show(&cache, EntryId(id))
        }
        Commands::Delete { id } => {
            let cache = build_cache(&config)?;
            commands::entry::run_delete(&cache, EntryId(id)).await
        }
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
    fn test_parses_negative_coordinates() {
        let cli = Cli::try_parse_from(["tourcache", "entries", "-33.86,151.21"]).unwrap();
        match cli.command {
            Commands::Entries { location } => {
                assert_eq!(location.latitude(), -33.86);
                assert_eq!(location.longitude(), 151.21);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_rejects_out_of_range_location() {
        assert!(Cli::try_parse_from(["tourcache", "entries", "91,0"]).is_err());
    }
}
