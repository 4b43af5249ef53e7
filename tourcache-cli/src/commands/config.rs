//! Configuration management CLI commands.

use std::path::Path;

use clap::Subcommand;
use tourcache::config::ConfigFile;

use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Write a config file with default settings
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the effective configuration
    Show,

    /// Show the configuration file path
    Path,
}

/// Run a config subcommand.
pub fn run(command: ConfigCommands, path: &Path, config: &ConfigFile) -> Result<(), CliError> {
    match command {
        ConfigCommands::Init { force } => run_init(path, force),
        ConfigCommands::Show => {
            run_show(config);
            Ok(())
        }
        ConfigCommands::Path => {
            println!("{}", path.display());
            Ok(())
        }
    }
}

fn run_init(path: &Path, force: bool) -> Result<(), CliError> {
    if path.exists() && !force {
        return Err(CliError::Config(format!(
            "{} already exists. Use --force to overwrite it.",
            path.display()
        )));
    }

    ConfigFile::default().save_to(path)?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}

fn run_show(config: &ConfigFile) {
    let not_set = || "(not set)".to_string();

    println!("[provider]");
    println!(
        "  api_key  = {}",
        config
            .provider
            .api_key
            .as_deref()
            .map(mask_key)
            .unwrap_or_else(not_set)
    );
    println!("  base_url = {}", config.provider.base_url);
    println!("  per_page = {}", config.provider.per_page);
    println!("  size     = {}", config.provider.size);
    println!();
    println!("[download]");
    println!("  timeout  = {}", config.download.timeout);
    println!("  parallel = {}", config.download.parallel);
    println!();
    println!("[store]");
    println!("  directory = {}", config.store.directory.display());
    println!();
    println!("[logging]");
    println!("  level     = {}", config.logging.level);
    println!(
        "  directory = {}",
        config
            .logging
            .directory
            .as_ref()
            .map(|d| d.display().to_string())
            .unwrap_or_else(not_set)
    );
}

/// Keep only the last four characters of a secret visible.
fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 4 {
        return "*".repeat(chars.len());
    }
    let visible: String = chars[chars.len() - 4..].iter().collect();
    format!("{}{}", "*".repeat(chars.len() - 4), visible)
}
