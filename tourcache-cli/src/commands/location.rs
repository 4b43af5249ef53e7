//! Commands operating on all entries of a location.

use std::path::{Path, PathBuf};
use std::pin::pin;

use console::style;
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use tourcache::cache::CacheEntry;
use tourcache::coord::LocationKey;
use tracing::warn;

use super::common::CliCache;
use crate::error::CliError;

/// List the entries of a location, fetching them on first use.
pub async fn run_entries(cache: &CliCache, location: LocationKey) -> Result<(), CliError> {
    let entries = cache.entries_for(&location).await?;
    print_entries(&location, &entries);
    Ok(())
}

/// Drop the location's entries and fetch a fresh page.
pub async fn run_refresh(cache: &CliCache, location: LocationKey) -> Result<(), CliError> {
    let entries = cache.clear_and_refetch(&location).await?;
    println!("Refreshed {}", location);
    print_entries(&location, &entries);
    Ok(())
}

/// Resolve every entry of a location, optionally writing payloads to disk.
pub async fn run_download(
    cache: &CliCache,
    location: LocationKey,
    output: Option<PathBuf>,
) -> Result<(), CliError> {
    let ids: Vec<_> = cache
        .entries_for(&location)
        .await?
        .into_iter()
        .map(|entry| entry.id)
        .collect();
    let total = ids.len();

    if total == 0 {
        println!("No photos found near {}", location);
        return Ok(());
    }

    if let Some(dir) = &output {
        std::fs::create_dir_all(dir).map_err(|e| output_error(dir, e))?;
    }

    let progress = ProgressBar::new(total as u64);
    progress.set_style(
        ProgressStyle::with_template("{spinner} [{bar:30}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );

    let mut failed = 0;
    let mut results = pin!(cache.resolve_stream(ids));
    while let Some((id, result)) = results.next().await {
        match result {
            Ok(payload) => {
                if let Some(dir) = &output {
                    let path = dir.join(format!("{}.jpg", id));
                    std::fs::write(&path, &payload).map_err(|e| output_error(&path, e))?;
                }
                progress.set_message(format!("entry {}", id));
            }
            Err(e) => {
                failed += 1;
                warn!(entry_id = %id, error = %e, "Download failed");
            }
        }
        progress.inc(1);
    }
    progress.finish_and_clear();

    println!(
        "{} {} of {} photos resolved ({})",
        style("Done:").green().bold(),
        total - failed,
        total,
        cache.stats()
    );

    if failed > 0 {
        return Err(CliError::PartialDownload { failed, total });
    }
    Ok(())
}

fn print_entries(location: &LocationKey, entries: &[CacheEntry]) {
    if entries.is_empty() {
        println!("No photos found near {}", location);
        return;
    }

    println!("{} photos near {}", entries.len(), location);
    for entry in entries {
        let state = if entry.is_resolved() {
            style(entry.state().to_string()).green()
        } else {
            style(entry.state().to_string()).yellow()
        };
        println!("  {:>6}  {:<9} {}", entry.id, state, entry.locator);
    }
}

fn output_error(path: &Path, e: std::io::Error) -> CliError {
    CliError::Output {
        path: path.display().to_string(),
        message: e.to_string(),
    }
}
