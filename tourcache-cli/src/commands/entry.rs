//! Commands operating on a single entry.

use std::io::Write;
use std::path::PathBuf;

use tourcache::cache::EntryId;

use super::common::CliCache;
use crate::error::CliError;

/// Resolve one entry's payload and write it to a file or stdout.
pub async fn run_resolve(
    cache: &CliCache,
    id: EntryId,
    output: Option<PathBuf>,
) -> Result<(), CliError> {
    let payload = cache.resolve(id).await?;

    match output {
        Some(path) => {
            std::fs::write(&path, &payload).map_err(|e| CliError::Output {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
            eprintln!("Wrote {} bytes to {}", payload.len(), path.display());
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout
                .write_all(&payload)
                .and_then(|_| stdout.flush())
                .map_err(|e| CliError::Output {
                    path: "stdout".to_string(),
                    message: e.to_string(),
                })?;
        }
    }
    Ok(())
}

/// Delete one entry. Unknown ids succeed silently.
pub async fn run_delete(cache: &CliCache, id: EntryId) -> Result<(), CliError> {
    cache.delete_entry(id).await?;
    println!("Deleted entry {}", id);
    Ok(())
}

/// Show a single entry without touching the network.
pub fn run_show(cache: &CliCache, id: EntryId) -> Result<(), CliError> {
    match cache.entry(id)? {
        Some(entry) => {
            println!("Entry {}", entry.id);
            println!("  Location: {}", entry.location);
            println!("  Locator:  {}", entry.locator);
            println!("  State:    {}", entry.state());
            if let Some(payload) = &entry.payload {
                println!("  Size:     {} bytes", payload.len());
            }
            Ok(())
        }
        None => Err(CliError::Resolve(
            tourcache::cache::ResolveError::NotFound(id),
        )),
    }
}
