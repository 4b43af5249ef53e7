//! Common types and utilities shared across CLI commands.

use std::path::PathBuf;

use tourcache::cache::{CacheConfig, ResourceCache};
use tourcache::config::ConfigFile;
use tourcache::provider::{FlickrLocatorFetcher, ReqwestClient};
use tourcache::store::JsonFileStore;
use tracing::debug;

use crate::error::CliError;

/// The cache as wired up by the CLI.
pub type CliCache = ResourceCache<JsonFileStore, FlickrLocatorFetcher<ReqwestClient>, ReqwestClient>;

/// Global options that override config file values.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub api_key: Option<String>,
    pub store: Option<PathBuf>,
}

/// Resolve the effective configuration: CLI flags take precedence.
pub fn apply_overrides(mut config: ConfigFile, overrides: &Overrides) -> ConfigFile {
    if let Some(key) = &overrides.api_key {
        config.provider.api_key = Some(key.clone());
    }
    if let Some(dir) = &overrides.store {
        config.store.directory = dir.clone();
    }
    config
}

/// Open the store and build a cache backed by the Flickr fetcher.
pub fn build_cache(config: &ConfigFile) -> Result<CliCache, CliError> {
    let api_key = config.provider.api_key.clone().ok_or_else(|| {
        CliError::Config(
            "Flickr requires an API key. \
             Set api_key in config.ini, TOURCACHE_API_KEY, or use --api-key"
                .to_string(),
        )
    })?;

    let http = ReqwestClient::with_timeout(config.download.timeout)?;
    let fetcher = FlickrLocatorFetcher::new(http.clone(), api_key)
        .with_base_url(&config.provider.base_url)
        .map_err(|e| {
            CliError::Config(format!(
                "Invalid provider base_url '{}': {}",
                config.provider.base_url, e
            ))
        })?
        .with_per_page(config.provider.per_page)
        .with_size_extra(config.provider.size.clone());

    let store = JsonFileStore::open(&config.store.directory)?;
    debug!(store = %config.store.directory.display(), "Store opened");

    let cache_config =
        CacheConfig::default().with_max_concurrent_downloads(config.download.parallel);
    Ok(ResourceCache::with_config(store, fetcher, http, cache_config))
}
