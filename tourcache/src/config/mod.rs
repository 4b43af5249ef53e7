//! Configuration file handling.
//!
//! Settings live in an INI file at `~/.tourcache/config.ini`:
//!
//! ```ini
//! [provider]
//! api_key = 0123456789abcdef
//! base_url = https://www.flickr.com/services/rest/
//! per_page = 25
//! size = url_n
//!
//! [download]
//! timeout = 30
//! parallel = 8
//!
//! [store]
//! directory = ~/.tourcache/store
//!
//! [logging]
//! level = info
//! directory =
//! ```
//!
//! Missing keys fall back to defaults. The API key can also be supplied
//! through the `TOURCACHE_API_KEY` environment variable, which takes
//! precedence over the file.

mod file;

pub use file::{
    config_dir, default_config_path, expand_tilde, ConfigError, ConfigFile, DownloadSettings,
    LoggingSettings, ProviderSettings, StoreSettings, API_KEY_ENV,
};
