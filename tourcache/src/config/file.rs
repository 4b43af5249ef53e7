//! INI-backed configuration file.

use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use ini::Ini;
use thiserror::Error;

use crate::cache::DEFAULT_MAX_CONCURRENT_DOWNLOADS;
use crate::provider::{DEFAULT_BASE_URL, DEFAULT_PER_PAGE, DEFAULT_SIZE_EXTRA, DEFAULT_TIMEOUT_SECS};

/// Environment variable overriding `provider.api_key`.
pub const API_KEY_ENV: &str = "TOURCACHE_API_KEY";

const CONFIG_DIR_NAME: &str = ".tourcache";
const CONFIG_FILE_NAME: &str = "config.ini";

/// Errors that can occur while loading or saving configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read or written.
    #[error("Failed to access {}: {message}", .path.display())]
    Io { path: PathBuf, message: String },

    /// The file is not valid INI.
    #[error("Failed to parse {}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },

    /// A key holds a value of the wrong type.
    #[error("Invalid value '{value}' for {section}.{key}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
    },
}

/// Photo search provider settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderSettings {
    pub api_key: Option<String>,
    pub base_url: String,
    pub per_page: u32,
    /// Flickr size extra, e.g. `url_n` or `url_t`.
    pub size: String,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            per_page: DEFAULT_PER_PAGE,
            size: DEFAULT_SIZE_EXTRA.to_string(),
        }
    }
}

/// HTTP download settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadSettings {
    /// Request timeout in seconds.
    pub timeout: u64,
    /// Maximum concurrent payload downloads.
    pub parallel: usize,
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT_SECS,
            parallel: DEFAULT_MAX_CONCURRENT_DOWNLOADS,
        }
    }
}

/// Entry store settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSettings {
    pub directory: PathBuf,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            directory: config_dir().join("store"),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    /// Default filter level (`error`, `warn`, `info`, `debug`, `trace`).
    pub level: String,
    /// Directory for rolling log files; stderr only when unset.
    pub directory: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: None,
        }
    }
}

/// Complete application configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigFile {
    pub provider: ProviderSettings,
    pub download: DownloadSettings,
    pub store: StoreSettings,
    pub logging: LoggingSettings,
}

impl ConfigFile {
    /// Loads the default config file, applying environment overrides.
    ///
    /// A missing file yields the defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = default_config_path();
        let mut config = if path.exists() {
            Self::load_from(&path)?
        } else {
            Self::default()
        };
        config.apply_env();
        Ok(config)
    }

    /// Loads configuration from a specific file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_file(path).map_err(|e| match e {
            ini::Error::Io(io) => ConfigError::Io {
                path: path.to_path_buf(),
                message: io.to_string(),
            },
            other => ConfigError::Parse {
                path: path.to_path_buf(),
                message: other.to_string(),
            },
        })?;
        Self::from_ini(&ini)
    }

    /// Writes the configuration to `path`, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let io_error = |e: std::io::Error| ConfigError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_error)?;
        }
        self.to_ini().write_to_file(path).map_err(io_error)
    }

    /// Replaces the API key with `TOURCACHE_API_KEY` when it is set.
    pub fn apply_env(&mut self) {
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.trim().is_empty() {
                self.provider.api_key = Some(key.trim().to_string());
            }
        }
    }

    fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(section) = ini.section(Some("provider")) {
            if let Some(v) = section.get("api_key").filter(|v| !v.trim().is_empty()) {
                config.provider.api_key = Some(v.trim().to_string());
            }
            if let Some(v) = section.get("base_url").filter(|v| !v.trim().is_empty()) {
                config.provider.base_url = v.trim().to_string();
            }
            if let Some(v) = section.get("per_page") {
                config.provider.per_page = parse_value("provider", "per_page", v)?;
            }
            if let Some(v) = section.get("size").filter(|v| !v.trim().is_empty()) {
                config.provider.size = v.trim().to_string();
            }
        }

        if let Some(section) = ini.section(Some("download")) {
            if let Some(v) = section.get("timeout") {
                config.download.timeout = parse_value("download", "timeout", v)?;
            }
            if let Some(v) = section.get("parallel") {
                config.download.parallel = parse_value("download", "parallel", v)?;
            }
        }

        if let Some(section) = ini.section(Some("store")) {
            if let Some(v) = section.get("directory").filter(|v| !v.trim().is_empty()) {
                config.store.directory = expand_tilde(v.trim());
            }
        }

        if let Some(section) = ini.section(Some("logging")) {
            if let Some(v) = section.get("level").filter(|v| !v.trim().is_empty()) {
                config.logging.level = v.trim().to_lowercase();
            }
            if let Some(v) = section.get("directory").filter(|v| !v.trim().is_empty()) {
                config.logging.directory = Some(expand_tilde(v.trim()));
            }
        }

        Ok(config)
    }

    fn to_ini(&self) -> Ini {
        let mut ini = Ini::new();
        ini.with_section(Some("provider"))
            .set("api_key", self.provider.api_key.clone().unwrap_or_default())
            .set("base_url", self.provider.base_url.clone())
            .set("per_page", self.provider.per_page.to_string())
            .set("size", self.provider.size.clone());
        ini.with_section(Some("download"))
            .set("timeout", self.download.timeout.to_string())
            .set("parallel", self.download.parallel.to_string());
        ini.with_section(Some("store"))
            .set("directory", self.store.directory.to_string_lossy().to_string());
        ini.with_section(Some("logging"))
            .set("level", self.logging.level.clone())
            .set(
                "directory",
                self.logging
                    .directory
                    .as_ref()
                    .map(|d| d.to_string_lossy().to_string())
                    .unwrap_or_default(),
            );
        ini
    }
}

fn parse_value<T>(section: &str, key: &str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
    })
}

/// Directory holding the config file and the default store.
pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONFIG_DIR_NAME)
}

/// Path of the default config file.
pub fn default_config_path() -> PathBuf {
    config_dir().join(CONFIG_FILE_NAME)
}

/// Expands a leading `~/` to the home directory.
pub fn expand_tilde(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => match dirs::home_dir() {
            Some(home) => home.join(rest),
            None => PathBuf::from(path),
        },
        None => PathBuf::from(path),
    }
}
