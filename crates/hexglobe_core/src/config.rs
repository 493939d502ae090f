//! Runtime configuration for hosts embedding the core (CLI, tests).
//!
//! # Responsibility
//! - Resolve data directory, storage backend and logging settings from
//!   defaults and `HEXGLOBE_*` environment variables.
//! - Open the configured tile store.
//!
//! # Invariants
//! - `validate()` passes before `open_store()` is meaningful; callers apply
//!   flag overrides in between.

use crate::geocode::{CachedGeocoder, GeocodeResult, NominatimGeocoder, DEFAULT_NOMINATIM_URL};
use crate::logging::{check_log_dir, default_log_level, LogLevel, LoggingError};
use crate::storage::{FsTileStore, SqliteTileStore, StorageResult, TileStore};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::str::FromStr;

pub const ENV_DATA_DIR: &str = "HEXGLOBE_DATA_DIR";
pub const ENV_STORAGE: &str = "HEXGLOBE_STORAGE";
pub const ENV_LOG_LEVEL: &str = "HEXGLOBE_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "HEXGLOBE_LOG_DIR";
pub const ENV_GEOCODER_URL: &str = "HEXGLOBE_GEOCODER_URL";

const DEFAULT_DATA_DIR: &str = "hexglobe-data";
const SQLITE_FILE_NAME: &str = "tiles.sqlite3";

/// Which `TileStore` implementation backs the repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageBackend {
    /// One JSON file per record under the data directory.
    #[default]
    Files,
    /// Single SQLite database file inside the data directory.
    Sqlite,
}

impl StorageBackend {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Files => "files",
            Self::Sqlite => "sqlite",
        }
    }
}

impl Display for StorageBackend {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StorageBackend {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "files" | "fs" => Ok(Self::Files),
            "sqlite" => Ok(Self::Sqlite),
            other => Err(ConfigError::InvalidBackend(other.to_string())),
        }
    }
}

/// Invalid configuration values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidBackend(String),
    EmptyDataDir,
    /// Log level or log directory rejected by the logging layer.
    Logging(LoggingError),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidBackend(value) => {
                write!(f, "unsupported storage backend `{value}`; expected files|sqlite")
            }
            Self::EmptyDataDir => write!(f, "data directory must not be empty"),
            Self::Logging(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Logging(err) => Some(err),
            _ => None,
        }
    }
}

impl From<LoggingError> for ConfigError {
    fn from(value: LoggingError) -> Self {
        Self::Logging(value)
    }
}

/// Resolved host configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HexGlobeConfig {
    pub data_dir: PathBuf,
    pub backend: StorageBackend,
    pub log_level: LogLevel,
    /// File logging is disabled when `None`.
    pub log_dir: Option<PathBuf>,
    /// Nominatim-compatible search endpoint for address lookups.
    pub geocoder_url: String,
}

impl Default for HexGlobeConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            backend: StorageBackend::default(),
            log_level: default_log_level(),
            log_dir: None,
            geocoder_url: DEFAULT_NOMINATIM_URL.to_string(),
        }
    }
}

impl HexGlobeConfig {
    /// Defaults overridden by the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by `lookup`, which maps variable names to values.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(value) = non_empty(ENV_DATA_DIR) {
            config.data_dir = PathBuf::from(value.trim());
        }
        if let Some(value) = non_empty(ENV_STORAGE) {
            config.backend = value.parse()?;
        }
        if let Some(value) = non_empty(ENV_LOG_LEVEL) {
            config.log_level = value.parse()?;
        }
        if let Some(value) = non_empty(ENV_LOG_DIR) {
            config.log_dir = Some(PathBuf::from(value.trim()));
        }
        if let Some(value) = non_empty(ENV_GEOCODER_URL) {
            config.geocoder_url = value.trim().to_string();
        }
        Ok(config)
    }

    /// Checks values that can only be judged after all overrides apply.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.data_dir.as_os_str().is_empty() {
            return Err(ConfigError::EmptyDataDir);
        }
        if let Some(dir) = &self.log_dir {
            check_log_dir(dir)?;
        }
        Ok(())
    }

    /// Location of the SQLite database for the `sqlite` backend.
    pub fn sqlite_path(&self) -> PathBuf {
        self.data_dir.join(SQLITE_FILE_NAME)
    }

    /// Nominatim client behind the default 24 h cache.
    pub fn open_geocoder(&self) -> GeocodeResult<CachedGeocoder<NominatimGeocoder>> {
        Ok(CachedGeocoder::new(NominatimGeocoder::new(
            self.geocoder_url.clone(),
        )?))
    }

    /// Opens the configured store.
    pub fn open_store(&self) -> StorageResult<Box<dyn TileStore>> {
        match self.backend {
            StorageBackend::Files => Ok(Box::new(FsTileStore::new(self.data_dir.clone()))),
            StorageBackend::Sqlite => Ok(Box::new(SqliteTileStore::open(self.sqlite_path())?)),
        }
    }
}
