//! Ledger configuration loaded from TOML.
//!
//! ```toml
//! database_path = "ownership.db"
//! log_filter = "ownerlog=debug"
//!
//! [runtime]
//! batch_max_ops = 64
//! snapshot_every_ops = 500
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::{
    core::store::OwnershipStore,
    persist::{OpSink, PersistError, sqlite::SqliteOpSink},
    runtime::handle::{LedgerHandle, RuntimeConfig, spawn_ledger},
};

/// Default `tracing` filter when neither the config nor `RUST_LOG` sets one.
pub const DEFAULT_LOG_FILTER: &str = "ownerlog=info";

/// Failure to load configuration or build the log filter.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file exists but could not be read.
    #[error("failed to read {path}: {source}")]
    Read {
        /// File that was read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The contents are not valid ledger TOML.
    #[error("failed to parse ledger config: {0}")]
    Parse(#[from] toml::de::Error),
    /// `log_filter` is not a valid `tracing` directive list.
    #[error("invalid log filter {filter:?}: {message}")]
    LogFilter {
        /// Filter as configured.
        filter: String,
        /// Parser message.
        message: String,
    },
}

/// Top-level ledger settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// SQLite journal location; `None` keeps the ledger in memory only.
    pub database_path: Option<PathBuf>,
    /// `tracing` directives used when `RUST_LOG` is unset.
    pub log_filter: String,
    /// Runtime batching and snapshot knobs.
    pub runtime: RuntimeConfig,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            runtime: RuntimeConfig::default(),
        }
    }
}

impl LedgerConfig {
    /// Parses a TOML document; missing keys take their defaults.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Reads `path`, falling back to defaults when the file does not exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            info!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Builds the `tracing` filter. `RUST_LOG` wins over the configured filter.
    pub fn env_filter(&self) -> Result<EnvFilter, ConfigError> {
        if let Ok(filter) = EnvFilter::try_from_default_env() {
            return Ok(filter);
        }
        EnvFilter::try_new(&self.log_filter).map_err(|e| ConfigError::LogFilter {
            filter: self.log_filter.clone(),
            message: e.to_string(),
        })
    }

    /// Installs a global fmt subscriber. Returns `false` if one was already set.
    pub fn init_tracing(&self) -> Result<bool, ConfigError> {
        let filter = self.env_filter()?;
        Ok(tracing_subscriber::fmt()
            .with_env_filter(filter)
            .try_init()
            .is_ok())
    }

    /// Opens the journal (if configured), replays it, and spawns the ledger task.
    ///
    /// Must be called inside a tokio runtime.
    pub fn spawn(&self) -> Result<LedgerHandle, PersistError> {
        let (store, sink): (OwnershipStore, Option<Box<dyn OpSink>>) = match &self.database_path {
            Some(path) => {
                let sink = SqliteOpSink::open(path)?;
                let store = sink.load_store()?;
                (store, Some(Box::new(sink) as Box<dyn OpSink>))
            }
            None => (OwnershipStore::new(), None),
        };
        Ok(spawn_ledger(store, sink, self.runtime.clone()))
    }
}
