use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::metrics::StorageMetrics;
use crate::primitives::concurrency::{DEFAULT_ALGORITHM_TIMEOUT, MAX_ALGORITHM_TIMEOUT};
use crate::primitives::wal::WalSyncMode;
use crate::types::{GraphError, Result};

/// Seed used for HNSW level generation when none is configured.
pub const DEFAULT_HNSW_SEED: u64 = 0x5EED_7E55_E8A0;

/// Configuration options supplied when opening a [`super::GraphStore`].
#[derive(Clone)]
pub struct StoreOptions {
    /// Directory holding `wal.log` and `snapshot.json`. `None` keeps the log
    /// in memory and persists nothing across processes.
    pub data_dir: Option<PathBuf>,
    /// When WAL appends are fsynced.
    pub wal_sync: WalSyncMode,
    /// Seed for the level generator of every vector index.
    pub hnsw_seed: u64,
    /// Budget for algorithms run through the store without an explicit deadline.
    pub algorithm_timeout: Duration,
    /// Optional metrics collection implementation
    pub metrics: Option<Arc<dyn StorageMetrics>>,
}

impl fmt::Debug for StoreOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreOptions")
            .field("data_dir", &self.data_dir)
            .field("wal_sync", &self.wal_sync)
            .field("hnsw_seed", &self.hnsw_seed)
            .field("algorithm_timeout", &self.algorithm_timeout)
            .field("metrics", &self.metrics.is_some())
            .finish()
    }
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            data_dir: None,
            wal_sync: WalSyncMode::Immediate,
            hnsw_seed: DEFAULT_HNSW_SEED,
            algorithm_timeout: DEFAULT_ALGORITHM_TIMEOUT,
            metrics: None,
        }
    }
}

impl StoreOptions {
    /// Options for a store persisted under `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self::default().data_dir(dir)
    }

    /// Options for a store that lives only in memory.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Sets the data directory.
    pub fn data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(dir.into());
        self
    }

    /// Sets the WAL sync mode.
    pub fn wal_sync(mut self, mode: WalSyncMode) -> Self {
        self.wal_sync = mode;
        self
    }

    /// Sets the HNSW level-generation seed.
    pub fn hnsw_seed(mut self, seed: u64) -> Self {
        self.hnsw_seed = seed;
        self
    }

    /// Sets the default algorithm budget, clamped to five minutes.
    pub fn algorithm_timeout(mut self, timeout: Duration) -> Self {
        self.algorithm_timeout = timeout.min(MAX_ALGORITHM_TIMEOUT);
        self
    }

    /// Sets the metrics collection implementation.
    pub fn metrics(mut self, metrics: Arc<dyn StorageMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }
}

/// File form of [`StoreOptions`].
///
/// ```toml
/// data_dir = "/var/lib/tessera"
/// wal_sync = "deferred"
/// hnsw_seed = 7
/// algorithm_timeout_secs = 30
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    /// Data directory; omitted means in-memory.
    pub data_dir: Option<PathBuf>,
    /// `immediate`, `deferred` or `off`.
    pub wal_sync: Option<String>,
    /// HNSW seed.
    pub hnsw_seed: Option<u64>,
    /// Algorithm budget in seconds.
    pub algorithm_timeout_secs: Option<u64>,
}

impl StoreConfig {
    /// Parses a TOML document.
    pub fn from_toml_str(src: &str) -> Result<Self> {
        toml::from_str(src).map_err(|err| GraphError::invalid(format!("config: {err}")))
    }

    /// Reads and parses a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&contents)
    }

    /// Converts into builder options, validating enumerated fields.
    pub fn into_options(self) -> Result<StoreOptions> {
        let mut options = StoreOptions::default();
        if let Some(dir) = self.data_dir {
            options = options.data_dir(dir);
        }
        if let Some(mode) = self.wal_sync.as_deref() {
            options = options.wal_sync(parse_sync_mode(mode)?);
        }
        if let Some(seed) = self.hnsw_seed {
            options = options.hnsw_seed(seed);
        }
        if let Some(secs) = self.algorithm_timeout_secs {
            options = options.algorithm_timeout(Duration::from_secs(secs));
        }
        Ok(options)
    }
}

fn parse_sync_mode(raw: &str) -> Result<WalSyncMode> {
    match raw.to_ascii_lowercase().as_str() {
        "immediate" | "full" => Ok(WalSyncMode::Immediate),
        "deferred" | "normal" => Ok(WalSyncMode::Deferred),
        "off" => Ok(WalSyncMode::Off),
        other => Err(GraphError::invalid(format!("unknown wal_sync mode '{other}'"))),
    }
}
