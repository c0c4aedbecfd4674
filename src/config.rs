use crate::storage::SnapshotFormat;
use std::path::{Path, PathBuf};

pub const ENV_DATA_PATH: &str = "LIVEGRAPH_DATA_PATH";
pub const ENV_FORMAT: &str = "LIVEGRAPH_FORMAT";

/// Live graph configuration
#[derive(Debug, Clone)]
pub struct GraphConfig {
    /// Snapshot document location; `None` keeps the graph purely in memory
    pub data_path: Option<PathBuf>,

    /// Encoding of the snapshot document
    pub format: SnapshotFormat,

    /// Initialize the store from an existing document at `data_path`
    pub load_existing: bool,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl GraphConfig {
    /// Configuration with no durable target
    pub fn in_memory() -> Self {
        Self {
            data_path: None,
            format: SnapshotFormat::Json,
            load_existing: true,
        }
    }

    /// Configuration persisting to a single document at `path`
    pub fn persistent<P: AsRef<Path>>(path: P) -> Self {
        Self::in_memory().data_path(path)
    }

    /// Set the snapshot document path
    pub fn data_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.data_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Set the snapshot encoding
    pub fn format(mut self, format: SnapshotFormat) -> Self {
        self.format = format;
        self
    }

    /// Start empty even if a document already exists; the next commit overwrites it
    pub fn fresh(mut self) -> Self {
        self.load_existing = false;
        self
    }

    pub fn is_durable(&self) -> bool {
        self.data_path.is_some()
    }

    /// Read `LIVEGRAPH_DATA_PATH` and `LIVEGRAPH_FORMAT` (`json` or `msgpack`).
    /// Unknown formats fall back to JSON.
    pub fn from_env() -> Self {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::in_memory();
        if let Some(path) = var(ENV_DATA_PATH) {
            if !path.trim().is_empty() {
                config = config.data_path(path.trim());
            }
        }
        if let Some(format) = var(ENV_FORMAT) {
            if let Some(format) = SnapshotFormat::parse(format.trim()) {
                config = config.format(format);
            }
        }
        config
    }
}
