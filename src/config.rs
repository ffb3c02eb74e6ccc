//! Configuration for SegKV
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;

use crate::error::{Result, SegKvError};

/// Default rotation threshold, in bytes of the active file
pub const DEFAULT_SEGMENT_CAPACITY: u64 = 100;

/// Main configuration for a SegKV store
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Directory holding every segment file of the store
    /// Internal structure:
    ///   {data_dir}/
    ///     ├── segment-0        (sealed, oldest)
    ///     ├── segment-1        (sealed)
    ///     └── current-data     (active segment)
    pub data_dir: PathBuf,

    /// Size in bytes at which the active segment is sealed and replaced
    pub segment_capacity: u64,

    // -------------------------------------------------------------------------
    // Durability Configuration
    // -------------------------------------------------------------------------
    /// When segment files are fsynced
    pub sync_strategy: SyncStrategy,
}

/// Segment sync strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStrategy {
    /// fsync after every put (safest, slowest)
    EveryWrite,

    /// fsync only when a segment is sealed (rotation, compaction, close)
    OnSeal,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./segkv_data"),
            segment_capacity: DEFAULT_SEGMENT_CAPACITY,
            sync_strategy: SyncStrategy::OnSeal,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Reject settings the store cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.segment_capacity == 0 {
            return Err(SegKvError::Config(
                "segment_capacity must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the data directory
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Set the rotation threshold (in bytes)
    pub fn segment_capacity(mut self, bytes: u64) -> Self {
        self.config.segment_capacity = bytes;
        self
    }

    /// Set the sync strategy
    pub fn sync_strategy(mut self, strategy: SyncStrategy) -> Self {
        self.config.sync_strategy = strategy;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
