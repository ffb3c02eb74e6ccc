//! Error types for SegKV
//!
//! Provides a unified error type for all operations.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using SegKvError
pub type Result<T> = std::result::Result<T, SegKvError>;

/// Unified error type for SegKV operations
#[derive(Debug, Error)]
pub enum SegKvError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Record Errors
    // -------------------------------------------------------------------------
    #[error("Record decode failed: {0}")]
    Decode(String),

    #[error("Record encode failed: {0}")]
    Encode(String),

    // -------------------------------------------------------------------------
    // Storage Errors
    // -------------------------------------------------------------------------
    #[error("Key not found")]
    KeyNotFound,

    #[error("Segment is sealed: {}", .0.display())]
    SegmentSealed(PathBuf),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Store is closed")]
    StoreClosed,

    #[error("Failed to close {failed} segment(s): {source}")]
    CloseFailed {
        failed: usize,
        #[source]
        source: Box<SegKvError>,
    },

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl SegKvError {
    /// True for the expected "key absent" outcome, false for real failures
    pub fn is_not_found(&self) -> bool {
        matches!(self, SegKvError::KeyNotFound)
    }
}
