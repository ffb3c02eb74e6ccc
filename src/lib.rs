//! # SegKV
//!
//! A durable key-value store backed by an append-only log split across
//! on-disk segments:
//! - Point lookups through a per-segment key → offset index
//! - Size-triggered rotation to a fresh active segment
//! - Newest-segment-wins reads across segment boundaries
//! - On-demand merge/compaction of redundant history
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          Store                               │
//! │           (RwLock: one writer / many readers)                │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ put → active        get → newest..oldest
//!          ┌────────────┼────────────┬────────────────┐
//!          ▼            ▼            ▼                ▼
//!   ┌────────────┐┌────────────┐┌────────────┐ ┌──────────────┐
//!   │ segment-0  ││ segment-1  ││current-data│ │    Merger    │
//!   │  (sealed)  ││  (sealed)  ││  (active)  │ │ (on demand)  │
//!   └─────┬──────┘└─────┬──────┘└─────┬──────┘ └──────────────┘
//!         └─────────────┴─────────────┘
//!                       │
//!                       ▼
//!               ┌──────────────┐
//!               │ Record Codec │
//!               └──────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod record;
pub mod storage;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{SegKvError, Result};
pub use config::{Config, SyncStrategy};
pub use record::Record;
pub use storage::{merge, CompactionStats, Segment, Store, StoreStats};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of SegKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
