//! Storage Module
//!
//! Segmented log-structured storage: every segment file is the log.
//!
//! ## Responsibilities
//! - Append records to the active segment, indexing key → offset
//! - Rotate the active segment once it reaches capacity
//! - Serve reads newest segment first (newer values shadow older ones)
//! - Merge segments into one holding only the newest value per key
//!
//! ## Directory Layout
//! ```text
//! {data_dir}/
//! ├── segment-0        sealed, sequence 0 (oldest)
//! ├── segment-1        sealed, sequence 1
//! ├── ...
//! ├── current-data     active, sequence = highest sealed + 1
//! └── merged-segment   scratch output of merge (ignored on open)
//! ```

mod merger;
mod segment;
mod store;

pub use merger::{merge, MERGED_SEGMENT_NAME};
pub use segment::Segment;
pub use store::{CompactionStats, Store, StoreStats, ACTIVE_SEGMENT_NAME, SEALED_SEGMENT_PREFIX};
