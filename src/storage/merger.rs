//! Merger
//!
//! Folds a set of segments into one segment holding only the newest value
//! of every key.
//!
//! Inputs are ordered by their sequence number before folding, so callers
//! may pass them in any order. Inputs are never modified, closed or deleted.

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{Result, SegKvError};
use crate::record::Record;

use super::Segment;

/// Name of the file `merge` writes in its output directory
pub const MERGED_SEGMENT_NAME: &str = "merged-segment";

/// Distinguishes scratch files of merges running at the same time
static SCRATCH_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Merge `segments` into a new segment at `{output_dir}/merged-segment`
///
/// The merge is written to a scratch file unique to this call and renamed
/// to `merged-segment` only once complete, so a reader never sees a partial
/// merge. The result is read-only, indexed by a fresh scan of the renamed
/// file, and tagged with the highest input sequence number. Segments
/// sharing a sequence number are folded in the order given.
pub fn merge(output_dir: &Path, segments: &[&Segment]) -> Result<Segment> {
    let output_path = output_dir.join(MERGED_SEGMENT_NAME);

    if segments.iter().any(|s| s.path() == output_path) {
        return Err(SegKvError::Storage(format!(
            "merge output {} is one of its inputs",
            output_path.display()
        )));
    }

    // Oldest first, so later inserts overwrite older values
    let mut ordered: Vec<&Segment> = segments.to_vec();
    ordered.sort_by_key(|s| s.sequence());

    let mut latest: BTreeMap<Vec<u8>, Vec<u8>> = BTreeMap::new();
    for segment in &ordered {
        for key in segment.keys() {
            let value = segment.get(key)?;
            latest.insert(key.to_vec(), value);
        }
    }

    let sequence = ordered.last().map(|s| s.sequence()).unwrap_or(0);

    let scratch_path = scratch_path(output_dir);
    let written = write_merged(&scratch_path, sequence, latest)
        .and_then(|()| fs::rename(&scratch_path, &output_path).map_err(SegKvError::from));
    if let Err(e) = written {
        if let Err(cleanup) = fs::remove_file(&scratch_path) {
            tracing::warn!(path = %scratch_path.display(), error = %cleanup, "failed to remove merge scratch file");
        }
        return Err(e);
    }

    let merged = Segment::open_read_only(&output_path, sequence)?;

    tracing::info!(
        inputs = segments.len(),
        keys = merged.len(),
        path = %output_path.display(),
        "segments merged"
    );

    Ok(merged)
}

fn scratch_path(output_dir: &Path) -> PathBuf {
    let n = SCRATCH_COUNTER.fetch_add(1, Ordering::Relaxed);
    output_dir.join(format!(
        "{}.{}.{}.tmp",
        MERGED_SEGMENT_NAME,
        std::process::id(),
        n
    ))
}

fn write_merged(path: &Path, sequence: u64, latest: BTreeMap<Vec<u8>, Vec<u8>>) -> Result<()> {
    // A crashed process with a reused pid may have left this name behind
    OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)?;

    let mut merged = Segment::open(path, sequence)?;
    for (key, value) in latest {
        merged.put(&Record { key, value })?;
    }
    merged.close()
}
