//! Store
//!
//! Routes reads and writes across the ordered segments of one directory.
//!
//! ## Responsibilities
//! - Discover existing segments on open, ordered by sequence number
//! - Append to the single active segment, rotating it at capacity
//! - Search segments newest → oldest for reads (newer shadows older)
//! - Compact sealed segments into one and retire the superseded files

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::{Mutex, RwLock};

use crate::config::{Config, SyncStrategy};
use crate::error::{Result, SegKvError};
use crate::record::Record;

use super::{merge, Segment};

/// Reserved file name of the active segment
pub const ACTIVE_SEGMENT_NAME: &str = "current-data";

/// Prefix of sealed segment files: `segment-<sequence>`
pub const SEALED_SEGMENT_PREFIX: &str = "segment-";

/// What a file name in the data directory denotes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SegmentFile {
    Active,
    Sealed(u64),
}

/// Point-in-time figures for diagnostics and capacity reporting
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Number of segments, active included
    pub segments: usize,
    /// Sum of all segment file sizes
    pub total_bytes: u64,
    /// Records on disk, including superseded history
    pub records: u64,
    /// Distinct keys across all segments
    pub live_keys: usize,
}

/// Outcome of `Store::compact`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompactionStats {
    /// Sealed segments folded into one (0 = nothing to do)
    pub segments_merged: usize,
    /// Keys in the merged segment
    pub keys: usize,
    /// Combined size of the sealed segments before compaction
    pub bytes_before: u64,
    /// Size of the merged segment
    pub bytes_after: u64,
    /// Superseded files deleted
    pub files_removed: usize,
}

/// Mutable state, guarded as one unit
struct StoreState {
    /// Ordered oldest → newest; the last one is the active segment
    segments: Vec<Segment>,
    /// Sequence of the active segment, and the name it gets when sealed
    next_sequence: u64,
    closed: bool,
}

impl StoreState {
    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(SegKvError::StoreClosed);
        }
        Ok(())
    }

    fn active_mut(&mut self) -> Result<&mut Segment> {
        match self.segments.last_mut() {
            Some(segment) if !segment.is_sealed() => Ok(segment),
            _ => Err(SegKvError::Storage("no active segment".to_string())),
        }
    }
}

/// A segmented log-structured key-value store over one directory
///
/// ## Concurrency:
/// - `state`: Protected by RwLock (many concurrent readers, exclusive writer)
/// - `put`, rotation, `compact` and `close` take the write lock
/// - `get`, `size`, `stats` and `merge_into` take the read lock
/// - `merge_lock`: serializes `merge_into` and `compact`, which share the
///   `merged-segment` file name; always taken before `state`
/// - All methods use `&self`
pub struct Store {
    config: Config,
    state: RwLock<StoreState>,
    merge_lock: Mutex<()>,
}

impl Store {
    /// Open or create a store with the given config
    ///
    /// On startup:
    /// 1. Create directory if it doesn't exist
    /// 2. Discover `segment-<N>` files and `current-data`
    /// 3. Rebuild each segment's index, ordered by N ascending
    /// 4. Open (or create) `current-data` as the active segment, last in order
    pub fn open(config: Config) -> Result<Self> {
        config.validate()?;
        let dir = config.data_dir.clone();
        fs::create_dir_all(&dir)?;

        let mut sealed: Vec<(u64, PathBuf)> = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }

            let file_path = entry.path();
            match Self::parse_segment_file(&file_path) {
                Some(SegmentFile::Sealed(sequence)) => sealed.push((sequence, file_path)),
                Some(SegmentFile::Active) => {}
                None => {
                    tracing::debug!(path = %file_path.display(), "ignoring non-segment file")
                }
            }
        }

        // Numeric order, never file-name order
        sealed.sort_by_key(|(sequence, _)| *sequence);

        let mut segments = Vec::with_capacity(sealed.len() + 1);
        for (sequence, path) in &sealed {
            segments.push(Segment::open_read_only(path, *sequence)?);
        }

        let next_sequence = match sealed.last() {
            Some((seq, _)) => Self::sequence_after(*seq)?,
            None => 0,
        };
        segments.push(Segment::open(&Self::active_path(&dir), next_sequence)?);

        tracing::info!(
            dir = %dir.display(),
            segments = segments.len(),
            active_sequence = next_sequence,
            "store opened"
        );

        Ok(Self {
            config,
            state: RwLock::new(StoreState {
                segments,
                next_sequence,
                closed: false,
            }),
            merge_lock: Mutex::new(()),
        })
    }

    /// Open with a path (convenience method)
    ///
    /// Uses default config with the specified data directory
    pub fn open_path(path: &Path) -> Result<Self> {
        Self::open(Config::builder().data_dir(path).build())
    }

    /// Get a value by key (searches segments newest → oldest)
    ///
    /// Returns:
    /// - `Ok(value)` — newest value written for `key`
    /// - `Err(KeyNotFound)` — no segment holds `key`
    /// - any other error from a segment is returned as-is, without
    ///   falling through to older segments
    pub fn get(&self, key: &[u8]) -> Result<Vec<u8>> {
        let state = self.state.read();
        state.ensure_open()?;

        for segment in state.segments.iter().rev() {
            match segment.get(key) {
                Ok(value) => return Ok(value),
                Err(SegKvError::KeyNotFound) => continue,
                Err(e) => return Err(e),
            }
        }

        Err(SegKvError::KeyNotFound)
    }

    /// Put a key-value pair
    ///
    /// Steps:
    /// 1. Acquire write lock
    /// 2. Append to the active segment (and fsync under `EveryWrite`)
    /// 3. Rotate if the active file reached capacity
    ///
    /// An error from step 3 means the record IS durable but the active
    /// segment was not replaced; the next `put` finishes the rotation.
    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let mut state = self.state.write();
        state.ensure_open()?;
        self.ensure_active(&mut state)?;

        let record = Record::new(key, value);
        let active = state.active_mut()?;
        active.put(&record)?;
        if self.config.sync_strategy == SyncStrategy::EveryWrite {
            active.sync()?;
        }

        if active.size()? >= self.config.segment_capacity {
            self.rotate(&mut state)?;
        }

        Ok(())
    }

    /// Sum of all segment file sizes in bytes
    pub fn size(&self) -> Result<u64> {
        let state = self.state.read();
        state.ensure_open()?;

        let mut total = 0;
        for segment in &state.segments {
            total += segment.size()?;
        }
        Ok(total)
    }

    pub fn stats(&self) -> Result<StoreStats> {
        let state = self.state.read();
        state.ensure_open()?;

        let mut stats = StoreStats {
            segments: state.segments.len(),
            ..StoreStats::default()
        };
        let mut keys: HashSet<&[u8]> = HashSet::new();
        for segment in &state.segments {
            stats.total_bytes += segment.size()?;
            stats.records += segment.record_count();
            keys.extend(segment.keys());
        }
        stats.live_keys = keys.len();

        Ok(stats)
    }

    /// Merge every segment (active included) into `{output_dir}/merged-segment`
    ///
    /// The store itself is left untouched; the caller owns the read-only
    /// result. Merges are serialized per store.
    ///
    /// `compact` writes the same file name in the data directory and then
    /// renames it away, so a segment returned by `merge_into(data_dir)` stops
    /// being readable once `compact` runs. Merge elsewhere to keep it.
    pub fn merge_into(&self, output_dir: &Path) -> Result<Segment> {
        let _merge_guard = self.merge_lock.lock();
        let state = self.state.read();
        state.ensure_open()?;

        fs::create_dir_all(output_dir)?;
        let inputs: Vec<&Segment> = state.segments.iter().collect();
        merge(output_dir, &inputs)
    }

    /// Compact all sealed segments into one
    ///
    /// The merged file replaces the newest sealed file by rename, the
    /// in-memory list is swapped, and only then are the other superseded
    /// files deleted. Files that fail to delete are reported after every
    /// removal has been attempted; they are fully shadowed by the merged
    /// segment, so the store stays correct either way.
    pub fn compact(&self) -> Result<CompactionStats> {
        let _merge_guard = self.merge_lock.lock();
        let mut state = self.state.write();
        state.ensure_open()?;
        self.ensure_active(&mut state)?;

        let sealed_count = state.segments.len() - 1;
        if sealed_count < 2 {
            return Ok(CompactionStats::default());
        }

        let mut bytes_before = 0;
        for segment in &state.segments[..sealed_count] {
            bytes_before += segment.size()?;
        }

        // Comes back sealed
        let mut merged = {
            let inputs: Vec<&Segment> = state.segments[..sealed_count].iter().collect();
            merge(&self.config.data_dir, &inputs)?
        };

        // The rename replaces the newest sealed file in place; the old
        // segment's index is stale from here on, so swap before anything
        // else can fail
        let target = self.segment_path(merged.sequence());
        merged.relocate(&target)?;
        let superseded: Vec<Segment> = state.segments.drain(..sealed_count).collect();
        state.segments.insert(0, merged);

        sync_dir(&self.config.data_dir)?;

        let mut stats = CompactionStats {
            segments_merged: sealed_count,
            keys: state.segments[0].len(),
            bytes_before,
            bytes_after: state.segments[0].size()?,
            files_removed: 0,
        };

        let mut first_error = None;
        for segment in superseded {
            if segment.path() == target {
                continue;
            }
            let path = segment.path().to_path_buf();
            drop(segment);

            match fs::remove_file(&path) {
                Ok(()) => stats.files_removed += 1,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "failed to remove compacted segment");
                    first_error.get_or_insert(e);
                }
            }
        }

        tracing::info!(
            merged = stats.segments_merged,
            keys = stats.keys,
            bytes_before = stats.bytes_before,
            bytes_after = stats.bytes_after,
            "compaction complete"
        );

        match first_error {
            Some(e) => Err(SegKvError::Io(e)),
            None => Ok(stats),
        }
    }

    /// Close every segment
    ///
    /// Every segment is attempted even if some fail. Failures are logged
    /// and reported together as `CloseFailed` carrying the first error.
    /// The store is closed afterwards regardless.
    pub fn close(&self) -> Result<()> {
        let mut state = self.state.write();
        state.ensure_open()?;
        state.closed = true;

        let mut failed = 0;
        let mut first_error = None;
        for segment in state.segments.drain(..) {
            let path = segment.path().to_path_buf();
            if let Err(e) = segment.close() {
                tracing::warn!(path = %path.display(), error = %e, "failed to close segment");
                failed += 1;
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(SegKvError::CloseFailed {
                failed,
                source: Box::new(e),
            }),
            None => Ok(()),
        }
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Get the number of segments, active included
    pub fn segment_count(&self) -> usize {
        self.state.read().segments.len()
    }

    /// Get the data directory path
    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn is_closed(&self) -> bool {
        self.state.read().closed
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Seal the active segment as `segment-<N>` and start a fresh one
    fn rotate(&self, state: &mut StoreState) -> Result<()> {
        let sequence = state.next_sequence;
        let next_sequence = Self::sequence_after(sequence)?;
        let sealed_path = self.segment_path(sequence);

        // Rename first: if it fails the active segment is untouched
        state.active_mut()?.relocate(&sealed_path)?;
        state.next_sequence = next_sequence;
        state.active_mut()?.seal()?;
        sync_dir(&self.config.data_dir)?;

        tracing::info!(
            sealed = %sealed_path.display(),
            next_sequence = state.next_sequence,
            "active segment rotated"
        );

        self.ensure_active(state)
    }

    /// Make sure the last segment accepts writes, creating `current-data`
    /// if a previous rotation stopped short of it
    fn ensure_active(&self, state: &mut StoreState) -> Result<()> {
        let needs_active = state.segments.last().map_or(true, |s| s.is_sealed());
        if needs_active {
            let path = Self::active_path(&self.config.data_dir);
            let segment = Segment::open(&path, state.next_sequence)?;
            state.segments.push(segment);
        }
        Ok(())
    }

    fn sequence_after(sequence: u64) -> Result<u64> {
        sequence.checked_add(1).ok_or_else(|| {
            SegKvError::Storage(format!("segment sequence {} cannot be advanced", sequence))
        })
    }

    fn segment_path(&self, sequence: u64) -> PathBuf {
        self.config
            .data_dir
            .join(format!("{}{}", SEALED_SEGMENT_PREFIX, sequence))
    }

    fn active_path(dir: &Path) -> PathBuf {
        dir.join(ACTIVE_SEGMENT_NAME)
    }

    /// "segment-42" → Sealed(42), "current-data" → Active
    ///
    /// Only the canonical decimal form is accepted, so "segment-042" and
    /// "segment-42" can never both name sequence 42.
    fn parse_segment_file(path: &Path) -> Option<SegmentFile> {
        let name = path.file_name()?.to_str()?;
        if name == ACTIVE_SEGMENT_NAME {
            return Some(SegmentFile::Active);
        }

        let digits = name.strip_prefix(SEALED_SEGMENT_PREFIX)?;
        let sequence: u64 = digits.parse().ok()?;
        (sequence.to_string() == digits).then_some(SegmentFile::Sealed(sequence))
    }
}

/// Persist renames in `dir`
#[cfg(unix)]
fn sync_dir(dir: &Path) -> Result<()> {
    fs::File::open(dir)?.sync_all()?;
    Ok(())
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> Result<()> {
    Ok(())
}
