//! Segment
//!
//! One append-only file plus an in-memory index of where each key's latest
//! record starts in that file.
//!
//! ## Index Invariant
//! For every key in `index`, seeking to the stored offset and decoding one
//! record yields that key with the newest value written to it in this file.
//! The index holds positions, not values; it is rebuilt from offset 0 on open.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::error::{Result, SegKvError};
use crate::record::{self, Record};

/// An append-only segment file with its key → offset index
#[derive(Debug)]
pub struct Segment {
    /// Current location of the backing file
    path: PathBuf,
    /// Recency tag: higher sequence = newer data
    sequence: u64,
    /// Append handle; `None` once sealed
    writer: Option<File>,
    /// Key → offset of the most recent record for that key
    index: HashMap<Vec<u8>, u64>,
    /// Running write offset (equals file length after a clean rebuild)
    offset: u64,
    /// Records in the file, including superseded ones
    record_count: u64,
}

impl Segment {
    /// Open or create a writable segment
    ///
    /// The file is opened for append+read and the index is rebuilt by a full
    /// sequential scan. A record that fails to decode aborts the open.
    pub fn open(path: &Path, sequence: u64) -> Result<Self> {
        let writer = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)?;

        let mut segment = Self::unindexed(path, sequence, Some(writer));
        segment.rebuild_index()?;
        Ok(segment)
    }

    /// Open an existing segment that will never be written again
    pub fn open_read_only(path: &Path, sequence: u64) -> Result<Self> {
        let mut segment = Self::unindexed(path, sequence, None);
        segment.rebuild_index()?;
        Ok(segment)
    }

    fn unindexed(path: &Path, sequence: u64, writer: Option<File>) -> Self {
        Self {
            path: path.to_path_buf(),
            sequence,
            writer,
            index: HashMap::new(),
            offset: 0,
            record_count: 0,
        }
    }

    /// Scan the file from the start, keeping the last offset seen per key
    fn rebuild_index(&mut self) -> Result<()> {
        let file = File::open(&self.path)?;
        let mut reader = BufReader::new(file);

        self.index.clear();
        self.offset = 0;
        self.record_count = 0;

        loop {
            let (record, consumed) = match record::decode(&mut reader) {
                Ok(Some(decoded)) => decoded,
                Ok(None) => break,
                Err(SegKvError::Decode(msg)) => {
                    return Err(SegKvError::Decode(format!(
                        "{} at offset {} in {}",
                        msg,
                        self.offset,
                        self.path.display()
                    )))
                }
                Err(e) => return Err(e),
            };

            self.index.insert(record.key, self.offset);
            self.offset += consumed as u64;
            self.record_count += 1;
        }

        tracing::debug!(
            path = %self.path.display(),
            records = self.record_count,
            keys = self.index.len(),
            bytes = self.offset,
            "segment index rebuilt"
        );

        Ok(())
    }

    /// Append a record
    ///
    /// The index only moves after the write succeeds. A failed write may
    /// leave a partial record at the tail of the file.
    pub fn put(&mut self, record: &Record) -> Result<()> {
        let writer = match self.writer.as_mut() {
            Some(w) => w,
            None => return Err(SegKvError::SegmentSealed(self.path.clone())),
        };

        let bytes = record.encode()?;
        writer.write_all(&bytes)?;

        self.index.insert(record.key.clone(), self.offset);
        self.offset += bytes.len() as u64;
        self.record_count += 1;

        Ok(())
    }

    /// Get a value by key
    ///
    /// Returns:
    /// - `Ok(value)` — key found
    /// - `Err(KeyNotFound)` — key not in this segment
    /// - `Err(Decode)` — the file no longer matches the index
    pub fn get(&self, key: &[u8]) -> Result<Vec<u8>> {
        let offset = match self.index.get(key) {
            Some(&off) => off,
            None => return Err(SegKvError::KeyNotFound),
        };

        // Own handle per lookup: concurrent readers never share a cursor
        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::Start(offset))?;
        let mut reader = BufReader::new(file);

        let (record, _) = record::decode(&mut reader)?.ok_or_else(|| {
            SegKvError::Decode(format!(
                "no record at offset {} in {}",
                offset,
                self.path.display()
            ))
        })?;

        if record.key != key {
            return Err(SegKvError::Decode(format!(
                "record at offset {} in {} holds a different key",
                offset,
                self.path.display()
            )));
        }

        Ok(record.value)
    }

    /// Check whether the index holds `key`
    pub fn contains_key(&self, key: &[u8]) -> bool {
        self.index.contains_key(key)
    }

    /// Keys with a live entry in this segment (arbitrary order)
    pub fn keys(&self) -> impl Iterator<Item = &[u8]> {
        self.index.keys().map(|k| k.as_slice())
    }

    /// Current file length in bytes, read from the filesystem
    pub fn size(&self) -> Result<u64> {
        Ok(fs::metadata(&self.path)?.len())
    }

    /// Force appended data to disk
    pub fn sync(&mut self) -> Result<()> {
        if let Some(writer) = self.writer.as_mut() {
            writer.sync_data()?;
        }
        Ok(())
    }

    /// Close the segment to writes: fsync and release the append handle
    ///
    /// Reads keep working. Sealing a sealed segment is a no-op.
    pub fn seal(&mut self) -> Result<()> {
        if let Some(writer) = self.writer.take() {
            writer.sync_all()?;
        }
        Ok(())
    }

    /// Move the backing file, keeping the index (offsets are path-independent)
    pub(crate) fn relocate(&mut self, new_path: &Path) -> Result<()> {
        fs::rename(&self.path, new_path)?;
        self.path = new_path.to_path_buf();
        Ok(())
    }

    /// Release the file handle
    pub fn close(mut self) -> Result<()> {
        self.seal()
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn is_sealed(&self) -> bool {
        self.writer.is_none()
    }

    /// Number of distinct keys indexed
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Records in the file, including ones shadowed by later writes
    pub fn record_count(&self) -> u64 {
        self.record_count
    }
}
