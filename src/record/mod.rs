//! Record Module
//!
//! The unit of data stored in a segment file.
//!
//! ## On-disk Format
//! ```text
//! ┌──────────────┬───────────┬──────────────┬─────────────┐
//! │ KeyLen (4)   │    Key    │ ValLen (4)   │    Value    │
//! └──────────────┴───────────┴──────────────┴─────────────┘
//! ```
//!
//! - Lengths are `u32`, little-endian
//! - Encoded length = 8 + key.len() + value.len()
//! - No header, version, or padding: a record decodes from any record-start
//!   offset with no other context

mod codec;

pub use codec::{decode, LEN_PREFIX_SIZE, RECORD_OVERHEAD};

/// An immutable key/value pair as written to a segment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

impl Record {
    pub fn new(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Number of bytes `encode()` produces for this record
    pub fn encoded_len(&self) -> u64 {
        RECORD_OVERHEAD + self.key.len() as u64 + self.value.len() as u64
    }
}
