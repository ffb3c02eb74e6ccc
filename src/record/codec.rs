//! Record codec
//!
//! Encoding and decoding of single records.
//!
//! `decode` distinguishes a clean end of stream (`Ok(None)`) from a record
//! that starts but cannot be completed (`Err(Decode)`), so a sequential scan
//! knows where the file ends and a point lookup knows when the index lied.

use std::io::{ErrorKind, Read};

use crate::error::{Result, SegKvError};

use super::Record;

/// Size of each length prefix
pub const LEN_PREFIX_SIZE: usize = 4;

/// Framing bytes per record: key length prefix + value length prefix
pub const RECORD_OVERHEAD: u64 = 2 * LEN_PREFIX_SIZE as u64;

impl Record {
    /// Encode this record to bytes
    ///
    /// Format: key_len (4) + key + value_len (4) + value
    pub fn encode(&self) -> Result<Vec<u8>> {
        let key_len = prefix_for("key", self.key.len())?;
        let value_len = prefix_for("value", self.value.len())?;

        let mut buf = Vec::with_capacity(self.encoded_len() as usize);
        buf.extend_from_slice(&key_len.to_le_bytes());
        buf.extend_from_slice(&self.key);
        buf.extend_from_slice(&value_len.to_le_bytes());
        buf.extend_from_slice(&self.value);

        Ok(buf)
    }
}

/// Decode one record from the current position of `reader`
///
/// Returns:
/// - `Ok(Some((record, consumed)))` — a full record, `consumed` bytes read
/// - `Ok(None)` — the stream ended exactly at a record boundary
/// - `Err(Decode)` — the stream ended inside a record
pub fn decode<R: Read>(reader: &mut R) -> Result<Option<(Record, usize)>> {
    let key_len = match read_prefix(reader)? {
        Some(len) => len as usize,
        None => return Ok(None),
    };
    let key = read_part(reader, key_len, "key")?;

    let value_len = match read_prefix(reader)? {
        Some(len) => len as usize,
        None => {
            return Err(SegKvError::Decode(
                "truncated record: missing value length".to_string(),
            ))
        }
    };
    let value = read_part(reader, value_len, "value")?;

    let consumed = 2 * LEN_PREFIX_SIZE + key_len + value_len;
    Ok(Some((Record { key, value }, consumed)))
}

fn prefix_for(part: &str, len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| {
        SegKvError::Encode(format!(
            "{} of {} bytes exceeds the {}-byte length prefix",
            part, len, LEN_PREFIX_SIZE
        ))
    })
}

/// Read a length prefix; `None` if the stream is already exhausted
fn read_prefix<R: Read>(reader: &mut R) -> Result<Option<u32>> {
    let mut buf = [0u8; LEN_PREFIX_SIZE];
    let mut filled = 0;

    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(SegKvError::Io(e)),
        }
    }

    match filled {
        0 => Ok(None),
        LEN_PREFIX_SIZE => Ok(Some(u32::from_le_bytes(buf))),
        n => Err(SegKvError::Decode(format!(
            "truncated length prefix: got {} of {} bytes",
            n, LEN_PREFIX_SIZE
        ))),
    }
}

/// Read exactly `len` bytes without trusting `len` for the allocation size
fn read_part<R: Read>(reader: &mut R, len: usize, part: &str) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    reader.by_ref().take(len as u64).read_to_end(&mut buf)?;

    if buf.len() < len {
        return Err(SegKvError::Decode(format!(
            "truncated {}: expected {} bytes, got {}",
            part,
            len,
            buf.len()
        )));
    }
    Ok(buf)
}
