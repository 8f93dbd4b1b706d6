//! On-disk lock protocol.
//!
//! A lock file holds two independent, non-overlapping regions:
//!
//! ```text
//! [0 .. state size)          state record   (version byte + codec payload)
//! [state size .. 2052)       owner record   (version byte, port, lock id, pid, operation)
//! ```
//!
//! The state region decides whether the protected cache can be trusted. The
//! information region only carries diagnostics about the current holder, so a
//! blocked process can read it without touching the state region lock.
//!
//! All integers are big-endian. Every record starts with its protocol version
//! byte, and decoding a record stamped with another version is fatal.

mod owner;
mod state;


pub use owner::{DESCRIPTION_CHAR_LIMIT, OWNER_PROTOCOL_VERSION, OwnerInfo, decode_owner, encode_owner};
pub use state::{LockState, OwnerId, StateCodec};

/// Offset of the state region.
pub const STATE_REGION_POS: u64 = 0;

/// End offset (exclusive) of the byte range locked for the information region.
///
/// Owner records may run past this offset; the range only exists for advisory locking.
pub const INFORMATION_REGION_END: u64 = 2052;

/// Why a record could not be decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// The leading version byte does not match the codec.
    UnexpectedVersion { expected: u8, found: u8 },
    /// The record ended before all of its fields were read.
    Truncated,
}

/// Big-endian cursor over a record.
pub(crate) struct RecordReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> RecordReader<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Read the version byte and check it against `expected`.
    pub(crate) fn version(&mut self, expected: u8) -> Result<(), DecodeError> {
        let found = self.u8()?;
        if found != expected {
            return Err(DecodeError::UnexpectedVersion { expected, found });
        }
        Ok(())
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let end = self.pos.checked_add(N).ok_or(DecodeError::Truncated)?;
        let bytes = self.buf.get(self.pos..end).ok_or(DecodeError::Truncated)?;
        self.pos = end;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    pub(crate) fn u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.take::<1>()?[0])
    }

    pub(crate) fn i32(&mut self) -> Result<i32, DecodeError> {
        Ok(i32::from_be_bytes(self.take()?))
    }

    pub(crate) fn i64(&mut self) -> Result<i64, DecodeError> {
        Ok(i64::from_be_bytes(self.take()?))
    }

    /// Read a `u16` length-prefixed UTF-8 string. Invalid sequences are replaced.
    pub(crate) fn utf(&mut self) -> Result<String, DecodeError> {
        let len = u16::from_be_bytes(self.take()?) as usize;
        let end = self.pos.checked_add(len).ok_or(DecodeError::Truncated)?;
        let bytes = self.buf.get(self.pos..end).ok_or(DecodeError::Truncated)?;
        self.pos = end;
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }
}

/// Append a `u16` length-prefixed UTF-8 string.
///
/// Callers bound the string length first; anything past `u16::MAX` bytes is cut
/// at the last char boundary that fits.
pub(crate) fn write_utf(out: &mut Vec<u8>, value: &str) {
    let mut end = value.len().min(u16::MAX as usize);
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    let bytes = &value.as_bytes()[..end];
    out.extend_from_slice(&(bytes.len() as u16).to_be_bytes());
    out.extend_from_slice(bytes);
}
