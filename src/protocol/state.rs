//! State record codecs.

use super::{DecodeError, RecordReader};
use serde::Serialize;
use std::fmt;
use std::num::NonZeroI32;

/// Identifier of the acquisition session that last left the cache clean.
///
/// Not an OS process id. Zero is reserved on disk for "unknown", which is the
/// dirty marker, so it can never be an owner id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct OwnerId(NonZeroI32);

impl OwnerId {
    /// Wrap a raw id. Returns `None` for zero.
    pub fn new(id: i32) -> Option<Self> {
        NonZeroI32::new(id).map(Self)
    }

    /// A fresh random owner id.
    pub fn random() -> Self {
        let (high, low) = uuid::Uuid::new_v4().as_u64_pair();
        let candidate = (high ^ low) as u32 as i32;
        // 0 is the dirty marker.
        Self(NonZeroI32::new(candidate).unwrap_or(NonZeroI32::MIN))
    }

    pub fn get(self) -> i32 {
        self.0.get()
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Persisted state of a lock file.
///
/// `dirty` is derived from the owner id in the current format: a state is
/// clean only when some owner explicitly marked it so.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockState {
    previous_owner: Option<OwnerId>,
    dirty: bool,
}

impl LockState {
    /// The state of a fresh file, or of a cache whose owner started mutating it.
    pub fn dirty() -> Self {
        Self {
            previous_owner: None,
            dirty: true,
        }
    }

    /// The state after `owner` finished its work successfully.
    pub fn clean(owner: OwnerId) -> Self {
        Self {
            previous_owner: Some(owner),
            dirty: false,
        }
    }

    /// Clean state read from the legacy format, which records no owner.
    pub(crate) fn clean_unowned() -> Self {
        Self {
            previous_owner: None,
            dirty: false,
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// The owner that last left the cache clean, if known.
    pub fn previous_owner(&self) -> Option<OwnerId> {
        self.previous_owner
    }

    /// The on-disk owner id: zero when dirty or unknown.
    pub fn previous_owner_id(&self) -> i32 {
        self.previous_owner.map_or(0, OwnerId::get)
    }
}

/// Serializer for the state region, selected by the lock options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StateCodec {
    /// Version 3: version byte followed by a 4-byte owner id, zero meaning dirty.
    #[default]
    Current,
    /// Version 1: version byte followed by a clean flag. Shared with older tool versions.
    Legacy,
}

impl StateCodec {
    pub const fn version(self) -> u8 {
        match self {
            Self::Current => 3,
            Self::Legacy => 1,
        }
    }

    /// Size of the state region in bytes, version byte included.
    pub const fn size(self) -> u64 {
        match self {
            Self::Current => 5,
            Self::Legacy => 2,
        }
    }

    /// State written to a lock file that has never been initialized.
    pub fn initial_state(self) -> LockState {
        LockState::dirty()
    }

    pub fn encode(self, state: &LockState) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.size() as usize);
        out.push(self.version());
        match self {
            Self::Current => out.extend_from_slice(&state.previous_owner_id().to_be_bytes()),
            Self::Legacy => out.push(u8::from(!state.is_dirty())),
        }
        out
    }

    pub fn decode(self, bytes: &[u8]) -> Result<LockState, DecodeError> {
        let mut reader = RecordReader::new(bytes);
        reader.version(self.version())?;
        match self {
            Self::Current => Ok(match OwnerId::new(reader.i32()?) {
                Some(owner) => LockState::clean(owner),
                None => LockState::dirty(),
            }),
            Self::Legacy => Ok(if reader.u8()? != 0 {
                LockState::clean_unowned()
            } else {
                LockState::dirty()
            }),
        }
    }
}

impl fmt::Display for StateCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Current => write!(f, "v{}", self.version()),
            Self::Legacy => write!(f, "v{} (cross-version)", self.version()),
        }
    }
}
