//! Lock options: mode and on-disk state format.

use crate::protocol::StateCodec;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How the state region is locked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LockMode {
    /// Single holder; required to mutate the protected cache.
    #[default]
    Exclusive,
    /// Any number of concurrent readers.
    Shared,
}

impl LockMode {
    pub fn is_shared(self) -> bool {
        self == Self::Shared
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Exclusive => "exclusive",
            Self::Shared => "shared",
        }
    }
}

impl fmt::Display for LockMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable lock configuration.
///
/// The cross-version flag only switches the state record format; owner records
/// are always written in the current format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct LockOptions {
    mode: LockMode,
    cross_version: bool,
}

impl LockOptions {
    pub fn new(mode: LockMode) -> Self {
        Self {
            mode,
            cross_version: false,
        }
    }

    pub fn exclusive() -> Self {
        Self::new(LockMode::Exclusive)
    }

    pub fn shared() -> Self {
        Self::new(LockMode::Shared)
    }

    /// Same options, using the legacy state format readable by older tool versions.
    pub fn use_cross_version_implementation(self) -> Self {
        Self {
            cross_version: true,
            ..self
        }
    }

    /// Same options with a different mode.
    pub fn with_mode(self, mode: LockMode) -> Self {
        Self { mode, ..self }
    }

    pub fn mode(&self) -> LockMode {
        self.mode
    }

    pub fn is_cross_version(&self) -> bool {
        self.cross_version
    }

    /// The state record serializer these options select.
    pub fn state_codec(&self) -> StateCodec {
        if self.cross_version {
            StateCodec::Legacy
        } else {
            StateCodec::Current
        }
    }
}

impl fmt::Display for LockOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.mode)?;
        if self.cross_version {
            write!(f, " (cross-version)")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_defaults() {
        let options = LockOptions::default();
        assert_eq!(options.mode(), LockMode::Exclusive);
        assert!(!options.is_cross_version());
        assert_eq!(options.state_codec(), StateCodec::Current);
    }

    #[test]
    fn test_with_mode_leaves_original_untouched() {
        let exclusive = LockOptions::exclusive().use_cross_version_implementation();
        let shared = exclusive.with_mode(LockMode::Shared);

        assert_eq!(exclusive.mode(), LockMode::Exclusive);
        assert_eq!(shared.mode(), LockMode::Shared);
        assert!(shared.is_cross_version());
    }

    #[test]
    fn test_cross_version_selects_legacy_codec() {
        let options = LockOptions::shared().use_cross_version_implementation();
        assert_eq!(options.state_codec(), StateCodec::Legacy);
    }

    #[test]
    fn test_structural_equality_and_hash() {
        let mut set = HashSet::new();
        set.insert(LockOptions::exclusive());
        set.insert(LockOptions::new(LockMode::Exclusive));
        set.insert(LockOptions::shared().with_mode(LockMode::Exclusive));
        assert_eq!(set.len(), 1);

        set.insert(LockOptions::exclusive().use_cross_version_implementation());
        set.insert(LockOptions::shared());
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn test_display() {
        assert_eq!(LockOptions::exclusive().to_string(), "exclusive");
        assert_eq!(
            LockOptions::shared()
                .use_cross_version_implementation()
                .to_string(),
            "shared (cross-version)"
        );
    }

    #[test]
    fn test_lock_mode_serde() {
        let yaml = serde_yaml::to_string(&LockMode::Shared).unwrap();
        assert_eq!(yaml.trim(), "shared");
        let mode: LockMode = serde_yaml::from_str("exclusive").unwrap();
        assert_eq!(mode, LockMode::Exclusive);
    }
}
