//! Versioning of persisted campaign payloads.

use std::fmt;

use serde::{Deserialize, Serialize};

/// `major.minor.patch` tag stored with every checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SchemaVersion {
    /// Breaking layout changes.
    pub major: u32,
    /// Fields added with defaults.
    pub minor: u32,
    /// Fixes that leave the layout alone.
    pub patch: u32,
}

impl SchemaVersion {
    /// Builds a version tag.
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// True when a reader at `self` understands a payload written at `written`.
    pub fn is_compatible_with(&self, written: &SchemaVersion) -> bool {
        self.major == written.major && written.minor <= self.minor
    }
}

impl Default for SchemaVersion {
    fn default() -> Self {
        Self::new(1, 0, 0)
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

#[cfg(test)]
mod tests {
    use super::SchemaVersion;

    #[test]
    fn newer_minor_is_unreadable() {
        let reader = SchemaVersion::new(1, 1, 0);
        assert!(reader.is_compatible_with(&SchemaVersion::new(1, 0, 3)));
        assert!(reader.is_compatible_with(&SchemaVersion::new(1, 1, 0)));
        assert!(!reader.is_compatible_with(&SchemaVersion::new(1, 2, 0)));
        assert!(!reader.is_compatible_with(&SchemaVersion::new(2, 0, 0)));
        assert_eq!(reader.to_string(), "1.1.0");
    }
}
