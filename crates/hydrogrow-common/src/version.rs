//! Record format versions and file signatures.
//!
//! Garden saves and replication snapshots each carry a [`SchemaVersion`].
//! A reader accepts any record with its own major version; minor bumps only
//! add fields that deserialize with defaults.

use serde::{Deserialize, Serialize};

/// Major/minor version stamped on persisted and replicated records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SchemaVersion {
    /// Bumped when old readers can no longer decode the record
    pub major: u16,
    /// Bumped for additive fields
    pub minor: u16,
}

impl SchemaVersion {
    /// Garden save records.
    pub const SAVE: Self = Self::new(1, 0);

    /// Replication snapshots and deltas.
    pub const SNAPSHOT: Self = Self::new(1, 0);

    /// Creates a version.
    #[must_use]
    pub const fn new(major: u16, minor: u16) -> Self {
        Self { major, minor }
    }

    /// Whether a reader at this version can decode a record written at
    /// `record`.
    #[must_use]
    pub const fn can_read(&self, record: &Self) -> bool {
        self.major == record.major
    }
}

impl std::fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{}.{}", self.major, self.minor)
    }
}

/// Four-byte signature at the start of a binary file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MagicBytes(pub [u8; 4]);

impl MagicBytes {
    /// Garden save files.
    pub const SAVE: Self = Self(*b"HGSV");

    /// Whether `bytes` starts with this signature.
    #[must_use]
    pub fn matches(self, bytes: &[u8]) -> bool {
        bytes.get(..4) == Some(&self.0[..])
    }
}
