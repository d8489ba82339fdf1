//! Backup identifiers.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Identifier of a backup attempt.
///
/// Ids are assigned by the registry in increasing order starting at 1 and are
/// never reused within a registry's lifetime.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BackupId(u64);

impl BackupId {
    /// The first id handed out by an empty registry.
    pub const FIRST: BackupId = BackupId(1);

    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    /// The id following this one, or `None` once the id space is used up.
    pub fn next(&self) -> Option<BackupId> {
        self.0.checked_add(1).map(BackupId)
    }
}

impl core::fmt::Display for BackupId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl From<u64> for BackupId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<BackupId> for u64 {
    fn from(value: BackupId) -> Self {
        value.0
    }
}

impl FromStr for BackupId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s
            .trim()
            .parse::<u64>()
            .map_err(|e| DomainError::invalid_id(format!("BackupId: {e}")))?;
        Ok(Self(value))
    }
}
