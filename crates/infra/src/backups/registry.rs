//! Backup registry: the authoritative store of backup records.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Utc};

use strongbox_core::{BackupId, BackupRecord};

/// Backup registry abstraction.
///
/// Every write (including admission) happens under one guard per registry,
/// so readers only ever see whole records.
pub trait BackupRegistry: Send + Sync {
    /// Hand out the next unused id.
    fn allocate(&self) -> Result<BackupId, RegistryError>;

    /// Store or overwrite a record, keyed by its id.
    fn put(&self, record: BackupRecord) -> Result<(), RegistryError>;

    /// Snapshot of a record.
    fn get(&self, id: BackupId) -> Result<BackupRecord, RegistryError>;

    /// Atomically admit a new backup.
    ///
    /// Fails with `AlreadyInProgress` if any record is still in progress;
    /// otherwise allocates an id and stores a fresh in-progress record.
    fn admit(
        &self,
        requested_by: &str,
        started_at: DateTime<Utc>,
    ) -> Result<BackupRecord, RegistryError>;

    /// The backup currently in progress, if any.
    fn in_progress(&self) -> Result<Option<BackupRecord>, RegistryError>;

    /// All records, ordered by id.
    fn list(&self) -> Result<Vec<BackupRecord>, RegistryError>;
}

/// Registry error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("backup not found: {0}")]
    NotFound(BackupId),
    #[error("backup {0} is already in progress")]
    AlreadyInProgress(BackupId),
    #[error("backup id space exhausted")]
    IdSpaceExhausted,
    #[error("storage error: {0}")]
    Storage(String),
}

/// Registry contents shared by the in-memory and file-backed registries.
#[derive(Debug, Clone)]
pub(crate) struct RegistryState {
    /// `None` once `u64::MAX` has been handed out.
    pub(crate) next_id: Option<BackupId>,
    pub(crate) records: BTreeMap<BackupId, BackupRecord>,
    /// Ids of in-progress records, kept in step with `records` by `put`/`admit`.
    pub(crate) running: BTreeSet<BackupId>,
}

impl Default for RegistryState {
    fn default() -> Self {
        Self {
            next_id: Some(BackupId::FIRST),
            records: BTreeMap::new(),
            running: BTreeSet::new(),
        }
    }
}

impl RegistryState {
    pub(crate) fn allocate(&mut self) -> Result<BackupId, RegistryError> {
        let id = self.next_id.ok_or(RegistryError::IdSpaceExhausted)?;
        self.next_id = id.next();
        Ok(id)
    }

    pub(crate) fn put(&mut self, record: BackupRecord) -> Option<BackupRecord> {
        let id = record.id();
        if self.next_id.is_some_and(|next| id >= next) {
            // Keep allocation ahead of anything stored directly.
            self.next_id = id.next();
        }
        if record.is_in_progress() {
            self.running.insert(id);
        } else {
            self.running.remove(&id);
        }
        self.records.insert(id, record)
    }

    pub(crate) fn get(&self, id: BackupId) -> Result<BackupRecord, RegistryError> {
        self.records.get(&id).cloned().ok_or(RegistryError::NotFound(id))
    }

    pub(crate) fn in_progress(&self) -> Option<&BackupRecord> {
        self.running.last().and_then(|id| self.records.get(id))
    }

    pub(crate) fn admit(
        &mut self,
        requested_by: &str,
        started_at: DateTime<Utc>,
    ) -> Result<BackupRecord, RegistryError> {
        if let Some(running) = self.in_progress() {
            return Err(RegistryError::AlreadyInProgress(running.id()));
        }

        let id = self.allocate()?;
        let record = BackupRecord::new(id, started_at, requested_by);
        self.running.insert(id);
        self.records.insert(id, record.clone());
        Ok(record)
    }

    pub(crate) fn list(&self) -> Vec<BackupRecord> {
        self.records.values().cloned().collect()
    }
}

/// In-memory registry for tests/dev; history is lost on restart.
#[derive(Debug, Default)]
pub struct InMemoryBackupRegistry {
    state: RwLock<RegistryState>,
}

impl InMemoryBackupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, RegistryState> {
        // State is consistent between statements, so a poisoned lock is still usable.
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, RegistryState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl BackupRegistry for InMemoryBackupRegistry {
    fn allocate(&self) -> Result<BackupId, RegistryError> {
        self.write().allocate()
    }

    fn put(&self, record: BackupRecord) -> Result<(), RegistryError> {
        self.write().put(record);
        Ok(())
    }

    fn get(&self, id: BackupId) -> Result<BackupRecord, RegistryError> {
        self.read().get(id)
    }

    fn admit(
        &self,
        requested_by: &str,
        started_at: DateTime<Utc>,
    ) -> Result<BackupRecord, RegistryError> {
        self.write().admit(requested_by, started_at)
    }

    fn in_progress(&self) -> Result<Option<BackupRecord>, RegistryError> {
        Ok(self.read().in_progress().cloned())
    }

    fn list(&self) -> Result<Vec<BackupRecord>, RegistryError> {
        Ok(self.read().list())
    }
}
