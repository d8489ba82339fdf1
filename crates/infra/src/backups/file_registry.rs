//! Durable registry persisted as a single JSON document.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use strongbox_core::{BackupId, BackupOutcome, BackupRecord};

use super::registry::{BackupRegistry, RegistryError, RegistryState};

/// Message stored on backups that were still running when the previous
/// process exited.
pub const ABORTED_ON_RESTART: &str = "Backup was aborted because the server restarted.";

#[derive(Debug, Serialize, Deserialize)]
struct RegistryDocument {
    next_id: Option<BackupId>,
    records: Vec<BackupRecord>,
}

/// File-backed registry.
///
/// The whole registry is rewritten (temp file + rename) after every mutation
/// while the write guard is held. If persisting fails the in-memory change is
/// rolled back and the caller gets `RegistryError::Storage`.
#[derive(Debug)]
pub struct FileBackupRegistry {
    path: PathBuf,
    state: RwLock<RegistryState>,
}

impl FileBackupRegistry {
    /// Open (or create) the registry at `path`.
    ///
    /// Records left in progress by an earlier process can never complete, so
    /// they are marked failed; otherwise they would block admission forever.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, RegistryError> {
        let path = path.into();
        let mut state = load(&path)?;

        let now = Utc::now();
        let stale: Vec<BackupId> = state.running.iter().copied().collect();
        for id in &stale {
            let mut record = state.get(*id)?;
            record
                .complete(BackupOutcome::failed(ABORTED_ON_RESTART), now)
                .map_err(|e| RegistryError::Storage(e.to_string()))?;
            state.put(record);
            warn!(backup_id = %id, "aborted backup left running by previous process");
        }

        persist(&path, &state)?;
        info!(
            path = %path.display(),
            records = state.records.len(),
            aborted = stale.len(),
            "opened backup registry"
        );

        Ok(Self {
            path,
            state: RwLock::new(state),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn mutate<T>(
        &self,
        f: impl FnOnce(&mut RegistryState) -> Result<T, RegistryError>,
    ) -> Result<T, RegistryError> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let before = state.clone();

        let value = f(&mut state)?;
        if let Err(e) = persist(&self.path, &state) {
            *state = before;
            return Err(e);
        }
        Ok(value)
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, RegistryState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }
}

fn load(path: &Path) -> Result<RegistryState, RegistryError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(RegistryState::default()),
        Err(e) => return Err(storage_error(path, e)),
    };

    let doc: RegistryDocument =
        serde_json::from_slice(&bytes).map_err(|e| storage_error(path, e))?;

    let mut state = RegistryState {
        next_id: doc.next_id,
        ..RegistryState::default()
    };
    for record in doc.records {
        state.put(record);
    }
    Ok(state)
}

fn persist(path: &Path, state: &RegistryState) -> Result<(), RegistryError> {
    let doc = RegistryDocument {
        next_id: state.next_id,
        records: state.list(),
    };
    let bytes = serde_json::to_vec_pretty(&doc).map_err(|e| storage_error(path, e))?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| storage_error(parent, e))?;
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    // The temp file must be on disk before it replaces the previous document.
    let mut file = fs::File::create(&tmp).map_err(|e| storage_error(&tmp, e))?;
    file.write_all(&bytes)
        .and_then(|()| file.sync_all())
        .map_err(|e| storage_error(&tmp, e))?;
    drop(file);

    fs::rename(&tmp, path).map_err(|e| storage_error(path, e))
}

fn storage_error(path: &Path, e: impl std::fmt::Display) -> RegistryError {
    RegistryError::Storage(format!("{}: {e}", path.display()))
}

impl BackupRegistry for FileBackupRegistry {
    fn allocate(&self) -> Result<BackupId, RegistryError> {
        self.mutate(|state| state.allocate())
    }

    fn put(&self, record: BackupRecord) -> Result<(), RegistryError> {
        self.mutate(|state| {
            state.put(record);
            Ok(())
        })
    }

    fn get(&self, id: BackupId) -> Result<BackupRecord, RegistryError> {
        self.read().get(id)
    }

    fn admit(
        &self,
        requested_by: &str,
        started_at: DateTime<Utc>,
    ) -> Result<BackupRecord, RegistryError> {
        self.mutate(|state| state.admit(requested_by, started_at))
    }

    fn in_progress(&self) -> Result<Option<BackupRecord>, RegistryError> {
        Ok(self.read().in_progress().cloned())
    }

    fn list(&self) -> Result<Vec<BackupRecord>, RegistryError> {
        Ok(self.read().list())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strongbox_core::BackupStatus;

    #[test]
    fn creates_an_empty_registry_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("backups.json");

        let registry = FileBackupRegistry::open(&path).unwrap();

        assert!(path.exists());
        assert!(registry.list().unwrap().is_empty());
        assert_eq!(registry.allocate().unwrap(), BackupId::FIRST);
    }

    #[test]
    fn history_and_ids_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("backups.json");

        {
            let registry = FileBackupRegistry::open(&path).unwrap();
            let mut first = registry.admit("alice", Utc::now()).unwrap();
            first.complete(BackupOutcome::succeeded("ok"), Utc::now()).unwrap();
            registry.put(first).unwrap();
            // Allocated but never stored: must still not be reused.
            assert_eq!(registry.allocate().unwrap(), BackupId::new(2));
        }

        let registry = FileBackupRegistry::open(&path).unwrap();
        let first = registry.get(BackupId::FIRST).unwrap();

        assert_eq!(first.status(), BackupStatus::Completed);
        assert_eq!(first.message(), "ok");
        assert_eq!(first.requested_by(), "alice");
        assert_eq!(registry.admit("bob", Utc::now()).unwrap().id(), BackupId::new(3));
    }

    #[test]
    fn running_backups_are_aborted_on_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("backups.json");

        let running_id = {
            let registry = FileBackupRegistry::open(&path).unwrap();
            registry.admit("alice", Utc::now()).unwrap().id()
        };

        let registry = FileBackupRegistry::open(&path).unwrap();
        let aborted = registry.get(running_id).unwrap();

        assert_eq!(aborted.status(), BackupStatus::Failed);
        assert_eq!(aborted.message(), ABORTED_ON_RESTART);
        assert!(aborted.completed_at().is_some());
        assert!(registry.in_progress().unwrap().is_none());
        assert!(registry.admit("bob", Utc::now()).is_ok());
    }

    #[test]
    fn persisting_replaces_the_document_and_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("backups.json");
        let registry = FileBackupRegistry::open(&path).unwrap();

        registry.admit("alice", Utc::now()).unwrap();

        let doc: RegistryDocument = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(doc.records.len(), 1);
        assert_eq!(doc.next_id, Some(BackupId::new(2)));

        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        assert!(!PathBuf::from(tmp).exists());
    }

    #[test]
    fn corrupt_file_is_a_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("backups.json");
        fs::write(&path, b"{ not json").unwrap();

        let err = FileBackupRegistry::open(&path).unwrap_err();

        assert!(matches!(err, RegistryError::Storage(_)));
    }

    #[test]
    fn failed_persist_rolls_back_admission() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("backups.json");
        let registry = FileBackupRegistry::open(&path).unwrap();

        // A directory where the temp file should go makes the write fail.
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        fs::create_dir(PathBuf::from(tmp)).unwrap();

        let err = registry.admit("alice", Utc::now()).unwrap_err();

        assert!(matches!(err, RegistryError::Storage(_)));
        assert!(registry.list().unwrap().is_empty());
        assert!(registry.in_progress().unwrap().is_none());
    }
}
