//! Backup scheduler: single-flight admission and completion bookkeeping.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::Utc;
use tokio::runtime::Handle;
use tracing::{error, info, warn};

use strongbox_core::{BackupId, BackupOutcome, BackupRecord, DomainError};

use super::executor::BackupExecutor;
use super::registry::{BackupRegistry, RegistryError};

/// Scheduling error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScheduleError {
    /// Expected outcome while another backup runs; nothing was allocated.
    #[error("backup {running} is already in progress")]
    AlreadyInProgress { running: BackupId },
    #[error("backup not found: {0}")]
    NotFound(BackupId),
    #[error("completion rejected: {0}")]
    AlreadyCompleted(DomainError),
    #[error("backup id space exhausted")]
    IdSpaceExhausted,
    #[error("storage error: {0}")]
    Storage(String),
}

impl From<RegistryError> for ScheduleError {
    fn from(e: RegistryError) -> Self {
        match e {
            RegistryError::NotFound(id) => Self::NotFound(id),
            RegistryError::AlreadyInProgress(running) => Self::AlreadyInProgress { running },
            RegistryError::IdSpaceExhausted => Self::IdSpaceExhausted,
            RegistryError::Storage(msg) => Self::Storage(msg),
        }
    }
}

/// Backoff for completions that could not be stored.
///
/// A backup whose outcome is not stored stays in progress and blocks
/// admission, so storage failures are retried until the write succeeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletionRetry {
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for CompletionRetry {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(30),
        }
    }
}

/// Admits backups one at a time and hands them to an executor.
///
/// Cheap to clone; clones share the registry, executor and runtime.
#[derive(Clone)]
pub struct BackupScheduler {
    registry: Arc<dyn BackupRegistry>,
    executor: Arc<dyn BackupExecutor>,
    runtime: Handle,
    /// Serializes read-modify-write of completions.
    completion: Arc<Mutex<()>>,
    retry: CompletionRetry,
}

impl BackupScheduler {
    /// `runtime` is where executions are spawned, so `schedule` may be called
    /// from any thread.
    pub fn new(
        registry: Arc<dyn BackupRegistry>,
        executor: Arc<dyn BackupExecutor>,
        runtime: Handle,
    ) -> Self {
        Self {
            registry,
            executor,
            runtime,
            completion: Arc::new(Mutex::new(())),
            retry: CompletionRetry::default(),
        }
    }

    pub fn with_completion_retry(mut self, retry: CompletionRetry) -> Self {
        self.retry = retry;
        self
    }

    pub fn registry(&self) -> &Arc<dyn BackupRegistry> {
        &self.registry
    }

    /// Admit a new backup and start it in the background.
    ///
    /// Returns as soon as the in-progress record is stored. Fails with
    /// `AlreadyInProgress` (allocating nothing) while another backup runs.
    pub fn schedule(&self, requested_by: &str) -> Result<BackupRecord, ScheduleError> {
        let record = match self.registry.admit(requested_by, Utc::now()) {
            Ok(record) => record,
            Err(RegistryError::AlreadyInProgress(running)) => {
                info!(requested_by, running_backup_id = %running, "backup rejected: already in progress");
                return Err(ScheduleError::AlreadyInProgress { running });
            }
            Err(e) => {
                error!(requested_by, error = %e, "backup admission failed");
                return Err(e.into());
            }
        };

        info!(backup_id = %record.id(), requested_by, "backup scheduled");
        self.spawn_execution(record.clone());
        Ok(record)
    }

    fn spawn_execution(&self, record: BackupRecord) {
        let scheduler = self.clone();
        let id = record.id();

        self.runtime.spawn(async move {
            let executor = scheduler.executor.clone();
            // Run in its own task so a panicking executor still yields a completion.
            let outcome = match tokio::spawn(async move { executor.execute(record).await }).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(backup_id = %id, error = %e, "backup execution aborted");
                    BackupOutcome::failed(format!("Backup execution aborted: {e}"))
                }
            };

            scheduler.store_completion(id, outcome).await;
        });
    }

    /// Record `outcome` off the async workers, retrying storage failures.
    async fn store_completion(&self, id: BackupId, outcome: BackupOutcome) {
        let mut delay = self.retry.initial_delay;
        let mut attempt = 1u32;

        loop {
            let scheduler = self.clone();
            let report = outcome.clone();
            let result =
                tokio::task::spawn_blocking(move || scheduler.record_completion(id, report)).await;

            match result {
                Ok(Ok(_)) => return,
                Ok(Err(ScheduleError::Storage(e))) => {
                    warn!(
                        backup_id = %id,
                        attempt,
                        retry_in_ms = delay.as_millis() as u64,
                        error = %e,
                        "failed to store backup completion; retrying"
                    );
                }
                Ok(Err(e)) => {
                    error!(backup_id = %id, error = %e, "failed to record backup completion");
                    return;
                }
                Err(e) => {
                    error!(backup_id = %id, error = %e, "backup completion task aborted");
                    return;
                }
            }

            tokio::time::sleep(delay).await;
            delay = (delay * 2).min(self.retry.max_delay);
            attempt = attempt.saturating_add(1);
        }
    }

    /// Record the outcome of backup `id`.
    ///
    /// This is the only path that changes a record after admission. A second
    /// report for the same backup is rejected and leaves the record as it was.
    pub fn record_completion(
        &self,
        id: BackupId,
        outcome: BackupOutcome,
    ) -> Result<BackupRecord, ScheduleError> {
        let _guard = self.completion.lock().unwrap_or_else(PoisonError::into_inner);

        let mut record = self.registry.get(id)?;
        if let Err(e) = record.complete(outcome, Utc::now()) {
            warn!(backup_id = %id, status = %record.status(), "duplicate backup completion ignored");
            return Err(ScheduleError::AlreadyCompleted(e));
        }
        self.registry.put(record.clone())?;

        info!(
            backup_id = %id,
            status = %record.status(),
            message = record.message(),
            "backup finished"
        );
        Ok(record)
    }
}
