//! Backup gateway: the request-facing operations, independent of HTTP.
//!
//! Handlers translate headers and paths into calls here and map the results
//! to status codes; every admission and authorization decision lives in this
//! module.

use std::sync::Arc;
use std::time::Duration;

use strongbox_auth::{AdminPolicy, AuthzError, Principal, authorize_admin};
use strongbox_core::{BackupId, BackupRecord};
use strongbox_infra::backups::{BackupScheduler, RegistryError, ScheduleError};

/// Collection path; individual backups live at `{BACKUPS_PATH}/{id}`.
pub const BACKUPS_PATH: &str = "/api/backups";

/// Polling hint returned with every accepted backup.
pub const RETRY_AFTER: Duration = Duration::from_secs(30);

/// Where the status of backup `id` can be read.
pub fn backup_location(id: BackupId) -> String {
    format!("{BACKUPS_PATH}/{id}")
}

/// A backup was admitted and is running in the background.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Accepted {
    pub id: BackupId,
    pub location: String,
    pub retry_after: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScheduleRejection {
    #[error("missing confirmation header: send 'X-Confirm: true' to start a backup")]
    ConfirmationRequired,
    #[error(transparent)]
    Unauthorized(#[from] AuthzError),
    #[error("another backup ({running}) is already in progress")]
    AlreadyInProgress { running: BackupId },
    #[error("backup could not be scheduled: {0}")]
    Internal(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LookupError {
    #[error("backup {0} not found")]
    NotFound(BackupId),
    #[error("backup could not be read: {0}")]
    Internal(String),
}

pub struct BackupGateway {
    scheduler: BackupScheduler,
    policy: Arc<dyn AdminPolicy>,
}

impl BackupGateway {
    pub fn new(scheduler: BackupScheduler, policy: Arc<dyn AdminPolicy>) -> Self {
        Self { scheduler, policy }
    }

    pub fn scheduler(&self) -> &BackupScheduler {
        &self.scheduler
    }

    /// Only administrators may schedule or inspect backups.
    pub fn authorize(&self, caller: &Principal) -> Result<(), AuthzError> {
        authorize_admin(self.policy.as_ref(), caller)
    }

    /// Start a backup on behalf of `caller`.
    ///
    /// Checks run in order: confirmation, then admin, then single-flight
    /// admission. A rejected request never allocates an id.
    pub fn schedule_backup(
        &self,
        caller: &Principal,
        has_confirm_header: bool,
    ) -> Result<Accepted, ScheduleRejection> {
        if !has_confirm_header {
            return Err(ScheduleRejection::ConfirmationRequired);
        }
        self.authorize(caller)?;

        let record = self.scheduler.schedule(&caller.name).map_err(|e| match e {
            ScheduleError::AlreadyInProgress { running } => {
                ScheduleRejection::AlreadyInProgress { running }
            }
            other => ScheduleRejection::Internal(other.to_string()),
        })?;

        Ok(Accepted {
            id: record.id(),
            location: backup_location(record.id()),
            retry_after: RETRY_AFTER,
        })
    }

    /// Snapshot of backup `id`. Callers authorize first.
    pub fn get_backup(&self, id: BackupId) -> Result<BackupRecord, LookupError> {
        self.scheduler.registry().get(id).map_err(|e| match e {
            RegistryError::NotFound(id) => LookupError::NotFound(id),
            other => LookupError::Internal(other.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration as StdDuration;

    use async_trait::async_trait;
    use strongbox_auth::{PrincipalId, Role, RoleAdminPolicy};
    use strongbox_core::{BackupOutcome, BackupStatus};
    use strongbox_infra::backups::{BackupExecutor, InMemoryBackupRegistry};
    use tokio::runtime::Handle;
    use tokio::sync::{Mutex, mpsc};

    /// Finishes each backup with whatever outcome the test sends next.
    struct ScriptedExecutor {
        outcomes: Mutex<mpsc::UnboundedReceiver<BackupOutcome>>,
    }

    #[async_trait]
    impl BackupExecutor for ScriptedExecutor {
        async fn execute(&self, _backup: BackupRecord) -> BackupOutcome {
            self.outcomes
                .lock()
                .await
                .recv()
                .await
                .unwrap_or_else(|| BackupOutcome::failed("script ended"))
        }
    }

    fn gateway() -> (BackupGateway, mpsc::UnboundedSender<BackupOutcome>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let scheduler = BackupScheduler::new(
            Arc::new(InMemoryBackupRegistry::new()),
            Arc::new(ScriptedExecutor { outcomes: Mutex::new(rx) }),
            Handle::current(),
        );
        (BackupGateway::new(scheduler, Arc::new(RoleAdminPolicy::default())), tx)
    }

    fn admin(name: &str) -> Principal {
        Principal::new(PrincipalId::new(), name, vec![Role::ADMIN])
    }

    fn viewer(name: &str) -> Principal {
        Principal::new(PrincipalId::new(), name, vec![Role::new("viewer")])
    }

    async fn wait_until_terminal(gateway: &BackupGateway, id: BackupId) -> BackupRecord {
        for _ in 0..200 {
            let record = gateway.get_backup(id).unwrap();
            if record.status().is_terminal() {
                return record;
            }
            tokio::time::sleep(StdDuration::from_millis(5)).await;
        }
        panic!("backup {id} did not finish");
    }

    #[tokio::test]
    async fn missing_confirmation_is_rejected_before_anything_else() {
        let (gateway, _tx) = gateway();

        assert_eq!(
            gateway.schedule_backup(&viewer("bob"), false),
            Err(ScheduleRejection::ConfirmationRequired)
        );
        assert_eq!(
            gateway.schedule_backup(&admin("alice"), false),
            Err(ScheduleRejection::ConfirmationRequired)
        );
        assert!(gateway.scheduler().registry().list().unwrap().is_empty());
    }

    #[tokio::test]
    async fn non_admin_is_rejected_without_allocating() {
        let (gateway, _tx) = gateway();

        let err = gateway.schedule_backup(&viewer("bob"), true).unwrap_err();

        assert!(matches!(err, ScheduleRejection::Unauthorized(AuthzError::NotAdmin(_))));
        assert_eq!(gateway.scheduler().registry().allocate().unwrap(), BackupId::FIRST);
    }

    #[tokio::test]
    async fn accepted_backup_points_at_its_status() {
        let (gateway, _tx) = gateway();

        let accepted = gateway.schedule_backup(&admin("alice"), true).unwrap();

        assert_eq!(accepted.id, BackupId::FIRST);
        assert_eq!(accepted.location, "/api/backups/1");
        assert_eq!(accepted.retry_after, StdDuration::from_secs(30));

        let record = gateway.get_backup(accepted.id).unwrap();
        assert_eq!(record.status(), BackupStatus::InProgress);
        assert_eq!(record.requested_by(), "alice");
    }

    #[tokio::test]
    async fn one_backup_at_a_time_then_the_next_gets_a_fresh_id() {
        let (gateway, tx) = gateway();

        let first = gateway.schedule_backup(&admin("alice"), true).unwrap();
        assert_eq!(
            gateway.schedule_backup(&admin("bob"), true),
            Err(ScheduleRejection::AlreadyInProgress { running: first.id })
        );

        tx.send(BackupOutcome::succeeded("ok")).unwrap();
        let finished = wait_until_terminal(&gateway, first.id).await;
        assert_eq!(finished.status(), BackupStatus::Completed);
        assert_eq!(finished.message(), "ok");
        assert!(finished.completed_at().is_some());

        let second = gateway.schedule_backup(&admin("carol"), true).unwrap();
        assert_eq!(second.id, BackupId::new(2));
        assert_eq!(second.location, "/api/backups/2");
    }

    #[tokio::test]
    async fn failed_backup_keeps_its_message() {
        let (gateway, tx) = gateway();
        let accepted = gateway.schedule_backup(&admin("alice"), true).unwrap();

        tx.send(BackupOutcome::failed("disk full")).unwrap();
        let record = wait_until_terminal(&gateway, accepted.id).await;

        assert_eq!(record.status(), BackupStatus::Failed);
        assert_eq!(record.message(), "disk full");
    }

    #[tokio::test]
    async fn unknown_backup_is_not_found() {
        let (gateway, _tx) = gateway();

        assert_eq!(
            gateway.get_backup(BackupId::new(42)),
            Err(LookupError::NotFound(BackupId::new(42)))
        );
    }

    #[tokio::test]
    async fn authorize_follows_the_admin_policy() {
        let (gateway, _tx) = gateway();

        assert!(gateway.authorize(&admin("alice")).is_ok());
        assert_eq!(
            gateway.authorize(&viewer("bob")),
            Err(AuthzError::NotAdmin("bob".to_string()))
        );
    }
}
