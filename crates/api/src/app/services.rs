use std::sync::Arc;

use tokio::runtime::Handle;

use strongbox_auth::RoleAdminPolicy;
use strongbox_infra::backups::{
    BackupExecutor, BackupRegistry, BackupScheduler, CommandBackupExecutor, FileBackupRegistry,
    InMemoryBackupRegistry, RegistryError, UnconfiguredBackupExecutor,
};

use crate::config::ServerConfig;
use crate::gateway::BackupGateway;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("failed to open backup registry: {0}")]
    Registry(#[from] RegistryError),
}

pub struct AppServices {
    pub backups: BackupGateway,
}

impl AppServices {
    pub fn new(backups: BackupGateway) -> Self {
        Self { backups }
    }

    pub fn from_config(config: &ServerConfig, runtime: Handle) -> Result<Self, ServiceError> {
        let registry: Arc<dyn BackupRegistry> = match &config.state_file {
            Some(path) => Arc::new(FileBackupRegistry::open(path)?),
            None => {
                tracing::warn!("BACKUP_STATE_FILE not set; backup history is kept in memory only");
                Arc::new(InMemoryBackupRegistry::new())
            }
        };

        let executor: Arc<dyn BackupExecutor> = match config
            .backup_command
            .as_deref()
            .and_then(CommandBackupExecutor::from_command_line)
        {
            Some(command) => {
                tracing::info!(program = command.program(), "backup command configured");
                Arc::new(command)
            }
            None => {
                tracing::warn!("BACKUP_COMMAND not set; every backup will fail");
                Arc::new(UnconfiguredBackupExecutor)
            }
        };

        let policy = Arc::new(RoleAdminPolicy::new(config.admin_roles.iter().cloned()));
        let scheduler = BackupScheduler::new(registry, executor, runtime);

        Ok(Self::new(BackupGateway::new(scheduler, policy)))
    }
}
