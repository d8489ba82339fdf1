//! Backup execution back-ends.
//!
//! How a backup artifact is produced is outside this crate's concern; an
//! executor only turns "backup N was admitted" into a [`BackupOutcome`].

use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, warn};

use strongbox_core::{BackupOutcome, BackupRecord};

/// Message recorded for a backup whose command exited successfully.
pub const BACKUP_SUCCEEDED: &str = "Backup was generated successfully.";

/// How much of a command's stderr is kept for the failure message.
const STDERR_TAIL_LIMIT: usize = 64 * 1024;

/// Runs one admitted backup to completion.
///
/// The scheduler calls `execute` on a background task, at most once per
/// admitted backup and never concurrently with another backup.
#[async_trait]
pub trait BackupExecutor: Send + Sync + 'static {
    async fn execute(&self, backup: BackupRecord) -> BackupOutcome;
}

/// Runs an external program to perform the backup.
///
/// The program sees `STRONGBOX_BACKUP_ID` and `STRONGBOX_BACKUP_REQUESTED_BY`
/// in its environment. Exit status 0 means success; otherwise the last line
/// of stderr becomes the failure message. Stdout is discarded.
#[derive(Debug, Clone)]
pub struct CommandBackupExecutor {
    program: String,
    args: Vec<String>,
}

impl CommandBackupExecutor {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Build from a whitespace separated command line (no shell quoting).
    pub fn from_command_line(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace();
        let program = parts.next()?;
        Some(Self::new(program, parts))
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }
}

#[async_trait]
impl BackupExecutor for CommandBackupExecutor {
    async fn execute(&self, backup: BackupRecord) -> BackupOutcome {
        debug!(backup_id = %backup.id(), program = %self.program, "running backup command");

        // Stdout may carry the dump itself; only the stderr tail is kept.
        let spawned = tokio::process::Command::new(&self.program)
            .args(&self.args)
            .env("STRONGBOX_BACKUP_ID", backup.id().to_string())
            .env("STRONGBOX_BACKUP_REQUESTED_BY", backup.requested_by())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();

        let mut child = match spawned {
            Ok(child) => child,
            Err(e) => {
                warn!(backup_id = %backup.id(), error = %e, "backup command could not start");
                return BackupOutcome::failed(format!(
                    "Failed to start backup command '{}': {e}",
                    self.program
                ));
            }
        };

        let stderr = match child.stderr.take() {
            Some(stderr) => read_tail(stderr, STDERR_TAIL_LIMIT).await.unwrap_or_else(|e| {
                debug!(backup_id = %backup.id(), error = %e, "could not read backup command stderr");
                Vec::new()
            }),
            None => Vec::new(),
        };

        let status = match child.wait().await {
            Ok(status) => status,
            Err(e) => {
                warn!(backup_id = %backup.id(), error = %e, "backup command could not be awaited");
                return BackupOutcome::failed(format!("Backup command failed: {e}"));
            }
        };

        if status.success() {
            return BackupOutcome::succeeded(BACKUP_SUCCEEDED);
        }

        warn!(backup_id = %backup.id(), status = %status, "backup command failed");
        let stderr = String::from_utf8_lossy(&stderr);
        match stderr.lines().rev().map(str::trim).find(|l| !l.is_empty()) {
            Some(detail) => {
                BackupOutcome::failed(format!("Backup command failed ({status}): {detail}"))
            }
            None => BackupOutcome::failed(format!("Backup command failed ({status})")),
        }
    }
}

/// Drain `reader`, keeping at most its last `limit` bytes.
async fn read_tail(mut reader: impl AsyncRead + Unpin, limit: usize) -> std::io::Result<Vec<u8>> {
    let mut tail = Vec::new();
    let mut chunk = [0u8; 8192];

    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            return Ok(tail);
        }
        tail.extend_from_slice(&chunk[..n]);
        if tail.len() > limit {
            let excess = tail.len() - limit;
            tail.drain(..excess);
        }
    }
}

/// Used when no backup command is configured: every backup fails at once.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnconfiguredBackupExecutor;

#[async_trait]
impl BackupExecutor for UnconfiguredBackupExecutor {
    async fn execute(&self, _backup: BackupRecord) -> BackupOutcome {
        BackupOutcome::failed("No backup command is configured.")
    }
}
