//! The backup record: one tracked backup attempt.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::id::BackupId;

/// Backup lifecycle status.
///
/// The only legal transitions are `InProgress -> Completed` and
/// `InProgress -> Failed`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BackupStatus {
    InProgress,
    Completed,
    Failed,
}

impl BackupStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, BackupStatus::InProgress)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BackupStatus::InProgress => "IN_PROGRESS",
            BackupStatus::Completed => "COMPLETED",
            BackupStatus::Failed => "FAILED",
        }
    }
}

impl core::fmt::Display for BackupStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the execution side reports once a backup has finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackupOutcome {
    Succeeded(String),
    Failed(String),
}

impl BackupOutcome {
    pub fn succeeded(message: impl Into<String>) -> Self {
        Self::Succeeded(message.into())
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }

    pub fn is_success(&self) -> bool {
        matches!(self, BackupOutcome::Succeeded(_))
    }

    pub fn message(&self) -> &str {
        match self {
            BackupOutcome::Succeeded(m) | BackupOutcome::Failed(m) => m,
        }
    }

    fn status(&self) -> BackupStatus {
        match self {
            BackupOutcome::Succeeded(_) => BackupStatus::Completed,
            BackupOutcome::Failed(_) => BackupStatus::Failed,
        }
    }
}

/// A single backup attempt.
///
/// `completed_at` is set if and only if `status` is terminal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupRecord {
    id: BackupId,
    status: BackupStatus,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    message: String,
    requested_by: String,
}

impl BackupRecord {
    /// Create a freshly admitted, in-progress record.
    pub fn new(id: BackupId, started_at: DateTime<Utc>, requested_by: impl Into<String>) -> Self {
        Self {
            id,
            status: BackupStatus::InProgress,
            started_at,
            completed_at: None,
            message: String::new(),
            requested_by: requested_by.into(),
        }
    }

    pub fn id(&self) -> BackupId {
        self.id
    }

    pub fn status(&self) -> BackupStatus {
        self.status
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn requested_by(&self) -> &str {
        &self.requested_by
    }

    pub fn is_in_progress(&self) -> bool {
        self.status == BackupStatus::InProgress
    }

    /// Move the record out of `InProgress`.
    ///
    /// Fails (leaving the record untouched) if it has already completed.
    pub fn complete(&mut self, outcome: BackupOutcome, at: DateTime<Utc>) -> DomainResult<()> {
        if self.status.is_terminal() {
            return Err(DomainError::already_completed(self.id));
        }

        self.status = outcome.status();
        self.completed_at = Some(at.max(self.started_at));
        self.message = match outcome {
            BackupOutcome::Succeeded(m) | BackupOutcome::Failed(m) => m,
        };
        Ok(())
    }
}
