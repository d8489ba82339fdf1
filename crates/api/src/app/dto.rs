use chrono::{DateTime, Utc};
use serde::Serialize;

use strongbox_core::{BackupId, BackupRecord, BackupStatus};

use crate::gateway::{Accepted, backup_location};

#[derive(Debug, Serialize)]
pub struct Link {
    pub href: String,
}

#[derive(Debug, Serialize)]
pub struct BackupLinks {
    #[serde(rename = "self")]
    pub self_link: Link,
}

#[derive(Debug, Serialize)]
pub struct BackupResponse {
    pub id: BackupId,
    pub status: BackupStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub message: String,
    pub requested_by: String,
    #[serde(rename = "_links")]
    pub links: BackupLinks,
}

impl From<&BackupRecord> for BackupResponse {
    fn from(record: &BackupRecord) -> Self {
        Self {
            id: record.id(),
            status: record.status(),
            started_at: record.started_at(),
            completed_at: record.completed_at(),
            message: record.message().to_string(),
            requested_by: record.requested_by().to_string(),
            links: BackupLinks {
                self_link: Link {
                    href: backup_location(record.id()),
                },
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AcceptedResponse {
    pub id: BackupId,
    pub location: String,
}

impl From<&Accepted> for AcceptedResponse {
    fn from(accepted: &Accepted) -> Self {
        Self {
            id: accepted.id,
            location: accepted.location.clone(),
        }
    }
}
