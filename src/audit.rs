use std::sync::Arc;

use crate::error::Result;
use crate::id::IdSource;
use crate::job::{local_now, SystemLogEntry};
use crate::record::RecordStore;

/// Host scope recorded for fleet-wide job mutations.
pub const ALL_HOSTS: &str = "all hosts";
pub const SUCCESS_NOTE: &str = "success";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditOperation {
    JobAdded,
    JobRemoved,
    JobEdited,
}

impl std::fmt::Display for AuditOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuditOperation::JobAdded => write!(f, "job added"),
            AuditOperation::JobRemoved => write!(f, "job removed"),
            AuditOperation::JobEdited => write!(f, "job edited"),
        }
    }
}

/// Append-only writer into the `systemlog` table.
#[derive(Clone)]
pub struct AuditSink {
    records: Arc<dyn RecordStore>,
    ids: Arc<dyn IdSource>,
}

impl AuditSink {
    pub fn new(records: Arc<dyn RecordStore>, ids: Arc<dyn IdSource>) -> Self {
        Self { records, ids }
    }

    /// Append one entry whose note is `"success"` or the error text.
    pub async fn record<T>(
        &self,
        scope: &str,
        operation: AuditOperation,
        detail: &str,
        outcome: &Result<T>,
    ) -> Result<()> {
        let note = match outcome {
            Ok(_) => SUCCESS_NOTE.to_string(),
            Err(e) => e.to_string(),
        };
        let entry = SystemLogEntry {
            id: self.ids.next_id(),
            host_scope: scope.to_string(),
            op_type: operation.to_string(),
            info: detail.to_string(),
            note,
            start_time: local_now(),
        };
        self.records.insert_system_log(&entry).await?;
        Ok(())
    }
}
