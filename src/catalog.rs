use std::sync::Arc;

use serde::Serialize;

use crate::error::Result;
use crate::job::{
    local_midnight, ExecutionRecord, ExecutionReport, JobRecord, JobState, SystemLogEntry,
};
use crate::record::{JobCountFilter, RecordStore};

const EXECUTION_HISTORY_LIMIT: u32 = 10;
const SYSTEM_LOG_LIMIT: u32 = 100;

/// Job counters for the operator overview.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct JobStats {
    pub total: i64,
    pub enabled: i64,
    pub created_today: i64,
    pub enabled_created_today: i64,
}

/// Read-side view over the record store, plus ingestion of worker
/// execution reports.
#[derive(Clone)]
pub struct JobCatalog {
    records: Arc<dyn RecordStore>,
}

impl JobCatalog {
    pub fn new(records: Arc<dyn RecordStore>) -> Self {
        Self { records }
    }

    pub async fn list_jobs(&self) -> Result<Vec<JobRecord>> {
        self.records.list_jobs().await
    }

    /// "Today" starts at local midnight.
    pub async fn stats(&self) -> Result<JobStats> {
        let midnight = local_midnight();
        let total = self.records.count_jobs(JobCountFilter::default()).await?;
        let enabled = self
            .records
            .count_jobs(JobCountFilter {
                state: Some(JobState::Enabled),
                started_after: None,
            })
            .await?;
        let created_today = self
            .records
            .count_jobs(JobCountFilter {
                state: None,
                started_after: Some(midnight),
            })
            .await?;
        let enabled_created_today = self
            .records
            .count_jobs(JobCountFilter {
                state: Some(JobState::Enabled),
                started_after: Some(midnight),
            })
            .await?;

        Ok(JobStats {
            total,
            enabled,
            created_today,
            enabled_created_today,
        })
    }

    /// Store a worker's completion report in `jobdata`.
    pub async fn record_execution(&self, report: ExecutionReport) -> Result<u64> {
        let record = report.into_record()?;
        let rows = self.records.insert_execution(&record).await?;
        tracing::debug!(
            job = %record.job_name,
            running_secs = record.running_secs,
            "Execution recorded"
        );
        Ok(rows)
    }

    /// The ten most recent runs of `job_name`, newest first.
    pub async fn execution_history(&self, job_name: &str) -> Result<Vec<ExecutionRecord>> {
        self.records
            .recent_executions(job_name, EXECUTION_HISTORY_LIMIT)
            .await
    }

    /// The hundred most recent audit entries, newest first.
    pub async fn system_logs(&self) -> Result<Vec<SystemLogEntry>> {
        self.records.recent_system_logs(SYSTEM_LOG_LIMIT).await
    }
}
