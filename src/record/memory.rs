use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{JobCountFilter, RecordStore};
use crate::error::{CronError, Result};
use crate::job::{ExecutionRecord, JobDraft, JobRecord, SystemLogEntry};

#[derive(Debug, Default)]
struct Tables {
    joblist: Vec<JobRecord>,
    jobdata: Vec<ExecutionRecord>,
    systemlog: Vec<SystemLogEntry>,
}

/// In-process record store mirroring the MySQL schema.
///
/// `joblist` writes and `systemlog` writes can be failed independently.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    tables: RwLock<Tables>,
    fail_job_writes: AtomicBool,
    fail_log_writes: AtomicBool,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_job_writes(&self, fail: bool) {
        self.fail_job_writes.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_log_writes(&self, fail: bool) {
        self.fail_log_writes.store(fail, Ordering::SeqCst);
    }

    /// Every audit entry in insertion order.
    pub async fn system_log(&self) -> Vec<SystemLogEntry> {
        self.tables.read().await.systemlog.clone()
    }

    pub async fn job(&self, id: i64) -> Option<JobRecord> {
        self.tables
            .read()
            .await
            .joblist
            .iter()
            .find(|r| r.id == id)
            .cloned()
    }

    fn check_job_write(&self) -> Result<()> {
        if self.fail_job_writes.load(Ordering::SeqCst) {
            return Err(CronError::record("joblist write rejected: lock wait timeout"));
        }
        Ok(())
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn insert_job(&self, record: &JobRecord) -> Result<u64> {
        self.check_job_write()?;
        self.tables.write().await.joblist.push(record.clone());
        Ok(1)
    }

    async fn update_job(&self, id: i64, draft: &JobDraft) -> Result<u64> {
        self.check_job_write()?;
        let mut tables = self.tables.write().await;
        match tables.joblist.iter_mut().find(|r| r.id == id) {
            Some(row) => {
                row.name = draft.name.clone();
                row.command = draft.command.clone();
                row.cron_expr = draft.cron_expr.clone();
                row.state = draft.state;
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn delete_job(&self, id: i64) -> Result<u64> {
        self.check_job_write()?;
        let mut tables = self.tables.write().await;
        let before = tables.joblist.len();
        tables.joblist.retain(|r| r.id != id);
        Ok((before - tables.joblist.len()) as u64)
    }

    async fn count_jobs_named(&self, name: &str) -> Result<i64> {
        let tables = self.tables.read().await;
        Ok(tables.joblist.iter().filter(|r| r.name == name).count() as i64)
    }

    async fn list_jobs(&self) -> Result<Vec<JobRecord>> {
        Ok(self.tables.read().await.joblist.clone())
    }

    async fn count_jobs(&self, filter: JobCountFilter) -> Result<i64> {
        let tables = self.tables.read().await;
        Ok(tables.joblist.iter().filter(|r| filter.matches(r)).count() as i64)
    }

    async fn insert_execution(&self, record: &ExecutionRecord) -> Result<u64> {
        self.tables.write().await.jobdata.push(record.clone());
        Ok(1)
    }

    async fn recent_executions(&self, job_name: &str, limit: u32) -> Result<Vec<ExecutionRecord>> {
        let tables = self.tables.read().await;
        let mut runs: Vec<ExecutionRecord> = tables
            .jobdata
            .iter()
            .filter(|r| r.job_name == job_name)
            .cloned()
            .collect();
        runs.sort_by(|a, b| b.stop_time.cmp(&a.stop_time));
        runs.truncate(limit as usize);
        Ok(runs)
    }

    async fn insert_system_log(&self, entry: &SystemLogEntry) -> Result<u64> {
        if self.fail_log_writes.load(Ordering::SeqCst) {
            return Err(CronError::record("systemlog write rejected: disk full"));
        }
        self.tables.write().await.systemlog.push(entry.clone());
        Ok(1)
    }

    async fn recent_system_logs(&self, limit: u32) -> Result<Vec<SystemLogEntry>> {
        let tables = self.tables.read().await;
        let mut entries = tables.systemlog.clone();
        // Stable sort keeps later inserts first among equal timestamps.
        entries.reverse();
        entries.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        entries.truncate(limit as usize);
        Ok(entries)
    }
}
