//! Record store: the relational system-of-record for the job list,
//! execution history and audit log.
//!
//! Statements use positional parameters only. Row IDs are supplied by the
//! caller from an [`IdSource`](crate::id::IdSource), never auto-incremented.

pub mod memory;
pub mod mysql;

use async_trait::async_trait;
use chrono::NaiveDateTime;

use crate::error::Result;
use crate::job::{ExecutionRecord, JobDraft, JobRecord, JobState, SystemLogEntry};

pub use memory::MemoryRecordStore;
pub use mysql::MySqlRecordStore;

pub const INSERT_JOB_SQL: &str = "insert into joblist(jobid,jobname,jobshell,jobstarttime,jobstatus,jobcronexpr) values (?,?,?,?,?,?)";
pub const UPDATE_JOB_SQL: &str =
    "update joblist set jobstatus=?,jobshell=?,jobname=?,jobcronexpr=? where jobid=?";
pub const DELETE_JOB_SQL: &str = "delete from joblist where jobid=?";
pub const COUNT_JOBS_NAMED_SQL: &str = "select count(jobname) from joblist where jobname=?";
pub const LIST_JOBS_SQL: &str =
    "select jobid,jobname,jobshell,jobstarttime,jobstatus,jobcronexpr from joblist";
pub const INSERT_EXECUTION_SQL: &str = "insert into jobdata(jobname,jobstarttime,jobstoptime,jobinfo,jobrunning,joberr) values (?,?,?,?,?,?)";
pub const RECENT_EXECUTIONS_SQL: &str = "select jobname,jobstarttime,jobstoptime,jobinfo,jobrunning,joberr from jobdata where jobname=? order by jobstoptime desc limit ?";
pub const INSERT_SYSTEM_LOG_SQL: &str = "insert into systemlog(systemlogid,systemloghostname,systemlogtype,systemloginfo,systemlognote,systemlogstarttime) values (?,?,?,?,?,?)";
pub const RECENT_SYSTEM_LOGS_SQL: &str = "select systemlogid,systemloghostname,systemlogtype,systemloginfo,systemlognote,systemlogstarttime from systemlog order by systemlogstarttime desc limit ?";

/// Optional constraints for counting `joblist` rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobCountFilter {
    pub state: Option<JobState>,
    /// Only rows whose start time is strictly after this instant.
    pub started_after: Option<NaiveDateTime>,
}

impl JobCountFilter {
    pub fn matches(&self, record: &JobRecord) -> bool {
        self.state.is_none_or(|s| record.state == s)
            && self.started_after.is_none_or(|t| record.start_time > t)
    }
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Returns rows affected.
    async fn insert_job(&self, record: &JobRecord) -> Result<u64>;

    /// Rewrites name, command, cron expression and state of row `id`.
    async fn update_job(&self, id: i64, draft: &JobDraft) -> Result<u64>;

    async fn delete_job(&self, id: i64) -> Result<u64>;

    async fn count_jobs_named(&self, name: &str) -> Result<i64>;

    async fn list_jobs(&self) -> Result<Vec<JobRecord>>;

    async fn count_jobs(&self, filter: JobCountFilter) -> Result<i64>;

    async fn insert_execution(&self, record: &ExecutionRecord) -> Result<u64>;

    /// Most recent first, by stop time.
    async fn recent_executions(&self, job_name: &str, limit: u32) -> Result<Vec<ExecutionRecord>>;

    async fn insert_system_log(&self, entry: &SystemLogEntry) -> Result<u64>;

    /// Most recent first, by start time.
    async fn recent_system_logs(&self, limit: u32) -> Result<Vec<SystemLogEntry>>;
}
