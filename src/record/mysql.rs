use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions};
use sqlx::{FromRow, MySql, QueryBuilder};

use super::{
    JobCountFilter, RecordStore, COUNT_JOBS_NAMED_SQL, DELETE_JOB_SQL, INSERT_EXECUTION_SQL,
    INSERT_JOB_SQL, INSERT_SYSTEM_LOG_SQL, LIST_JOBS_SQL, RECENT_EXECUTIONS_SQL,
    RECENT_SYSTEM_LOGS_SQL, UPDATE_JOB_SQL,
};
use crate::config::RecordStoreConfig;
use crate::error::{CronError, Result};
use crate::job::{ExecutionRecord, JobDraft, JobRecord, JobState, SystemLogEntry};

impl From<sqlx::Error> for CronError {
    fn from(e: sqlx::Error) -> Self {
        CronError::record(e.to_string())
    }
}

#[derive(FromRow)]
struct JobRow {
    jobid: i64,
    jobname: String,
    jobshell: String,
    jobstarttime: NaiveDateTime,
    jobstatus: i32,
    jobcronexpr: String,
}

impl From<JobRow> for JobRecord {
    fn from(row: JobRow) -> Self {
        Self {
            id: row.jobid,
            name: row.jobname,
            command: row.jobshell,
            start_time: row.jobstarttime,
            state: JobState::from_code(row.jobstatus),
            cron_expr: row.jobcronexpr,
        }
    }
}

#[derive(FromRow)]
struct ExecutionRow {
    jobname: String,
    jobstarttime: NaiveDateTime,
    jobstoptime: NaiveDateTime,
    jobinfo: String,
    jobrunning: i64,
    joberr: String,
}

impl From<ExecutionRow> for ExecutionRecord {
    fn from(row: ExecutionRow) -> Self {
        Self {
            job_name: row.jobname,
            start_time: row.jobstarttime,
            stop_time: row.jobstoptime,
            info: row.jobinfo,
            running_secs: row.jobrunning,
            err: row.joberr,
        }
    }
}

#[derive(FromRow)]
struct SystemLogRow {
    systemlogid: i64,
    systemloghostname: String,
    systemlogtype: String,
    systemloginfo: String,
    systemlognote: String,
    systemlogstarttime: NaiveDateTime,
}

impl From<SystemLogRow> for SystemLogEntry {
    fn from(row: SystemLogRow) -> Self {
        Self {
            id: row.systemlogid,
            host_scope: row.systemloghostname,
            op_type: row.systemlogtype,
            info: row.systemloginfo,
            note: row.systemlognote,
            start_time: row.systemlogstarttime,
        }
    }
}

/// MySQL-backed record store over a shared connection pool.
#[derive(Clone)]
pub struct MySqlRecordStore {
    pool: MySqlPool,
}

impl MySqlRecordStore {
    pub async fn connect(config: &RecordStoreConfig) -> Result<Self> {
        let options = MySqlConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.user)
            .password(&config.password)
            .database(&config.db_name);

        let pool = MySqlPoolOptions::new()
            .max_connections(config.max_conns)
            .min_connections(config.max_idle_conns.min(config.max_conns))
            .acquire_timeout(Duration::from_millis(config.acquire_timeout_ms))
            .connect_with(options)
            .await?;

        tracing::info!(
            host = %config.host,
            port = config.port,
            db = %config.db_name,
            "Connected to record store"
        );
        Ok(Self { pool })
    }
}

#[async_trait]
impl RecordStore for MySqlRecordStore {
    async fn insert_job(&self, record: &JobRecord) -> Result<u64> {
        let result = sqlx::query(INSERT_JOB_SQL)
            .bind(record.id)
            .bind(&record.name)
            .bind(&record.command)
            .bind(record.start_time)
            .bind(record.state.code())
            .bind(&record.cron_expr)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn update_job(&self, id: i64, draft: &JobDraft) -> Result<u64> {
        let result = sqlx::query(UPDATE_JOB_SQL)
            .bind(draft.state.code())
            .bind(&draft.command)
            .bind(&draft.name)
            .bind(&draft.cron_expr)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_job(&self, id: i64) -> Result<u64> {
        let result = sqlx::query(DELETE_JOB_SQL)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn count_jobs_named(&self, name: &str) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(COUNT_JOBS_NAMED_SQL)
            .bind(name)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn list_jobs(&self) -> Result<Vec<JobRecord>> {
        let rows: Vec<JobRow> = sqlx::query_as(LIST_JOBS_SQL)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(JobRecord::from).collect())
    }

    async fn count_jobs(&self, filter: JobCountFilter) -> Result<i64> {
        let mut query = QueryBuilder::<MySql>::new("select count(jobid) from joblist where 1=1");
        if let Some(state) = filter.state {
            query.push(" and jobstatus = ").push_bind(state.code());
        }
        if let Some(after) = filter.started_after {
            query.push(" and jobstarttime > ").push_bind(after);
        }
        let count: i64 = query.build_query_scalar().fetch_one(&self.pool).await?;
        Ok(count)
    }

    async fn insert_execution(&self, record: &ExecutionRecord) -> Result<u64> {
        let result = sqlx::query(INSERT_EXECUTION_SQL)
            .bind(&record.job_name)
            .bind(record.start_time)
            .bind(record.stop_time)
            .bind(&record.info)
            .bind(record.running_secs)
            .bind(&record.err)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn recent_executions(&self, job_name: &str, limit: u32) -> Result<Vec<ExecutionRecord>> {
        let rows: Vec<ExecutionRow> = sqlx::query_as(RECENT_EXECUTIONS_SQL)
            .bind(job_name)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(ExecutionRecord::from).collect())
    }

    async fn insert_system_log(&self, entry: &SystemLogEntry) -> Result<u64> {
        let result = sqlx::query(INSERT_SYSTEM_LOG_SQL)
            .bind(entry.id)
            .bind(&entry.host_scope)
            .bind(&entry.op_type)
            .bind(&entry.info)
            .bind(&entry.note)
            .bind(entry.start_time)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn recent_system_logs(&self, limit: u32) -> Result<Vec<SystemLogEntry>> {
        let rows: Vec<SystemLogRow> = sqlx::query_as(RECENT_SYSTEM_LOGS_SQL)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(SystemLogEntry::from).collect())
    }
}
