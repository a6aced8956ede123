use chrono::{DateTime, Local, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::error::{CronError, Result};

/// Job definition as published to workers under `/cron/jobs/<name>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct JobSpec {
    pub name: String,
    pub command: String,
    pub cron_expr: String,
}

impl JobSpec {
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Best-effort decode of a stored definition. Malformed payloads yield
    /// `None` rather than an error.
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        match serde_json::from_slice(bytes) {
            Ok(spec) => Some(spec),
            Err(e) => {
                tracing::debug!(error = %e, "Ignoring undecodable job definition");
                None
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    Disabled,
    Enabled,
}

impl JobState {
    pub fn code(self) -> i32 {
        match self {
            JobState::Disabled => 0,
            JobState::Enabled => 1,
        }
    }

    pub fn from_code(code: i32) -> Self {
        if code == 1 {
            JobState::Enabled
        } else {
            JobState::Disabled
        }
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobState::Disabled => write!(f, "disabled"),
            JobState::Enabled => write!(f, "enabled"),
        }
    }
}

/// Caller-supplied job fields for create and update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobDraft {
    pub name: String,
    pub command: String,
    pub cron_expr: String,
    pub state: JobState,
}

impl JobDraft {
    pub fn new(
        name: impl Into<String>,
        command: impl Into<String>,
        cron_expr: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            cron_expr: cron_expr.into(),
            state: JobState::Enabled,
        }
    }

    pub fn with_state(mut self, state: JobState) -> Self {
        self.state = state;
        self
    }

    pub fn spec(&self) -> JobSpec {
        JobSpec {
            name: self.name.clone(),
            command: self.command.clone(),
            cron_expr: self.cron_expr.clone(),
        }
    }
}

/// A `joblist` row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobRecord {
    pub id: i64,
    pub name: String,
    pub command: String,
    pub start_time: NaiveDateTime,
    pub state: JobState,
    pub cron_expr: String,
}

impl JobRecord {
    pub fn from_draft(id: i64, draft: &JobDraft, start_time: NaiveDateTime) -> Self {
        Self {
            id,
            name: draft.name.clone(),
            command: draft.command.clone(),
            start_time,
            state: draft.state,
            cron_expr: draft.cron_expr.clone(),
        }
    }
}

/// Completion report sent by a worker, timestamps in epoch milliseconds.
#[derive(Debug, Clone)]
pub struct ExecutionReport {
    pub job_name: String,
    pub start_ms: i64,
    pub stop_ms: i64,
    pub info: String,
    pub err: String,
}

impl ExecutionReport {
    pub fn into_record(self) -> Result<ExecutionRecord> {
        if self.stop_ms < self.start_ms {
            return Err(CronError::InvalidInput(format!(
                "execution of {} stops ({}) before it starts ({})",
                self.job_name, self.stop_ms, self.start_ms
            )));
        }
        let start_time = local_from_millis(self.start_ms)?;
        let stop_time = local_from_millis(self.stop_ms)?;
        Ok(ExecutionRecord {
            running_secs: (self.stop_ms - self.start_ms) / 1000,
            job_name: self.job_name,
            start_time,
            stop_time,
            info: self.info,
            err: self.err,
        })
    }
}

/// A `jobdata` row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionRecord {
    pub job_name: String,
    pub start_time: NaiveDateTime,
    pub stop_time: NaiveDateTime,
    pub info: String,
    pub running_secs: i64,
    pub err: String,
}

/// A `systemlog` row. Append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SystemLogEntry {
    pub id: i64,
    pub host_scope: String,
    pub op_type: String,
    pub info: String,
    pub note: String,
    pub start_time: NaiveDateTime,
}

pub fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}

/// Local midnight of the current day.
pub fn local_midnight() -> NaiveDateTime {
    Local::now().date_naive().and_time(NaiveTime::MIN)
}

fn local_from_millis(ms: i64) -> Result<NaiveDateTime> {
    DateTime::from_timestamp_millis(ms)
        .map(|dt| dt.with_timezone(&Local).naive_local())
        .ok_or_else(|| CronError::InvalidInput(format!("timestamp out of range: {ms}")))
}
