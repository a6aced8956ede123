//! Job coordinator: keeps the coordination store and the record store in
//! step for job create, update and delete, and issues kill signals.
//!
//! # Write ordering
//!
//! Every mutation touches the coordination store first and the record store
//! second, strictly in sequence. There is no transaction spanning both, so
//! a failed second step leaves them diverged. The compensation policy is
//! deliberately asymmetric:
//!
//! | operation | record-store failure                          |
//! |-----------|-----------------------------------------------|
//! | create    | published definition is deleted (best effort) |
//! | update    | new definition stays published                |
//! | delete    | definition stays deleted                      |
//!
//! Update and delete therefore leave worker-visible state ahead of the
//! administrative record until the operator retries. No reconciliation
//! pass runs here.
//!
//! Each job mutation appends exactly one audit entry regardless of outcome.
//! Rollback and audit failures are logged and never replace the primary
//! result.

use std::sync::Arc;
use std::time::Duration;

use crate::audit::{AuditOperation, AuditSink, ALL_HOSTS};
use crate::coordination::{job_key, kill_key, CoordinationStore, JOB_PREFIX};
use crate::error::{CronError, Result};
use crate::id::IdSource;
use crate::job::{local_now, JobDraft, JobRecord, JobSpec};
use crate::record::{RecordStore, DELETE_JOB_SQL, INSERT_JOB_SQL, UPDATE_JOB_SQL};

pub const DEFAULT_KILL_TTL: Duration = Duration::from_secs(1);

/// Result of a successful job mutation.
#[derive(Debug)]
pub struct MutationOutcome {
    /// `joblist` rows affected (0 or 1).
    pub rows_affected: u64,
    /// Definition the coordination store held before this mutation, if it
    /// held one and it decoded.
    pub previous: Option<JobSpec>,
    /// Set when the audit entry could not be written.
    pub audit_error: Option<CronError>,
}

type StepResult = Result<(u64, Option<JobSpec>)>;

pub struct JobCoordinator {
    coordination: Arc<dyn CoordinationStore>,
    records: Arc<dyn RecordStore>,
    ids: Arc<dyn IdSource>,
    audit: AuditSink,
    kill_ttl: Duration,
}

impl JobCoordinator {
    pub fn new(
        coordination: Arc<dyn CoordinationStore>,
        records: Arc<dyn RecordStore>,
        ids: Arc<dyn IdSource>,
    ) -> Self {
        Self {
            audit: AuditSink::new(records.clone(), ids.clone()),
            coordination,
            records,
            ids,
            kill_ttl: DEFAULT_KILL_TTL,
        }
    }

    pub fn with_kill_ttl(mut self, ttl: Duration) -> Self {
        self.kill_ttl = ttl;
        self
    }

    /// Existence pre-check that must precede [`create`](Self::create).
    ///
    /// # Errors
    ///
    /// `DuplicateJob` when a `joblist` row with this name exists.
    pub async fn ensure_absent(&self, name: &str) -> Result<()> {
        if self.records.count_jobs_named(name).await? > 0 {
            return Err(CronError::DuplicateJob(name.to_string()));
        }
        Ok(())
    }

    /// Publish a new job and insert its `joblist` row.
    ///
    /// Not idempotent on its own: without [`ensure_absent`](Self::ensure_absent)
    /// a second create overwrites the published definition and inserts a
    /// second row.
    ///
    /// # Errors
    ///
    /// A coordination-store failure is returned before the record store is
    /// touched. A record-store failure is returned after the published
    /// definition has been deleted again.
    pub async fn create(&self, draft: &JobDraft) -> Result<MutationOutcome> {
        let result = self.create_steps(draft).await;
        self.finish(AuditOperation::JobAdded, INSERT_JOB_SQL, result).await
    }

    /// Withdraw a job from workers and delete its `joblist` row.
    ///
    /// Deleting a job that was never published succeeds with
    /// `previous == None`.
    pub async fn delete(&self, id: i64, name: &str) -> Result<MutationOutcome> {
        let result = self.delete_steps(id, name).await;
        self.finish(AuditOperation::JobRemoved, DELETE_JOB_SQL, result).await
    }

    /// Republish a job under `draft.name` and rewrite row `id`.
    pub async fn update(&self, id: i64, draft: &JobDraft) -> Result<MutationOutcome> {
        let result = self.update_steps(id, draft).await;
        self.finish(AuditOperation::JobEdited, UPDATE_JOB_SQL, result).await
    }

    /// Broadcast a kill signal for `name`.
    ///
    /// Writes an empty value at `/cron/kill/<name>` bound to a fresh lease.
    /// The key is never deleted here; it disappears when the lease expires.
    /// Workers react to its presence and must de-duplicate repeated
    /// observations while it lives.
    pub async fn issue_kill(&self, name: &str) -> Result<()> {
        let key = kill_key(name);
        let lease = self
            .coordination
            .grant_lease(self.kill_ttl)
            .await
            .inspect_err(|e| {
                tracing::error!(job = %name, error = %e, "Kill lease grant failed")
            })?;
        self.coordination
            .put_with_lease(&key, Vec::new(), lease)
            .await
            .inspect_err(|e| {
                tracing::error!(job = %name, key = %key, error = %e, "Kill signal put failed")
            })?;
        tracing::info!(
            job = %name,
            key = %key,
            lease = lease.0,
            ttl = ?self.kill_ttl,
            "Kill signal issued"
        );
        Ok(())
    }

    /// Definition currently visible to workers.
    pub async fn live_job(&self, name: &str) -> Result<Option<JobSpec>> {
        let value = self.coordination.get(&job_key(name)).await?;
        Ok(value.as_deref().and_then(JobSpec::decode))
    }

    /// Every definition currently visible to workers, sorted by name.
    /// Undecodable entries are skipped.
    pub async fn live_jobs(&self) -> Result<Vec<JobSpec>> {
        let entries = self.coordination.list(JOB_PREFIX).await?;
        Ok(entries
            .iter()
            .filter_map(|(_, value)| JobSpec::decode(value))
            .collect())
    }

    async fn create_steps(&self, draft: &JobDraft) -> StepResult {
        let key = job_key(&draft.name);
        let previous = self.publish(&key, &draft.spec()).await?;

        let record = JobRecord::from_draft(self.ids.next_id(), draft, local_now());
        match self.records.insert_job(&record).await {
            Ok(rows) => {
                tracing::info!(job = %draft.name, id = record.id, rows, "Job created");
                Ok((rows, previous))
            }
            Err(e) => {
                tracing::warn!(
                    job = %draft.name,
                    error = %e,
                    "Record store insert failed, withdrawing published definition"
                );
                if let Err(rollback) = self.coordination.delete(&key).await {
                    tracing::error!(
                        job = %draft.name,
                        key = %key,
                        error = %rollback,
                        "Rollback of published definition failed"
                    );
                }
                Err(e)
            }
        }
    }

    async fn delete_steps(&self, id: i64, name: &str) -> StepResult {
        let key = job_key(name);
        let previous = self
            .coordination
            .delete(&key)
            .await
            .inspect_err(|e| {
                tracing::error!(job = %name, key = %key, error = %e, "Withdraw failed")
            })?
            .as_deref()
            .and_then(JobSpec::decode);

        let rows = self.records.delete_job(id).await.inspect_err(|e| {
            tracing::warn!(
                job = %name,
                id,
                error = %e,
                "Record store delete failed, definition stays withdrawn"
            )
        })?;
        tracing::info!(job = %name, id, rows, "Job deleted");
        Ok((rows, previous))
    }

    async fn update_steps(&self, id: i64, draft: &JobDraft) -> StepResult {
        let key = job_key(&draft.name);
        let previous = self.publish(&key, &draft.spec()).await?;

        let rows = self.records.update_job(id, draft).await.inspect_err(|e| {
            tracing::warn!(
                job = %draft.name,
                id,
                error = %e,
                "Record store update failed, new definition stays published"
            )
        })?;
        tracing::info!(job = %draft.name, id, rows, "Job updated");
        Ok((rows, previous))
    }

    async fn publish(&self, key: &str, spec: &JobSpec) -> Result<Option<JobSpec>> {
        let value = spec.encode()?;
        let previous = self
            .coordination
            .put(key, value)
            .await
            .inspect_err(|e| tracing::error!(key = %key, error = %e, "Publish failed"))?;
        Ok(previous.as_deref().and_then(JobSpec::decode))
    }

    async fn finish(
        &self,
        operation: AuditOperation,
        detail: &str,
        result: StepResult,
    ) -> Result<MutationOutcome> {
        let audit_error = self
            .audit
            .record(ALL_HOSTS, operation, detail, &result)
            .await
            .err();
        if let Some(e) = &audit_error {
            tracing::error!(operation = %operation, error = %e, "Failed to append audit entry");
        }

        let (rows_affected, previous) = result?;
        Ok(MutationOutcome {
            rows_affected,
            previous,
            audit_error,
        })
    }
}
