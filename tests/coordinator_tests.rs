//! Tests for the dual-store write protocol.
//!
//! These tests verify:
//! - What create, update and delete leave in each store
//! - Rollback of the published definition when a create cannot be recorded
//! - No rollback for update and delete
//! - One audit entry per mutation, whatever the outcome


use cron_coordinator::coordination::{job_key, CoordinationStore};
use cron_coordinator::error::{CronError, StoreKind};
use cron_coordinator::job::{JobDraft, JobSpec, JobState};
use cron_coordinator::record::RecordStore;
use test_harness::{backup_job, TestPlane};

async fn only_job_id(plane: &TestPlane) -> i64 {
    let jobs = plane.records.list_jobs().await.unwrap();
    assert_eq!(jobs.len(), 1);
    jobs[0].id
}

// ============================================================================
// Create
// ============================================================================

#[tokio::test]
async fn test_create_publishes_definition_and_inserts_row() {
    let plane = TestPlane::new();

    let outcome = plane.coordinator.create(&backup_job()).await.unwrap();

    assert_eq!(outcome.rows_affected, 1);
    assert!(outcome.previous.is_none());
    assert!(outcome.audit_error.is_none());
    assert_eq!(
        plane.published("backup").await.as_deref(),
        Some(r#"{"Name":"backup","Command":"/usr/bin/backup.sh","CronExpr":"0 2 * * *"}"#)
    );

    let jobs = plane.records.list_jobs().await.unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].name, "backup");
    assert_eq!(jobs[0].command, "/usr/bin/backup.sh");
    assert_eq!(jobs[0].cron_expr, "0 2 * * *");
    assert_eq!(jobs[0].state, JobState::Enabled);
}

#[tokio::test]
async fn test_create_keeps_supplied_state() {
    let plane = TestPlane::new();
    let draft = backup_job().with_state(JobState::Disabled);

    plane.coordinator.create(&draft).await.unwrap();

    let jobs = plane.records.list_jobs().await.unwrap();
    assert_eq!(jobs[0].state, JobState::Disabled);
}

#[tokio::test]
async fn test_created_job_reads_back_from_coordination_store() {
    let plane = TestPlane::new();
    let draft = JobDraft::new("report", "echo 'a b' | wc -w", "*/5 * * * *");

    plane.coordinator.create(&draft).await.unwrap();

    let live = plane.coordinator.live_job("report").await.unwrap();
    assert_eq!(live, Some(draft.spec()));
}

/// A second create under the same name is not rejected by the coordinator:
/// the published definition is overwritten and a second row is inserted.
/// Only the pre-check prevents this.
#[tokio::test]
async fn test_repeated_create_overwrites_without_precheck() {
    let plane = TestPlane::new();
    plane.coordinator.create(&backup_job()).await.unwrap();

    let second = JobDraft::new("backup", "/usr/bin/backup-v2.sh", "0 3 * * *");
    let outcome = plane.coordinator.create(&second).await.unwrap();

    assert_eq!(outcome.previous, Some(backup_job().spec()));
    assert_eq!(outcome.rows_affected, 1);
    assert_eq!(
        plane.coordinator.live_job("backup").await.unwrap(),
        Some(second.spec())
    );
    assert_eq!(plane.records.count_jobs_named("backup").await.unwrap(), 2);
}

#[tokio::test]
async fn test_precheck_rejects_existing_name() {
    let plane = TestPlane::new();
    plane.coordinator.ensure_absent("backup").await.unwrap();

    plane.coordinator.create(&backup_job()).await.unwrap();

    let err = plane.coordinator.ensure_absent("backup").await.unwrap_err();
    assert!(matches!(err, CronError::DuplicateJob(ref name) if name == "backup"));
}

#[tokio::test]
async fn test_create_rolls_back_when_record_insert_fails() {
    let plane = TestPlane::new();
    plane.records.set_fail_job_writes(true);

    let err = plane.coordinator.create(&backup_job()).await.unwrap_err();

    assert_eq!(err.store(), Some(StoreKind::Record));
    assert!(plane.published("backup").await.is_none());
    assert!(plane.records.list_jobs().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_failed_rollback_still_surfaces_record_error() {
    let plane = TestPlane::new();
    plane.records.set_fail_job_writes(true);
    plane.coordination.set_fail_deletes(true);

    let err = plane.coordinator.create(&backup_job()).await.unwrap_err();

    assert_eq!(err.store(), Some(StoreKind::Record));
    // Rollback could not run, so the definition is still published
    assert!(plane.published("backup").await.is_some());
}

#[tokio::test]
async fn test_create_stops_when_publish_fails() {
    let plane = TestPlane::new();
    plane.coordination.set_fail_puts(true);

    let err = plane.coordinator.create(&backup_job()).await.unwrap_err();

    assert_eq!(err.store(), Some(StoreKind::Coordination));
    assert!(plane.records.list_jobs().await.unwrap().is_empty());
    assert_eq!(plane.coordination.mutation_count(), 0);
}

#[tokio::test]
async fn test_undecodable_previous_value_is_ignored() {
    let plane = TestPlane::new();
    plane
        .coordination
        .put(&job_key("backup"), b"{not json".to_vec())
        .await
        .unwrap();

    let outcome = plane.coordinator.create(&backup_job()).await.unwrap();

    assert!(outcome.previous.is_none());
    assert_eq!(
        plane.coordinator.live_job("backup").await.unwrap(),
        Some(backup_job().spec())
    );
}

// ============================================================================
// Delete
// ============================================================================

#[tokio::test]
async fn test_delete_withdraws_definition_and_row() {
    let plane = TestPlane::new();
    plane.coordinator.create(&backup_job()).await.unwrap();
    let id = only_job_id(&plane).await;

    let outcome = plane.coordinator.delete(id, "backup").await.unwrap();

    assert_eq!(outcome.rows_affected, 1);
    assert_eq!(outcome.previous, Some(backup_job().spec()));
    assert!(plane.published("backup").await.is_none());
    assert!(plane.records.list_jobs().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_delete_of_unknown_job_is_noop() {
    let plane = TestPlane::new();

    let outcome = plane.coordinator.delete(404, "ghost").await.unwrap();

    assert_eq!(outcome.rows_affected, 0);
    assert!(outcome.previous.is_none());
}

#[tokio::test]
async fn test_delete_is_not_rolled_back_when_record_delete_fails() {
    let plane = TestPlane::new();
    plane.coordinator.create(&backup_job()).await.unwrap();
    let id = only_job_id(&plane).await;
    plane.records.set_fail_job_writes(true);

    let err = plane.coordinator.delete(id, "backup").await.unwrap_err();

    assert_eq!(err.store(), Some(StoreKind::Record));
    // Workers no longer see the job, the record store still lists it
    assert!(plane.published("backup").await.is_none());
    assert!(plane.records.job(id).await.is_some());
}

#[tokio::test]
async fn test_delete_stops_when_withdraw_fails() {
    let plane = TestPlane::new();
    plane.coordinator.create(&backup_job()).await.unwrap();
    let id = only_job_id(&plane).await;
    plane.coordination.set_fail_deletes(true);

    let err = plane.coordinator.delete(id, "backup").await.unwrap_err();

    assert_eq!(err.store(), Some(StoreKind::Coordination));
    assert!(plane.published("backup").await.is_some());
    assert!(plane.records.job(id).await.is_some());
}

// ============================================================================
// Update
// ============================================================================

#[tokio::test]
async fn test_update_republishes_and_rewrites_row() {
    let plane = TestPlane::new();
    plane.coordinator.create(&backup_job()).await.unwrap();
    let id = only_job_id(&plane).await;
    let edited = JobDraft::new("backup", "/usr/bin/backup.sh --full", "30 1 * * *")
        .with_state(JobState::Disabled);

    let outcome = plane.coordinator.update(id, &edited).await.unwrap();

    assert_eq!(outcome.rows_affected, 1);
    assert_eq!(outcome.previous, Some(backup_job().spec()));
    assert_eq!(
        plane.coordinator.live_job("backup").await.unwrap(),
        Some(edited.spec())
    );
    let row = plane.records.job(id).await.unwrap();
    assert_eq!(row.command, "/usr/bin/backup.sh --full");
    assert_eq!(row.cron_expr, "30 1 * * *");
    assert_eq!(row.state, JobState::Disabled);
}

#[tokio::test]
async fn test_update_is_not_rolled_back_when_record_update_fails() {
    let plane = TestPlane::new();
    plane.coordinator.create(&backup_job()).await.unwrap();
    let id = only_job_id(&plane).await;
    plane.records.set_fail_job_writes(true);
    let edited = JobDraft::new("backup", "/usr/bin/backup-v2.sh", "0 2 * * *");

    let err = plane.coordinator.update(id, &edited).await.unwrap_err();

    assert_eq!(err.store(), Some(StoreKind::Record));
    // Coordination store shows the new definition, record store the old one
    assert_eq!(
        plane.coordinator.live_job("backup").await.unwrap(),
        Some(edited.spec())
    );
    assert_eq!(
        plane.records.job(id).await.unwrap().command,
        "/usr/bin/backup.sh"
    );
}

#[tokio::test]
async fn test_update_of_unknown_row_affects_nothing() {
    let plane = TestPlane::new();

    let outcome = plane.coordinator.update(404, &backup_job()).await.unwrap();

    assert_eq!(outcome.rows_affected, 0);
    assert!(plane.published("backup").await.is_some());
}

// ============================================================================
// Audit
// ============================================================================

#[tokio::test]
async fn test_every_mutation_writes_one_audit_entry() {
    let plane = TestPlane::new();

    plane.coordinator.create(&backup_job()).await.unwrap();
    let id = only_job_id(&plane).await;
    plane.coordinator.update(id, &backup_job()).await.unwrap();
    plane.records.set_fail_job_writes(true);
    let failed = plane.coordinator.delete(id, "backup").await.unwrap_err();

    let log = plane.records.system_log().await;
    assert_eq!(log.len(), 3);

    assert_eq!(log[0].op_type, "job added");
    assert_eq!(log[0].note, "success");
    assert_eq!(log[0].host_scope, "all hosts");
    assert!(log[0].info.starts_with("insert into joblist"));

    assert_eq!(log[1].op_type, "job edited");
    assert_eq!(log[1].note, "success");
    assert!(log[1].info.starts_with("update joblist"));

    assert_eq!(log[2].op_type, "job removed");
    assert_eq!(log[2].note, failed.to_string());
    assert!(log[2].info.starts_with("delete from joblist"));
}

#[tokio::test]
async fn test_failed_create_is_audited_with_error_text() {
    let plane = TestPlane::new();
    plane.coordination.set_fail_puts(true);

    let err = plane.coordinator.create(&backup_job()).await.unwrap_err();

    let log = plane.records.system_log().await;
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].op_type, "job added");
    assert_eq!(log[0].note, err.to_string());
}

#[tokio::test]
async fn test_audit_failure_does_not_fail_the_mutation() {
    let plane = TestPlane::new();
    plane.records.set_fail_log_writes(true);

    let outcome = plane.coordinator.create(&backup_job()).await.unwrap();

    assert_eq!(outcome.rows_affected, 1);
    assert!(outcome.audit_error.is_some());
    assert!(plane.published("backup").await.is_some());
}

#[tokio::test]
async fn test_audit_failure_does_not_replace_primary_error() {
    let plane = TestPlane::new();
    plane.records.set_fail_log_writes(true);
    plane.records.set_fail_job_writes(true);

    let err = plane.coordinator.create(&backup_job()).await.unwrap_err();

    assert!(err.to_string().contains("joblist"));
}

// ============================================================================
// Live view
// ============================================================================

#[tokio::test]
async fn test_live_jobs_lists_published_definitions() {
    let plane = TestPlane::new();
    plane.coordinator.create(&backup_job()).await.unwrap();
    plane
        .coordinator
        .create(&JobDraft::new("archive", "tar czf /tmp/a.tgz /srv", "0 4 * * 0"))
        .await
        .unwrap();
    plane.coordinator.issue_kill("backup").await.unwrap();

    let live: Vec<String> = plane
        .coordinator
        .live_jobs()
        .await
        .unwrap()
        .into_iter()
        .map(|spec: JobSpec| spec.name)
        .collect();
    assert_eq!(live, vec!["archive", "backup"]);
}
