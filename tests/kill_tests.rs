//! Tests for lease-bound kill signals.


use std::time::Duration;

use cron_coordinator::coordination::{kill_key, CoordinationStore};
use cron_coordinator::error::StoreKind;
use test_harness::{backup_job, TestPlane};

#[tokio::test(start_paused = true)]
async fn test_kill_signal_is_visible_then_expires() {
    let plane = TestPlane::new();

    plane.coordinator.issue_kill("backup").await.unwrap();

    let value = plane.coordination.get(&kill_key("backup")).await.unwrap();
    assert_eq!(value, Some(Vec::new()));

    tokio::time::advance(Duration::from_millis(999)).await;
    assert!(plane
        .coordination
        .get(&kill_key("backup"))
        .await
        .unwrap()
        .is_some());

    tokio::time::advance(Duration::from_millis(2)).await;
    assert!(plane
        .coordination
        .get(&kill_key("backup"))
        .await
        .unwrap()
        .is_none());
}

#[tokio::test(start_paused = true)]
async fn test_kill_lease_ttl_is_configurable() {
    let plane = TestPlane::with_kill_ttl(Duration::from_secs(5));

    plane.coordinator.issue_kill("backup").await.unwrap();

    tokio::time::advance(Duration::from_secs(4)).await;
    assert!(plane
        .coordination
        .get(&kill_key("backup"))
        .await
        .unwrap()
        .is_some());

    tokio::time::advance(Duration::from_secs(2)).await;
    assert!(plane
        .coordination
        .get(&kill_key("backup"))
        .await
        .unwrap()
        .is_none());
}

#[tokio::test(start_paused = true)]
async fn test_kill_does_not_touch_job_definition_or_records() {
    let plane = TestPlane::new();
    plane.coordinator.create(&backup_job()).await.unwrap();
    let audit_before = plane.records.system_log().await.len();

    plane.coordinator.issue_kill("backup").await.unwrap();
    tokio::time::advance(Duration::from_secs(2)).await;

    assert_eq!(
        plane.coordinator.live_job("backup").await.unwrap(),
        Some(backup_job().spec())
    );
    assert_eq!(plane.records.system_log().await.len(), audit_before);
}

#[tokio::test(start_paused = true)]
async fn test_repeated_kill_renews_signal() {
    let plane = TestPlane::new();

    plane.coordinator.issue_kill("backup").await.unwrap();
    tokio::time::advance(Duration::from_millis(800)).await;
    plane.coordinator.issue_kill("backup").await.unwrap();
    tokio::time::advance(Duration::from_millis(800)).await;

    // First lease is gone but the key is bound to the second one
    assert!(plane
        .coordination
        .get(&kill_key("backup"))
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn test_kill_fails_when_lease_cannot_be_granted() {
    let plane = TestPlane::new();
    plane.coordination.set_fail_leases(true);

    let err = plane.coordinator.issue_kill("backup").await.unwrap_err();

    assert_eq!(err.store(), Some(StoreKind::Coordination));
    assert!(plane
        .coordination
        .get(&kill_key("backup"))
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_kill_fails_when_put_fails() {
    let plane = TestPlane::new();
    plane.coordination.set_fail_puts(true);

    let err = plane.coordinator.issue_kill("backup").await.unwrap_err();

    assert_eq!(err.store(), Some(StoreKind::Coordination));
}
