//! Coordination store: the watchable, lease-capable key-value store that
//! broadcasts live job definitions and kill signals to workers.
//!
//! # Key layout
//!
//! - `/cron/jobs/<name>` JSON [`JobSpec`](crate::job::JobSpec)
//! - `/cron/kill/<name>` empty value bound to a short lease
//!
//! Workers watch both prefixes; they are never addressed individually.

pub mod etcd;
pub mod memory;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;

pub use etcd::EtcdStore;
pub use memory::MemoryCoordinationStore;

pub const JOB_PREFIX: &str = "/cron/jobs/";
pub const KILL_PREFIX: &str = "/cron/kill/";

pub fn job_key(name: &str) -> String {
    format!("{JOB_PREFIX}{name}")
}

pub fn kill_key(name: &str) -> String {
    format!("{KILL_PREFIX}{name}")
}

/// Server-granted lease identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LeaseId(pub i64);

/// Lease TTLs are whole seconds; anything shorter rounds up to one.
pub fn lease_ttl_secs(ttl: Duration) -> i64 {
    let secs = ttl.as_secs() + u64::from(ttl.subsec_nanos() > 0);
    i64::try_from(secs.max(1)).unwrap_or(i64::MAX)
}

/// Operations the coordinator needs from the coordination store.
///
/// Every call is a single round-trip with no implicit retry; transport and
/// auth failures come back as `StoreUnavailable`. Previous values are the
/// raw bytes the key held immediately before the mutation.
#[async_trait]
pub trait CoordinationStore: Send + Sync {
    async fn put(&self, key: &str, value: Vec<u8>) -> Result<Option<Vec<u8>>>;

    async fn put_with_lease(&self, key: &str, value: Vec<u8>, lease: LeaseId) -> Result<()>;

    /// Deleting an absent key is a no-op returning `None`.
    async fn delete(&self, key: &str) -> Result<Option<Vec<u8>>>;

    async fn grant_lease(&self, ttl: Duration) -> Result<LeaseId>;

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// All keys under `prefix`, sorted by key.
    async fn list(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_use_distinct_prefixes() {
        assert_eq!(job_key("backup"), "/cron/jobs/backup");
        assert_eq!(kill_key("backup"), "/cron/kill/backup");
    }

    #[test]
    fn lease_ttl_rounds_up_to_whole_seconds() {
        assert_eq!(lease_ttl_secs(Duration::from_millis(1)), 1);
        assert_eq!(lease_ttl_secs(Duration::ZERO), 1);
        assert_eq!(lease_ttl_secs(Duration::from_secs(1)), 1);
        assert_eq!(lease_ttl_secs(Duration::from_millis(1500)), 2);
    }
}
