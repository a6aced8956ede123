use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::time::Instant;

use super::{lease_ttl_secs, CoordinationStore, LeaseId};
use crate::error::{CronError, Result};

#[derive(Debug, Clone)]
struct Entry {
    value: Vec<u8>,
    lease: Option<LeaseId>,
}

#[derive(Debug, Default)]
struct State {
    entries: BTreeMap<String, Entry>,
    leases: HashMap<LeaseId, Instant>,
    next_lease: i64,
}

impl State {
    /// Drop expired leases and every key attached to them.
    fn expire(&mut self, now: Instant) {
        let expired: Vec<LeaseId> = self
            .leases
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(id, _)| *id)
            .collect();
        if expired.is_empty() {
            return;
        }
        for id in &expired {
            self.leases.remove(id);
        }
        self.entries
            .retain(|_, entry| !matches!(entry.lease, Some(id) if expired.contains(&id)));
    }
}

/// In-process coordination store with etcd's put/delete/lease semantics.
///
/// Lease deadlines use `tokio::time`, so a paused test clock controls
/// expiry. Individual operation kinds can be made to fail to simulate an
/// unreachable cluster.
#[derive(Debug, Default)]
pub struct MemoryCoordinationStore {
    state: RwLock<State>,
    fail_puts: AtomicBool,
    fail_deletes: AtomicBool,
    fail_leases: AtomicBool,
    mutations: AtomicUsize,
}

impl MemoryCoordinationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_leases(&self, fail: bool) {
        self.fail_leases.store(fail, Ordering::SeqCst);
    }

    /// Number of successful puts and deletes so far.
    pub fn mutation_count(&self) -> usize {
        self.mutations.load(Ordering::SeqCst)
    }

    fn check(flag: &AtomicBool, op: &str) -> Result<()> {
        if flag.load(Ordering::SeqCst) {
            return Err(CronError::coordination(format!("{op}: connection refused")));
        }
        Ok(())
    }
}

#[async_trait]
impl CoordinationStore for MemoryCoordinationStore {
    async fn put(&self, key: &str, value: Vec<u8>) -> Result<Option<Vec<u8>>> {
        Self::check(&self.fail_puts, "put")?;
        let mut state = self.state.write().await;
        state.expire(Instant::now());
        let prev = state
            .entries
            .insert(key.to_string(), Entry { value, lease: None });
        self.mutations.fetch_add(1, Ordering::SeqCst);
        Ok(prev.map(|e| e.value))
    }

    async fn put_with_lease(&self, key: &str, value: Vec<u8>, lease: LeaseId) -> Result<()> {
        Self::check(&self.fail_puts, "put")?;
        let mut state = self.state.write().await;
        state.expire(Instant::now());
        if !state.leases.contains_key(&lease) {
            return Err(CronError::coordination(format!(
                "requested lease not found: {}",
                lease.0
            )));
        }
        state.entries.insert(
            key.to_string(),
            Entry {
                value,
                lease: Some(lease),
            },
        );
        self.mutations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Self::check(&self.fail_deletes, "delete")?;
        let mut state = self.state.write().await;
        state.expire(Instant::now());
        let prev = state.entries.remove(key);
        self.mutations.fetch_add(1, Ordering::SeqCst);
        Ok(prev.map(|e| e.value))
    }

    async fn grant_lease(&self, ttl: Duration) -> Result<LeaseId> {
        Self::check(&self.fail_leases, "lease grant")?;
        let mut state = self.state.write().await;
        let now = Instant::now();
        state.expire(now);
        state.next_lease += 1;
        let id = LeaseId(state.next_lease);
        let secs = u64::try_from(lease_ttl_secs(ttl)).unwrap_or(u64::MAX);
        state.leases.insert(id, now + Duration::from_secs(secs));
        Ok(id)
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut state = self.state.write().await;
        state.expire(Instant::now());
        Ok(state.entries.get(key).map(|e| e.value.clone()))
    }

    async fn list(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>> {
        let mut state = self.state.write().await;
        state.expire(Instant::now());
        Ok(state
            .entries
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, e)| (k.clone(), e.value.clone()))
            .collect())
    }
}
