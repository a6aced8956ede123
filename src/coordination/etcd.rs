use std::time::Duration;

use async_trait::async_trait;
use etcd_client::{Client, ConnectOptions, DeleteOptions, GetOptions, PutOptions};

use super::{lease_ttl_secs, CoordinationStore, LeaseId};
use crate::config::CoordinationConfig;
use crate::error::{CronError, Result};
use crate::tls::TlsIdentity;

impl From<etcd_client::Error> for CronError {
    fn from(e: etcd_client::Error) -> Self {
        CronError::coordination(e.to_string())
    }
}

/// etcd-backed coordination store.
///
/// Built once at startup and shared; `Client` is a cheap handle over a
/// multiplexed channel, so each call works on its own clone.
#[derive(Clone)]
pub struct EtcdStore {
    client: Client,
}

impl EtcdStore {
    /// Connect to the configured endpoints.
    ///
    /// With a complete TLS config the connection uses mTLS and checks the
    /// server name. An incomplete or unreadable TLS config is an error
    /// unless `allow_insecure` is set, in which case the client falls back
    /// to plaintext with a warning.
    pub async fn connect(config: &CoordinationConfig) -> Result<Self> {
        if config.endpoints.is_empty() {
            return Err(CronError::Config(
                "no coordination store endpoints configured".to_string(),
            ));
        }

        let mut options = ConnectOptions::new()
            .with_connect_timeout(config.dial_timeout())
            .with_timeout(config.request_timeout());

        if let (Some(user), Some(password)) = (&config.username, &config.password) {
            options = options.with_user(user.clone(), password.clone());
        }

        let tls = &config.tls;
        if tls.is_complete() {
            match TlsIdentity::load(tls).await {
                Ok(identity) => {
                    tracing::info!(
                        server_name = identity.server_name(),
                        "Coordination store TLS enabled with mTLS authentication"
                    );
                    options = options.with_tls(identity.client_tls_options());
                }
                Err(e) if tls.allow_insecure => {
                    tracing::warn!(
                        error = %e,
                        "TLS certificate loading failed, connecting in insecure mode"
                    );
                }
                Err(e) => return Err(e.into()),
            }
        } else if tls.enabled {
            if tls.allow_insecure {
                tracing::warn!(
                    "TLS enabled but configuration incomplete, connecting in insecure mode"
                );
            } else {
                return Err(CronError::Config(
                    "TLS enabled but missing CA, certificate, key or server name".to_string(),
                ));
            }
        }

        let client = Client::connect(&config.endpoints, Some(options)).await?;
        tracing::info!(endpoints = ?config.endpoints, "Connected to coordination store");
        Ok(Self { client })
    }
}

#[async_trait]
impl CoordinationStore for EtcdStore {
    async fn put(&self, key: &str, value: Vec<u8>) -> Result<Option<Vec<u8>>> {
        let mut client = self.client.clone();
        let resp = client
            .put(key, value, Some(PutOptions::new().with_prev_key()))
            .await?;
        Ok(resp.prev_key().map(|kv| kv.value().to_vec()))
    }

    async fn put_with_lease(&self, key: &str, value: Vec<u8>, lease: LeaseId) -> Result<()> {
        let mut client = self.client.clone();
        client
            .put(key, value, Some(PutOptions::new().with_lease(lease.0)))
            .await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut client = self.client.clone();
        let resp = client
            .delete(key, Some(DeleteOptions::new().with_prev_key()))
            .await?;
        Ok(resp.prev_kvs().first().map(|kv| kv.value().to_vec()))
    }

    async fn grant_lease(&self, ttl: Duration) -> Result<LeaseId> {
        let mut client = self.client.clone();
        let resp = client.lease_grant(lease_ttl_secs(ttl), None).await?;
        Ok(LeaseId(resp.id()))
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut client = self.client.clone();
        let resp = client.get(key, None).await?;
        Ok(resp.kvs().first().map(|kv| kv.value().to_vec()))
    }

    async fn list(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>> {
        let mut client = self.client.clone();
        let resp = client
            .get(prefix, Some(GetOptions::new().with_prefix()))
            .await?;
        let mut entries: Vec<(String, Vec<u8>)> = resp
            .kvs()
            .iter()
            .filter_map(|kv| {
                let key = kv.key_str().ok()?.to_string();
                Some((key, kv.value().to_vec()))
            })
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(entries)
    }
}
