use std::sync::Arc;

use crate::catalog::JobCatalog;
use crate::config::ControlPlaneConfig;
use crate::coordination::{CoordinationStore, EtcdStore};
use crate::coordinator::JobCoordinator;
use crate::error::Result;
use crate::id::{IdSource, Snowflake};
use crate::record::{MySqlRecordStore, RecordStore};

/// Constructed control plane: one coordinator and one catalog sharing the
/// same long-lived store clients.
///
/// Clients are built once here and live until the process exits; there is
/// no teardown path.
pub struct ControlPlane {
    pub coordinator: JobCoordinator,
    pub catalog: JobCatalog,
}

impl ControlPlane {
    /// Connect both stores and wire the coordinator.
    ///
    /// # Errors
    ///
    /// Returns an error if either store cannot be reached or the TLS
    /// material for the coordination store cannot be loaded.
    pub async fn connect(config: &ControlPlaneConfig) -> Result<Self> {
        let coordination: Arc<dyn CoordinationStore> =
            Arc::new(EtcdStore::connect(&config.coordination).await?);
        let records: Arc<dyn RecordStore> =
            Arc::new(MySqlRecordStore::connect(&config.record).await?);
        let ids: Arc<dyn IdSource> = Arc::new(Snowflake::new(config.machine_id));

        tracing::info!(machine_id = config.machine_id, "Control plane ready");
        Ok(Self::from_parts(
            coordination,
            records,
            ids,
            config.coordination.kill_lease_ttl(),
        ))
    }

    /// Wire a control plane over already-constructed stores.
    pub fn from_parts(
        coordination: Arc<dyn CoordinationStore>,
        records: Arc<dyn RecordStore>,
        ids: Arc<dyn IdSource>,
        kill_ttl: std::time::Duration,
    ) -> Self {
        Self {
            coordinator: JobCoordinator::new(coordination, records.clone(), ids)
                .with_kill_ttl(kill_ttl),
            catalog: JobCatalog::new(records),
        }
    }
}
