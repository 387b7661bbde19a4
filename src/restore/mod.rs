// archivetool/src/restore/mod.rs
//
// Cold-storage restore orchestration: prepare (transactional, commits the
// ARCHIVED -> RESTORING lock), execute (no transaction, captures failures),
// finalize (transactional, compensates on failure). The three phases are
// chained through a RestoreJobDescriptor value.

mod execute;
mod finalize;
mod prepare;
pub mod tier;

use crate::config::RestoreSettings;
use crate::errors::Result;
use crate::gateway::RemoteStoreGateway;
use crate::model::{BusinessObjectDataKey, RestoreOutcome};
use crate::registry::StorageUnitRegistry;

/// Entry point for restoring a business object data's cold-tier storage
/// unit. Holds the registry, the remote store gateway and the injected
/// configuration capability; one instance serves any number of concurrent
/// requests (all shared state lives in the registry).
pub struct RestoreOrchestrator<R, G> {
    registry: R,
    gateway: G,
    settings: RestoreSettings,
}

impl<R: StorageUnitRegistry, G: RemoteStoreGateway> RestoreOrchestrator<R, G> {
    pub fn new(registry: R, gateway: G, settings: RestoreSettings) -> Self {
        Self {
            registry,
            gateway,
            settings,
        }
    }

    /// Runs the full three-phase restore flow for one storage unit.
    ///
    /// Returns `Ok` both when the restore was initiated and when the remote
    /// step failed and was compensated; the two are distinguished by
    /// `RestoreOutcome::failure`. An `Err` means either nothing was
    /// persisted (prepare rejected the request) or, for finalize errors
    /// only, that compensation itself failed and the unit needs manual
    /// reconciliation.
    pub async fn initiate_restore(
        &self,
        key: &BusinessObjectDataKey,
        expiration_in_days: Option<i32>,
        retrieval_option: Option<&str>,
        batch_mode: bool,
    ) -> Result<RestoreOutcome> {
        let mut descriptor = prepare::prepare(
            &self.registry,
            &self.settings,
            key,
            expiration_in_days,
            retrieval_option,
            batch_mode,
        )
        .await?;

        execute::execute(&self.gateway, &mut descriptor).await;

        finalize::finalize(&self.registry, descriptor).await
    }
}
