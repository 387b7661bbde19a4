// archivetool/src/restore/finalize.rs
//
// Finalize/compensation phase of the restore saga. Runs in a fresh
// transactional scope after the executor: on a captured failure it reverts
// the unit to ARCHIVED so the operation is immediately retryable; on
// success it leaves RESTORING in place as the durable marker that a remote
// job is in flight. An error raised *here* is the one non-recoverable case
// and propagates loudly.

use crate::errors::{AppError, Result};
use crate::model::{
    BusinessObjectDataSnapshot, RestoreJobDescriptor, RestoreOutcome, StorageUnitStatus,
};
use crate::registry::{CasOutcome, StorageUnitRegistry, COLD_STORAGE_PLATFORM};

pub(super) async fn finalize<R: StorageUnitRegistry>(
    registry: &R,
    descriptor: RestoreJobDescriptor,
) -> Result<RestoreOutcome> {
    if descriptor.failure.is_some() {
        let outcome = registry
            .revert_to_archived(
                descriptor.storage_unit_id,
                StorageUnitStatus::Archived.as_str(),
            )
            .await?;
        if outcome == CasOutcome::Conflict {
            return Err(AppError::Conflict(format!(
                "failed to revert storage unit {} in storage '{}' to ARCHIVED during \
                 compensation; the unit requires manual reconciliation",
                descriptor.storage_unit_id, descriptor.storage_name
            )));
        }
        eprintln!(
            "⚠️ Restore failed; reverted storage unit {} to ARCHIVED",
            descriptor.storage_unit_id
        );
    }

    // Re-resolve so the snapshot reflects the post-compensation state.
    let unit = registry
        .find_storage_units(&descriptor.data_key, COLD_STORAGE_PLATFORM)
        .await?
        .into_iter()
        .find(|unit| unit.id == descriptor.storage_unit_id)
        .ok_or_else(|| {
            AppError::NotFound(format!(
                "storage unit {} disappeared while finalizing the restore of {}",
                descriptor.storage_unit_id, descriptor.data_key
            ))
        })?;
    let files = registry.list_registered_files(unit.id).await?;

    Ok(RestoreOutcome {
        old_status: descriptor.old_status,
        new_status: unit.status,
        snapshot: BusinessObjectDataSnapshot {
            data_key: unit.data_key,
            storage_name: unit.storage_name,
            status: unit.status,
            restore_expiration_on: unit.restore_expiration_on,
            files,
        },
        batch_job_id: descriptor.batch_job_id,
        failure: descriptor.failure,
    })
}
