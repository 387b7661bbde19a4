// archivetool/src/restore/prepare.rs
//
// Prepare phase of the restore saga. Everything here is either a read or a
// guarded single-statement transition, so any error leaves the catalog
// untouched. The committed ARCHIVED -> RESTORING transition at the end is
// the durable lock against a second concurrent restore of the same unit.

use chrono::{Duration, Utc};

use crate::config::RestoreSettings;
use crate::errors::{AppError, Result};
use crate::model::{
    BusinessObjectDataKey, RestoreJobDescriptor, RestoreMode, StorageUnit, StorageUnitStatus,
};
use crate::registry::{CasOutcome, StorageUnitRegistry, COLD_STORAGE_PLATFORM};
use crate::restore::tier;

pub(super) async fn prepare<R: StorageUnitRegistry>(
    registry: &R,
    settings: &RestoreSettings,
    key: &BusinessObjectDataKey,
    expiration_in_days: Option<i32>,
    retrieval_option: Option<&str>,
    batch_mode: bool,
) -> Result<RestoreJobDescriptor> {
    key.validate()?;
    let unit = resolve_single_cold_tier_unit(registry, key).await?;

    let expiration_days = expiration_in_days
        .filter(|days| *days > 0)
        .unwrap_or(settings.default_expiration_days);
    if expiration_days <= 0 {
        return Err(AppError::InvalidInput(format!(
            "restore expiration must resolve to a positive number of days, got {}",
            expiration_days
        )));
    }
    let expiration = Utc::now() + Duration::days(i64::from(expiration_days));

    let retrieval_tier = match tier::validate_retrieval_option(retrieval_option, batch_mode)? {
        Some(tier) => tier,
        None => tier::validate_retrieval_option(
            settings.default_retrieval_tier.as_deref(),
            batch_mode,
        )?
        .unwrap_or_else(|| tier::default_tier(batch_mode).to_string()),
    };

    match unit.status {
        StorageUnitStatus::Restored => {
            // Refresh: the unit is already readable, only the expiration
            // moves. The executor must not touch the remote store.
            registry.set_expiration(unit.id, Some(expiration)).await?;
            Ok(RestoreJobDescriptor {
                data_key: key.clone(),
                storage_unit_id: unit.id,
                storage_name: unit.storage_name,
                bucket_name: None,
                key_prefix: unit.directory_path,
                registered_files: Vec::new(),
                retrieval_tier,
                mode: RestoreMode::Single,
                already_restored: true,
                old_status: StorageUnitStatus::Restored,
                new_status: StorageUnitStatus::Restored,
                restore_expiration_on: expiration,
                batch_job_id: None,
                failure: None,
            })
        }
        StorageUnitStatus::Archived => {
            let bucket_name = settings.bucket_name_for_storage(&unit.storage_name)?;
            let key_prefix = normalized_key_prefix(&unit)?;

            // Directory-only registrations have zero files; that is valid.
            let registered_files = registry.list_registered_files(unit.id).await?;

            let foreign_files = registry
                .count_foreign_files_under_prefix(&unit.storage_name, &key_prefix, unit.id)
                .await?;
            if foreign_files > 0 {
                return Err(AppError::Conflict(format!(
                    "{} files belonging to other business object data are registered under \
                     prefix '{}' in storage '{}'",
                    foreign_files, key_prefix, unit.storage_name
                )));
            }

            // Assemble the batch configuration before the status transition
            // so a configuration error aborts with nothing persisted.
            let mode = if batch_mode {
                RestoreMode::Batch {
                    config: settings.batch_job_config()?,
                }
            } else {
                RestoreMode::Single
            };

            let outcome = registry
                .transition_to_restoring(
                    unit.id,
                    expiration,
                    StorageUnitStatus::Restoring.as_str(),
                )
                .await?;
            if outcome == CasOutcome::Conflict {
                // Lost the race: re-read the status for the diagnostic.
                let status = current_status(registry, key, &unit).await?;
                return Err(AppError::not_restorable(&unit.storage_name, &status));
            }
            println!(
                "🔒 Storage unit {} in storage '{}' transitioned ARCHIVED -> RESTORING",
                unit.id, unit.storage_name
            );

            Ok(RestoreJobDescriptor {
                data_key: key.clone(),
                storage_unit_id: unit.id,
                storage_name: unit.storage_name,
                bucket_name: Some(bucket_name),
                key_prefix,
                registered_files,
                retrieval_tier,
                mode,
                already_restored: false,
                old_status: StorageUnitStatus::Archived,
                new_status: StorageUnitStatus::Restoring,
                restore_expiration_on: expiration,
                batch_job_id: None,
                failure: None,
            })
        }
        other => Err(AppError::not_restorable(&unit.storage_name, other.as_str())),
    }
}

/// Resolves the one cold-tier storage unit for the data key. More than one
/// is a data-integrity error, not a retry condition.
async fn resolve_single_cold_tier_unit<R: StorageUnitRegistry>(
    registry: &R,
    key: &BusinessObjectDataKey,
) -> Result<StorageUnit> {
    let mut units = registry
        .find_storage_units(key, COLD_STORAGE_PLATFORM)
        .await?;
    match units.len() {
        0 => Err(AppError::NotFound(format!(
            "no cold-tier storage unit exists for business object data {}",
            key
        ))),
        1 => Ok(units.remove(0)),
        n => Err(AppError::Conflict(format!(
            "found {} cold-tier storage units for business object data {}; expected exactly one",
            n, key
        ))),
    }
}

/// Key prefix under which the unit's files live: the registered directory
/// path with a guaranteed trailing slash.
fn normalized_key_prefix(unit: &StorageUnit) -> Result<String> {
    let mut prefix = unit.directory_path.trim_start_matches('/').to_string();
    if prefix.is_empty() {
        return Err(AppError::Config(format!(
            "storage unit {} in storage '{}' has no directory path registered",
            unit.id, unit.storage_name
        )));
    }
    if !prefix.ends_with('/') {
        prefix.push('/');
    }
    Ok(prefix)
}

async fn current_status<R: StorageUnitRegistry>(
    registry: &R,
    key: &BusinessObjectDataKey,
    unit: &StorageUnit,
) -> Result<String> {
    let status = registry
        .find_storage_units(key, COLD_STORAGE_PLATFORM)
        .await?
        .into_iter()
        .find(|u| u.id == unit.id)
        .map(|u| u.status.as_str().to_string())
        .unwrap_or_else(|| "UNKNOWN".to_string());
    Ok(status)
}
