// archivetool/src/restore/execute.rs
//
// Execute phase of the restore saga. Runs with no ambient transaction (the
// remote calls can block for a long time) and never returns an error: every
// failure is captured on the descriptor so the finalize phase always runs
// and can compensate.

use std::collections::HashMap;

use crate::errors::{AppError, Result};
use crate::gateway::{RemoteObject, RemoteStoreGateway};
use crate::model::{RestoreJobDescriptor, RestoreMode, StorageFile};

/// Lifetime passed to the remote restore request. This is the remote job's
/// internal polling horizon, not the catalog's restore expiration; it only
/// has to outlive any expiration the catalog can hand out.
const RESTORE_REQUEST_LIFETIME_DAYS: i32 = 36500;

/// Storage classes eligible for a restore request. Exactly the classes the
/// archival transition sets; anything else means we raced with archival.
const RESTORABLE_STORAGE_CLASSES: &[&str] = &["GLACIER", "DEEP_ARCHIVE"];

pub(super) async fn execute<G: RemoteStoreGateway>(
    gateway: &G,
    descriptor: &mut RestoreJobDescriptor,
) {
    // Refresh-only path: the expiration was already moved in prepare.
    if descriptor.already_restored {
        return;
    }
    if let Err(failure) = run_remote_steps(gateway, descriptor).await {
        descriptor.failure = Some(failure);
    }
}

async fn run_remote_steps<G: RemoteStoreGateway>(
    gateway: &G,
    descriptor: &mut RestoreJobDescriptor,
) -> Result<()> {
    let bucket_name = descriptor.bucket_name.clone().ok_or_else(|| {
        AppError::Config(format!(
            "restore descriptor for storage '{}' carries no bucket name",
            descriptor.storage_name
        ))
    })?;

    let objects = gateway
        .list_objects(&bucket_name, &descriptor.key_prefix)
        .await?;
    println!(
        "🔍 Found {} objects under s3://{}/{}",
        objects.len(),
        bucket_name,
        descriptor.key_prefix
    );

    validate_registered_files(&descriptor.registered_files, &objects)?;
    validate_storage_classes(&objects)?;

    match &descriptor.mode {
        RestoreMode::Single => {
            for object in &objects {
                gateway
                    .restore_object(
                        &bucket_name,
                        &object.key,
                        RESTORE_REQUEST_LIFETIME_DAYS,
                        &descriptor.retrieval_tier,
                    )
                    .await?;
            }
            println!(
                "🧊 Requested {} restore of {} objects",
                descriptor.retrieval_tier,
                objects.len()
            );
        }
        RestoreMode::Batch { config } => {
            let job_id = gateway
                .submit_batch_restore_job(
                    &bucket_name,
                    &descriptor.key_prefix,
                    &objects,
                    config,
                    RESTORE_REQUEST_LIFETIME_DAYS,
                    &descriptor.retrieval_tier,
                )
                .await?;
            println!(
                "🧊 Submitted batch restore job {} covering {} objects",
                job_id,
                objects.len()
            );
            descriptor.batch_job_id = Some(job_id);
        }
    }
    Ok(())
}

/// Every registered file must exist among the actual objects with a
/// matching size.
fn validate_registered_files(registered: &[StorageFile], actual: &[RemoteObject]) -> Result<()> {
    let actual_sizes: HashMap<&str, i64> = actual
        .iter()
        .map(|object| (object.key.as_str(), object.size))
        .collect();

    for file in registered {
        match actual_sizes.get(file.file_path.as_str()) {
            None => {
                return Err(AppError::Remote(format!(
                    "registered file '{}' was not found in the remote store",
                    file.file_path
                )));
            }
            Some(actual_size) if *actual_size != file.file_size_bytes => {
                return Err(AppError::Remote(format!(
                    "registered file '{}' has size {} in the remote store, expected {}",
                    file.file_path, actual_size, file.file_size_bytes
                )));
            }
            Some(_) => {}
        }
    }
    Ok(())
}

/// Every actual object must sit in a cold-tier storage class before a
/// restore request is issued.
fn validate_storage_classes(objects: &[RemoteObject]) -> Result<()> {
    for object in objects {
        if !RESTORABLE_STORAGE_CLASSES.contains(&object.storage_class.as_str()) {
            return Err(AppError::Remote(format!(
                "object '{}' has storage class '{}'; restore requires one of: {}",
                object.key,
                object.storage_class,
                RESTORABLE_STORAGE_CLASSES.join(", ")
            )));
        }
    }
    Ok(())
}
