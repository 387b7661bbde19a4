// archivetool/src/model/mod.rs
//
// Domain types shared by the restore orchestration flow. These are plain
// value objects; persistence mapping lives in the registry module.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::time::Duration;
use uuid::Uuid;

use crate::errors::{AppError, Result};

/// Identifies one business-object-data instance in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BusinessObjectDataKey {
    pub namespace: String,
    pub definition_name: String,
    pub usage_code: String,
    pub file_type: String,
    pub version: i32,
    #[serde(default)]
    pub partition_values: Vec<String>,
}

impl BusinessObjectDataKey {
    /// Checks that every required field is present before any registry or
    /// remote call is made.
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("namespace", &self.namespace),
            ("definition_name", &self.definition_name),
            ("usage_code", &self.usage_code),
            ("file_type", &self.file_type),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(AppError::InvalidInput(format!(
                    "business object data key field '{}' must not be blank",
                    name
                )));
            }
        }
        if self.version < 0 {
            return Err(AppError::InvalidInput(
                "business object data version must not be negative".to_string(),
            ));
        }
        Ok(())
    }
}

impl std::fmt::Display for BusinessObjectDataKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}/v{}",
            self.namespace, self.definition_name, self.usage_code, self.file_type, self.version
        )
    }
}

/// Lifecycle status of a storage unit. Stored upper-case in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageUnitStatus {
    Enabled,
    Disabled,
    Archived,
    Restoring,
    Restored,
}

impl StorageUnitStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageUnitStatus::Enabled => "ENABLED",
            StorageUnitStatus::Disabled => "DISABLED",
            StorageUnitStatus::Archived => "ARCHIVED",
            StorageUnitStatus::Restoring => "RESTORING",
            StorageUnitStatus::Restored => "RESTORED",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "ENABLED" => Ok(StorageUnitStatus::Enabled),
            "DISABLED" => Ok(StorageUnitStatus::Disabled),
            "ARCHIVED" => Ok(StorageUnitStatus::Archived),
            "RESTORING" => Ok(StorageUnitStatus::Restoring),
            "RESTORED" => Ok(StorageUnitStatus::Restored),
            other => Err(AppError::InvalidInput(format!(
                "unknown storage unit status '{}'",
                other
            ))),
        }
    }
}

impl std::fmt::Display for StorageUnitStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The record of where one data asset's files live within one named storage.
#[derive(Debug, Clone, PartialEq)]
pub struct StorageUnit {
    pub id: Uuid,
    pub storage_name: String,
    pub data_key: BusinessObjectDataKey,
    pub status: StorageUnitStatus,
    pub restore_expiration_on: Option<DateTime<Utc>>,
    pub failed_transitions: i32,
    pub directory_path: String,
}

/// One registered file belonging to a storage unit. `file_path` is the full
/// object key in the storage's bucket.
#[derive(Debug, Clone, PartialEq)]
pub struct StorageFile {
    pub file_path: String,
    pub file_size_bytes: i64,
    pub row_count: Option<i64>,
}

/// Parameters for one bulk remote-job submission. Built fresh from
/// configuration for each batch restore.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchJobConfig {
    pub account_id: String,
    pub role_arn: String,
    pub manifest_bucket: String,
    pub manifest_prefix: String,
    pub backoff: Duration,
    pub max_attempts: u32,
}

/// How the restore is submitted to the remote store.
#[derive(Debug, Clone, PartialEq)]
pub enum RestoreMode {
    Single,
    Batch { config: BatchJobConfig },
}

impl RestoreMode {
    pub fn is_batch(&self) -> bool {
        matches!(self, RestoreMode::Batch { .. })
    }
}

/// Ephemeral value object threading state across the prepare, execute and
/// finalize phases of one restore attempt. Never persisted; only the status
/// fields it carries are written back into the storage unit.
#[derive(Debug)]
pub struct RestoreJobDescriptor {
    pub data_key: BusinessObjectDataKey,
    pub storage_unit_id: Uuid,
    pub storage_name: String,
    /// Bucket of the storage's cold tier. `None` only on the refresh path,
    /// which never touches the remote store.
    pub bucket_name: Option<String>,
    pub key_prefix: String,
    pub registered_files: Vec<StorageFile>,
    pub retrieval_tier: String,
    pub mode: RestoreMode,
    /// Set when the unit was already RESTORED and only the expiration was
    /// refreshed; the executor must not touch the remote store.
    pub already_restored: bool,
    pub old_status: StorageUnitStatus,
    pub new_status: StorageUnitStatus,
    pub restore_expiration_on: DateTime<Utc>,
    pub batch_job_id: Option<String>,
    pub failure: Option<AppError>,
}

/// Snapshot of the data/storage-unit state returned to the caller after the
/// finalize phase.
#[derive(Debug, Clone)]
pub struct BusinessObjectDataSnapshot {
    pub data_key: BusinessObjectDataKey,
    pub storage_name: String,
    pub status: StorageUnitStatus,
    pub restore_expiration_on: Option<DateTime<Utc>>,
    pub files: Vec<StorageFile>,
}

/// Result of one `initiate_restore` call. `failure` is populated when the
/// remote step failed and the unit was reverted to ARCHIVED.
#[derive(Debug)]
pub struct RestoreOutcome {
    pub old_status: StorageUnitStatus,
    pub new_status: StorageUnitStatus,
    pub snapshot: BusinessObjectDataSnapshot,
    pub batch_job_id: Option<String>,
    pub failure: Option<AppError>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_key() -> BusinessObjectDataKey {
        BusinessObjectDataKey {
            namespace: "NS1".to_string(),
            definition_name: "DEF1".to_string(),
            usage_code: "PRC".to_string(),
            file_type: "BZ".to_string(),
            version: 0,
            partition_values: vec![],
        }
    }

    #[test]
    fn test_key_validation_accepts_complete_key() -> anyhow::Result<()> {
        sample_key().validate()?;
        Ok(())
    }

    #[test]
    fn test_key_validation_rejects_blank_namespace() {
        let mut key = sample_key();
        key.namespace = "  ".to_string();
        let err = key.validate().unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
        assert!(err.to_string().contains("namespace"));
    }

    #[test]
    fn test_key_validation_rejects_negative_version() {
        let mut key = sample_key();
        key.version = -1;
        assert!(matches!(
            key.validate().unwrap_err(),
            AppError::InvalidInput(_)
        ));
    }

    #[test]
    fn test_status_round_trips_db_representation() -> anyhow::Result<()> {
        for status in [
            StorageUnitStatus::Enabled,
            StorageUnitStatus::Disabled,
            StorageUnitStatus::Archived,
            StorageUnitStatus::Restoring,
            StorageUnitStatus::Restored,
        ] {
            assert_eq!(StorageUnitStatus::parse(status.as_str())?, status);
        }
        Ok(())
    }

    #[test]
    fn test_status_parse_rejects_unknown_value() {
        assert!(StorageUnitStatus::parse("GLACIERED").is_err());
    }
}
