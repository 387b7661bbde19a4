// archivetool/src/registry/mod.rs
//
// Catalog access for storage units. The trait is what the restore flow
// consumes; `PgStorageUnitRegistry` is the Postgres implementation. Every
// status transition is a single UPDATE guarded by the expected current
// status, so each one is atomic on its own and doubles as the
// compare-and-set the orchestration relies on for concurrency control.

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::errors::{AppError, Result};
use crate::model::{BusinessObjectDataKey, StorageFile, StorageUnit, StorageUnitStatus};

/// Platform name of the cold tier in the storage catalog.
pub const COLD_STORAGE_PLATFORM: &str = "GLACIER";

/// Result of a guarded status transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CasOutcome {
    Updated,
    Conflict,
}

pub trait StorageUnitRegistry {
    /// All storage units for the data key within storages of the given
    /// platform. The caller enforces the at-most-one invariant.
    async fn find_storage_units(
        &self,
        key: &BusinessObjectDataKey,
        storage_platform: &str,
    ) -> Result<Vec<StorageUnit>>;

    /// Registered files of one storage unit. Empty for directory-only
    /// registrations.
    async fn list_registered_files(&self, unit_id: Uuid) -> Result<Vec<StorageFile>>;

    /// Number of files registered to *other* storage units of the same
    /// storage whose paths fall under the given key prefix.
    async fn count_foreign_files_under_prefix(
        &self,
        storage_name: &str,
        prefix: &str,
        exclude_unit: Uuid,
    ) -> Result<i64>;

    /// ARCHIVED -> RESTORING, setting the restore expiration and resetting
    /// the failed-transition counter in the same statement. This commit is
    /// the durable lock that rejects a second concurrent restore.
    async fn transition_to_restoring(
        &self,
        unit_id: Uuid,
        expiration: DateTime<Utc>,
        reason: &str,
    ) -> Result<CasOutcome>;

    /// RESTORING -> ARCHIVED compensation: clears the expiration and bumps
    /// the failed-transition counter.
    async fn revert_to_archived(&self, unit_id: Uuid, reason: &str) -> Result<CasOutcome>;

    /// Updates only the restore expiration (refresh of an already RESTORED
    /// unit; status untouched).
    async fn set_expiration(
        &self,
        unit_id: Uuid,
        expiration: Option<DateTime<Utc>>,
    ) -> Result<()>;
}

/// sqlx-backed registry over the catalog schema:
/// `business_object_data` (key columns), `storage` (name, storage_platform),
/// `storage_unit` (status, restore_expiration_on, failed_transitions,
/// directory_path) and `storage_file` (file_path, file_size_bytes,
/// row_count).
#[derive(Clone)]
pub struct PgStorageUnitRegistry {
    pool: PgPool,
}

impl PgStorageUnitRegistry {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct StorageUnitRow {
    id: Uuid,
    storage_name: String,
    namespace: String,
    definition_name: String,
    usage_code: String,
    file_type: String,
    version: i32,
    partition_values: Vec<String>,
    status: String,
    restore_expiration_on: Option<DateTime<Utc>>,
    failed_transitions: i32,
    directory_path: String,
}

impl StorageUnitRow {
    fn into_model(self) -> Result<StorageUnit> {
        Ok(StorageUnit {
            id: self.id,
            storage_name: self.storage_name,
            data_key: BusinessObjectDataKey {
                namespace: self.namespace,
                definition_name: self.definition_name,
                usage_code: self.usage_code,
                file_type: self.file_type,
                version: self.version,
                partition_values: self.partition_values,
            },
            status: StorageUnitStatus::parse(&self.status)?,
            restore_expiration_on: self.restore_expiration_on,
            failed_transitions: self.failed_transitions,
            directory_path: self.directory_path,
        })
    }
}

impl StorageUnitRegistry for PgStorageUnitRegistry {
    async fn find_storage_units(
        &self,
        key: &BusinessObjectDataKey,
        storage_platform: &str,
    ) -> Result<Vec<StorageUnit>> {
        let rows: Vec<StorageUnitRow> = sqlx::query_as(
            r#"
            SELECT su.id, su.storage_name,
                   bd.namespace, bd.definition_name, bd.usage_code,
                   bd.file_type, bd.version, bd.partition_values,
                   su.status, su.restore_expiration_on,
                   su.failed_transitions, su.directory_path
            FROM storage_unit su
            JOIN business_object_data bd ON bd.id = su.business_object_data_id
            JOIN storage s ON s.name = su.storage_name
            WHERE bd.namespace = $1
              AND bd.definition_name = $2
              AND bd.usage_code = $3
              AND bd.file_type = $4
              AND bd.version = $5
              AND bd.partition_values = $6
              AND s.storage_platform = $7
            ORDER BY su.storage_name
            "#,
        )
        .bind(&key.namespace)
        .bind(&key.definition_name)
        .bind(&key.usage_code)
        .bind(&key.file_type)
        .bind(key.version)
        .bind(&key.partition_values)
        .bind(storage_platform)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(StorageUnitRow::into_model).collect()
    }

    async fn list_registered_files(&self, unit_id: Uuid) -> Result<Vec<StorageFile>> {
        let rows = sqlx::query(
            r#"
            SELECT file_path, file_size_bytes, row_count
            FROM storage_file
            WHERE storage_unit_id = $1
            ORDER BY file_path
            "#,
        )
        .bind(unit_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| StorageFile {
                file_path: row.get("file_path"),
                file_size_bytes: row.get("file_size_bytes"),
                row_count: row.get("row_count"),
            })
            .collect())
    }

    async fn count_foreign_files_under_prefix(
        &self,
        storage_name: &str,
        prefix: &str,
        exclude_unit: Uuid,
    ) -> Result<i64> {
        // LIKE pattern characters in the prefix must match literally.
        let pattern = format!(
            "{}%",
            prefix.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
        );
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM storage_file sf
            JOIN storage_unit su ON su.id = sf.storage_unit_id
            WHERE su.storage_name = $1
              AND sf.file_path LIKE $2
              AND su.id <> $3
            "#,
        )
        .bind(storage_name)
        .bind(&pattern)
        .bind(exclude_unit)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn transition_to_restoring(
        &self,
        unit_id: Uuid,
        expiration: DateTime<Utc>,
        reason: &str,
    ) -> Result<CasOutcome> {
        let result = sqlx::query(
            r#"
            UPDATE storage_unit
            SET status = 'RESTORING',
                status_reason = $2,
                restore_expiration_on = $3,
                failed_transitions = 0,
                updated_on = now()
            WHERE id = $1 AND status = 'ARCHIVED'
            "#,
        )
        .bind(unit_id)
        .bind(reason)
        .bind(expiration)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            Ok(CasOutcome::Updated)
        } else {
            Ok(CasOutcome::Conflict)
        }
    }

    async fn revert_to_archived(&self, unit_id: Uuid, reason: &str) -> Result<CasOutcome> {
        let result = sqlx::query(
            r#"
            UPDATE storage_unit
            SET status = 'ARCHIVED',
                status_reason = $2,
                restore_expiration_on = NULL,
                failed_transitions = failed_transitions + 1,
                updated_on = now()
            WHERE id = $1 AND status = 'RESTORING'
            "#,
        )
        .bind(unit_id)
        .bind(reason)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            Ok(CasOutcome::Updated)
        } else {
            Ok(CasOutcome::Conflict)
        }
    }

    async fn set_expiration(
        &self,
        unit_id: Uuid,
        expiration: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE storage_unit
            SET restore_expiration_on = $2, updated_on = now()
            WHERE id = $1
            "#,
        )
        .bind(unit_id)
        .bind(expiration)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "storage unit {} no longer exists",
                unit_id
            )));
        }
        Ok(())
    }
}
