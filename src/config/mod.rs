// archivetool/src/config/mod.rs
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::Duration;
use url::Url;

use crate::errors::AppError;
use crate::model::{BatchJobConfig, BusinessObjectDataKey};

// Structs for deserializing config.json
#[derive(Debug, Clone, Deserialize)]
pub struct JsonStorageConfig {
    pub bucket_name: Option<String>,
    pub region: Option<String>,
    pub endpoint_url: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JsonBatchJobConfig {
    pub account_id: String,
    pub role_arn: String,
    pub manifest_bucket: String,
    pub manifest_prefix: Option<String>,
    pub backoff_seconds: Option<u64>,
    pub max_attempts: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JsonRestoreRequest {
    pub namespace: String,
    pub definition_name: String,
    pub usage_code: String,
    pub file_type: String,
    pub version: i32,
    #[serde(default)]
    pub partition_values: Vec<String>,
    pub expiration_in_days: Option<i32>,
    pub retrieval_option: Option<String>,
    pub batch_mode: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawJsonConfig {
    pub catalog_database_url: Option<String>,
    pub default_expiration_days: Option<i32>,
    pub default_retrieval_tier: Option<String>,
    pub storages: Option<HashMap<String, JsonStorageConfig>>,
    pub batch_job: Option<JsonBatchJobConfig>,
    pub restore_request: Option<JsonRestoreRequest>,
}

// Application's internal configuration structs

/// Connection settings for one named storage backed by an S3-compatible
/// endpoint. `endpoint_url`/credentials are only set for non-AWS services.
#[derive(Debug, Clone, Default)]
pub struct StorageConfig {
    pub bucket_name: Option<String>,
    pub region: Option<String>,
    pub endpoint_url: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
}

#[derive(Debug, Clone)]
pub struct BatchJobSettings {
    pub account_id: String,
    pub role_arn: String,
    pub manifest_bucket: String,
    pub manifest_prefix: String,
    pub backoff_seconds: u64,
    pub max_attempts: u32,
}

/// The configuration-access capability handed to the restore orchestrator.
/// Lookups fail with typed errors instead of panicking on missing entries.
#[derive(Debug, Clone)]
pub struct RestoreSettings {
    pub default_expiration_days: i32,
    pub default_retrieval_tier: Option<String>,
    pub storages: HashMap<String, StorageConfig>,
    pub batch_job: Option<BatchJobSettings>,
}

impl RestoreSettings {
    /// Looks up the bucket name attribute configured for a storage.
    pub fn bucket_name_for_storage(
        &self,
        storage_name: &str,
    ) -> std::result::Result<String, AppError> {
        let storage = self.storages.get(storage_name).ok_or_else(|| {
            AppError::Config(format!(
                "no configuration found for storage '{}'",
                storage_name
            ))
        })?;
        match &storage.bucket_name {
            Some(bucket) if !bucket.trim().is_empty() => Ok(bucket.clone()),
            _ => Err(AppError::Config(format!(
                "storage '{}' has no bucket name attribute configured",
                storage_name
            ))),
        }
    }

    /// Assembles a fresh batch job configuration for one bulk submission.
    pub fn batch_job_config(&self) -> std::result::Result<BatchJobConfig, AppError> {
        let settings = self.batch_job.as_ref().ok_or_else(|| {
            AppError::Config(
                "batch mode requested but no batch_job section is configured".to_string(),
            )
        })?;
        Ok(BatchJobConfig {
            account_id: settings.account_id.clone(),
            role_arn: settings.role_arn.clone(),
            manifest_bucket: settings.manifest_bucket.clone(),
            manifest_prefix: settings.manifest_prefix.clone(),
            backoff: Duration::from_secs(settings.backoff_seconds),
            max_attempts: settings.max_attempts,
        })
    }
}

#[derive(Debug, Clone)]
pub struct RestoreRequestConfig {
    pub data_key: BusinessObjectDataKey,
    pub expiration_in_days: Option<i32>,
    pub retrieval_option: Option<String>,
    pub batch_mode: bool,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub catalog_database_url: String,
    pub settings: RestoreSettings,
    pub restore_request: Option<RestoreRequestConfig>,
}

const DEFAULT_EXPIRATION_DAYS: i32 = 90;
const DEFAULT_MANIFEST_PREFIX: &str = "batch-restore-manifests";
const DEFAULT_BATCH_BACKOFF_SECONDS: u64 = 30;
const DEFAULT_BATCH_MAX_ATTEMPTS: u32 = 5;

impl AppConfig {
    pub fn load_from_json(config_path: &Path) -> Result<Self> {
        let config_content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file at {}", config_path.display()))?;
        let raw: RawJsonConfig = serde_json::from_str(&config_content).with_context(|| {
            format!(
                "Failed to parse JSON from config file at {}",
                config_path.display()
            )
        })?;
        Self::from_raw(raw)
    }

    pub fn from_raw(raw: RawJsonConfig) -> Result<Self> {
        let catalog_database_url = raw
            .catalog_database_url
            .context("catalog_database_url must be set in config.json")?;
        let parsed = Url::parse(&catalog_database_url)
            .with_context(|| format!("Invalid catalog_database_url: {}", catalog_database_url))?;
        if !matches!(parsed.scheme(), "postgres" | "postgresql") {
            anyhow::bail!(
                "catalog_database_url must be a postgres:// URL, got scheme '{}'",
                parsed.scheme()
            );
        }

        let storages = raw
            .storages
            .unwrap_or_default()
            .into_iter()
            .map(|(name, json)| {
                (
                    name,
                    StorageConfig {
                        bucket_name: json.bucket_name,
                        region: json.region,
                        endpoint_url: json.endpoint_url,
                        access_key_id: json.access_key_id,
                        secret_access_key: json.secret_access_key,
                    },
                )
            })
            .collect();

        let batch_job = raw.batch_job.map(|json| BatchJobSettings {
            account_id: json.account_id,
            role_arn: json.role_arn,
            manifest_bucket: json.manifest_bucket,
            manifest_prefix: json
                .manifest_prefix
                .unwrap_or_else(|| DEFAULT_MANIFEST_PREFIX.to_string()),
            backoff_seconds: json.backoff_seconds.unwrap_or(DEFAULT_BATCH_BACKOFF_SECONDS),
            max_attempts: json.max_attempts.unwrap_or(DEFAULT_BATCH_MAX_ATTEMPTS),
        });

        let default_expiration_days = raw
            .default_expiration_days
            .unwrap_or(DEFAULT_EXPIRATION_DAYS);
        if default_expiration_days <= 0 {
            anyhow::bail!(
                "default_expiration_days must be a positive integer, got {}",
                default_expiration_days
            );
        }

        let restore_request = raw.restore_request.map(|json| RestoreRequestConfig {
            data_key: BusinessObjectDataKey {
                namespace: json.namespace,
                definition_name: json.definition_name,
                usage_code: json.usage_code,
                file_type: json.file_type,
                version: json.version,
                partition_values: json.partition_values,
            },
            expiration_in_days: json.expiration_in_days,
            retrieval_option: json.retrieval_option,
            batch_mode: json.batch_mode.unwrap_or(false),
        });

        Ok(AppConfig {
            catalog_database_url,
            settings: RestoreSettings {
                default_expiration_days,
                default_retrieval_tier: raw.default_retrieval_tier,
                storages,
                batch_job,
            },
            restore_request,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw_from_json(value: serde_json::Value) -> Result<RawJsonConfig> {
        Ok(serde_json::from_value(value)?)
    }

    #[test]
    fn test_load_minimal_config() -> anyhow::Result<()> {
        let raw = raw_from_json(json!({
            "catalog_database_url": "postgres://localhost/catalog"
        }))?;
        let config = AppConfig::from_raw(raw)?;

        assert_eq!(config.catalog_database_url, "postgres://localhost/catalog");
        assert_eq!(config.settings.default_expiration_days, 90);
        assert!(config.settings.batch_job.is_none());
        assert!(config.restore_request.is_none());
        Ok(())
    }

    #[test]
    fn test_missing_database_url_is_rejected() -> anyhow::Result<()> {
        let raw = raw_from_json(json!({ "default_expiration_days": 30 }))?;
        assert!(AppConfig::from_raw(raw).is_err());
        Ok(())
    }

    #[test]
    fn test_malformed_database_url_is_rejected() -> anyhow::Result<()> {
        let raw = raw_from_json(json!({
            "catalog_database_url": "not a url at all"
        }))?;
        assert!(AppConfig::from_raw(raw).is_err());
        Ok(())
    }

    #[test]
    fn test_non_postgres_database_url_is_rejected() -> anyhow::Result<()> {
        let raw = raw_from_json(json!({
            "catalog_database_url": "mysql://localhost/catalog"
        }))?;
        let err = AppConfig::from_raw(raw).unwrap_err();
        assert!(err.to_string().contains("postgres"));
        Ok(())
    }

    #[test]
    fn test_postgresql_scheme_is_accepted() -> anyhow::Result<()> {
        let raw = raw_from_json(json!({
            "catalog_database_url": "postgresql://catalog_user@localhost:5432/catalog"
        }))?;
        assert!(AppConfig::from_raw(raw).is_ok());
        Ok(())
    }

    #[test]
    fn test_non_positive_default_expiration_is_rejected() -> anyhow::Result<()> {
        let raw = raw_from_json(json!({
            "catalog_database_url": "postgres://localhost/catalog",
            "default_expiration_days": 0
        }))?;
        assert!(AppConfig::from_raw(raw).is_err());
        Ok(())
    }

    #[test]
    fn test_bucket_name_lookup_per_storage() -> anyhow::Result<()> {
        let raw = raw_from_json(json!({
            "catalog_database_url": "postgres://localhost/catalog",
            "storages": {
                "S3_GLACIER": { "bucket_name": "archive-bucket" },
                "S3_BROKEN": { "region": "us-east-1" }
            }
        }))?;
        let config = AppConfig::from_raw(raw)?;

        assert_eq!(
            config.settings.bucket_name_for_storage("S3_GLACIER")?,
            "archive-bucket"
        );
        assert!(matches!(
            config.settings.bucket_name_for_storage("S3_BROKEN"),
            Err(AppError::Config(_))
        ));
        assert!(matches!(
            config.settings.bucket_name_for_storage("S3_MISSING"),
            Err(AppError::Config(_))
        ));
        Ok(())
    }

    #[test]
    fn test_batch_job_settings_with_defaults() -> anyhow::Result<()> {
        let raw = raw_from_json(json!({
            "catalog_database_url": "postgres://localhost/catalog",
            "batch_job": {
                "account_id": "123456789012",
                "role_arn": "arn:aws:iam::123456789012:role/batch-restore",
                "manifest_bucket": "manifest-bucket"
            }
        }))?;
        let config = AppConfig::from_raw(raw)?;
        let batch = config.settings.batch_job_config()?;

        assert_eq!(batch.account_id, "123456789012");
        assert_eq!(batch.manifest_prefix, "batch-restore-manifests");
        assert_eq!(batch.backoff, Duration::from_secs(30));
        assert_eq!(batch.max_attempts, 5);
        Ok(())
    }

    #[test]
    fn test_batch_config_missing_section_is_config_error() -> anyhow::Result<()> {
        let raw = raw_from_json(json!({
            "catalog_database_url": "postgres://localhost/catalog"
        }))?;
        let config = AppConfig::from_raw(raw)?;
        assert!(matches!(
            config.settings.batch_job_config(),
            Err(AppError::Config(_))
        ));
        Ok(())
    }

    #[test]
    fn test_restore_request_parsing() -> anyhow::Result<()> {
        let raw = raw_from_json(json!({
            "catalog_database_url": "postgres://localhost/catalog",
            "restore_request": {
                "namespace": "NS1",
                "definition_name": "DEF1",
                "usage_code": "PRC",
                "file_type": "BZ",
                "version": 0,
                "batch_mode": true,
                "retrieval_option": "STANDARD"
            }
        }))?;
        let config = AppConfig::from_raw(raw)?;
        let request = config.restore_request.expect("restore_request should parse");

        assert_eq!(request.data_key.namespace, "NS1");
        assert_eq!(request.data_key.version, 0);
        assert!(request.batch_mode);
        assert_eq!(request.expiration_in_days, None);
        assert_eq!(request.retrieval_option.as_deref(), Some("STANDARD"));
        Ok(())
    }
}
