// archivetool/src/gateway/mod.rs
use aws_sdk_s3 as s3;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{GlacierJobParameters, RestoreRequest, Tier};
use aws_sdk_s3control as s3control;
use aws_sdk_s3control::types::{
    JobManifest, JobManifestFieldName, JobManifestFormat, JobManifestLocation, JobManifestSpec,
    JobOperation, JobReport, S3GlacierJobTier, S3InitiateRestoreObjectOperation,
};
use chrono::Utc;
use uuid::Uuid;

use crate::config::StorageConfig;
use crate::errors::{AppError, Result};
use crate::model::BatchJobConfig;

/// One object found under the key prefix in the remote store.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteObject {
    pub key: String,
    pub size: i64,
    pub storage_class: String,
}

/// Remote object store operations the restore flow needs. Implemented for
/// S3/S3-compatible services below; mocked in tests.
pub trait RemoteStoreGateway {
    /// Lists all non-zero-byte objects under the prefix.
    async fn list_objects(&self, bucket: &str, prefix: &str) -> Result<Vec<RemoteObject>>;

    /// Issues a single-object restore request against the cold tier.
    async fn restore_object(
        &self,
        bucket: &str,
        key: &str,
        lifetime_days: i32,
        tier: &str,
    ) -> Result<()>;

    /// Uploads a manifest covering all objects and submits one bulk restore
    /// job. Returns the remote job id.
    async fn submit_batch_restore_job(
        &self,
        bucket: &str,
        prefix: &str,
        objects: &[RemoteObject],
        config: &BatchJobConfig,
        lifetime_days: i32,
        tier: &str,
    ) -> Result<String>;
}

/// aws-sdk backed gateway. The S3 client handles listing, single-object
/// restores and manifest uploads; the S3 Control client submits batch jobs.
pub struct S3Gateway {
    s3: s3::Client,
    s3control: s3control::Client,
}

impl S3Gateway {
    /// Builds the SDK clients from a storage's configuration. Endpoint and
    /// static credentials are only applied when configured, so the default
    /// provider chain still works for plain AWS storages.
    pub async fn from_storage_config(storage: &StorageConfig) -> Self {
        let mut loader = aws_config::defaults(s3::config::BehaviorVersion::latest());
        if let Some(endpoint_url) = &storage.endpoint_url {
            loader = loader.endpoint_url(endpoint_url);
        }
        if let Some(region) = &storage.region {
            loader = loader.region(s3::config::Region::new(region.clone()));
        }
        if let (Some(access_key_id), Some(secret_access_key)) =
            (&storage.access_key_id, &storage.secret_access_key)
        {
            loader = loader.credentials_provider(s3::config::Credentials::new(
                access_key_id,
                secret_access_key,
                None, // session_token
                None, // expiry
                "Static",
            ));
        }
        let sdk_config = loader.load().await;

        Self {
            s3: s3::Client::new(&sdk_config),
            s3control: s3control::Client::new(&sdk_config),
        }
    }

    async fn upload_manifest(
        &self,
        config: &BatchJobConfig,
        manifest_key: &str,
        manifest_body: String,
    ) -> Result<String> {
        let put = self
            .s3
            .put_object()
            .bucket(&config.manifest_bucket)
            .key(manifest_key)
            .body(ByteStream::from(manifest_body.into_bytes()))
            .send()
            .await
            .map_err(|e| {
                AppError::Remote(format!(
                    "Failed to upload batch manifest to s3://{}/{}: {}",
                    config.manifest_bucket, manifest_key, e
                ))
            })?;

        let etag = put
            .e_tag()
            .map(|tag| tag.trim_matches('"').to_string())
            .ok_or_else(|| {
                AppError::Remote("manifest upload response carried no ETag".to_string())
            })?;
        Ok(etag)
    }

    async fn create_batch_job(
        &self,
        bucket: &str,
        prefix: &str,
        config: &BatchJobConfig,
        manifest_key: &str,
        manifest_etag: &str,
        lifetime_days: i32,
        tier: &str,
    ) -> Result<String> {
        let spec = JobManifestSpec::builder()
            .format(JobManifestFormat::S3BatchOperationsCsv20180820)
            .fields(JobManifestFieldName::Bucket)
            .fields(JobManifestFieldName::Key)
            .build()
            .map_err(|e| AppError::Remote(format!("Failed to build manifest spec: {}", e)))?;
        let location = JobManifestLocation::builder()
            .object_arn(format!(
                "arn:aws:s3:::{}/{}",
                config.manifest_bucket, manifest_key
            ))
            .e_tag(manifest_etag)
            .build()
            .map_err(|e| AppError::Remote(format!("Failed to build manifest location: {}", e)))?;
        let manifest = JobManifest::builder()
            .spec(spec)
            .location(location)
            .build();

        let operation = JobOperation::builder()
            .s3_initiate_restore_object(
                S3InitiateRestoreObjectOperation::builder()
                    .expiration_in_days(lifetime_days)
                    .glacier_job_tier(S3GlacierJobTier::from(tier))
                    .build(),
            )
            .build();
        let report = JobReport::builder().enabled(false).build();

        let response = self
            .s3control
            .create_job()
            .account_id(&config.account_id)
            .confirmation_required(false)
            .client_request_token(Uuid::new_v4().to_string())
            .operation(operation)
            .report(report)
            .manifest(manifest)
            .priority(BATCH_JOB_PRIORITY)
            .role_arn(&config.role_arn)
            .description(format!("Restore of s3://{}/{}", bucket, prefix))
            .send()
            .await
            .map_err(|e| AppError::Remote(format!("Failed to submit batch restore job: {}", e)))?;

        response
            .job_id()
            .map(str::to_string)
            .ok_or_else(|| AppError::Remote("batch job submission returned no job id".to_string()))
    }
}

const BATCH_JOB_PRIORITY: i32 = 10;

/// Builds the S3 Batch Operations CSV manifest body (one `bucket,key` row
/// per object).
pub fn build_manifest_csv(bucket: &str, objects: &[RemoteObject]) -> String {
    let mut body = String::new();
    for object in objects {
        body.push_str(bucket);
        body.push(',');
        body.push_str(&object.key);
        body.push('\n');
    }
    body
}

impl RemoteStoreGateway for S3Gateway {
    async fn list_objects(&self, bucket: &str, prefix: &str) -> Result<Vec<RemoteObject>> {
        let mut pages = self
            .s3
            .list_objects_v2()
            .bucket(bucket)
            .prefix(prefix)
            .into_paginator()
            .send();

        let mut objects = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| {
                AppError::Remote(format!(
                    "Failed to list objects under s3://{}/{}: {}",
                    bucket, prefix, e
                ))
            })?;
            for object in page.contents() {
                let size = object.size().unwrap_or(0);
                // Zero-byte objects are directory markers, not data files.
                if size == 0 {
                    continue;
                }
                objects.push(RemoteObject {
                    key: object.key().unwrap_or_default().to_string(),
                    size,
                    storage_class: object
                        .storage_class()
                        .map(|class| class.as_str().to_string())
                        .unwrap_or_else(|| "STANDARD".to_string()),
                });
            }
        }
        Ok(objects)
    }

    async fn restore_object(
        &self,
        bucket: &str,
        key: &str,
        lifetime_days: i32,
        tier: &str,
    ) -> Result<()> {
        let glacier_job_parameters = GlacierJobParameters::builder()
            .tier(Tier::from(tier))
            .build()
            .map_err(|e| AppError::Remote(format!("Failed to build restore parameters: {}", e)))?;
        let restore_request = RestoreRequest::builder()
            .days(lifetime_days)
            .glacier_job_parameters(glacier_job_parameters)
            .build();

        self.s3
            .restore_object()
            .bucket(bucket)
            .key(key)
            .restore_request(restore_request)
            .send()
            .await
            .map_err(|e| {
                AppError::Remote(format!(
                    "Failed to request restore of s3://{}/{}: {}",
                    bucket, key, e
                ))
            })?;
        Ok(())
    }

    async fn submit_batch_restore_job(
        &self,
        bucket: &str,
        prefix: &str,
        objects: &[RemoteObject],
        config: &BatchJobConfig,
        lifetime_days: i32,
        tier: &str,
    ) -> Result<String> {
        let manifest_key = format!(
            "{}/{}-{}.csv",
            config.manifest_prefix.trim_matches('/'),
            Utc::now().format("%Y%m%dT%H%M%SZ"),
            Uuid::new_v4()
        );
        let manifest_body = build_manifest_csv(bucket, objects);
        let manifest_etag = self
            .upload_manifest(config, &manifest_key, manifest_body)
            .await?;

        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self
                .create_batch_job(
                    bucket,
                    prefix,
                    config,
                    &manifest_key,
                    &manifest_etag,
                    lifetime_days,
                    tier,
                )
                .await
            {
                Ok(job_id) => return Ok(job_id),
                Err(e) if attempt < config.max_attempts => {
                    eprintln!(
                        "⚠️ Batch job submission attempt {}/{} failed: {}. Retrying in {:?}...",
                        attempt, config.max_attempts, e, config.backoff
                    );
                    tokio::time::sleep(config.backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
