use async_trait::async_trait;
use aws_sdk_s3::Client as S3Client;
use tracing::{info, warn};

use crate::errors::AppError;

/// Boundary to the file store. The engine only ever needs to ask whether a
/// key exists and to delete it; uploads happen elsewhere.
#[async_trait]
pub trait FileStore: Send + Sync {
    async fn exists(&self, key: &str) -> Result<bool, AppError>;

    async fn delete(&self, key: &str) -> Result<(), AppError>;

    /// Existence-checked delete. Returns true if a file was actually removed,
    /// so a second run over the same key is a no-op rather than an error.
    async fn delete_if_exists(&self, key: &str) -> Result<bool, AppError> {
        if self.exists(key).await? {
            self.delete(key).await?;
            Ok(true)
        } else {
            Ok(false)
        }
    }
}

/// S3 / MinIO backed file store.
pub struct S3FileStore {
    client: S3Client,
    bucket: String,
}

impl S3FileStore {
    pub fn new(client: S3Client, bucket: String) -> Self {
        Self { client, bucket }
    }
}

#[async_trait]
impl FileStore for S3FileStore {
    async fn exists(&self, key: &str) -> Result<bool, AppError> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) => {
                let service_err = e.into_service_error();
                if service_err.is_not_found() {
                    Ok(false)
                } else {
                    Err(AppError::Storage(format!(
                        "head_object failed for {key}: {service_err}"
                    )))
                }
            }
        }
    }

    async fn delete(&self, key: &str) -> Result<(), AppError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("delete_object failed for {key}: {e}")))?;
        info!("Deleted file {key} from bucket {}", self.bucket);
        Ok(())
    }
}

/// Removes a batch of file keys, best effort. Failures are logged and
/// reported back as strings; they never abort the caller.
pub async fn reclaim_files(files: &dyn FileStore, keys: &[String]) -> Vec<String> {
    let mut errors = Vec::new();
    for key in keys {
        match files.delete_if_exists(key).await {
            Ok(true) => {}
            Ok(false) => {
                // Already gone. Expected when a concurrent trigger got here first.
            }
            Err(e) => {
                warn!("Failed to reclaim file {key}: {e}");
                errors.push(format!("file {key}: {e}"));
            }
        }
    }
    errors
}
