//! S3-compatible object store client for policy bundle blobs (§2, §4.5),
//! adapted from the teacher's `StorageClient`, stripped of its
//! image-specific magic-byte validation since bundles are gzipped tar
//! archives, not images.

use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use shared_error::AppError;
use std::time::Duration;

const MAX_RETRIES: u32 = 3;
const RETRY_BASE_DELAY_MS: u64 = 100;

#[derive(Clone, Debug)]
pub struct ObjectStoreConfig {
    pub endpoint: String,
    pub access_key: String,
    pub secret_key: String,
    pub bucket: String,
    pub region: String,
    pub ssl: bool,
}

/// S3-compatible client, used by the bundle builder to upload/fetch the
/// gzipped tar archives it produces (§4.5's build protocol step 4).
pub struct ObjectStoreClient {
    client: Client,
    bucket: String,
}

impl ObjectStoreClient {
    pub fn new(config: &ObjectStoreConfig) -> Self {
        let credentials =
            aws_sdk_s3::config::Credentials::new(&config.access_key, &config.secret_key, None, None, "heimdall");

        let s3_config = aws_sdk_s3::Config::builder()
            .behavior_version_latest()
            .endpoint_url(&config.endpoint)
            .credentials_provider(credentials)
            .region(aws_sdk_s3::config::Region::new(config.region.clone()))
            .force_path_style(true)
            .build();

        Self { client: Client::from_conf(s3_config), bucket: config.bucket.clone() }
    }

    fn retry_delays() -> impl Iterator<Item = Duration> {
        (0..MAX_RETRIES).map(|attempt| Duration::from_millis(RETRY_BASE_DELAY_MS * 2u64.pow(attempt)))
    }

    /// Uploads `data` at `key`, retrying transient failures with
    /// exponential backoff. Build is idempotent w.r.t. the
    /// `(bundle_name, version)` path, so re-uploading the same key simply
    /// overwrites the prior blob (§4.5).
    pub async fn upload(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<(), AppError> {
        let mut delays = Self::retry_delays();
        loop {
            let body = ByteStream::from(data.clone());
            let result = self
                .client
                .put_object()
                .bucket(&self.bucket)
                .key(key)
                .body(body)
                .content_type(content_type)
                .send()
                .await;

            match result {
                Ok(_) => {
                    tracing::info!(key, size_bytes = data.len(), "bundle blob uploaded");
                    return Ok(());
                },
                Err(e) => match delays.next() {
                    Some(delay) => {
                        tracing::warn!(key, error = %e, "object store upload failed, retrying");
                        tokio::time::sleep(delay).await;
                    },
                    None => {
                        tracing::error!(key, error = %e, "object store upload failed after retries");
                        return Err(AppError::DependencyUnavailable(format!(
                            "object store upload failed after {MAX_RETRIES} retries: {e}"
                        )));
                    },
                },
            }
        }
    }

    pub async fn download(&self, key: &str) -> Result<Vec<u8>, AppError> {
        let resp = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| AppError::DependencyUnavailable(format!("object store get_object failed: {e}")))?;

        let bytes = resp
            .body
            .collect()
            .await
            .map_err(|e| AppError::DependencyUnavailable(format!("object store stream read failed: {e}")))?;
        Ok(bytes.into_bytes().to_vec())
    }

    pub async fn delete(&self, key: &str) -> Result<(), AppError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| AppError::DependencyUnavailable(format!("object store delete failed: {e}")))?;
        Ok(())
    }
}

/// Deterministic path for a bundle's archive, matching §4.5's build
/// protocol and §4.5's failure-semantics collision rule.
pub fn bundle_storage_path(bundle_name: &str, version: &str) -> String {
    format!("bundles/{bundle_name}-{version}.tar.gz")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundle_path_is_deterministic() {
        assert_eq!(bundle_storage_path("checkout-policy", "1.2.0"), "bundles/checkout-policy-1.2.0.tar.gz");
    }
}
