//! Adapts the concrete `shared_object_store::ObjectStoreClient` to
//! `bundle_service_core`'s narrow `BundleBlobStore` seam, the same way
//! `token_service_infra` wraps `shared_idp_client` behind its own
//! `IdentityProvider` trait object.

use async_trait::async_trait;
use shared_error::AppError;
use shared_object_store::ObjectStoreClient;

use bundle_service_core::domains::bundle::domain::collaborators::BundleBlobStore;

pub struct S3BundleBlobStore {
    client: ObjectStoreClient,
}

impl S3BundleBlobStore {
    pub fn new(client: ObjectStoreClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl BundleBlobStore for S3BundleBlobStore {
    async fn upload(&self, key: &str, data: Vec<u8>) -> Result<(), AppError> {
        self.client.upload(key, data, "application/gzip").await
    }
}
