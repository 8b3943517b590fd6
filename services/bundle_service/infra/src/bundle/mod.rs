pub mod archive;
pub mod object_store;
pub mod policy_client;
pub mod repository;
pub mod service;

pub use object_store::S3BundleBlobStore;
pub use policy_client::HttpPolicyTestClient;
pub use repository::{PgBundleRepository, PgDeploymentRepository, PgPolicyRepository};
pub use service::BundleBuilderServiceImpl;
