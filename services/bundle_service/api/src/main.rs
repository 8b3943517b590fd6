use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use shared_jwt::TokenCodec;
use shared_object_store::{ObjectStoreClient, ObjectStoreConfig};

use bundle_service_api::handlers::AppState;
use bundle_service_infra::bundle::{
    BundleBuilderServiceImpl, HttpPolicyTestClient, PgBundleRepository, PgDeploymentRepository, PgPolicyRepository,
    S3BundleBlobStore,
};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).json().init();

    tracing::info!("bundle service starting");

    let config = shared_config::Config::from_env().expect("failed to load configuration");

    let db_pool =
        shared_db::init_pool(&config.database_url, config.database_max_connections, config.database_max_idle)
            .await
            .expect("failed to connect to database");
    tracing::info!("database connected");

    let codec = Arc::new(
        TokenCodec::from_pem_files(
            &config.jwt_private_key_path,
            &config.jwt_public_key_path,
            config.jwt_issuer.clone(),
            config.jwt_clock_skew_seconds.max(0) as u64,
        )
        .expect("failed to load JWT key material"),
    );

    let object_store = ObjectStoreClient::new(&ObjectStoreConfig {
        endpoint: config.object_store_endpoint.clone(),
        access_key: config.object_store_access_key.clone(),
        secret_key: config.object_store_secret_key.clone(),
        bucket: config.object_store_bucket.clone(),
        region: "us-east-1".to_string(),
        ssl: config.object_store_ssl,
    });

    let policy_engine = Arc::new(
        HttpPolicyTestClient::new(
            config.policy_engine_url.clone(),
            Duration::from_secs(config.policy_engine_timeout_seconds),
        )
        .expect("failed to build policy engine test client"),
    );

    let policies = Arc::new(PgPolicyRepository::new(db_pool.clone()));
    let bundles = Arc::new(PgBundleRepository::new(db_pool.clone()));
    let deployments = Arc::new(PgDeploymentRepository::new(db_pool));

    let builder = Arc::new(BundleBuilderServiceImpl::new(
        policies,
        bundles,
        deployments,
        policy_engine,
        Arc::new(S3BundleBlobStore::new(object_store)),
    ));

    let state = AppState { builder: builder.clone(), token_codec: codec };

    tracing::info!("services initialized");

    let cors = bundle_service_api::cors_layer(&config.allowed_origins);
    let app = bundle_service_api::create_router(state, cors);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!(%addr, "bundle service listening");

    let listener = tokio::net::TcpListener::bind(addr).await.expect("failed to bind listener");
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .await
        .expect("server error");

    builder.shutdown(Duration::from_secs(30)).await;
}
