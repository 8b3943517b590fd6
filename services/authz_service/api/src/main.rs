use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use shared_jwt::TokenCodec;
use shared_kv::RedisKvStore;

use authz_service_api::handlers::AppState;
use authz_service_infra::build_authorization_service;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).json().init();

    tracing::info!("authz service starting");

    let config = shared_config::Config::from_env().expect("failed to load configuration");

    let redis_url = config.redis_url.clone().expect("REDIS_URL is required");
    let kv_store = Arc::new(RedisKvStore::connect(&redis_url).await.expect("failed to connect to redis"));
    tracing::info!("redis connected");

    let codec = Arc::new(
        TokenCodec::from_pem_files(
            &config.jwt_private_key_path,
            &config.jwt_public_key_path,
            config.jwt_issuer.clone(),
            config.jwt_clock_skew_seconds.max(0) as u64,
        )
        .expect("failed to load JWT key material"),
    );

    let authorization = Arc::new(
        build_authorization_service(
            config.policy_engine_url.clone(),
            Duration::from_secs(config.policy_engine_timeout_seconds),
            config.policy_engine_default_path.clone(),
            Duration::from_secs(config.decision_cache_ttl_seconds),
            kv_store,
        )
        .expect("failed to build authorization service"),
    );

    let state = AppState { authorization, token_codec: codec };

    tracing::info!("services initialized");

    let cors = authz_service_api::cors_layer(&config.allowed_origins);
    let app = authz_service_api::create_router(state, cors);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!(%addr, "authz service listening");

    let listener = tokio::net::TcpListener::bind(addr).await.expect("failed to bind listener");
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .await
        .expect("server error");
}
