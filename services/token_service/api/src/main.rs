use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use shared_idp_client::HttpIdpClient;
use shared_jwt::TokenCodec;
use shared_kv::RedisKvStore;
use shared_rate_limit::config::RateLimitConfig;
use shared_rate_limit::middleware::RateLimitState;

use token_service_api::handlers::AppState;
use token_service_infra::auth::{
    PgPermissionRepository, PgRoleRepository, PgSubjectRepository, PgTenantRepository, SessionServiceImpl,
    TokenLifetimes,
};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).json().init();

    tracing::info!("token service starting");

    let config = shared_config::Config::from_env().expect("failed to load configuration");

    let db_pool =
        shared_db::init_pool(&config.database_url, config.database_max_connections, config.database_max_idle)
            .await
            .expect("failed to connect to database");
    tracing::info!("database connected");

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

    let idp = Arc::new(
        HttpIdpClient::new(
            config.idp_url.clone(),
            config.idp_api_key.clone(),
            config.idp_tenant_id.clone(),
            config.idp_application_id.clone(),
            Duration::from_secs(config.idp_timeout_seconds),
        )
        .expect("failed to build IDP client"),
    );

    let rate_limit = Arc::new(
        RateLimitState::from_config(RateLimitConfig { redis_url: config.redis_url.clone(), ..Default::default() })
            .await,
    );

    let tenants = Arc::new(PgTenantRepository::new(db_pool.clone()));
    let subjects = Arc::new(PgSubjectRepository::new(db_pool.clone()));
    let roles = Arc::new(PgRoleRepository::new(db_pool.clone()));
    let permissions = Arc::new(PgPermissionRepository::new(db_pool.clone()));

    let lifetimes = TokenLifetimes {
        access_seconds: config.jwt_access_expiration_seconds,
        refresh_seconds: config.jwt_refresh_expiration_seconds,
        remember_me_seconds: config.jwt_remember_me_expiration_seconds,
    };

    let session_service = Arc::new(SessionServiceImpl::new(
        tenants.clone(),
        subjects,
        roles.clone(),
        idp,
        kv_store.clone(),
        kv_store,
        codec,
        rate_limit,
        lifetimes,
    ));

    let state = AppState { session_service, roles, permissions };

    tracing::info!("services initialized");

    let cors = token_service_api::cors_layer(&config.allowed_origins);
    let app = token_service_api::create_router(state, cors);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!(%addr, "token service listening");

    let listener = tokio::net::TcpListener::bind(addr).await.expect("failed to bind listener");
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .await
        .expect("server error");
}
