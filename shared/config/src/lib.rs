use serde::Deserialize;

/// Process-wide configuration, loaded once at startup and passed by
/// reference into the session, authorization and bundle services rather
/// than read from a global (see DESIGN.md's "global singletons" note).
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // -- Server --
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_app_env")]
    pub app_env: String,
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: String,
    #[serde(default = "default_rate_limit_per_minute")]
    pub rate_limit_per_minute: u32,

    // -- Relational store --
    pub database_url: String,
    #[serde(default = "default_database_max_connections")]
    pub database_max_connections: u32,
    #[serde(default = "default_database_max_idle")]
    pub database_max_idle: u32,

    // -- KV store --
    pub redis_url: Option<String>,

    // -- JWT --
    #[serde(default = "default_jwt_private_key_path")]
    pub jwt_private_key_path: String,
    #[serde(default = "default_jwt_public_key_path")]
    pub jwt_public_key_path: String,
    #[serde(default = "default_jwt_access_expiration_seconds")]
    pub jwt_access_expiration_seconds: i64,
    #[serde(default = "default_jwt_refresh_expiration_seconds")]
    pub jwt_refresh_expiration_seconds: i64,
    #[serde(default = "default_jwt_remember_me_expiration_seconds")]
    pub jwt_remember_me_expiration_seconds: i64,
    #[serde(default = "default_jwt_issuer")]
    pub jwt_issuer: String,
    #[serde(default = "default_jwt_clock_skew_seconds")]
    pub jwt_clock_skew_seconds: i64,

    // -- IDP --
    #[serde(default)]
    pub idp_url: String,
    #[serde(default)]
    pub idp_api_key: String,
    #[serde(default)]
    pub idp_tenant_id: String,
    #[serde(default)]
    pub idp_application_id: String,
    #[serde(default = "default_idp_timeout_seconds")]
    pub idp_timeout_seconds: u64,

    // -- Policy engine --
    #[serde(default)]
    pub policy_engine_url: String,
    #[serde(default = "default_policy_engine_default_path")]
    pub policy_engine_default_path: String,
    #[serde(default = "default_policy_engine_timeout_seconds")]
    pub policy_engine_timeout_seconds: u64,
    #[serde(default = "default_true")]
    pub policy_engine_cache_enable: bool,

    // -- Object store --
    #[serde(default)]
    pub object_store_endpoint: String,
    #[serde(default)]
    pub object_store_access_key: String,
    #[serde(default)]
    pub object_store_secret_key: String,
    #[serde(default = "default_object_store_bucket")]
    pub object_store_bucket: String,
    #[serde(default = "default_true")]
    pub object_store_ssl: bool,

    // -- Decision cache --
    #[serde(default = "default_decision_cache_ttl_seconds")]
    pub decision_cache_ttl_seconds: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    3000
}
fn default_app_env() -> String {
    "development".to_string()
}
fn default_allowed_origins() -> String {
    "*".to_string()
}
fn default_rate_limit_per_minute() -> u32 {
    600
}
fn default_database_max_connections() -> u32 {
    10
}
fn default_database_max_idle() -> u32 {
    2
}
fn default_jwt_private_key_path() -> String {
    "keys/jwt_private.pem".to_string()
}
fn default_jwt_public_key_path() -> String {
    "keys/jwt_public.pem".to_string()
}
fn default_jwt_access_expiration_seconds() -> i64 {
    900
}
fn default_jwt_refresh_expiration_seconds() -> i64 {
    604_800
}
fn default_jwt_remember_me_expiration_seconds() -> i64 {
    2_592_000
}
fn default_jwt_issuer() -> String {
    "heimdall".to_string()
}
fn default_jwt_clock_skew_seconds() -> i64 {
    60
}
fn default_idp_timeout_seconds() -> u64 {
    30
}
fn default_policy_engine_default_path() -> String {
    "heimdall/authz/allow".to_string()
}
fn default_policy_engine_timeout_seconds() -> u64 {
    5
}
fn default_object_store_bucket() -> String {
    "heimdall-bundles".to_string()
}
fn default_decision_cache_ttl_seconds() -> u64 {
    300
}
fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from process environment (and `.env` if present),
    /// exactly the teacher's `dotenvy` + `config` layering.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        let _ = dotenvy::dotenv();

        let builder = config::Config::builder().add_source(config::Environment::default());

        builder.build()?.try_deserialize::<Config>()
    }

    /// A configuration suitable for unit/integration tests: zero clock skew
    /// (per §4.1, tests default to zero leeway) and an in-memory-friendly
    /// decision cache TTL.
    #[cfg(any(test, feature = "test-util"))]
    pub fn test() -> Self {
        Self {
            host: default_host(),
            port: 0,
            app_env: "test".to_string(),
            allowed_origins: "*".to_string(),
            rate_limit_per_minute: default_rate_limit_per_minute(),
            database_url: "postgres://localhost/test".to_string(),
            database_max_connections: 5,
            database_max_idle: 1,
            redis_url: None,
            jwt_private_key_path: default_jwt_private_key_path(),
            jwt_public_key_path: default_jwt_public_key_path(),
            jwt_access_expiration_seconds: 900,
            jwt_refresh_expiration_seconds: 604_800,
            jwt_remember_me_expiration_seconds: 2_592_000,
            jwt_issuer: default_jwt_issuer(),
            jwt_clock_skew_seconds: 0,
            idp_url: "http://localhost:8080".to_string(),
            idp_api_key: "test".to_string(),
            idp_tenant_id: "test".to_string(),
            idp_application_id: "test".to_string(),
            idp_timeout_seconds: 30,
            policy_engine_url: "http://localhost:8181".to_string(),
            policy_engine_default_path: default_policy_engine_default_path(),
            policy_engine_timeout_seconds: 5,
            policy_engine_cache_enable: true,
            object_store_endpoint: "http://localhost:9000".to_string(),
            object_store_access_key: "test".to_string(),
            object_store_secret_key: "test".to_string(),
            object_store_bucket: default_object_store_bucket(),
            object_store_ssl: false,
            decision_cache_ttl_seconds: 300,
        }
    }
}
