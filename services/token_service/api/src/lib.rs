//! Library surface for the token lifecycle engine, exposed so integration
//! tests can build a router against a test database/config without going
//! through `main`.

pub mod extractors;
pub mod handlers;
pub mod openapi;

pub use handlers::AppState;

use axum::http::HeaderValue;
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Builds a CORS layer from the comma-separated `allowed_origins` config
/// value, falling back to `AllowOrigin::any()` for `"*"` or an empty value.
pub fn cors_layer(allowed_origins: &str) -> CorsLayer {
    let origins: Vec<&str> = allowed_origins.split(',').map(str::trim).filter(|s| !s.is_empty()).collect();
    let allow_origin = if origins.is_empty() || origins.contains(&"*") {
        AllowOrigin::any()
    } else {
        let values: Vec<HeaderValue> =
            origins.into_iter().filter_map(|origin| HeaderValue::from_str(origin).ok()).collect();
        AllowOrigin::list(values)
    };
    CorsLayer::new().allow_origin(allow_origin)
}

/// Builds the full router from an already-assembled [`AppState`]. Split
/// out from `main` so tests can call it directly against a test database.
pub fn create_router(state: AppState, cors: CorsLayer) -> Router {
    let auth_routes = Router::new()
        .route("/api/v1/auth/register", post(handlers::register))
        .route("/api/v1/auth/login", post(handlers::login))
        .route("/api/v1/auth/refresh", post(handlers::refresh_token))
        .route("/api/v1/auth/logout", post(handlers::logout))
        .route("/api/v1/auth/logout-all", post(handlers::logout_everywhere))
        .route("/api/v1/auth/password/change", post(handlers::change_password));

    let user_routes = Router::new()
        .route(
            "/api/v1/users/me",
            get(handlers::get_me).patch(handlers::update_me).delete(handlers::delete_me),
        )
        .route("/api/v1/users/me/permissions", get(handlers::get_me_permissions))
        .route("/api/v1/users", get(handlers::list_users))
        .route("/api/v1/users/{id}", get(handlers::get_user).delete(handlers::delete_user))
        .route("/api/v1/users/{id}/roles", post(handlers::assign_role))
        .route("/api/v1/users/{id}/roles/{role_id}", delete(handlers::revoke_role));

    let role_routes = Router::new()
        .route("/api/v1/roles", get(handlers::list_roles).post(handlers::create_role))
        .route("/api/v1/roles/{id}", delete(handlers::delete_role))
        .route("/api/v1/permissions", get(handlers::list_permissions).post(handlers::create_permission))
        .route(
            "/api/v1/roles/{role_id}/permissions/{permission_id}",
            post(handlers::attach_permission).delete(handlers::detach_permission),
        );

    let tenant_routes = Router::new()
        .route("/api/v1/tenants", get(handlers::list_tenants).post(handlers::create_tenant))
        .route("/api/v1/tenants/{id}", get(handlers::get_tenant))
        .route("/api/v1/tenants/{id}/suspend", post(handlers::suspend_tenant))
        .route("/api/v1/tenants/{id}/reactivate", post(handlers::reactivate_tenant));

    let api_routes = auth_routes.merge(user_routes).merge(role_routes).merge(tenant_routes);

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::ready_check))
        .merge(api_routes)
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", openapi::ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
