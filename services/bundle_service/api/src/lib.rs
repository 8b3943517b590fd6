//! Library surface for the policy bundle builder, exposed so integration
//! tests can build a router against fakes without going through `main`.

pub mod handlers;
pub mod openapi;

pub use handlers::AppState;

use axum::http::HeaderValue;
use axum::routing::{get, post};
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
/// out from `main` so tests can call it directly against fake repositories.
pub fn create_router(state: AppState, cors: CorsLayer) -> Router {
    let policy_routes = Router::new()
        .route("/api/v1/policies", get(handlers::list_policies).post(handlers::create_policy))
        .route(
            "/api/v1/policies/{id}",
            get(handlers::get_policy).put(handlers::update_policy).delete(handlers::delete_policy),
        )
        .route("/api/v1/policies/{id}/validate", post(handlers::validate_policy))
        .route("/api/v1/policies/{id}/test", post(handlers::test_policy))
        .route("/api/v1/policies/{id}/publish", post(handlers::publish_policy));

    let bundle_routes = Router::new()
        .route("/api/v1/bundles", get(handlers::list_bundles).post(handlers::create_bundle))
        .route("/api/v1/bundles/{id}", get(handlers::get_bundle).delete(handlers::delete_bundle))
        .route("/api/v1/bundles/{id}/activate", post(handlers::activate_bundle))
        .route("/api/v1/bundles/{id}/deploy", post(handlers::deploy_bundle))
        .route("/api/v1/bundles/{id}/rollback", post(handlers::rollback_bundle))
        .route("/api/v1/bundles/{id}/deployments", get(handlers::list_deployments));

    let api_routes = policy_routes.merge(bundle_routes);

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::ready_check))
        .merge(api_routes)
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", openapi::ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
