//! Library surface for the authorization service, exposed so integration
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
/// out from `main` so tests can call it directly against a fake policy
/// client/cache.
pub fn create_router(state: AppState, cors: CorsLayer) -> Router {
    let api_routes = Router::new()
        .route("/api/v1/authorize", post(handlers::authorize))
        .route("/api/v1/authorize/batch", post(handlers::authorize_batch));

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::ready_check))
        .merge(api_routes)
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", openapi::ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
