use authz_service_core::dto::*;
use utoipa::OpenApi;

/// OpenAPI documentation for the authorization decision pipeline.
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::health_check,
        crate::handlers::ready_check,
        crate::handlers::authorize,
        crate::handlers::authorize_batch,
    ),
    components(
        schemas(
            crate::handlers::HealthResp,
            EnvironmentReq,
            AuthorizeReq,
            AuthorizeResp,
            BatchItemReq,
            BatchAuthorizeReq,
        )
    ),
    tags(
        (name = "health", description = "Liveness and readiness endpoints"),
        (name = "authorize", description = "Single and batch authorization decisions"),
    ),
    info(
        title = "Authorization Service API",
        version = "0.1.0",
        description = "Five-layer authorization decision pipeline with decision caching",
    ),
    servers(
        (url = "http://localhost:8002", description = "Local development server"),
    ),
)]
pub struct ApiDoc;
