use bundle_service_core::domains::bundle::dto::bundle_dto::*;
use bundle_service_core::domains::bundle::dto::policy_dto::*;
use utoipa::OpenApi;

/// OpenAPI documentation for the policy bundle builder.
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::health_check,
        crate::handlers::ready_check,
        crate::handlers::create_policy,
        crate::handlers::list_policies,
        crate::handlers::get_policy,
        crate::handlers::update_policy,
        crate::handlers::delete_policy,
        crate::handlers::validate_policy,
        crate::handlers::test_policy,
        crate::handlers::publish_policy,
        crate::handlers::create_bundle,
        crate::handlers::list_bundles,
        crate::handlers::get_bundle,
        crate::handlers::delete_bundle,
        crate::handlers::activate_bundle,
        crate::handlers::deploy_bundle,
        crate::handlers::rollback_bundle,
        crate::handlers::list_deployments,
    ),
    components(
        schemas(
            crate::handlers::HealthResp,
            CreatePolicyReq,
            UpdatePolicyReq,
            PolicyResp,
            PolicyListResp,
            PolicyValidationResp,
            PolicyTestCaseResult,
            PolicyTestResp,
            CreateBundleReq,
            BundleResp,
            BundleListResp,
            DeployBundleReq,
            RollbackBundleReq,
            DeploymentResp,
        )
    ),
    tags(
        (name = "health", description = "Liveness and readiness endpoints"),
        (name = "policies", description = "Policy document CRUD, validation, testing and publishing"),
        (name = "bundles", description = "Bundle creation, activation, deployment and rollback"),
    ),
    info(
        title = "Bundle Builder Service API",
        version = "0.1.0",
        description = "Policy bundle build, activation, deployment and rollback service",
    ),
    servers(
        (url = "http://localhost:8003", description = "Local development server"),
    ),
)]
pub struct ApiDoc;
