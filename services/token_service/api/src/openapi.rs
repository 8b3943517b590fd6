use token_service_core::domains::auth::dto::auth_dto::*;
use token_service_core::domains::auth::dto::role_dto::*;
use token_service_core::domains::auth::dto::tenant_dto::*;
use utoipa::OpenApi;

/// OpenAPI documentation for the token lifecycle engine.
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::health_check,
        crate::handlers::ready_check,
        crate::handlers::register,
        crate::handlers::login,
        crate::handlers::refresh_token,
        crate::handlers::logout,
        crate::handlers::logout_everywhere,
        crate::handlers::change_password,
        crate::handlers::get_me,
        crate::handlers::update_me,
        crate::handlers::delete_me,
        crate::handlers::get_me_permissions,
        crate::handlers::list_users,
        crate::handlers::get_user,
        crate::handlers::delete_user,
        crate::handlers::assign_role,
        crate::handlers::revoke_role,
        crate::handlers::list_roles,
        crate::handlers::create_role,
        crate::handlers::delete_role,
        crate::handlers::list_permissions,
        crate::handlers::create_permission,
        crate::handlers::attach_permission,
        crate::handlers::detach_permission,
        crate::handlers::create_tenant,
        crate::handlers::get_tenant,
        crate::handlers::list_tenants,
        crate::handlers::suspend_tenant,
        crate::handlers::reactivate_tenant,
    ),
    components(
        schemas(
            crate::handlers::HealthResp,
            RegisterReq,
            LoginReq,
            RefreshReq,
            LogoutReq,
            ChangePasswordReq,
            AuthResp,
            UserInfo,
            UserListResp,
            PermissionsResp,
            UpdateUserReq,
            CreateRoleReq,
            RoleResp,
            AssignRoleReq,
            CreatePermissionReq,
            PermissionResp,
            CreateTenantReq,
            TenantResp,
            TenantListResp,
        )
    ),
    tags(
        (name = "health", description = "Liveness and readiness endpoints"),
        (name = "auth", description = "Registration, login, refresh and logout"),
        (name = "users", description = "Self-service and user management endpoints"),
        (name = "admin-roles", description = "Role and role-permission management (admin only)"),
        (name = "admin-permissions", description = "Permission catalog management (admin only)"),
        (name = "admin", description = "Tenant administration endpoints (admin only)"),
    ),
    info(
        title = "Token Service API",
        version = "0.1.0",
        description = "Multi-tenant session and token lifecycle service",
    ),
    servers(
        (url = "http://localhost:8001", description = "Local development server"),
    ),
)]
pub struct ApiDoc;
