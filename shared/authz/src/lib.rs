//! Authorization decision pipeline: the context builder, the policy
//! engine's HTTP client, and the five-layer authorization service that
//! composes their results into a single cached decision (§4.3, §4.4).

pub mod context;
pub mod extractors;
pub mod policy_client;
pub mod service;

pub use context::{
    action_from_method, DecisionInput, DecisionInputBuilder, RequestContext, ResourceContext,
    TenantContext, TimeContext, UserContext,
};
pub use extractors::{
    AdminRole, AuthUser, AuthzChecker, Role, RequireAdmin, RequireRole, SharedAuthzChecker,
    TenantOverride, TokenCodecProvider,
};
pub use policy_client::{HttpPolicyClient, PolicyClient, PolicyEvaluation};
pub use service::{AuthorizationService, BatchDecision, DecisionRequest};
