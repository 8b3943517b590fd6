//! Request/response shapes for the authorization service's HTTP surface,
//! and the translation from wire shape to `shared_authz::DecisionInput`.

pub mod dto;
