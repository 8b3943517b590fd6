//! Infrastructure layer for the token lifecycle engine: Postgres-backed
//! repositories and the `SessionService` implementation wiring the IDP,
//! the KV revocation store, and the token codec (§4.2).

pub mod auth;
