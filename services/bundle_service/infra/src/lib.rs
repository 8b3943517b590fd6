//! Infrastructure layer for the policy bundle builder: Postgres-backed
//! repositories, the archive format, and the `BundleBuilderService`
//! implementation wiring the policy test engine and object store (§4.5).

pub mod bundle;
