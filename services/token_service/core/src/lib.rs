//! Domain layer for the token lifecycle engine (§4.1, §4.2): the
//! relational entities, repository traits, and the `SessionService`
//! contract the `infra` crate implements and the `api` crate drives.

pub mod domains;
