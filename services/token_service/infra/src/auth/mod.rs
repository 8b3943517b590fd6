pub mod repository;
pub mod service;

pub use repository::{PgPermissionRepository, PgRoleRepository, PgSubjectRepository, PgTenantRepository};
pub use service::{SessionServiceImpl, TokenLifetimes};
