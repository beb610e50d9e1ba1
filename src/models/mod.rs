pub mod masterdata;
pub mod rbac;

pub use masterdata::{IdentityDocument, Position, Repository};
pub use rbac::{Permission, PolicySnapshot, Role, User};
