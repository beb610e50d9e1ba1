//! Authorization - condition evaluation and permission resolution
//!
//! This module answers "may the current user do X" for the console:
//! - Role-based permissions flattened into a resolved set
//! - Direct user grants
//! - Per-access condition maps (`$gt`, `$lt`, `$in`, `$nin`, equality, membership)
//! - Declarative guards for routes, menus and buttons

mod condition;
mod guard;
mod resolver;

pub use condition::{evaluate, Condition, ConditionContext, ConditionMap};
pub use guard::Guard;
pub use resolver::{resolve, PermissionResolver, Target, DEFAULT_ACTION};

/// Well-known role ids
pub mod roles {
    pub const ADMIN: &str = "admin";
    pub const MASTER_DATA_EDITOR: &str = "master_data_editor";
    pub const VIEWER: &str = "viewer";
}

/// Well-known permission ids
pub mod permissions {
    // Identity documents
    pub const IDENTITY_DOCUMENT_CREATE: &str = "identity_document.create";
    pub const IDENTITY_DOCUMENT_READ: &str = "identity_document.read";
    pub const IDENTITY_DOCUMENT_UPDATE: &str = "identity_document.update";
    pub const IDENTITY_DOCUMENT_DELETE: &str = "identity_document.delete";

    // Positions
    pub const POSITION_CREATE: &str = "position.create";
    pub const POSITION_READ: &str = "position.read";
    pub const POSITION_UPDATE: &str = "position.update";
    pub const POSITION_DELETE: &str = "position.delete";

    // Repositories
    pub const REPOSITORY_CREATE: &str = "repository.create";
    pub const REPOSITORY_READ: &str = "repository.read";
    pub const REPOSITORY_UPDATE: &str = "repository.update";
    pub const REPOSITORY_DELETE: &str = "repository.delete";

    // Roles
    pub const ROLE_READ: &str = "role.read";
    pub const ROLE_MANAGE: &str = "role.manage";

    // Dashboard
    pub const DASHBOARD_VIEW: &str = "dashboard.view";
}
