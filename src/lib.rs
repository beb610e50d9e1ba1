pub mod authz;
pub mod config;
pub mod crud;
pub mod errors;
pub mod models;
pub mod obfuscation;
pub mod retry;
pub mod session;

// Re-export commonly used items for tests
pub use authz::PermissionResolver;
pub use crud::crud_config;
pub use errors::{AppError, AppResult};
pub use retry::{with_retry, RetryPolicy};
