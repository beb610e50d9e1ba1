use serde::{Deserialize, Serialize};

use crate::crud::Entity;
use crate::models::rbac::Role;

// =============================================================================
// IDENTITY DOCUMENT
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityDocument {
    pub code: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub active: bool,
}

impl Entity for IdentityDocument {
    const NAME: &'static str = "identity_document";
    const PATH: &'static str = "identity-documents";
    const IDENTITY_FIELDS: &'static [&'static str] = &["code"];
}

// =============================================================================
// POSITION
// =============================================================================

/// Positions are numbered per company, so the key is composite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub company: String,
    pub code: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(default)]
    pub active: bool,
}

impl Entity for Position {
    const NAME: &'static str = "position";
    const PATH: &'static str = "positions";
    const IDENTITY_FIELDS: &'static [&'static str] = &["company", "code"];
}

// =============================================================================
// REPOSITORY
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Repository {
    pub code: String,
    pub name: String,
    pub location: String,
    #[serde(default)]
    pub active: bool,
}

impl Entity for Repository {
    const NAME: &'static str = "repository";
    const PATH: &'static str = "repositories";
    const IDENTITY_FIELDS: &'static [&'static str] = &["code"];
}

// Roles are maintained through the same CRUD screens.
impl Entity for Role {
    const NAME: &'static str = "role";
    const PATH: &'static str = "roles";
    const IDENTITY_FIELDS: &'static [&'static str] = &["id"];
}
