use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::authz::ConditionMap;
use crate::errors::{AppError, AppResult};

// =============================================================================
// PERMISSION
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Permission {
    pub id: String,
    pub name: String,
    pub resource: String,
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditions: Option<ConditionMap>,
}

impl Permission {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        resource: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            resource: resource.into(),
            action: action.into(),
            conditions: None,
        }
    }

    pub fn with_conditions(mut self, conditions: ConditionMap) -> Self {
        self.conditions = Some(conditions);
        self
    }

    /// An empty condition map gates nothing.
    pub fn is_conditional(&self) -> bool {
        self.conditions.as_ref().is_some_and(|c| !c.is_empty())
    }

    pub fn targets(&self, resource: &str, action: &str) -> bool {
        self.resource == resource && self.action == action
    }
}

// =============================================================================
// ROLE
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Role {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub permissions: Vec<String>,
}

impl Role {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            permissions: Vec::new(),
        }
    }

    pub fn with_permissions<I, S>(mut self, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.permissions = permissions.into_iter().map(Into::into).collect();
        self
    }
}

// =============================================================================
// USER
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub roles: Vec<String>,
    /// Direct grants on top of what the roles give.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<Vec<String>>,
}

impl User {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            roles: Vec::new(),
            permissions: None,
        }
    }

    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles = roles.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_permissions<I, S>(mut self, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.permissions = Some(permissions.into_iter().map(Into::into).collect());
        self
    }

    pub fn direct_permissions(&self) -> &[String] {
        self.permissions.as_deref().unwrap_or_default()
    }
}

// =============================================================================
// POLICY SNAPSHOT
// =============================================================================

/// Everything the resolver needs, as one JSON document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicySnapshot {
    #[serde(default)]
    pub user: Option<User>,
    #[serde(default)]
    pub roles: Vec<Role>,
    #[serde(default)]
    pub permissions: Vec<Permission>,
}

impl PolicySnapshot {
    pub fn from_json(raw: &str) -> AppResult<Self> {
        let de = &mut serde_json::Deserializer::from_str(raw);
        serde_path_to_error::deserialize(de).map_err(|err| {
            AppError::decode(format!("invalid policy at `{}`: {}", err.path(), err.inner()))
        })
    }

    pub fn load(path: &Path) -> AppResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|err| {
            AppError::bad_request(format!("cannot read policy {}: {err}", path.display()))
        })?;
        Self::from_json(&raw)
    }
}
