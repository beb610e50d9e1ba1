use serde::{Deserialize, Serialize};

use super::condition::ConditionContext;
use super::resolver::{PermissionResolver, DEFAULT_ACTION};

/// Declarative gate attached to a route, menu entry or button.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Guard {
    Permission { id: String },
    AnyOf { ids: Vec<String> },
    AllOf { ids: Vec<String> },
    Resource {
        resource: String,
        #[serde(default = "default_action")]
        action: String,
    },
    Role { id: String },
    AnyRole { ids: Vec<String> },
}

fn default_action() -> String {
    DEFAULT_ACTION.to_string()
}

impl Guard {
    pub fn permission(id: impl Into<String>) -> Self {
        Guard::Permission { id: id.into() }
    }

    pub fn resource(resource: impl Into<String>, action: impl Into<String>) -> Self {
        Guard::Resource {
            resource: resource.into(),
            action: action.into(),
        }
    }

    pub fn role(id: impl Into<String>) -> Self {
        Guard::Role { id: id.into() }
    }
}

impl PermissionResolver {
    /// Whether the guarded element should be rendered for the current user.
    pub fn should_show(&self, guard: &Guard, context: Option<&ConditionContext>) -> bool {
        if self.user().is_none() {
            return false;
        }
        match guard {
            Guard::Permission { id } => self.has_permission(id, None, context),
            Guard::AnyOf { ids } => self.has_any_permission(ids, None, context),
            Guard::AllOf { ids } => self.has_all_permissions(ids, None, context),
            Guard::Resource { resource, action } => self.can_access_with(resource, action, context),
            Guard::Role { id } => self.has_role(id),
            Guard::AnyRole { ids } => self.has_any_role(ids),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Permission, Role, User};
    use serde_json::json;

    fn resolver() -> PermissionResolver {
        PermissionResolver::new(
            Some(User::new("u1").with_roles(["clerk"])),
            vec![Role::new("clerk", "Clerk").with_permissions(["position.read", "position.create"])],
            vec![
                Permission::new("position.read", "Read", "position", "read"),
                Permission::new("position.create", "Create", "position", "create"),
            ],
        )
    }

    #[test]
    fn guards_from_route_config() {
        let guards: Vec<Guard> = serde_json::from_value(json!([
            {"kind": "permission", "id": "position.read"},
            {"kind": "all_of", "ids": ["position.read", "position.delete"]},
            {"kind": "any_of", "ids": ["position.read", "position.delete"]},
            {"kind": "resource", "resource": "position"},
            {"kind": "resource", "resource": "position", "action": "delete"},
            {"kind": "role", "id": "clerk"},
            {"kind": "any_role", "ids": ["admin"]}
        ]))
        .expect("valid guards");

        let resolver = resolver();
        let shown: Vec<bool> = guards.iter().map(|g| resolver.should_show(g, None)).collect();
        assert_eq!(shown, vec![true, false, true, true, false, true, false]);
    }

    #[test]
    fn nothing_shows_without_a_user() {
        let mut resolver = resolver();
        resolver.set_user(None);
        assert!(!resolver.should_show(&Guard::permission("position.read"), None));
        assert!(!resolver.should_show(&Guard::resource("position", "read"), None));
        assert!(!resolver.should_show(&Guard::role("clerk"), None));
        assert!(!resolver.should_show(&Guard::AllOf { ids: vec![] }, None));
    }
}
