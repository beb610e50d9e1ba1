use std::collections::HashSet;

use crate::models::{Permission, PolicySnapshot, Role, User};

use super::condition::ConditionContext;

/// Action assumed by [`PermissionResolver::can_read`].
pub const DEFAULT_ACTION: &str = "read";

/// A resource + action pair a permission may be looked up by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Target<'a> {
    pub resource: &'a str,
    pub action: &'a str,
}

impl<'a> Target<'a> {
    pub fn new(resource: &'a str, action: &'a str) -> Self {
        Self { resource, action }
    }
}

/// Union of the permissions of every role the user holds and the user's
/// direct grants. Unknown role ids contribute nothing.
pub fn resolve(user: Option<&User>, roles: &[Role]) -> HashSet<String> {
    let Some(user) = user else {
        return HashSet::new();
    };

    let mut resolved: HashSet<String> = roles
        .iter()
        .filter(|role| user.roles.iter().any(|id| id == &role.id))
        .flat_map(|role| role.permissions.iter().cloned())
        .collect();
    resolved.extend(user.direct_permissions().iter().cloned());
    resolved
}

/// Answers permission and role queries for one user.
///
/// The resolved set is recomputed whenever the user or the role list is
/// replaced; permission definitions are only consulted at check time.
#[derive(Debug, Clone, Default)]
pub struct PermissionResolver {
    user: Option<User>,
    roles: Vec<Role>,
    permissions: Vec<Permission>,
    resolved: HashSet<String>,
}

impl PermissionResolver {
    pub fn new(user: Option<User>, roles: Vec<Role>, permissions: Vec<Permission>) -> Self {
        let resolved = resolve(user.as_ref(), &roles);
        Self {
            user,
            roles,
            permissions,
            resolved,
        }
    }

    pub fn from_snapshot(snapshot: PolicySnapshot) -> Self {
        Self::new(snapshot.user, snapshot.roles, snapshot.permissions)
    }

    pub fn set_user(&mut self, user: Option<User>) {
        self.user = user;
        self.recompute();
    }

    pub fn set_roles(&mut self, roles: Vec<Role>) {
        self.roles = roles;
        self.recompute();
    }

    pub fn set_permissions(&mut self, permissions: Vec<Permission>) {
        self.permissions = permissions;
    }

    fn recompute(&mut self) {
        self.resolved = resolve(self.user.as_ref(), &self.roles);
        tracing::debug!(
            user_id = self.user.as_ref().map(|u| u.id.as_str()).unwrap_or("-"),
            resolved = self.resolved.len(),
            "permission set recomputed"
        );
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn resolved_permissions(&self) -> &HashSet<String> {
        &self.resolved
    }

    pub fn permission(&self, permission_id: &str) -> Option<&Permission> {
        self.permissions.iter().find(|p| p.id == permission_id)
    }

    pub fn has_permission(
        &self,
        permission_id: &str,
        target: Option<Target<'_>>,
        context: Option<&ConditionContext>,
    ) -> bool {
        if self.user.is_none() {
            return false;
        }

        if self.resolved.contains(permission_id) {
            return match self.permission(permission_id) {
                Some(permission) => conditions_hold(permission, context),
                // Granted ids without a definition carry no conditions.
                None => true,
            };
        }

        match target {
            Some(target) => self.grants_target(target, context),
            None => false,
        }
    }

    /// Resource + action lookup: the first resolved definition for the pair
    /// decides.
    fn grants_target(&self, target: Target<'_>, context: Option<&ConditionContext>) -> bool {
        self.permissions
            .iter()
            .find(|p| p.targets(target.resource, target.action) && self.resolved.contains(&p.id))
            .is_some_and(|permission| conditions_hold(permission, context))
    }

    pub fn has_any_permission<I, S>(
        &self,
        permission_ids: I,
        target: Option<Target<'_>>,
        context: Option<&ConditionContext>,
    ) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        permission_ids
            .into_iter()
            .any(|id| self.has_permission(id.as_ref(), target, context))
    }

    pub fn has_all_permissions<I, S>(
        &self,
        permission_ids: I,
        target: Option<Target<'_>>,
        context: Option<&ConditionContext>,
    ) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        permission_ids
            .into_iter()
            .all(|id| self.has_permission(id.as_ref(), target, context))
    }

    pub fn can_access(&self, resource: &str, action: &str) -> bool {
        self.can_access_with(resource, action, None)
    }

    pub fn can_access_with(
        &self,
        resource: &str,
        action: &str,
        context: Option<&ConditionContext>,
    ) -> bool {
        self.user.is_some() && self.grants_target(Target::new(resource, action), context)
    }

    pub fn can_read(&self, resource: &str) -> bool {
        self.can_access(resource, DEFAULT_ACTION)
    }

    /// Same as [`has_permission`](Self::has_permission), calling `on_denied`
    /// with the permission id before returning `false`.
    pub fn check_permission<F>(
        &self,
        permission_id: &str,
        target: Option<Target<'_>>,
        context: Option<&ConditionContext>,
        on_denied: F,
    ) -> bool
    where
        F: FnOnce(&str),
    {
        let allowed = self.has_permission(permission_id, target, context);
        if !allowed {
            tracing::debug!(
                user_id = self.user.as_ref().map(|u| u.id.as_str()).unwrap_or("-"),
                permission = %permission_id,
                "permission denied"
            );
            on_denied(permission_id);
        }
        allowed
    }

    pub fn permissions_for_resource(&self, resource: &str) -> Vec<&Permission> {
        self.permissions
            .iter()
            .filter(|p| p.resource == resource && self.resolved.contains(&p.id))
            .collect()
    }

    pub fn user_roles(&self) -> Vec<&Role> {
        let Some(user) = self.user.as_ref() else {
            return Vec::new();
        };
        self.roles
            .iter()
            .filter(|role| user.roles.contains(&role.id))
            .collect()
    }

    pub fn has_role(&self, role_id: &str) -> bool {
        self.user
            .as_ref()
            .is_some_and(|user| user.roles.iter().any(|id| id == role_id))
    }

    pub fn has_any_role<I, S>(&self, role_ids: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        role_ids.into_iter().any(|id| self.has_role(id.as_ref()))
    }
}

fn conditions_hold(permission: &Permission, context: Option<&ConditionContext>) -> bool {
    match permission.conditions.as_ref() {
        Some(conditions) if !conditions.is_empty() => match context {
            Some(context) => conditions.evaluate(context),
            None => conditions.evaluate(&ConditionContext::new()),
        },
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::{Condition, ConditionMap};
    use serde_json::json;

    fn fixture() -> (Vec<Role>, Vec<Permission>) {
        let roles = vec![
            Role::new("editor", "Editor").with_permissions(["doc.read", "doc.update", "doc.read"]),
            Role::new("viewer", "Viewer").with_permissions(["doc.read"]),
        ];
        let permissions = vec![
            Permission::new("doc.read", "Read", "identity_document", "read"),
            Permission::new("doc.update", "Update", "identity_document", "update"),
            Permission::new("adult.only", "Adults", "position", "read").with_conditions(
                ConditionMap::new().with("age", Condition::GreaterThan(json!(18))),
            ),
        ];
        (roles, permissions)
    }

    #[test]
    fn resolution_deduplicates_across_roles_and_grants() {
        let (roles, _) = fixture();
        let user = User::new("u1")
            .with_roles(["editor", "viewer", "ghost"])
            .with_permissions(["doc.read", "repo.read"]);
        let resolved = resolve(Some(&user), &roles);

        let mut ids: Vec<_> = resolved.into_iter().collect();
        ids.sort();
        assert_eq!(ids, vec!["doc.read", "doc.update", "repo.read"]);
    }

    #[test]
    fn absent_user_denies_everything() {
        let (roles, permissions) = fixture();
        let resolver = PermissionResolver::new(None, roles, permissions);

        assert!(resolver.resolved_permissions().is_empty());
        assert!(!resolver.has_permission("doc.read", None, None));
        assert!(!resolver.has_permission("", Some(Target::new("identity_document", "read")), None));
        assert!(!resolver.can_read("identity_document"));
        assert!(resolver.user_roles().is_empty());
    }

    #[test]
    fn resource_action_fallback() {
        let (roles, permissions) = fixture();
        let resolver = PermissionResolver::new(
            Some(User::new("u1").with_roles(["viewer"])),
            roles,
            permissions,
        );

        assert!(resolver.has_permission("unknown", Some(Target::new("identity_document", "read")), None));
        assert!(!resolver.has_permission("unknown", Some(Target::new("identity_document", "update")), None));
        assert!(resolver.can_read("identity_document"));
        assert!(!resolver.can_access("identity_document", "update"));
    }

    #[test]
    fn conditional_permission_uses_context() {
        let (roles, permissions) = fixture();
        let resolver = PermissionResolver::new(
            Some(User::new("u1").with_permissions(["adult.only"])),
            roles,
            permissions,
        );

        let minor = json!({"age": 17}).as_object().cloned().unwrap_or_default();
        let adult = json!({"age": 19}).as_object().cloned().unwrap_or_default();
        assert!(!resolver.has_permission("adult.only", None, Some(&minor)));
        assert!(resolver.has_permission("adult.only", None, Some(&adult)));
        assert!(!resolver.has_permission("adult.only", None, None));
        assert!(resolver.can_access_with("position", "read", Some(&adult)));
        assert!(!resolver.can_access("position", "read"));
    }

    #[test]
    fn recomputes_when_inputs_change() {
        let (roles, permissions) = fixture();
        let mut resolver = PermissionResolver::new(
            Some(User::new("u1").with_roles(["viewer"])),
            roles,
            permissions,
        );
        assert!(!resolver.has_permission("doc.update", None, None));

        resolver.set_user(Some(User::new("u1").with_roles(["editor"])));
        assert!(resolver.has_permission("doc.update", None, None));

        resolver.set_roles(vec![Role::new("editor", "Editor")]);
        assert!(!resolver.has_permission("doc.update", None, None));
    }

    #[test]
    fn check_permission_reports_denials() {
        let (roles, permissions) = fixture();
        let resolver = PermissionResolver::new(
            Some(User::new("u1").with_roles(["viewer"])),
            roles,
            permissions,
        );

        let mut denied = Vec::new();
        assert!(resolver.check_permission("doc.read", None, None, |id| denied.push(id.to_string())));
        assert!(!resolver.check_permission("doc.update", None, None, |id| denied.push(id.to_string())));
        assert_eq!(denied, vec!["doc.update"]);
    }

    #[test]
    fn roles_and_resource_listing() {
        let (roles, permissions) = fixture();
        let resolver = PermissionResolver::new(
            Some(User::new("u1").with_roles(["editor"])),
            roles,
            permissions,
        );

        let names: Vec<_> = resolver.user_roles().iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Editor"]);
        assert!(resolver.has_role("editor"));
        assert!(resolver.has_any_role(["admin", "editor"]));
        assert!(!resolver.has_any_role(Vec::<String>::new()));

        let ids: Vec<_> = resolver
            .permissions_for_resource("identity_document")
            .iter()
            .map(|p| p.id.as_str())
            .collect();
        assert_eq!(ids, vec!["doc.read", "doc.update"]);
        assert!(resolver.permissions_for_resource("position").is_empty());
    }
}
