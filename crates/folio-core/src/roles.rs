//! Workspace role lookup

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::error::Result;
use crate::models::{Role, UserId, WorkspaceId};

/// Source of workspace membership roles
pub trait RoleLookup: Send + Sync {
    /// Role of `user_id` in `workspace_id`, or `None` for non-members
    fn role_of(&self, workspace_id: &WorkspaceId, user_id: &UserId) -> Result<Option<Role>>;
}

/// Resolve a user's effective role; non-members and lookup failures are viewers.
pub fn effective_role(
    lookup: &dyn RoleLookup,
    workspace_id: &WorkspaceId,
    user_id: &UserId,
) -> Role {
    match lookup.role_of(workspace_id, user_id) {
        Ok(role) => role.unwrap_or_default(),
        Err(e) => {
            tracing::warn!(
                workspace = %workspace_id,
                user = %user_id,
                "Role lookup failed, treating as viewer: {e}"
            );
            Role::default()
        }
    }
}

/// In-memory membership table
#[derive(Debug, Default)]
pub struct MemberDirectory {
    members: RwLock<HashMap<(WorkspaceId, UserId), Role>>,
}

impl MemberDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a member or change their role
    pub fn set_role(&self, workspace_id: WorkspaceId, user_id: UserId, role: Role) {
        self.members.write().insert((workspace_id, user_id), role);
    }

    /// Remove a member; returns their previous role
    pub fn remove(&self, workspace_id: &WorkspaceId, user_id: &UserId) -> Option<Role> {
        self.members
            .write()
            .remove(&(workspace_id.clone(), user_id.clone()))
    }
}

impl RoleLookup for MemberDirectory {
    fn role_of(&self, workspace_id: &WorkspaceId, user_id: &UserId) -> Result<Option<Role>> {
        Ok(self
            .members
            .read()
            .get(&(workspace_id.clone(), user_id.clone()))
            .copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    struct BrokenLookup;

    impl RoleLookup for BrokenLookup {
        fn role_of(&self, _: &WorkspaceId, _: &UserId) -> Result<Option<Role>> {
            Err(Error::Database("membership store offline".to_string()))
        }
    }

    #[test]
    fn test_member_roles() {
        let directory = MemberDirectory::new();
        let ws = WorkspaceId::new("ws");
        let alice = UserId::new("alice");
        directory.set_role(ws.clone(), alice.clone(), Role::Owner);

        assert_eq!(effective_role(&directory, &ws, &alice), Role::Owner);
        assert_eq!(
            effective_role(&directory, &WorkspaceId::new("other"), &alice),
            Role::Viewer
        );

        assert_eq!(directory.remove(&ws, &alice), Some(Role::Owner));
        assert_eq!(effective_role(&directory, &ws, &alice), Role::Viewer);
    }

    #[test]
    fn test_lookup_failure_is_lowest_privilege() {
        let role = effective_role(&BrokenLookup, &WorkspaceId::new("ws"), &UserId::new("bob"));
        assert_eq!(role, Role::Viewer);
    }
}
