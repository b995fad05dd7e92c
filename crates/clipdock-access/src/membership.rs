//! Membership lifecycle
//!
//! One row per (user, workspace) pair, upsert semantics. The store is a
//! pure table; [`MembershipManager`] is the mutation surface the rest of
//! the platform calls, adding workspace validation and audit emission.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use clipdock_common::audit::{self, AuditAction, AuditEvent, AuditSink};
use clipdock_common::error::{CoreError, CoreResult};
use clipdock_common::{UserId, WorkspaceId};
use clipdock_tenant::model::WorkspaceKind;
use clipdock_tenant::registry::WorkspaceRegistry;

use crate::rbac::Role;

/// A user's role within one workspace
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Membership {
    pub user_id: UserId,
    pub workspace_id: WorkspaceId,
    pub role: Role,
    /// Denormalized workspace type, for fast filtering
    pub workspace_kind: WorkspaceKind,
    /// Who invited this member, when joined via invite
    pub invited_by: Option<UserId>,
    /// Set once, on first creation
    pub joined_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Upsert request
#[derive(Debug, Clone)]
pub struct MembershipUpsert {
    pub user_id: UserId,
    pub workspace_id: WorkspaceId,
    pub role: Role,
    pub workspace_kind: WorkspaceKind,
    pub invited_by: Option<UserId>,
}

/// Membership table keyed by (user, workspace)
#[derive(Default)]
pub struct MembershipStore {
    rows: DashMap<(UserId, WorkspaceId), Membership>,
}

impl MembershipStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or refresh the (user, workspace) row
    ///
    /// Idempotent: the first call sets `joined_at`; later calls update
    /// role and metadata, refreshing only `updated_at`.
    pub fn upsert(&self, req: MembershipUpsert) -> Membership {
        let now = Utc::now();
        let mut entry = self
            .rows
            .entry((req.user_id, req.workspace_id))
            .or_insert_with(|| Membership {
                user_id: req.user_id,
                workspace_id: req.workspace_id,
                role: req.role,
                workspace_kind: req.workspace_kind,
                invited_by: req.invited_by,
                joined_at: now,
                updated_at: now,
            });
        entry.role = req.role;
        entry.workspace_kind = req.workspace_kind;
        entry.invited_by = req.invited_by;
        entry.updated_at = now;
        entry.clone()
    }

    /// Change the role on an existing row
    pub fn update_role(
        &self,
        user_id: UserId,
        workspace_id: WorkspaceId,
        role: Role,
    ) -> CoreResult<Membership> {
        let mut entry = self
            .rows
            .get_mut(&(user_id, workspace_id))
            .ok_or_else(|| CoreError::not_found("membership"))?;
        entry.role = role;
        entry.updated_at = Utc::now();
        Ok(entry.clone())
    }

    /// Drop the (user, workspace) row
    pub fn remove(&self, user_id: UserId, workspace_id: WorkspaceId) -> CoreResult<Membership> {
        self.rows
            .remove(&(user_id, workspace_id))
            .map(|(_, membership)| membership)
            .ok_or_else(|| CoreError::not_found("membership"))
    }

    /// Row for one (user, workspace) pair
    pub fn get(&self, user_id: UserId, workspace_id: WorkspaceId) -> Option<Membership> {
        self.rows.get(&(user_id, workspace_id)).map(|m| m.clone())
    }

    /// All of a user's memberships, oldest first
    pub fn list_for_user(&self, user_id: UserId) -> Vec<Membership> {
        let mut out: Vec<Membership> = self
            .rows
            .iter()
            .filter(|m| m.user_id == user_id)
            .map(|m| m.clone())
            .collect();
        out.sort_by(|a, b| a.joined_at.cmp(&b.joined_at));
        out
    }

    /// All members of a workspace, oldest first
    pub fn list_for_workspace(&self, workspace_id: WorkspaceId) -> Vec<Membership> {
        let mut out: Vec<Membership> = self
            .rows
            .iter()
            .filter(|m| m.workspace_id == workspace_id)
            .map(|m| m.clone())
            .collect();
        out.sort_by(|a, b| a.joined_at.cmp(&b.joined_at));
        out
    }

    /// Total rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Membership mutation surface
///
/// Validates the target workspace is live before writing (the store
/// itself does not cascade-validate) and emits one audit event per
/// mutation.
pub struct MembershipManager {
    store: Arc<MembershipStore>,
    workspaces: Arc<WorkspaceRegistry>,
    audit: Arc<dyn AuditSink>,
}

impl MembershipManager {
    /// Manager over a store, a workspace registry and an audit sink
    pub fn new(
        store: Arc<MembershipStore>,
        workspaces: Arc<WorkspaceRegistry>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            store,
            workspaces,
            audit,
        }
    }

    /// Add a member or refresh their role
    ///
    /// Fails with `NotFound` when the workspace is absent or soft-deleted.
    pub async fn upsert(
        &self,
        actor: UserId,
        user_id: UserId,
        workspace_id: WorkspaceId,
        role: Role,
    ) -> CoreResult<Membership> {
        let workspace = self
            .workspaces
            .get_live(&workspace_id)
            .ok_or_else(|| CoreError::not_found("workspace"))?;

        let membership = self.store.upsert(MembershipUpsert {
            user_id,
            workspace_id,
            role,
            workspace_kind: workspace.kind,
            invited_by: Some(actor),
        });

        tracing::info!(user = %user_id, workspace = %workspace_id, role = role.as_str(), "membership upserted");
        audit::emit(
            self.audit.as_ref(),
            AuditEvent::new(AuditAction::MembershipUpsert)
                .actor(actor)
                .workspace(workspace_id)
                .resource("membership", user_id)
                .meta("role", role.as_str()),
        );

        Ok(membership)
    }

    /// Change an existing member's role
    pub async fn update_role(
        &self,
        actor: UserId,
        user_id: UserId,
        workspace_id: WorkspaceId,
        role: Role,
    ) -> CoreResult<Membership> {
        let membership = self.store.update_role(user_id, workspace_id, role)?;

        audit::emit(
            self.audit.as_ref(),
            AuditEvent::new(AuditAction::RoleChange)
                .actor(actor)
                .workspace(workspace_id)
                .resource("membership", user_id)
                .meta("role", role.as_str()),
        );

        Ok(membership)
    }

    /// Remove a member
    pub async fn remove(
        &self,
        actor: UserId,
        user_id: UserId,
        workspace_id: WorkspaceId,
    ) -> CoreResult<()> {
        self.store.remove(user_id, workspace_id)?;

        tracing::info!(user = %user_id, workspace = %workspace_id, "membership removed");
        audit::emit(
            self.audit.as_ref(),
            AuditEvent::new(AuditAction::MembershipRemove)
                .actor(actor)
                .workspace(workspace_id)
                .resource("membership", user_id),
        );

        Ok(())
    }

    /// Memberships held by a user
    pub fn list_for_user(&self, user_id: UserId) -> Vec<Membership> {
        self.store.list_for_user(user_id)
    }

    /// Members of a workspace
    pub fn list_for_workspace(&self, workspace_id: WorkspaceId) -> Vec<Membership> {
        self.store.list_for_workspace(workspace_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clipdock_common::audit::MemoryAuditSink;
    use clipdock_tenant::cache::ResolutionCache;
    use clipdock_tenant::registry::NewWorkspace;
    use uuid::Uuid;

    #[test]
    fn test_upsert_is_idempotent() {
        let store = MembershipStore::new();
        let user = Uuid::new_v4();
        let workspace = Uuid::new_v4();
        let inviter = Uuid::new_v4();

        let first = store.upsert(MembershipUpsert {
            user_id: user,
            workspace_id: workspace,
            role: Role::User,
            workspace_kind: WorkspaceKind::Client,
            invited_by: Some(inviter),
        });
        let second = store.upsert(MembershipUpsert {
            user_id: user,
            workspace_id: workspace,
            role: Role::Admin,
            workspace_kind: WorkspaceKind::Client,
            invited_by: Some(inviter),
        });

        assert_eq!(store.len(), 1);
        assert_eq!(second.role, Role::Admin);
        assert_eq!(second.joined_at, first.joined_at);
        assert!(second.updated_at >= first.updated_at);
    }

    #[test]
    fn test_update_role_and_remove() {
        let store = MembershipStore::new();
        let user = Uuid::new_v4();
        let workspace = Uuid::new_v4();

        assert!(matches!(
            store.update_role(user, workspace, Role::Admin),
            Err(CoreError::NotFound(_))
        ));

        store.upsert(MembershipUpsert {
            user_id: user,
            workspace_id: workspace,
            role: Role::User,
            workspace_kind: WorkspaceKind::Client,
            invited_by: None,
        });

        let updated = store.update_role(user, workspace, Role::Owner).unwrap();
        assert_eq!(updated.role, Role::Owner);

        store.remove(user, workspace).unwrap();
        assert!(store.get(user, workspace).is_none());
        assert!(matches!(
            store.remove(user, workspace),
            Err(CoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_listings() {
        let store = MembershipStore::new();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let master = Uuid::new_v4();
        let client = Uuid::new_v4();

        for (user, workspace, kind) in [
            (alice, master, WorkspaceKind::Master),
            (alice, client, WorkspaceKind::Client),
            (bob, client, WorkspaceKind::Client),
        ] {
            store.upsert(MembershipUpsert {
                user_id: user,
                workspace_id: workspace,
                role: Role::User,
                workspace_kind: kind,
                invited_by: None,
            });
        }

        assert_eq!(store.list_for_user(alice).len(), 2);
        assert_eq!(store.list_for_user(bob).len(), 1);
        assert_eq!(store.list_for_workspace(client).len(), 2);
        assert_eq!(store.list_for_workspace(master).len(), 1);
    }

    #[tokio::test]
    async fn test_manager_validates_workspace_and_audits() {
        let sink = Arc::new(MemoryAuditSink::new());
        let registry = Arc::new(WorkspaceRegistry::new(
            Arc::new(ResolutionCache::default()),
            sink.clone(),
        ));
        let manager = MembershipManager::new(
            Arc::new(MembershipStore::new()),
            registry.clone(),
            sink.clone(),
        );
        let actor = Uuid::new_v4();
        let user = Uuid::new_v4();

        // Unknown workspace is rejected before any write
        let err = manager
            .upsert(actor, user, Uuid::new_v4(), Role::User)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));

        let ws = registry
            .create(actor, NewWorkspace::new("Acme", "acme", WorkspaceKind::Client))
            .unwrap();
        let membership = manager.upsert(actor, user, ws.id, Role::User).await.unwrap();
        assert_eq!(membership.workspace_kind, WorkspaceKind::Client);

        manager.update_role(actor, user, ws.id, Role::Admin).await.unwrap();
        assert_eq!(sink.events_for(AuditAction::MembershipUpsert).len(), 1);
        assert_eq!(sink.events_for(AuditAction::RoleChange).len(), 1);

        // Soft-deleted workspaces stop accepting members
        registry.soft_delete(actor, ws.id).unwrap();
        let err = manager
            .upsert(actor, Uuid::new_v4(), ws.id, Role::User)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));
    }
}
