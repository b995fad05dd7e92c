//! Session assembly
//!
//! Builds the authenticated principal's membership view at issuance or
//! refresh time. The snapshot is the only input request handlers need for
//! role and permission checks; role changes made afterwards become
//! visible on the next assembly, bounded by the session max age.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use clipdock_common::{UserId, WorkspaceId};
use clipdock_tenant::model::WorkspaceKind;
use clipdock_tenant::registry::WorkspaceRegistry;

use crate::membership::MembershipStore;
use crate::rbac::Role;

/// Session tuning
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Upper bound on how long an issued snapshot may be honored
    pub max_age: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_age: Duration::from_secs(30 * 24 * 60 * 60),
        }
    }
}

/// One membership as seen by a session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMembership {
    pub workspace_id: WorkspaceId,
    pub workspace_kind: WorkspaceKind,
    pub role: Role,
    /// For tenant-aware redirects
    pub subdomain: String,
}

/// Point-in-time view of a user's memberships
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub user_id: UserId,
    /// Ordered by join time
    pub memberships: Vec<SessionMembership>,
    pub issued_at: DateTime<Utc>,
    /// issued_at + configured max age
    pub expires_at: DateTime<Utc>,
}

impl SessionSnapshot {
    /// First membership of a workspace type, mirroring area routing
    pub fn membership_for(&self, kind: WorkspaceKind) -> Option<&SessionMembership> {
        self.memberships.iter().find(|m| m.workspace_kind == kind)
    }
}

/// Builds session snapshots from the membership and workspace stores
pub struct SessionAssembler {
    memberships: Arc<MembershipStore>,
    workspaces: Arc<WorkspaceRegistry>,
    config: SessionConfig,
}

impl SessionAssembler {
    /// Assembler over the two stores
    pub fn new(
        memberships: Arc<MembershipStore>,
        workspaces: Arc<WorkspaceRegistry>,
        config: SessionConfig,
    ) -> Self {
        Self {
            memberships,
            workspaces,
            config,
        }
    }

    /// Assemble the membership view for a user
    ///
    /// Reads the workspace store directly (not the TTL cache): issuance
    /// wants fresh subdomains. Memberships whose workspace has been
    /// soft-deleted since joining are skipped.
    pub async fn assemble(&self, user_id: UserId) -> SessionSnapshot {
        let memberships = self
            .memberships
            .list_for_user(user_id)
            .into_iter()
            .filter_map(|m| {
                let workspace = self.workspaces.get_live(&m.workspace_id)?;
                Some(SessionMembership {
                    workspace_id: m.workspace_id,
                    workspace_kind: m.workspace_kind,
                    role: m.role,
                    subdomain: workspace.subdomain,
                })
            })
            .collect();

        let issued_at = Utc::now();
        let expires_at = issued_at
            + chrono::Duration::from_std(self.config.max_age)
                .unwrap_or_else(|_| chrono::Duration::days(30));

        SessionSnapshot {
            user_id,
            memberships,
            issued_at,
            expires_at,
        }
    }
}
