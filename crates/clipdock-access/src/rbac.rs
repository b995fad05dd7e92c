//! Role/Permission Engine
//!
//! Pure, stateless evaluation of the role hierarchy and the per-workspace-
//! type permission matrix. The matrix is the single source of truth: no
//! fallback, no inheritance across workspace types, default-deny for
//! anything it does not grant.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use clipdock_common::error::{CoreError, CoreResult};
use clipdock_tenant::model::WorkspaceKind;

/// Membership role, a strict total order: OWNER > ADMIN > USER > VIEW_ONLY
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Owner,
    Admin,
    User,
    ViewOnly,
}

impl Role {
    /// All roles, for exhaustive table checks
    pub const ALL: [Role; 4] = [Role::Owner, Role::Admin, Role::User, Role::ViewOnly];

    /// Position in the hierarchy; higher outranks lower
    pub fn rank(self) -> u8 {
        match self {
            Self::Owner => 3,
            Self::Admin => 2,
            Self::User => 1,
            Self::ViewOnly => 0,
        }
    }

    /// Wire name, as stored by the platform
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Owner => "OWNER",
            Self::Admin => "ADMIN",
            Self::User => "USER",
            Self::ViewOnly => "VIEW_ONLY",
        }
    }
}

/// Coarse gate: does `current` sit at or above `required`?
pub fn has_role(current: Role, required: Role) -> bool {
    current.rank() >= required.rank()
}

/// Named capability, granted per (workspace type, role)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Permission {
    GlobalSettings,
    ManageClients,
    ManageClippers,
    Billing,
    AnalyticsGlobal,
    AnalyticsClient,
    ContentManage,
    ContentApprove,
    TaskManage,
    InviteUsers,
    WorkspaceSettings,
    ApiFull,
    ApiLimited,
    ApiUploads,
    ViewTenants,
    ViewClippers,
    AdminTools,
}

impl Permission {
    /// All permissions, for closed-world checks
    pub const ALL: [Permission; 17] = [
        Permission::GlobalSettings,
        Permission::ManageClients,
        Permission::ManageClippers,
        Permission::Billing,
        Permission::AnalyticsGlobal,
        Permission::AnalyticsClient,
        Permission::ContentManage,
        Permission::ContentApprove,
        Permission::TaskManage,
        Permission::InviteUsers,
        Permission::WorkspaceSettings,
        Permission::ApiFull,
        Permission::ApiLimited,
        Permission::ApiUploads,
        Permission::ViewTenants,
        Permission::ViewClippers,
        Permission::AdminTools,
    ];
}

// The platform's grant table. Totality over (kind, role) is enforced by
// the compiler: the match must cover every pair.
//
// MASTER roles govern agency-wide operations, CLIENT roles one tenant's
// content and invites. CLIPPER workspaces are individual-contributor
// accounts: only USER rank carries any capability there.
fn platform_grants(kind: WorkspaceKind, role: Role) -> &'static [Permission] {
    use Permission::*;
    match (kind, role) {
        (WorkspaceKind::Master, Role::Owner) => &[
            GlobalSettings,
            ManageClients,
            ManageClippers,
            Billing,
            AnalyticsGlobal,
            AnalyticsClient,
            ContentManage,
            ContentApprove,
            TaskManage,
            InviteUsers,
            WorkspaceSettings,
            ApiFull,
            ViewTenants,
            ViewClippers,
            AdminTools,
        ],
        (WorkspaceKind::Master, Role::Admin) => &[
            ManageClients,
            ManageClippers,
            Billing,
            AnalyticsGlobal,
            AnalyticsClient,
            ContentManage,
            ContentApprove,
            TaskManage,
            InviteUsers,
            WorkspaceSettings,
            ApiFull,
            ViewTenants,
            ViewClippers,
            AdminTools,
        ],
        (WorkspaceKind::Master, Role::User) => &[
            AnalyticsGlobal,
            AnalyticsClient,
            ContentManage,
            TaskManage,
            ApiLimited,
        ],
        (WorkspaceKind::Master, Role::ViewOnly) => &[AnalyticsGlobal, AnalyticsClient],
        (WorkspaceKind::Client, Role::Owner) | (WorkspaceKind::Client, Role::Admin) => &[
            AnalyticsClient,
            ContentManage,
            ContentApprove,
            TaskManage,
            InviteUsers,
            WorkspaceSettings,
            ApiLimited,
        ],
        (WorkspaceKind::Client, Role::User) => &[ContentManage, TaskManage, ApiLimited],
        (WorkspaceKind::Client, Role::ViewOnly) => &[AnalyticsClient],
        (WorkspaceKind::Clipper, Role::User) => &[TaskManage, ApiUploads, ContentManage],
        (WorkspaceKind::Clipper, Role::Owner)
        | (WorkspaceKind::Clipper, Role::Admin)
        | (WorkspaceKind::Clipper, Role::ViewOnly) => &[],
    }
}

/// Role → permission-set table per workspace type
///
/// Total by construction: [`PermissionMatrix::new`] materializes the
/// compiler-checked platform table; [`PermissionMatrix::with_grants`]
/// accepts a custom table and fails fast when any (kind, role) pair is
/// missing.
#[derive(Debug)]
pub struct PermissionMatrix {
    grants: HashMap<(WorkspaceKind, Role), HashSet<Permission>>,
}

impl PermissionMatrix {
    /// The platform's standard matrix
    pub fn new() -> Self {
        let mut grants = HashMap::new();
        for kind in WorkspaceKind::ALL {
            for role in Role::ALL {
                grants.insert(
                    (kind, role),
                    platform_grants(kind, role).iter().copied().collect(),
                );
            }
        }
        Self { grants }
    }

    /// Custom matrix, validated total over (kind, role)
    pub fn with_grants(
        grants: HashMap<(WorkspaceKind, Role), HashSet<Permission>>,
    ) -> CoreResult<Self> {
        for kind in WorkspaceKind::ALL {
            for role in Role::ALL {
                if !grants.contains_key(&(kind, role)) {
                    return Err(CoreError::Validation(format!(
                        "permission table missing entry for {}/{}",
                        kind.as_str(),
                        role.as_str()
                    )));
                }
            }
        }
        Ok(Self { grants })
    }

    /// Fine gate: does this (role, workspace type) pair carry `permission`?
    pub fn has_permission(
        &self,
        role: Role,
        kind: WorkspaceKind,
        permission: Permission,
    ) -> bool {
        self.grants
            .get(&(kind, role))
            .map(|set| set.contains(&permission))
            .unwrap_or(false)
    }

    /// The full grant set for one (kind, role) pair
    pub fn grants_for(&self, kind: WorkspaceKind, role: Role) -> &HashSet<Permission> {
        // Present for every pair, by construction
        &self.grants[&(kind, role)]
    }
}

impl Default for PermissionMatrix {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_hierarchy() {
        assert!(has_role(Role::Owner, Role::Admin));
        assert!(has_role(Role::Admin, Role::Admin));
        assert!(!has_role(Role::User, Role::Admin));
        assert!(!has_role(Role::ViewOnly, Role::User));

        // rank() is the single ordering authority
        for r1 in Role::ALL {
            for r2 in Role::ALL {
                assert_eq!(has_role(r1, r2), r1.rank() >= r2.rank());
            }
        }
    }

    #[test]
    fn test_permissions_by_workspace_type() {
        let matrix = PermissionMatrix::new();

        assert!(matrix.has_permission(Role::Admin, WorkspaceKind::Master, Permission::ManageClients));
        assert!(!matrix.has_permission(Role::ViewOnly, WorkspaceKind::Client, Permission::ContentManage));

        // Only the master owner touches global settings
        assert!(matrix.has_permission(Role::Owner, WorkspaceKind::Master, Permission::GlobalSettings));
        assert!(!matrix.has_permission(Role::Admin, WorkspaceKind::Master, Permission::GlobalSettings));

        // Client admins invite, client users do not
        assert!(matrix.has_permission(Role::Admin, WorkspaceKind::Client, Permission::InviteUsers));
        assert!(!matrix.has_permission(Role::User, WorkspaceKind::Client, Permission::InviteUsers));
    }

    #[test]
    fn test_clipper_elevated_ranks_hold_nothing() {
        let matrix = PermissionMatrix::new();

        for permission in Permission::ALL {
            assert!(!matrix.has_permission(Role::Owner, WorkspaceKind::Clipper, permission));
            assert!(!matrix.has_permission(Role::Admin, WorkspaceKind::Clipper, permission));
            assert!(!matrix.has_permission(Role::ViewOnly, WorkspaceKind::Clipper, permission));
        }
        assert!(matrix.has_permission(Role::User, WorkspaceKind::Clipper, Permission::ApiUploads));
    }

    #[test]
    fn test_matrix_is_total() {
        let matrix = PermissionMatrix::new();
        for kind in WorkspaceKind::ALL {
            for role in Role::ALL {
                // Every pair has a defined (possibly empty) set
                let _ = matrix.grants_for(kind, role);
            }
        }
    }

    #[test]
    fn test_closed_world_default_deny() {
        let matrix = PermissionMatrix::new();
        // No grant anywhere outside the table: spot-check the permission
        // count against the explicit table sizes.
        let granted: usize = WorkspaceKind::ALL
            .iter()
            .flat_map(|kind| Role::ALL.iter().map(move |role| (*kind, *role)))
            .map(|(kind, role)| matrix.grants_for(kind, role).len())
            .sum();
        let expected: usize = WorkspaceKind::ALL
            .iter()
            .flat_map(|kind| Role::ALL.iter().map(move |role| (*kind, *role)))
            .map(|(kind, role)| platform_grants(kind, role).len())
            .sum();
        assert_eq!(granted, expected);
    }

    #[test]
    fn test_custom_table_must_be_total() {
        let mut grants: HashMap<(WorkspaceKind, Role), HashSet<Permission>> = HashMap::new();
        for kind in WorkspaceKind::ALL {
            for role in Role::ALL {
                grants.insert((kind, role), HashSet::new());
            }
        }
        grants.remove(&(WorkspaceKind::Clipper, Role::ViewOnly));

        let err = PermissionMatrix::with_grants(grants).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[test]
    fn test_role_wire_names() {
        assert_eq!(serde_json::to_string(&Role::ViewOnly).unwrap(), "\"VIEW_ONLY\"");
        assert_eq!(
            serde_json::to_string(&Permission::AnalyticsGlobal).unwrap(),
            "\"ANALYTICS_GLOBAL\""
        );
        let role: Role = serde_json::from_str("\"OWNER\"").unwrap();
        assert_eq!(role, Role::Owner);
    }
}
