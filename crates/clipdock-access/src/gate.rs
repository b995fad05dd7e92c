//! Request gating
//!
//! Small helpers request handlers call before privileged work. The role
//! check answers "is this actor senior enough in this tenant"; the
//! permission check answers "does this tenant-type/role combination carry
//! this capability". The two are complementary, not redundant.

use clipdock_common::error::{CoreError, CoreResult};
use clipdock_tenant::model::WorkspaceKind;

use crate::rbac::{has_role, Permission, PermissionMatrix, Role};
use crate::session::{SessionMembership, SessionSnapshot};

/// The caller's membership for the workspace type guarding an area
///
/// `Unauthorized` when the snapshot holds no membership of that type.
pub fn require_membership(
    snapshot: &SessionSnapshot,
    kind: WorkspaceKind,
) -> CoreResult<&SessionMembership> {
    snapshot
        .membership_for(kind)
        .ok_or(CoreError::Unauthorized)
}

/// Coarse gate on the role hierarchy
pub fn ensure_role(membership: &SessionMembership, required: Role) -> CoreResult<()> {
    if has_role(membership.role, required) {
        Ok(())
    } else {
        Err(CoreError::Forbidden(format!(
            "requires at least {}",
            required.as_str()
        )))
    }
}

/// Fine gate on the permission matrix
///
/// Also rejects when the membership belongs to a different workspace type
/// than the one the action is scoped to.
pub fn ensure_permission(
    matrix: &PermissionMatrix,
    membership: &SessionMembership,
    kind: WorkspaceKind,
    permission: Permission,
) -> CoreResult<()> {
    if membership.workspace_kind != kind {
        return Err(CoreError::Forbidden(format!(
            "requires a {} membership",
            kind.as_str()
        )));
    }
    if matrix.has_permission(membership.role, kind, permission) {
        Ok(())
    } else {
        Err(CoreError::Forbidden(format!(
            "missing permission {permission:?}"
        )))
    }
}
