//! Clipdock Access - Roles, permissions, memberships and sessions
//!
//! Access control for the multi-tenant core:
//! - Role hierarchy and per-workspace-type permission matrix ([`rbac`])
//! - Membership lifecycle with upsert semantics ([`membership`])
//! - Request gating helpers ([`gate`])
//! - Session snapshot assembly ([`session`])
//!
//! # Access decision flow
//!
//! ```text
//! session snapshot ──► require_membership(kind)   "are you in this area?"
//!                          │
//!                          ▼
//!                      ensure_role(required)      "are you senior enough?"
//!                          │
//!                          ▼
//!                      ensure_permission(...)     "does (type, role) carry it?"
//! ```

pub mod gate;
pub mod membership;
pub mod rbac;
pub mod session;

pub use gate::{ensure_permission, ensure_role, require_membership};
pub use membership::{Membership, MembershipManager, MembershipStore, MembershipUpsert};
pub use rbac::{has_role, Permission, PermissionMatrix, Role};
pub use session::{SessionAssembler, SessionConfig, SessionMembership, SessionSnapshot};
