//! Audit Logging
//!
//! Append-only trail of privileged actions. The core emits events into an
//! [`AuditSink`]; durable persistence belongs to the surrounding system.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CoreResult;
use crate::{UserId, WorkspaceId};

/// Privileged actions recorded in the audit trail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    /// User signed in
    Login,
    /// Invite issued
    InviteCreate,
    /// Invite redeemed into a membership
    InviteAccept,
    /// Invite revoked before redemption
    InviteRevoke,
    /// Password reset token issued
    PasswordResetRequest,
    /// Password reset token consumed
    PasswordResetComplete,
    /// Email verification token consumed
    EmailVerify,
    /// Membership role changed
    RoleChange,
    /// Membership created or refreshed
    MembershipUpsert,
    /// Membership removed
    MembershipRemove,
    /// Workspace created
    WorkspaceCreate,
    /// Workspace updated
    WorkspaceUpdate,
    /// Workspace soft-deleted
    WorkspaceDelete,
}

/// One audit trail entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Acting user, when known
    pub actor: Option<UserId>,
    /// Workspace the action applies to, when scoped
    pub workspace: Option<WorkspaceId>,
    /// What happened
    pub action: AuditAction,
    /// Kind of resource touched ("workspace", "invite", "membership", ...)
    pub resource_type: Option<String>,
    /// Identifier of the touched resource
    pub resource_id: Option<String>,
    /// Free-form context
    pub metadata: serde_json::Map<String, Value>,
    /// Emission time
    pub created_at: DateTime<Utc>,
}

impl AuditEvent {
    /// New event for an action, stamped now
    pub fn new(action: AuditAction) -> Self {
        Self {
            actor: None,
            workspace: None,
            action,
            resource_type: None,
            resource_id: None,
            metadata: serde_json::Map::new(),
            created_at: Utc::now(),
        }
    }

    /// Set the acting user
    pub fn actor(mut self, actor: UserId) -> Self {
        self.actor = Some(actor);
        self
    }

    /// Set the workspace scope
    pub fn workspace(mut self, workspace: WorkspaceId) -> Self {
        self.workspace = Some(workspace);
        self
    }

    /// Set the touched resource
    pub fn resource(mut self, resource_type: &str, resource_id: impl ToString) -> Self {
        self.resource_type = Some(resource_type.to_string());
        self.resource_id = Some(resource_id.to_string());
        self
    }

    /// Attach one metadata entry
    pub fn meta(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }
}

/// Destination for audit events
pub trait AuditSink: Send + Sync {
    /// Record one event
    fn record(&self, event: AuditEvent) -> CoreResult<()>;
}

/// Emit an event, best-effort
///
/// Sink failure must never roll back the operation that produced the
/// event; it is logged and swallowed here.
pub fn emit(sink: &dyn AuditSink, event: AuditEvent) {
    let action = event.action;
    if let Err(err) = sink.record(event) {
        tracing::warn!(?action, %err, "audit emission failed");
    }
}

/// Sink that logs events through `tracing`
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: AuditEvent) -> CoreResult<()> {
        tracing::info!(
            action = ?event.action,
            actor = ?event.actor,
            workspace = ?event.workspace,
            resource_type = event.resource_type.as_deref(),
            resource_id = event.resource_id.as_deref(),
            "audit"
        );
        Ok(())
    }
}

/// In-memory sink, for tests and admin views
#[derive(Default)]
pub struct MemoryAuditSink {
    events: parking_lot::RwLock<Vec<AuditEvent>>,
}

impl MemoryAuditSink {
    /// Empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all recorded events, oldest first
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.read().clone()
    }

    /// Events matching an action
    pub fn events_for(&self, action: AuditAction) -> Vec<AuditEvent> {
        self.events
            .read()
            .iter()
            .filter(|e| e.action == action)
            .cloned()
            .collect()
    }

    /// Number of recorded events
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// Whether nothing was recorded yet
    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, event: AuditEvent) -> CoreResult<()> {
        self.events.write().push(event);
        Ok(())
    }
}
