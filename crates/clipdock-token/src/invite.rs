//! Invite tokens
//!
//! An invite is a pending grant of a future membership. Redemption is
//! exactly-once: the check-and-mark happens under the ledger entry's
//! write lock, never as separate read and write calls, so two concurrent
//! redeemers cannot both succeed.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use clipdock_access::membership::{Membership, MembershipStore, MembershipUpsert};
use clipdock_access::rbac::Role;
use clipdock_common::audit::{self, AuditAction, AuditEvent, AuditSink};
use clipdock_common::error::{CoreError, CoreResult};
use clipdock_common::{InviteId, UserId, WorkspaceId};
use clipdock_tenant::registry::WorkspaceRegistry;

use crate::material::{generate_token, hash_token};

/// Shortest accepted invite lifetime
pub const MIN_TTL_DAYS: i64 = 1;
/// Longest accepted invite lifetime
pub const MAX_TTL_DAYS: i64 = 30;

/// Invite ledger tuning
#[derive(Debug, Clone)]
pub struct InviteConfig {
    /// Lifetime applied when the issuer does not pick one
    pub default_ttl_days: i64,
    /// Upper bound on addresses per bulk issue
    pub bulk_limit: usize,
}

impl Default for InviteConfig {
    fn default() -> Self {
        Self {
            default_ttl_days: 7,
            bulk_limit: 100,
        }
    }
}

/// A pending membership grant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invite {
    pub id: InviteId,
    /// Hex SHA-256 of the raw token; the raw value is never stored
    pub token_hash: String,
    pub email: String,
    pub workspace_id: WorkspaceId,
    pub role: Role,
    pub invited_by: UserId,
    pub expires_at: DateTime<Utc>,
    /// Set atomically on first redemption
    pub used_at: Option<DateTime<Utc>>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Invite {
    /// Whether the invite can still be redeemed right now
    pub fn is_pending(&self) -> bool {
        self.used_at.is_none() && self.revoked_at.is_none() && self.expires_at > Utc::now()
    }
}

/// Authoritative invite table with a digest index
pub struct InviteLedger {
    invites: DashMap<InviteId, Invite>,
    /// token digest → invite, unique by construction
    by_hash: DashMap<String, InviteId>,
    config: InviteConfig,
}

impl InviteLedger {
    /// Ledger from config
    pub fn new(config: InviteConfig) -> Self {
        Self {
            invites: DashMap::new(),
            by_hash: DashMap::new(),
            config,
        }
    }

    // Claim a fresh digest in the index; the entry API enforces the
    // uniqueness constraint on the digest column.
    fn claim_material(&self, id: InviteId) -> (String, String) {
        loop {
            let raw = generate_token();
            let hash = hash_token(&raw);
            match self.by_hash.entry(hash.clone()) {
                dashmap::mapref::entry::Entry::Occupied(_) => continue,
                dashmap::mapref::entry::Entry::Vacant(slot) => {
                    slot.insert(id);
                    return (raw, hash);
                }
            }
        }
    }

    fn ttl(&self, ttl_days: Option<i64>) -> CoreResult<Duration> {
        let days = ttl_days.unwrap_or(self.config.default_ttl_days);
        if !(MIN_TTL_DAYS..=MAX_TTL_DAYS).contains(&days) {
            return Err(CoreError::Validation(format!(
                "invite ttl must be between {MIN_TTL_DAYS} and {MAX_TTL_DAYS} days"
            )));
        }
        Ok(Duration::days(days))
    }

    /// Issue an invite; returns the record and the raw token, once
    pub fn issue(
        &self,
        email: &str,
        workspace_id: WorkspaceId,
        role: Role,
        invited_by: UserId,
        ttl_days: Option<i64>,
    ) -> CoreResult<(Invite, String)> {
        let ttl = self.ttl(ttl_days)?;
        let id = Uuid::new_v4();
        let (raw, hash) = self.claim_material(id);
        let now = Utc::now();

        let invite = Invite {
            id,
            token_hash: hash,
            email: email.to_string(),
            workspace_id,
            role,
            invited_by,
            expires_at: now + ttl,
            used_at: None,
            accepted_at: None,
            revoked_at: None,
            created_at: now,
        };
        self.invites.insert(id, invite.clone());

        Ok((invite, raw))
    }

    /// Invite by id
    pub fn get(&self, id: InviteId) -> Option<Invite> {
        self.invites.get(&id).map(|i| i.clone())
    }

    /// Invite matching a raw token, without consuming it
    pub fn find_by_token(&self, raw: &str) -> Option<Invite> {
        let id = *self.by_hash.get(&hash_token(raw))?;
        self.get(id)
    }

    /// Redeem a raw token, exactly once
    ///
    /// Verifies not-revoked, not-used, not-expired and marks the invite
    /// used in one step under the entry lock. The second of two racing
    /// redeemers observes `AlreadyUsed`. Revoked invites read as
    /// `NotFound`; revocation is not leaked to the redeemer.
    pub fn redeem(&self, raw: &str) -> CoreResult<Invite> {
        let hash = hash_token(raw);
        let id = *self
            .by_hash
            .get(&hash)
            .ok_or_else(|| CoreError::not_found("invite"))?;

        let mut entry = self
            .invites
            .get_mut(&id)
            .ok_or_else(|| CoreError::not_found("invite"))?;
        if entry.revoked_at.is_some() {
            return Err(CoreError::not_found("invite"));
        }
        if entry.used_at.is_some() {
            return Err(CoreError::AlreadyUsed);
        }
        if entry.expires_at <= Utc::now() {
            return Err(CoreError::Expired);
        }

        let now = Utc::now();
        entry.used_at = Some(now);
        entry.accepted_at = Some(now);
        Ok(entry.clone())
    }

    /// Revoke a pending invite
    ///
    /// Drops the digest from the index so the emailed link stops
    /// resolving at all. Revoking twice is a no-op.
    pub fn revoke(&self, id: InviteId) -> CoreResult<Invite> {
        let invite = {
            let mut entry = self
                .invites
                .get_mut(&id)
                .ok_or_else(|| CoreError::not_found("invite"))?;
            if entry.used_at.is_some() {
                return Err(CoreError::AlreadyUsed);
            }
            if entry.revoked_at.is_none() {
                entry.revoked_at = Some(Utc::now());
            }
            entry.clone()
        };
        self.by_hash
            .remove_if(&invite.token_hash, |_, owner| *owner == id);
        Ok(invite)
    }

    /// Rotate an invite's token and return the fresh raw value
    ///
    /// The new digest is persisted on the same invite record and the
    /// expiry window restarts, so the resent link always validates and
    /// the previously emailed one immediately stops.
    pub fn resend(&self, id: InviteId) -> CoreResult<(Invite, String)> {
        let old_hash;
        let (invite, raw) = {
            let mut entry = self
                .invites
                .get_mut(&id)
                .ok_or_else(|| CoreError::not_found("invite"))?;
            if entry.revoked_at.is_some() {
                return Err(CoreError::not_found("invite"));
            }
            if entry.used_at.is_some() {
                return Err(CoreError::AlreadyUsed);
            }

            let (raw, hash) = self.claim_material(id);
            old_hash = std::mem::replace(&mut entry.token_hash, hash);
            entry.expires_at = Utc::now() + Duration::days(self.config.default_ttl_days);
            (entry.clone(), raw)
        };
        self.by_hash.remove_if(&old_hash, |_, owner| *owner == id);
        Ok((invite, raw))
    }

    /// Redeemable invites for a workspace
    pub fn pending_for_workspace(&self, workspace_id: WorkspaceId) -> Vec<Invite> {
        let mut out: Vec<Invite> = self
            .invites
            .iter()
            .filter(|i| i.workspace_id == workspace_id && i.is_pending())
            .map(|i| i.clone())
            .collect();
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        out
    }

    /// Total invites, redeemed and revoked included
    pub fn len(&self) -> usize {
        self.invites.len()
    }

    /// Whether nothing was issued yet
    pub fn is_empty(&self) -> bool {
        self.invites.is_empty()
    }
}

impl Default for InviteLedger {
    fn default() -> Self {
        Self::new(InviteConfig::default())
    }
}

/// Invite issuance and acceptance flows
///
/// Validates the target workspace, drives the ledger and upserts the
/// resulting membership, emitting one audit event per call.
pub struct InviteService {
    ledger: Arc<InviteLedger>,
    memberships: Arc<MembershipStore>,
    workspaces: Arc<WorkspaceRegistry>,
    audit: Arc<dyn AuditSink>,
}

impl InviteService {
    /// Service over the ledger and the membership/workspace stores
    pub fn new(
        ledger: Arc<InviteLedger>,
        memberships: Arc<MembershipStore>,
        workspaces: Arc<WorkspaceRegistry>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            ledger,
            memberships,
            workspaces,
            audit,
        }
    }

    /// Issue one invite
    pub async fn issue(
        &self,
        actor: UserId,
        email: &str,
        workspace_id: WorkspaceId,
        role: Role,
        ttl_days: Option<i64>,
    ) -> CoreResult<(Invite, String)> {
        let workspace = self
            .workspaces
            .get_live(&workspace_id)
            .ok_or_else(|| CoreError::not_found("workspace"))?;

        let (invite, raw) = self
            .ledger
            .issue(email, workspace_id, role, actor, ttl_days)?;

        tracing::info!(invite = %invite.id, workspace = %workspace_id, %email, "invite issued");
        audit::emit(
            self.audit.as_ref(),
            AuditEvent::new(AuditAction::InviteCreate)
                .actor(actor)
                .workspace(workspace_id)
                .resource("invite", invite.id)
                .meta("email", email)
                .meta("role", role.as_str())
                .meta("workspaceType", workspace.kind.as_str()),
        );

        Ok((invite, raw))
    }

    /// Issue one invite per address, bounded by the configured bulk limit
    pub async fn issue_bulk(
        &self,
        actor: UserId,
        emails: &[String],
        workspace_id: WorkspaceId,
        role: Role,
        ttl_days: Option<i64>,
    ) -> CoreResult<Vec<(Invite, String)>> {
        if emails.is_empty() || emails.len() > self.ledger.config.bulk_limit {
            return Err(CoreError::Validation(format!(
                "bulk invite accepts 1 to {} addresses",
                self.ledger.config.bulk_limit
            )));
        }
        let workspace = self
            .workspaces
            .get_live(&workspace_id)
            .ok_or_else(|| CoreError::not_found("workspace"))?;

        let mut out = Vec::with_capacity(emails.len());
        for email in emails {
            out.push(self.ledger.issue(email, workspace_id, role, actor, ttl_days)?);
        }

        audit::emit(
            self.audit.as_ref(),
            AuditEvent::new(AuditAction::InviteCreate)
                .actor(actor)
                .workspace(workspace_id)
                .resource("invite", "bulk")
                .meta("emailCount", emails.len())
                .meta("role", role.as_str())
                .meta("workspaceType", workspace.kind.as_str()),
        );

        Ok(out)
    }

    /// Accept an invite for an authenticated user
    ///
    /// Marks the token used and only then upserts the membership. A
    /// workspace that disappears between the two steps surfaces as a
    /// failed acceptance with the used marker intact.
    pub async fn accept(&self, raw: &str, user_id: UserId) -> CoreResult<Membership> {
        let preview = self
            .ledger
            .find_by_token(raw)
            .ok_or_else(|| CoreError::not_found("invite"))?;

        // Validate the target before burning the token
        let workspace = self
            .workspaces
            .get_live(&preview.workspace_id)
            .ok_or_else(|| CoreError::not_found("workspace"))?;

        let invite = self.ledger.redeem(raw)?;

        let membership = self.memberships.upsert(MembershipUpsert {
            user_id,
            workspace_id: invite.workspace_id,
            role: invite.role,
            workspace_kind: workspace.kind,
            invited_by: Some(invite.invited_by),
        });

        tracing::info!(invite = %invite.id, workspace = %invite.workspace_id, user = %user_id, "invite accepted");
        audit::emit(
            self.audit.as_ref(),
            AuditEvent::new(AuditAction::InviteAccept)
                .actor(user_id)
                .workspace(invite.workspace_id)
                .resource("invite", invite.id)
                .meta("email", invite.email.clone())
                .meta("role", invite.role.as_str()),
        );

        Ok(membership)
    }

    /// Rotate and re-deliver an invite token
    pub async fn resend(&self, actor: UserId, id: InviteId) -> CoreResult<(Invite, String)> {
        let (invite, raw) = self.ledger.resend(id)?;

        audit::emit(
            self.audit.as_ref(),
            AuditEvent::new(AuditAction::InviteCreate)
                .actor(actor)
                .workspace(invite.workspace_id)
                .resource("invite", invite.id)
                .meta("email", invite.email.clone())
                .meta("action", "resend"),
        );

        Ok((invite, raw))
    }

    /// Revoke a pending invite
    pub async fn revoke(&self, actor: UserId, id: InviteId) -> CoreResult<Invite> {
        let invite = self.ledger.revoke(id)?;

        audit::emit(
            self.audit.as_ref(),
            AuditEvent::new(AuditAction::InviteRevoke)
                .actor(actor)
                .workspace(invite.workspace_id)
                .resource("invite", invite.id)
                .meta("email", invite.email.clone()),
        );

        Ok(invite)
    }

    /// Redeemable invites for a workspace, for admin views
    pub fn pending_for_workspace(&self, workspace_id: WorkspaceId) -> Vec<Invite> {
        self.ledger.pending_for_workspace(workspace_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clipdock_common::audit::MemoryAuditSink;
    use clipdock_tenant::cache::ResolutionCache;
    use clipdock_tenant::model::WorkspaceKind;
    use clipdock_tenant::registry::NewWorkspace;
    use std::sync::Barrier;

    struct Fixture {
        ledger: Arc<InviteLedger>,
        memberships: Arc<MembershipStore>,
        workspaces: Arc<WorkspaceRegistry>,
        sink: Arc<MemoryAuditSink>,
        service: InviteService,
    }

    fn fixture() -> Fixture {
        let ledger = Arc::new(InviteLedger::default());
        let memberships = Arc::new(MembershipStore::new());
        let sink = Arc::new(MemoryAuditSink::new());
        let workspaces = Arc::new(WorkspaceRegistry::new(
            Arc::new(ResolutionCache::default()),
            sink.clone(),
        ));
        let service = InviteService::new(
            ledger.clone(),
            memberships.clone(),
            workspaces.clone(),
            sink.clone(),
        );
        Fixture {
            ledger,
            memberships,
            workspaces,
            sink,
            service,
        }
    }

    #[tokio::test]
    async fn test_invite_flow_end_to_end() {
        let f = fixture();
        let admin = Uuid::new_v4();
        let invitee = Uuid::new_v4();

        let acme = f
            .workspaces
            .create(admin, NewWorkspace::new("Acme", "acme", WorkspaceKind::Client))
            .unwrap();
        let (invite, raw) = f
            .service
            .issue(admin, "user@x.com", acme.id, Role::User, Some(7))
            .await
            .unwrap();
        assert!(invite.is_pending());

        let membership = f.service.accept(&raw, invitee).await.unwrap();
        assert_eq!(membership.role, Role::User);
        assert_eq!(membership.workspace_kind, WorkspaceKind::Client);
        assert_eq!(membership.invited_by, Some(admin));

        let members = f.memberships.list_for_workspace(acme.id);
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].user_id, invitee);

        // Same raw token again: terminal AlreadyUsed, not NotFound
        assert_eq!(
            f.service.accept(&raw, invitee).await.unwrap_err(),
            CoreError::AlreadyUsed
        );

        assert_eq!(f.sink.events_for(AuditAction::InviteCreate).len(), 1);
        assert_eq!(f.sink.events_for(AuditAction::InviteAccept).len(), 1);
    }

    #[tokio::test]
    async fn test_issue_validates_workspace_and_ttl() {
        let f = fixture();
        let admin = Uuid::new_v4();

        let err = f
            .service
            .issue(admin, "user@x.com", Uuid::new_v4(), Role::User, None)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));

        let acme = f
            .workspaces
            .create(admin, NewWorkspace::new("Acme", "acme", WorkspaceKind::Client))
            .unwrap();
        for days in [0, 31, -1] {
            let err = f
                .service
                .issue(admin, "user@x.com", acme.id, Role::User, Some(days))
                .await
                .unwrap_err();
            assert!(matches!(err, CoreError::Validation(_)));
        }
    }

    #[tokio::test]
    async fn test_expired_invite_is_terminal() {
        let f = fixture();
        let admin = Uuid::new_v4();
        let acme = f
            .workspaces
            .create(admin, NewWorkspace::new("Acme", "acme", WorkspaceKind::Client))
            .unwrap();
        let (invite, raw) = f
            .service
            .issue(admin, "user@x.com", acme.id, Role::User, None)
            .await
            .unwrap();

        f.ledger.invites.get_mut(&invite.id).unwrap().expires_at =
            Utc::now() - Duration::hours(1);

        assert_eq!(
            f.service.accept(&raw, Uuid::new_v4()).await.unwrap_err(),
            CoreError::Expired
        );
        assert!(f.memberships.is_empty());
        assert!(f.ledger.pending_for_workspace(acme.id).is_empty());
    }

    #[tokio::test]
    async fn test_revoked_invite_reads_as_not_found() {
        let f = fixture();
        let admin = Uuid::new_v4();
        let acme = f
            .workspaces
            .create(admin, NewWorkspace::new("Acme", "acme", WorkspaceKind::Client))
            .unwrap();
        let (invite, raw) = f
            .service
            .issue(admin, "user@x.com", acme.id, Role::User, None)
            .await
            .unwrap();

        f.service.revoke(admin, invite.id).await.unwrap();

        assert!(matches!(
            f.service.accept(&raw, Uuid::new_v4()).await.unwrap_err(),
            CoreError::NotFound(_)
        ));
        assert!(f.ledger.pending_for_workspace(acme.id).is_empty());
        assert_eq!(f.sink.events_for(AuditAction::InviteRevoke).len(), 1);
    }

    #[tokio::test]
    async fn test_resend_rotates_and_repersists() {
        let f = fixture();
        let admin = Uuid::new_v4();
        let acme = f
            .workspaces
            .create(admin, NewWorkspace::new("Acme", "acme", WorkspaceKind::Client))
            .unwrap();
        let (invite, old_raw) = f
            .service
            .issue(admin, "user@x.com", acme.id, Role::User, None)
            .await
            .unwrap();

        let (rotated, new_raw) = f.service.resend(admin, invite.id).await.unwrap();
        assert_eq!(rotated.id, invite.id);
        assert_ne!(new_raw, old_raw);
        assert_ne!(rotated.token_hash, invite.token_hash);

        // The old link is dead, the resent one validates
        assert!(matches!(
            f.service.accept(&old_raw, Uuid::new_v4()).await.unwrap_err(),
            CoreError::NotFound(_)
        ));
        f.service.accept(&new_raw, Uuid::new_v4()).await.unwrap();

        // Used invites cannot be resent
        assert_eq!(
            f.service.resend(admin, invite.id).await.unwrap_err(),
            CoreError::AlreadyUsed
        );
    }

    #[tokio::test]
    async fn test_bulk_issue_bounds_and_count() {
        let f = fixture();
        let admin = Uuid::new_v4();
        let acme = f
            .workspaces
            .create(admin, NewWorkspace::new("Acme", "acme", WorkspaceKind::Client))
            .unwrap();

        let emails: Vec<String> = (0..3).map(|i| format!("user{i}@x.com")).collect();
        let issued = f
            .service
            .issue_bulk(admin, &emails, acme.id, Role::ViewOnly, None)
            .await
            .unwrap();
        assert_eq!(issued.len(), 3);
        assert_eq!(f.ledger.pending_for_workspace(acme.id).len(), 3);

        let too_many: Vec<String> = (0..101).map(|i| format!("u{i}@x.com")).collect();
        assert!(matches!(
            f.service
                .issue_bulk(admin, &too_many, acme.id, Role::User, None)
                .await
                .unwrap_err(),
            CoreError::Validation(_)
        ));
        assert!(matches!(
            f.service
                .issue_bulk(admin, &[], acme.id, Role::User, None)
                .await
                .unwrap_err(),
            CoreError::Validation(_)
        ));
    }

    #[tokio::test]
    async fn test_accept_into_deleted_workspace_fails_cleanly() {
        let f = fixture();
        let admin = Uuid::new_v4();
        let acme = f
            .workspaces
            .create(admin, NewWorkspace::new("Acme", "acme", WorkspaceKind::Client))
            .unwrap();
        let (_, raw) = f
            .service
            .issue(admin, "user@x.com", acme.id, Role::User, None)
            .await
            .unwrap();

        f.workspaces.soft_delete(admin, acme.id).unwrap();

        assert!(matches!(
            f.service.accept(&raw, Uuid::new_v4()).await.unwrap_err(),
            CoreError::NotFound(_)
        ));
        assert!(f.memberships.is_empty());
    }

    #[test]
    fn test_concurrent_redemption_single_winner() {
        let ledger = Arc::new(InviteLedger::default());
        let (_, raw) = ledger
            .issue("user@x.com", Uuid::new_v4(), Role::User, Uuid::new_v4(), None)
            .unwrap();

        let barrier = Arc::new(Barrier::new(2));
        let handles: Vec<_> = (0..2)
            .map(|_| {
                let ledger = ledger.clone();
                let raw = raw.clone();
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    barrier.wait();
                    ledger.redeem(&raw)
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let wins = results.iter().filter(|r| r.is_ok()).count();
        let already_used = results
            .iter()
            .filter(|r| matches!(r, Err(CoreError::AlreadyUsed)))
            .count();

        assert_eq!(wins, 1);
        assert_eq!(already_used, 1);
    }
}
