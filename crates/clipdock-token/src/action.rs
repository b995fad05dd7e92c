//! Action tokens
//!
//! Short-lived, purpose-scoped, single-use credentials for email
//! verification and password reset. Consumption is an atomic
//! find-and-delete: the record is removed by a single conditional
//! operation, so two simultaneous attempts cannot both succeed.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use clipdock_common::audit::{self, AuditAction, AuditEvent, AuditSink};
use clipdock_common::error::{CoreError, CoreResult};

use crate::material::{generate_token, hash_token};

/// What a token entitles its bearer to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenPurpose {
    /// Email verification
    Verify,
    /// Password reset
    Reset,
}

impl TokenPurpose {
    /// Wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Verify => "verify",
            Self::Reset => "reset",
        }
    }
}

/// Action token tuning
#[derive(Debug, Clone)]
pub struct ActionConfig {
    /// Password reset lifetime
    pub reset_ttl: Duration,
    /// Email verification lifetime
    pub verify_ttl: Duration,
}

impl Default for ActionConfig {
    fn default() -> Self {
        Self {
            reset_ttl: Duration::from_secs(60 * 60),
            verify_ttl: Duration::from_secs(24 * 60 * 60),
        }
    }
}

/// One stored action token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionToken {
    /// Hex SHA-256 of the raw token
    pub token_hash: String,
    /// Who the token is about (an email address)
    pub subject: String,
    pub purpose: TokenPurpose,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Single-use action token ledger
///
/// Expired-but-unconsumed tokens are inert: they can never be consumed
/// and may be swept by [`ActionTokenLedger::purge_expired`] or simply
/// left to sit.
pub struct ActionTokenLedger {
    /// Keyed by digest; consumption removes the entry
    tokens: DashMap<String, ActionToken>,
    config: ActionConfig,
    audit: Arc<dyn AuditSink>,
}

impl ActionTokenLedger {
    /// Ledger from config and an audit sink
    pub fn new(config: ActionConfig, audit: Arc<dyn AuditSink>) -> Self {
        Self {
            tokens: DashMap::new(),
            config,
            audit,
        }
    }

    fn default_ttl(&self, purpose: TokenPurpose) -> Duration {
        match purpose {
            TokenPurpose::Verify => self.config.verify_ttl,
            TokenPurpose::Reset => self.config.reset_ttl,
        }
    }

    /// Issue a token bound to a subject and purpose
    ///
    /// Returns the raw token, once. Callers on the password-reset path
    /// must answer the requester identically whether or not the subject
    /// exists; nothing here leaks existence.
    pub fn issue(&self, subject: &str, purpose: TokenPurpose, ttl: Option<Duration>) -> String {
        let ttl = ttl.unwrap_or_else(|| self.default_ttl(purpose));
        let now = Utc::now();
        let expires_at = now
            + chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::hours(1));

        // Claim a fresh digest; the entry API is the uniqueness guard
        let raw = loop {
            let raw = generate_token();
            let hash = hash_token(&raw);
            match self.tokens.entry(hash.clone()) {
                dashmap::mapref::entry::Entry::Occupied(_) => continue,
                dashmap::mapref::entry::Entry::Vacant(slot) => {
                    slot.insert(ActionToken {
                        token_hash: hash,
                        subject: subject.to_string(),
                        purpose,
                        expires_at,
                        created_at: now,
                    });
                    break raw;
                }
            }
        };

        if purpose == TokenPurpose::Reset {
            audit::emit(
                self.audit.as_ref(),
                AuditEvent::new(AuditAction::PasswordResetRequest)
                    .resource("user", subject)
                    .meta("email", subject),
            );
        }

        raw
    }

    /// Consume a raw token, exactly once
    ///
    /// Atomically deletes the record when it matches the purpose and is
    /// unexpired, returning the bound subject. Already consumed, unknown
    /// or wrong-purpose tokens miss with `NotFound`; a surviving expired
    /// record reports `Expired`.
    pub fn consume(&self, raw: &str, purpose: TokenPurpose) -> CoreResult<String> {
        let hash = hash_token(raw);
        let now = Utc::now();

        if let Some((_, token)) = self
            .tokens
            .remove_if(&hash, |_, t| t.purpose == purpose && t.expires_at > now)
        {
            let action = match purpose {
                TokenPurpose::Reset => AuditAction::PasswordResetComplete,
                TokenPurpose::Verify => AuditAction::EmailVerify,
            };
            audit::emit(
                self.audit.as_ref(),
                AuditEvent::new(action).resource("user", token.subject.clone()),
            );
            return Ok(token.subject);
        }

        // Refine the miss for caller feedback; the exactly-once guarantee
        // rests on the conditional remove above, not on this read.
        match self.tokens.get(&hash) {
            Some(token) if token.purpose == purpose && token.expires_at <= now => {
                Err(CoreError::Expired)
            }
            _ => Err(CoreError::not_found("token")),
        }
    }

    /// Drop expired records; returns how many were swept
    pub fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let before = self.tokens.len();
        self.tokens.retain(|_, t| t.expires_at > now);
        before.saturating_sub(self.tokens.len())
    }

    /// Outstanding (issued, unconsumed) tokens
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Whether the ledger is empty
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}
