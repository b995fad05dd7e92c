//! Clipdock Common - Shared types for the Clipdock platform core
//!
//! This crate provides the pieces every other Clipdock crate leans on:
//! - Error taxonomy ([`CoreError`])
//! - Audit events and sinks ([`audit`])
//! - Request rate limiting ([`ratelimit`])
//! - Shared identifier aliases

#![warn(missing_docs)]

pub mod audit;
pub mod error;
pub mod ratelimit;

pub use audit::{AuditAction, AuditEvent, AuditSink, MemoryAuditSink, TracingAuditSink};
pub use error::{CoreError, CoreResult};
pub use ratelimit::RateLimiter;

use uuid::Uuid;

/// User ID
pub type UserId = Uuid;

/// Workspace ID
pub type WorkspaceId = Uuid;

/// Invite ID
pub type InviteId = Uuid;
