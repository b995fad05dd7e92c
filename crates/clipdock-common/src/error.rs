//! Error types for Clipdock

use thiserror::Error;

/// Clipdock core error type
///
/// Backing-store failures are mapped into [`CoreError::StoreUnavailable`]
/// before they cross a crate boundary; raw store errors are never passed
/// through verbatim.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Resource absent or soft-deleted
    #[error("not found: {0}")]
    NotFound(String),

    /// Token already redeemed
    #[error("already used")]
    AlreadyUsed,

    /// Token past its expiry instant
    #[error("expired")]
    Expired,

    /// No authenticated membership for the guarded area
    #[error("unauthorized")]
    Unauthorized,

    /// Role or permission check failed
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Uniqueness violation (e.g. subdomain collision)
    #[error("conflict: {0}")]
    Conflict(String),

    /// Rate limit exceeded
    #[error("rate limit exceeded")]
    RateLimited,

    /// Input failed validation
    #[error("validation failed: {0}")]
    Validation(String),

    /// Backing store unreachable
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
}

/// Result type for Clipdock core operations
pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// Shorthand for a `NotFound` over a named resource kind
    pub fn not_found(resource: &str) -> Self {
        Self::NotFound(resource.to_string())
    }
}
