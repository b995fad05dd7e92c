//! Workspace Data Model

use chrono::{DateTime, Utc};
use clipdock_common::error::{CoreError, CoreResult};
use clipdock_common::WorkspaceId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Workspace type
///
/// MASTER anchors the root domain; CLIENT and CLIPPER workspaces anchor
/// their own subdomains. A CLIPPER may belong to a CLIENT via
/// [`Workspace::parent_id`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkspaceKind {
    Master,
    Client,
    Clipper,
}

impl WorkspaceKind {
    /// All kinds, for exhaustive table checks
    pub const ALL: [WorkspaceKind; 3] = [
        WorkspaceKind::Master,
        WorkspaceKind::Client,
        WorkspaceKind::Clipper,
    ];

    /// Wire name, as stored by the platform
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Master => "MASTER",
            Self::Client => "CLIENT",
            Self::Clipper => "CLIPPER",
        }
    }
}

/// Workspace definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workspace {
    /// Unique workspace ID
    pub id: WorkspaceId,
    /// Display name
    pub name: String,
    /// Globally unique subdomain (lowercase alphanumeric + hyphen)
    pub subdomain: String,
    /// Workspace type
    pub kind: WorkspaceKind,
    /// Owning workspace, for CLIPPER workspaces attached to a CLIENT
    pub parent_id: Option<WorkspaceId>,
    /// Opaque settings map
    pub settings: serde_json::Map<String, Value>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last update time
    pub updated_at: DateTime<Utc>,
    /// Soft-delete marker; rows are never physically removed
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Workspace {
    /// Create a new live workspace
    pub fn new(name: &str, subdomain: &str, kind: WorkspaceKind) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            subdomain: subdomain.to_string(),
            kind,
            parent_id: None,
            settings: serde_json::Map::new(),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    /// Whether the workspace has been soft-deleted
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Lowercase and strip everything outside `[a-z0-9-]`
pub fn normalize_subdomain(input: &str) -> String {
    input
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-')
        .collect()
}

/// Validate a subdomain as stored: non-empty, at most one DNS label,
/// lowercase alphanumeric + hyphen only
pub fn validate_subdomain(subdomain: &str) -> CoreResult<()> {
    if subdomain.is_empty() {
        return Err(CoreError::Validation("subdomain must not be empty".into()));
    }
    if subdomain.len() > 63 {
        return Err(CoreError::Validation(
            "subdomain must be at most 63 characters".into(),
        ));
    }
    if !subdomain
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(CoreError::Validation(
            "subdomain must be lowercase alphanumeric with dashes".into(),
        ));
    }
    Ok(())
}
