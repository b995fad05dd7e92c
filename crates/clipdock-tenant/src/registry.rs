//! Workspace registry
//!
//! Authoritative store and lifecycle for workspaces. Every mutation
//! invalidates the resolution cache for the affected subdomain(s) before
//! returning, and emits one audit event best-effort.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use serde_json::Value;
use uuid::Uuid;

use clipdock_common::audit::{self, AuditAction, AuditEvent, AuditSink};
use clipdock_common::error::{CoreError, CoreResult};
use clipdock_common::{UserId, WorkspaceId};

use crate::cache::ResolutionCache;
use crate::model::{validate_subdomain, Workspace, WorkspaceKind};

/// Injectable workspace lookup for the resolver
///
/// The registry is the in-process implementation; test doubles model an
/// unreachable store so the fail-open path can be exercised.
pub trait WorkspaceSource: Send + Sync {
    /// Live (non-deleted) workspace for a normalized subdomain
    fn find_by_subdomain(&self, subdomain: &str) -> CoreResult<Option<Workspace>>;
}

/// Workspace creation request
#[derive(Debug, Clone)]
pub struct NewWorkspace {
    /// Display name
    pub name: String,
    /// Subdomain, already normalized by the caller
    pub subdomain: String,
    /// Workspace type
    pub kind: WorkspaceKind,
    /// Owning workspace, for CLIPPER under a CLIENT
    pub parent_id: Option<WorkspaceId>,
    /// Opaque settings
    pub settings: serde_json::Map<String, Value>,
}

impl NewWorkspace {
    /// Minimal request
    pub fn new(name: &str, subdomain: &str, kind: WorkspaceKind) -> Self {
        Self {
            name: name.to_string(),
            subdomain: subdomain.to_string(),
            kind,
            parent_id: None,
            settings: serde_json::Map::new(),
        }
    }

    /// Attach a parent workspace
    pub fn parent(mut self, parent_id: WorkspaceId) -> Self {
        self.parent_id = Some(parent_id);
        self
    }
}

/// Workspace patch; `None` fields are left untouched
#[derive(Debug, Clone, Default)]
pub struct WorkspaceUpdate {
    /// New display name
    pub name: Option<String>,
    /// New subdomain (triggers re-validation and conflict check)
    pub subdomain: Option<String>,
    /// Replacement settings map
    pub settings: Option<serde_json::Map<String, Value>>,
}

/// Workspace registry
pub struct WorkspaceRegistry {
    /// All workspaces, soft-deleted included
    workspaces: DashMap<WorkspaceId, Workspace>,
    /// Subdomain → id index over live workspaces only
    by_subdomain: DashMap<String, WorkspaceId>,
    /// Resolution cache, invalidated from within each mutation
    cache: Arc<ResolutionCache>,
    /// Audit sink
    audit: Arc<dyn AuditSink>,
}

impl WorkspaceRegistry {
    /// Registry wired to a cache and an audit sink
    pub fn new(cache: Arc<ResolutionCache>, audit: Arc<dyn AuditSink>) -> Self {
        Self {
            workspaces: DashMap::new(),
            by_subdomain: DashMap::new(),
            cache,
            audit,
        }
    }

    /// Create a workspace
    ///
    /// Fails with `Conflict` when the subdomain is already claimed by a
    /// live workspace, `Validation` on malformed subdomains.
    pub fn create(&self, actor: UserId, input: NewWorkspace) -> CoreResult<Workspace> {
        validate_subdomain(&input.subdomain)?;

        let mut workspace = Workspace::new(&input.name, &input.subdomain, input.kind);
        workspace.parent_id = input.parent_id;
        workspace.settings = input.settings;

        // Atomic subdomain claim; the entry API is the uniqueness guard
        match self.by_subdomain.entry(input.subdomain.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                return Err(CoreError::Conflict(format!(
                    "subdomain already exists: {}",
                    input.subdomain
                )));
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(workspace.id);
            }
        }

        self.workspaces.insert(workspace.id, workspace.clone());
        self.cache.invalidate(&workspace.subdomain);

        tracing::info!(workspace = %workspace.id, subdomain = %workspace.subdomain, kind = workspace.kind.as_str(), "workspace created");
        audit::emit(
            self.audit.as_ref(),
            AuditEvent::new(AuditAction::WorkspaceCreate)
                .actor(actor)
                .workspace(workspace.id)
                .resource("workspace", workspace.id)
                .meta("type", workspace.kind.as_str())
                .meta("subdomain", workspace.subdomain.clone()),
        );

        Ok(workspace)
    }

    /// Patch a live workspace
    ///
    /// Subdomain changes re-check uniqueness and invalidate both the old
    /// and the new cache entry.
    pub fn update(
        &self,
        actor: UserId,
        id: WorkspaceId,
        update: WorkspaceUpdate,
    ) -> CoreResult<Workspace> {
        let current = self
            .get(&id)
            .filter(|ws| !ws.is_deleted())
            .ok_or_else(|| CoreError::not_found("workspace"))?;
        let old_subdomain = current.subdomain.clone();

        let renamed = match &update.subdomain {
            Some(next) if *next != old_subdomain => {
                validate_subdomain(next)?;
                match self.by_subdomain.entry(next.clone()) {
                    dashmap::mapref::entry::Entry::Occupied(slot) => {
                        if *slot.get() != id {
                            return Err(CoreError::Conflict(format!(
                                "subdomain already exists: {next}"
                            )));
                        }
                        None
                    }
                    dashmap::mapref::entry::Entry::Vacant(slot) => {
                        slot.insert(id);
                        Some(next.clone())
                    }
                }
            }
            _ => None,
        };

        let updated = {
            let mut entry = match self.workspaces.get_mut(&id) {
                Some(entry) => entry,
                None => {
                    // Row vanished between read and write; release the claim
                    if let Some(sub) = &renamed {
                        self.by_subdomain.remove(sub);
                    }
                    return Err(CoreError::not_found("workspace"));
                }
            };
            if let Some(name) = update.name {
                entry.name = name;
            }
            if let Some(sub) = &renamed {
                entry.subdomain = sub.clone();
            }
            if let Some(settings) = update.settings {
                entry.settings = settings;
            }
            entry.updated_at = Utc::now();
            entry.clone()
        };

        if renamed.is_some() {
            self.by_subdomain
                .remove_if(&old_subdomain, |_, owner| *owner == id);
            self.cache.invalidate(&old_subdomain);
        }
        self.cache.invalidate(&updated.subdomain);

        audit::emit(
            self.audit.as_ref(),
            AuditEvent::new(AuditAction::WorkspaceUpdate)
                .actor(actor)
                .workspace(id)
                .resource("workspace", id)
                .meta("subdomain", updated.subdomain.clone()),
        );

        Ok(updated)
    }

    /// Soft-delete a workspace
    ///
    /// The row stays; resolution treats it as absent from the moment the
    /// cache entry is invalidated. Deleting twice is a no-op.
    pub fn soft_delete(&self, actor: UserId, id: WorkspaceId) -> CoreResult<()> {
        let subdomain = {
            let mut entry = self
                .workspaces
                .get_mut(&id)
                .ok_or_else(|| CoreError::not_found("workspace"))?;
            if entry.is_deleted() {
                return Ok(());
            }
            let now = Utc::now();
            entry.deleted_at = Some(now);
            entry.updated_at = now;
            entry.subdomain.clone()
        };

        self.by_subdomain.remove_if(&subdomain, |_, owner| *owner == id);
        self.cache.invalidate(&subdomain);

        tracing::info!(workspace = %id, %subdomain, "workspace soft-deleted");
        audit::emit(
            self.audit.as_ref(),
            AuditEvent::new(AuditAction::WorkspaceDelete)
                .actor(actor)
                .workspace(id)
                .resource("workspace", id)
                .meta("subdomain", subdomain),
        );

        Ok(())
    }

    /// Workspace by id, soft-deleted included
    pub fn get(&self, id: &WorkspaceId) -> Option<Workspace> {
        self.workspaces.get(id).map(|ws| ws.clone())
    }

    /// Workspace by id, live only
    pub fn get_live(&self, id: &WorkspaceId) -> Option<Workspace> {
        self.get(id).filter(|ws| !ws.is_deleted())
    }

    /// Live workspace for a normalized subdomain
    pub fn find_by_subdomain(&self, subdomain: &str) -> Option<Workspace> {
        let id = *self.by_subdomain.get(subdomain)?;
        self.get_live(&id)
    }

    /// Whether a subdomain is claimed by a live workspace
    pub fn subdomain_taken(&self, subdomain: &str) -> bool {
        self.find_by_subdomain(subdomain).is_some()
    }

    /// Workspaces of a kind, newest first
    ///
    /// `search` filters on name or subdomain, case-insensitive.
    pub fn list_by_kind(
        &self,
        kind: WorkspaceKind,
        include_deleted: bool,
        search: Option<&str>,
    ) -> Vec<Workspace> {
        let needle = search.map(str::to_lowercase);
        let mut out: Vec<Workspace> = self
            .workspaces
            .iter()
            .filter(|ws| ws.kind == kind)
            .filter(|ws| include_deleted || !ws.is_deleted())
            .filter(|ws| match &needle {
                Some(n) => {
                    ws.name.to_lowercase().contains(n) || ws.subdomain.contains(n.as_str())
                }
                None => true,
            })
            .map(|ws| ws.clone())
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        out
    }

    /// Total rows, soft-deleted included
    pub fn count(&self) -> usize {
        self.workspaces.len()
    }
}

impl WorkspaceSource for WorkspaceRegistry {
    fn find_by_subdomain(&self, subdomain: &str) -> CoreResult<Option<Workspace>> {
        Ok(WorkspaceRegistry::find_by_subdomain(self, subdomain))
    }
}
