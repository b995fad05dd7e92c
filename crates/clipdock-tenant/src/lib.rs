//! Clipdock Tenant - Multi-tenant workspace resolution
//!
//! Workspaces are the platform's tenants: each one is reached by a unique
//! subdomain and typed as MASTER (agency-wide), CLIENT or CLIPPER.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                 TENANT RESOLUTION PIPELINE                 │
//! │                                                            │
//! │  hostname ──► TenantResolver ──► ResolutionCache           │
//! │                                      │ miss                │
//! │                                      ▼                     │
//! │                              WorkspaceRegistry             │
//! │                        (authoritative, soft-delete)        │
//! │                                                            │
//! │  create / update / soft-delete ──► synchronous cache       │
//! │                                    invalidation + audit    │
//! └────────────────────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]

pub mod cache;
pub mod model;
pub mod registry;
pub mod resolver;

pub use cache::{CacheConfig, ResolutionCache};
pub use model::{normalize_subdomain, validate_subdomain, Workspace, WorkspaceKind};
pub use registry::{NewWorkspace, WorkspaceRegistry, WorkspaceSource, WorkspaceUpdate};
pub use resolver::{ResolverConfig, TenantResolver};
