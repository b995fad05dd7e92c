//! Tenant resolution
//!
//! Turns an inbound hostname into the workspace it addresses, going
//! through the [`ResolutionCache`] and falling back to the injected
//! [`WorkspaceSource`]. If the source is unreachable, resolution fails
//! open to "no tenant" rather than serving stale positives beyond TTL.

use std::sync::Arc;

use crate::cache::ResolutionCache;
use crate::model::{normalize_subdomain, Workspace};
use crate::registry::WorkspaceSource;

/// Resolver tuning
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Apex domain tenants hang off, port included when non-standard
    /// (e.g. `clipdock.io` or `localhost:3000`)
    pub root_domain: String,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            root_domain: "localhost:3000".to_string(),
        }
    }
}

/// Hostname → workspace resolver
pub struct TenantResolver {
    cache: Arc<ResolutionCache>,
    source: Arc<dyn WorkspaceSource>,
    config: ResolverConfig,
}

impl TenantResolver {
    /// Resolver over a cache and a workspace source
    pub fn new(
        cache: Arc<ResolutionCache>,
        source: Arc<dyn WorkspaceSource>,
        config: ResolverConfig,
    ) -> Self {
        Self {
            cache,
            source,
            config,
        }
    }

    /// Candidate subdomain for a request hostname
    ///
    /// `None` means the root domain itself (or an unrelated host): no
    /// tenant. Recognizes `sub.localhost` development hosts and
    /// `tenant---branch.vercel.app` preview deployments.
    pub fn extract_subdomain(&self, host: &str) -> Option<String> {
        let hostname = host.split(':').next().unwrap_or_default().to_lowercase();

        let candidate = if hostname == "localhost" {
            return None;
        } else if let Some(prefix) = hostname.strip_suffix(".localhost") {
            prefix.to_string()
        } else if hostname.contains("---") && hostname.ends_with(".vercel.app") {
            hostname.split("---").next().unwrap_or_default().to_string()
        } else {
            let root = self
                .config
                .root_domain
                .split(':')
                .next()
                .unwrap_or_default()
                .to_lowercase();
            if hostname == root || hostname == format!("www.{root}") {
                return None;
            }
            hostname.strip_suffix(&format!(".{root}"))?.to_string()
        };

        let normalized = normalize_subdomain(&candidate);
        if normalized.is_empty() {
            None
        } else {
            Some(normalized)
        }
    }

    /// Resolve a subdomain to its live workspace
    ///
    /// Caches hits and explicit negatives. Source failures are logged and
    /// answered as "no tenant" without being cached, so fail-open never
    /// outlives the outage.
    pub fn resolve(&self, subdomain: &str) -> Option<Workspace> {
        let key = normalize_subdomain(subdomain);
        if key.is_empty() {
            return None;
        }

        if let Some(cached) = self.cache.get(&key) {
            return cached;
        }

        match self.source.find_by_subdomain(&key) {
            Ok(found) => {
                self.cache.insert(&key, found.clone());
                found
            }
            Err(err) => {
                tracing::warn!(subdomain = %key, %err, "workspace store lookup failed; failing open to not-found");
                None
            }
        }
    }

    /// Resolve a full request hostname
    pub fn resolve_host(&self, host: &str) -> Option<Workspace> {
        let subdomain = self.extract_subdomain(host)?;
        self.resolve(&subdomain)
    }
}
