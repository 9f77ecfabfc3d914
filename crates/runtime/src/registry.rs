//! Write-once action registry.
//!
//! All registration happens at process start; after `build()` the registry
//! is immutable and shared by `Arc`, so lookups are plain hash-map reads
//! with no locking on the request path.

use std::collections::HashMap;
use std::sync::Arc;

use acthub_core::HubError;

use crate::handler::ActionService;

/// Registration-time failures.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// Two adapters claimed the same action name. Silently replacing one
    /// would route a caller's data to the wrong destination.
    #[error("action {name} is already registered")]
    Duplicate { name: String },
}

/// Caller capabilities that filter which actions are visible.
#[derive(Debug, Clone, Default)]
pub struct LookupOptions {
    /// Protocol version derived from the caller's user agent, when any.
    pub protocol_version: Option<semver::Version>,
    /// Whether the caller can run delegated oauth flows.
    pub support_delegate_oauth: bool,
}

/// Collects adapters before the hub starts serving.
#[derive(Default)]
pub struct RegistryBuilder {
    actions: HashMap<String, Arc<dyn ActionService>>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an adapter. Names must be unique.
    pub fn register(&mut self, action: Arc<dyn ActionService>) -> Result<(), RegistryError> {
        let name = action.descriptor().name.clone();
        if self.actions.contains_key(&name) {
            return Err(RegistryError::Duplicate { name });
        }
        tracing::info!(action = %name, "registered action");
        self.actions.insert(name, action);
        Ok(())
    }

    pub fn build(self) -> ActionRegistry {
        ActionRegistry {
            actions: self.actions,
        }
    }
}

/// Immutable name → adapter map.
pub struct ActionRegistry {
    actions: HashMap<String, Arc<dyn ActionService>>,
}

impl ActionRegistry {
    /// Look up an action as a specific caller sees it: gated by the
    /// caller's protocol version and delegate-oauth capability. An action
    /// the caller cannot use is indistinguishable from one that does not
    /// exist.
    pub fn find(
        &self,
        name: &str,
        opts: &LookupOptions,
    ) -> Result<Arc<dyn ActionService>, HubError> {
        self.actions
            .get(name)
            .filter(|action| Self::visible(action.descriptor(), opts))
            .cloned()
            .ok_or_else(|| HubError::NotFound {
                name: name.to_owned(),
            })
    }

    /// Unfiltered lookup, for oauth redirect legs where the browser carries
    /// no caller identity.
    pub fn get(&self, name: &str) -> Result<Arc<dyn ActionService>, HubError> {
        self.actions
            .get(name)
            .cloned()
            .ok_or_else(|| HubError::NotFound {
                name: name.to_owned(),
            })
    }

    /// All actions visible to the caller, name-sorted for a stable listing.
    pub fn list(&self, opts: &LookupOptions) -> Vec<Arc<dyn ActionService>> {
        let mut visible: Vec<_> = self
            .actions
            .values()
            .filter(|action| Self::visible(action.descriptor(), opts))
            .cloned()
            .collect();
        visible.sort_by(|a, b| a.descriptor().name.cmp(&b.descriptor().name));
        visible
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    fn visible(descriptor: &acthub_core::ActionDescriptor, opts: &LookupOptions) -> bool {
        if !descriptor.supports_version(opts.protocol_version.as_ref()) {
            return false;
        }
        if descriptor.delegate_oauth_only && !opts.support_delegate_oauth {
            return false;
        }
        true
    }
}
