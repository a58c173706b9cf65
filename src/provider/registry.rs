//! Provider registry.
//!
//! Holds the configured adapter set. Resolution is either static (first
//! configured adapter), by identity (for sessions that already carry a
//! provider name), or dynamic (a per-resident hook naming the provider
//! for brand-new sessions).

use std::sync::Arc;

use crate::errors::UploadError;
use crate::provider::adapter::Provider;

/// The set of configured provider adapters.
#[derive(Clone)]
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn Provider>>,
}

impl ProviderRegistry {
    /// Build a registry from at least one adapter. The first adapter is
    /// the static default.
    pub fn new(providers: Vec<Arc<dyn Provider>>) -> Result<Self, UploadError> {
        if providers.is_empty() {
            return Err(UploadError::configuration(
                "at least one provider adapter must be configured",
            ));
        }
        Ok(Self { providers })
    }

    /// The statically selected default adapter (first configured).
    pub fn default_provider(&self) -> Arc<dyn Provider> {
        Arc::clone(&self.providers[0])
    }

    /// Resolve an adapter by name, and by location when one is given.
    ///
    /// Sessions record both at creation; a session naming a provider that
    /// is no longer configured is a deployment mistake, reported as a
    /// configuration error rather than a lookup miss.
    pub fn resolve(
        &self,
        name: &str,
        location: Option<&str>,
    ) -> Result<Arc<dyn Provider>, UploadError> {
        self.providers
            .iter()
            .find(|p| {
                let id = p.identity();
                id.name == name && location.is_none_or(|loc| id.location == loc)
            })
            .cloned()
            .ok_or_else(|| {
                UploadError::configuration(format!("no provider configured with name {name}"))
            })
    }

    /// Number of configured adapters.
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}
