//! Process-wide registry mapping `providerId -> ProviderPlugin`.

use std::sync::Arc;

use arrival_core::provider::ProviderPlugin;
use dashmap::DashMap;
use smol_str::SmolStr;

/// A registry of provider plugins, keyed by provider id.
///
/// Registration is idempotent — registering the same `providerId` twice
/// overwrites the previous plugin. The engine accepts an injected registry
/// (rather than reaching for a global singleton) so tests can run with
/// isolated provider sets.
#[derive(Default)]
pub struct ProviderRegistry {
    plugins: DashMap<SmolStr, Arc<dyn ProviderPlugin>>,
}

impl ProviderRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        ProviderRegistry {
            plugins: DashMap::new(),
        }
    }

    /// Registers a provider, overwriting any previous registration under
    /// the same id.
    pub fn register(&self, plugin: Arc<dyn ProviderPlugin>) {
        self.plugins
            .insert(SmolStr::new(plugin.provider_id()), plugin);
    }

    /// Looks up a provider by id.
    pub fn get(&self, provider_id: &str) -> Option<Arc<dyn ProviderPlugin>> {
        self.plugins.get(provider_id).map(|entry| entry.clone())
    }

    /// Number of registered providers.
    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    /// Whether the registry has no registered providers.
    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.plugins.len())
            .finish()
    }
}
