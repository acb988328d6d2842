use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::builtin;
use super::descriptor::{ApiProvider, ModelDescriptor};

/// In-memory lookup over the static model catalog.
///
/// Insertion order is preserved: fallback candidates are tried in registry
/// order, never randomized.
#[derive(Debug, Default)]
pub struct ModelRegistry {
    models: Vec<ModelDescriptor>,
    by_short_key: HashMap<String, usize>,
    by_id: HashMap<String, usize>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with the built-in catalog.
    pub fn builtins() -> Self {
        let mut registry = Self::new();
        builtin::register_all(&mut registry);
        registry
    }

    pub fn register(&mut self, descriptor: ModelDescriptor) {
        let index = self.models.len();
        self.by_short_key
            .insert(descriptor.short_key.clone(), index);
        self.by_id.insert(descriptor.id.clone(), index);
        self.models.push(descriptor);
    }

    pub fn get(&self, short_key: &str) -> Option<&ModelDescriptor> {
        self.by_short_key
            .get(short_key)
            .map(|&i| &self.models[i])
    }

    /// Lookup by short key first, then by provider-qualified id.
    pub fn resolve(&self, key_or_id: &str) -> Option<&ModelDescriptor> {
        self.get(key_or_id)
            .or_else(|| self.by_id.get(key_or_id).map(|&i| &self.models[i]))
    }

    /// Free, active chat models of the same backend, in registry order,
    /// excluding the requested model itself.
    pub fn fallback_candidates(&self, requested: &ModelDescriptor) -> Vec<&ModelDescriptor> {
        self.models
            .iter()
            .filter(|m| {
                m.api_provider == requested.api_provider
                    && m.short_key != requested.short_key
                    && m.is_fallback_candidate()
            })
            .collect()
    }

    pub fn for_provider(&self, provider: ApiProvider) -> Vec<&ModelDescriptor> {
        self.models
            .iter()
            .filter(|m| m.api_provider == provider)
            .collect()
    }

    pub fn all(&self) -> impl Iterator<Item = &ModelDescriptor> {
        self.models.iter()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

/// Shared handle over the registry supporting invalidate-and-reload.
///
/// Readers take a cheap `Arc` snapshot; admin edits swap in a freshly built
/// registry instead of mutating shared state in place.
#[derive(Debug)]
pub struct RegistryHandle {
    inner: RwLock<Arc<ModelRegistry>>,
}

impl RegistryHandle {
    pub fn new(registry: ModelRegistry) -> Self {
        Self {
            inner: RwLock::new(Arc::new(registry)),
        }
    }

    pub fn builtin() -> Self {
        Self::new(ModelRegistry::builtins())
    }

    /// Snapshot of the current registry.
    pub fn current(&self) -> Arc<ModelRegistry> {
        match self.inner.read() {
            Ok(guard) => Arc::clone(&guard),
            // A poisoned lock still holds a valid snapshot.
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Swap in a rebuilt registry. Existing readers keep their snapshot.
    pub fn replace(&self, registry: ModelRegistry) {
        let next = Arc::new(registry);
        match self.inner.write() {
            Ok(mut guard) => *guard = next,
            Err(poisoned) => *poisoned.into_inner() = next,
        }
    }
}

impl Default for RegistryHandle {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ModelType, Tier};

    #[test]
    fn test_builtin_resolve() {
        let registry = ModelRegistry::builtins();
        assert!(!registry.is_empty());
        assert!(registry.resolve("llama-3.3-70b").is_some());
        assert!(registry.resolve("seed-1-6").is_some());
        assert!(registry.resolve("nonexistent-model").is_none());
    }

    #[test]
    fn test_resolve_by_full_id() {
        let registry = ModelRegistry::builtins();
        let by_key = registry.resolve("llama-3.3-70b").unwrap();
        let by_id = registry.resolve(&by_key.id.clone()).unwrap();
        assert_eq!(by_key.short_key, by_id.short_key);
    }

    #[test]
    fn test_fallback_candidates_same_backend_free_only() {
        let registry = ModelRegistry::builtins();
        let requested = registry.resolve("seed-1-6").unwrap();
        let fallbacks = registry.fallback_candidates(requested);

        assert!(!fallbacks.is_empty());
        for candidate in &fallbacks {
            assert_eq!(candidate.api_provider, requested.api_provider);
            assert!(candidate.is_free);
            assert!(candidate.active);
            assert_eq!(candidate.model_type, ModelType::Chat);
            assert_ne!(candidate.short_key, requested.short_key);
        }
    }

    #[test]
    fn test_fallback_candidates_preserve_registry_order() {
        let mut registry = ModelRegistry::new();
        for key in ["m-a", "m-b", "m-c"] {
            registry.register(ModelDescriptor {
                id: format!("test/{key}"),
                short_key: key.to_string(),
                display_name: key.to_string(),
                provider: "Test".to_string(),
                model_type: ModelType::Chat,
                api_provider: crate::models::ApiProvider::OpenRouter,
                is_free: true,
                tier: Tier::Free,
                max_context_tokens: 8192,
                active: true,
            });
        }
        let requested = registry.get("m-b").unwrap().clone();
        let order: Vec<_> = registry
            .fallback_candidates(&requested)
            .iter()
            .map(|m| m.short_key.clone())
            .collect();
        assert_eq!(order, vec!["m-a", "m-c"]);
    }

    #[test]
    fn test_registry_handle_replace() {
        let handle = RegistryHandle::builtin();
        let before = handle.current();
        assert!(before.resolve("llama-3.3-70b").is_some());

        handle.replace(ModelRegistry::new());
        assert!(handle.current().is_empty());
        // Old snapshot is unaffected.
        assert!(before.resolve("llama-3.3-70b").is_some());
    }
}
