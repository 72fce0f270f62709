//! In-memory platform definition registry.

use crate::{
    definition::PlatformDefinition,
    error::{PlatformError, Result},
    loader::{builtin_definitions, PlatformLoader},
};
use lookout_core::ServiceId;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::{debug, info};

/// In-memory cache of platform definitions.
///
/// Definitions are kept ordered by platform ID so that everything built from
/// the registry (probe lists, rate-limit tables) is deterministic.
#[derive(Clone, Default)]
pub struct PlatformRegistry {
    definitions: Arc<RwLock<BTreeMap<ServiceId, PlatformDefinition>>>,
}

impl PlatformRegistry {
    /// Create a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the built-in definitions.
    ///
    /// # Errors
    /// Returns error if a bundled definition is invalid.
    pub fn with_builtin() -> Result<Self> {
        let registry = Self::new();
        for definition in builtin_definitions()? {
            registry.insert(definition)?;
        }
        Ok(registry)
    }

    /// Create a registry and load all definitions from the given loader.
    ///
    /// # Errors
    /// Returns error if loading fails.
    pub fn load_from(loader: &PlatformLoader) -> Result<Self> {
        let registry = Self::new();
        registry.reload(loader)?;
        Ok(registry)
    }

    /// Replace the current contents with freshly loaded definitions.
    ///
    /// # Errors
    /// Returns error if loading fails.
    pub fn reload(&self, loader: &PlatformLoader) -> Result<()> {
        let definitions = loader.load_all()?;

        let mut cache = self
            .definitions
            .write()
            .expect("acquire write lock on definitions");

        cache.clear();
        for definition in definitions {
            cache.insert(definition.id().clone(), definition);
        }

        info!(count = cache.len(), "reloaded platform definitions");

        Ok(())
    }

    /// Get a platform definition by ID.
    ///
    /// # Errors
    /// Returns error if the platform is not found.
    pub fn get(&self, platform_id: &ServiceId) -> Result<PlatformDefinition> {
        let cache = self
            .definitions
            .read()
            .expect("acquire read lock on definitions");

        cache
            .get(platform_id)
            .cloned()
            .ok_or_else(|| PlatformError::NotFound {
                platform_id: platform_id.to_string(),
            })
    }

    /// Get all platform definitions, ordered by ID.
    #[must_use]
    pub fn get_all(&self) -> Vec<PlatformDefinition> {
        let cache = self
            .definitions
            .read()
            .expect("acquire read lock on definitions");

        cache.values().cloned().collect()
    }

    /// Get the total number of platforms in the registry.
    #[must_use]
    pub fn count(&self) -> usize {
        self.definitions
            .read()
            .expect("acquire read lock on definitions")
            .len()
    }

    /// Check if a platform exists in the registry.
    #[must_use]
    pub fn contains(&self, platform_id: &ServiceId) -> bool {
        self.definitions
            .read()
            .expect("acquire read lock on definitions")
            .contains_key(platform_id)
    }

    /// Per-platform rate-limit intervals declared by the definitions.
    #[must_use]
    pub fn min_intervals(&self) -> Vec<(ServiceId, Duration)> {
        let cache = self
            .definitions
            .read()
            .expect("acquire read lock on definitions");

        cache
            .values()
            .filter_map(|def| def.min_interval().map(|interval| (def.id().clone(), interval)))
            .collect()
    }

    /// Add or update a platform definition.
    pub fn insert(&self, definition: PlatformDefinition) -> Result<()> {
        definition.validate()?;

        let mut cache = self
            .definitions
            .write()
            .expect("acquire write lock on definitions");

        let platform_id = definition.id().clone();
        cache.insert(platform_id.clone(), definition);

        debug!(platform_id = %platform_id, "inserted platform definition");

        Ok(())
    }

    /// Remove a platform definition.
    ///
    /// Returns `true` if the platform was present, `false` otherwise.
    pub fn remove(&self, platform_id: &ServiceId) -> bool {
        let removed = self
            .definitions
            .write()
            .expect("acquire write lock on definitions")
            .remove(platform_id)
            .is_some();

        if removed {
            debug!(platform_id = %platform_id, "removed platform definition");
        }

        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::tests::create_test_definition;

    #[test]
    fn test_registry_new() {
        let registry = PlatformRegistry::new();
        assert_eq!(registry.count(), 0);
    }

    #[test]
    fn test_registry_with_builtin() {
        let registry = PlatformRegistry::with_builtin().expect("load built-in platforms");
        assert_eq!(registry.count(), 5);

        let github = ServiceId::new("github").expect("valid platform ID");
        assert!(registry.contains(&github));
    }

    #[test]
    fn test_registry_insert_and_get() {
        let registry = PlatformRegistry::new();
        let definition = create_test_definition("test-platform");
        let platform_id = definition.id().clone();

        registry.insert(definition).expect("insert definition");

        let retrieved = registry.get(&platform_id).expect("get definition");
        assert_eq!(retrieved.name(), "Test test-platform");
    }

    #[test]
    fn test_registry_rejects_invalid() {
        let registry = PlatformRegistry::new();
        let mut definition = create_test_definition("test-platform");
        definition.indicators.found.clear();

        assert!(registry.insert(definition).is_err());
        assert_eq!(registry.count(), 0);
    }

    #[test]
    fn test_registry_get_nonexistent() {
        let registry = PlatformRegistry::new();
        let platform_id = ServiceId::new("nonexistent").expect("valid platform ID");

        assert!(matches!(
            registry.get(&platform_id),
            Err(PlatformError::NotFound { .. })
        ));
    }

    #[test]
    fn test_registry_ordered_by_id() {
        let registry = PlatformRegistry::new();
        for id in ["zeta", "alpha", "mid-platform"] {
            registry
                .insert(create_test_definition(id))
                .expect("insert definition");
        }

        let ids: Vec<String> = registry
            .get_all()
            .iter()
            .map(|d| d.id().to_string())
            .collect();
        assert_eq!(ids, vec!["alpha", "mid-platform", "zeta"]);
    }

    #[test]
    fn test_registry_remove_and_intervals() {
        let registry = PlatformRegistry::new();
        let mut slow = create_test_definition("slow-platform");
        slow.platform.min_interval_ms = Some(5000);
        registry.insert(slow).expect("insert definition");
        registry
            .insert(create_test_definition("fast-platform"))
            .expect("insert definition");

        let intervals = registry.min_intervals();
        assert_eq!(intervals.len(), 1);
        assert_eq!(intervals[0].1, Duration::from_secs(5));

        let slow_id = ServiceId::new("slow-platform").expect("valid platform ID");
        assert!(registry.remove(&slow_id));
        assert!(!registry.remove(&slow_id));
        assert_eq!(registry.count(), 1);
    }
}
