use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::artwork::{ModuleContext, ModuleFactory, ModuleHandle, ModuleOptions};
use crate::error::isolate;
use crate::ExhibitError;

/// Registration for one marker. The instance is built lazily on first use.
pub struct ModuleDescriptor {
    marker_id: String,
    factory: ModuleFactory,
    options: ModuleOptions,
    instance: Option<ModuleHandle>,
}

impl ModuleDescriptor {
    pub fn marker_id(&self) -> &str {
        &self.marker_id
    }

    pub fn options(&self) -> &ModuleOptions {
        &self.options
    }

    pub fn is_constructed(&self) -> bool {
        self.instance.is_some()
    }
}

impl fmt::Debug for ModuleDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleDescriptor")
            .field("marker_id", &self.marker_id)
            .field("options", &self.options)
            .field("constructed", &self.instance.is_some())
            .finish()
    }
}

/// Maps marker ids to their module descriptors.
#[derive(Debug)]
pub struct ModuleRegistry {
    context: ModuleContext,
    descriptors: HashMap<String, ModuleDescriptor>,
}

impl ModuleRegistry {
    pub fn new(context: ModuleContext) -> Self {
        Self {
            context,
            descriptors: HashMap::new(),
        }
    }

    pub fn context(&self) -> &ModuleContext {
        &self.context
    }

    /// Registers a factory for `marker_id`. Returns `false` when the
    /// registration was rejected.
    ///
    /// A second registration for the same marker replaces the descriptor
    /// without cleaning up an instance the first one may already have built.
    pub fn register(
        &mut self,
        marker_id: impl Into<String>,
        factory: ModuleFactory,
        options: ModuleOptions,
    ) -> bool {
        let marker_id = marker_id.into();
        if marker_id.trim().is_empty() {
            let err = ExhibitError::config("module registration without a marker id");
            tracing::warn!(error = %err, "registration dropped");
            return false;
        }

        let descriptor = ModuleDescriptor {
            marker_id: marker_id.clone(),
            factory,
            options,
            instance: None,
        };
        if let Some(previous) = self.descriptors.insert(marker_id.clone(), descriptor) {
            if previous.is_constructed() {
                tracing::warn!(
                    marker_id = %marker_id,
                    "re-registration replaced a live module without cleaning it up"
                );
            }
        }
        true
    }

    /// Returns the cached instance, constructing and initializing it on first
    /// use. Construction failures are logged and yield `None`; nothing is
    /// cached so a later detection retries.
    pub fn get_or_create(&mut self, marker_id: &str) -> Option<ModuleHandle> {
        let descriptor = self.descriptors.get_mut(marker_id)?;
        if let Some(instance) = &descriptor.instance {
            return Some(instance.clone());
        }

        let context = self.context.for_marker(marker_id);
        let factory = descriptor.factory.clone();
        let options = &descriptor.options;
        let mut module = match isolate(|| factory(&context, options)) {
            Ok(module) => module,
            Err(reason) => {
                let err = ExhibitError::Construction {
                    marker_id: marker_id.to_string(),
                    reason,
                };
                tracing::warn!(error = %err, "module construction failed");
                return None;
            }
        };

        if let Err(reason) = isolate(|| module.initialize()) {
            let err = ExhibitError::Construction {
                marker_id: marker_id.to_string(),
                reason,
            };
            tracing::warn!(error = %err, "module initialization failed");
            if let Err(reason) = isolate(|| module.cleanup()) {
                tracing::warn!(marker_id, %reason, "cleanup after failed initialization failed");
            }
            return None;
        }

        tracing::debug!(marker_id, "module constructed");
        let instance: ModuleHandle = Arc::new(Mutex::new(module));
        descriptor.instance = Some(instance.clone());
        Some(instance)
    }

    pub fn contains(&self, marker_id: &str) -> bool {
        self.descriptors.contains_key(marker_id)
    }

    pub fn descriptor(&self, marker_id: &str) -> Option<&ModuleDescriptor> {
        self.descriptors.get(marker_id)
    }

    /// Constructed instance for `marker_id`, if any.
    pub fn instance(&self, marker_id: &str) -> Option<ModuleHandle> {
        self.descriptors.get(marker_id)?.instance.clone()
    }

    /// Registered marker ids, sorted.
    pub fn marker_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.descriptors.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn constructed_count(&self) -> usize {
        self.descriptors
            .values()
            .filter(|descriptor| descriptor.is_constructed())
            .count()
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Takes every constructed instance out of the registry, leaving the
    /// descriptors registered.
    pub(crate) fn drain_instances(&mut self) -> Vec<(String, ModuleHandle)> {
        self.descriptors
            .values_mut()
            .filter_map(|descriptor| {
                descriptor
                    .instance
                    .take()
                    .map(|instance| (descriptor.marker_id.clone(), instance))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artwork::testing::{failing_factory, stub_factory};
    use crate::artwork::{factory, ArtworkModule};

    fn registry() -> ModuleRegistry {
        ModuleRegistry::new(ModuleContext::default())
    }

    #[test]
    fn constructs_lazily_and_reuses_the_instance() {
        let mut registry = registry();
        let (factory, calls) = stub_factory();
        assert!(registry.register("m1", factory, ModuleOptions::new()));
        assert_eq!(calls.lock().constructed, 0);

        let first = registry.get_or_create("m1").unwrap();
        let second = registry.get_or_create("m1").unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        let calls = calls.lock();
        assert_eq!(calls.constructed, 1);
        assert_eq!(calls.initialized, 1);
    }

    #[test]
    fn blank_marker_ids_are_rejected() {
        let mut registry = registry();
        let (factory, _) = stub_factory();

        assert!(!registry.register("  ", factory, ModuleOptions::new()));
        assert!(registry.is_empty());
    }

    #[test]
    fn unknown_markers_yield_none() {
        let mut registry = registry();
        assert!(registry.get_or_create("ghost").is_none());
    }

    #[test]
    fn construction_errors_yield_none_and_retry_later() {
        let mut registry = registry();
        registry.register("bad", failing_factory(), ModuleOptions::new());

        assert!(registry.get_or_create("bad").is_none());
        assert!(registry.get_or_create("bad").is_none());
        assert_eq!(registry.constructed_count(), 0);
    }

    #[test]
    fn construction_panics_are_contained() {
        let mut registry = registry();
        registry.register(
            "panicky",
            factory(|_, _| -> crate::Result<Box<dyn ArtworkModule>> { panic!("no webgl") }),
            ModuleOptions::new(),
        );

        assert!(registry.get_or_create("panicky").is_none());
    }

    #[test]
    fn factories_see_their_marker_and_options() {
        let mut registry = registry();
        let seen = Arc::new(Mutex::new(None));
        let sink = seen.clone();
        let (inner, _) = stub_factory();
        let mut options = ModuleOptions::new();
        options.insert("hue".to_string(), serde_json::json!(0.3));
        registry.register(
            "m7",
            factory(move |context, options| {
                *sink.lock() = Some((context.marker_id.clone(), options.get("hue").cloned()));
                inner(context, options)
            }),
            options,
        );

        registry.get_or_create("m7").unwrap();

        let (marker, hue) = seen.lock().clone().unwrap();
        assert_eq!(marker, "m7");
        assert_eq!(hue, Some(serde_json::json!(0.3)));
    }

    #[test]
    fn reregistration_drops_the_cached_instance() {
        let mut registry = registry();
        let (first, first_calls) = stub_factory();
        let (second, second_calls) = stub_factory();
        registry.register("m1", first, ModuleOptions::new());
        registry.get_or_create("m1").unwrap();

        registry.register("m1", second, ModuleOptions::new());
        registry.get_or_create("m1").unwrap();

        assert_eq!(first_calls.lock().cleaned_up, 0);
        assert_eq!(second_calls.lock().constructed, 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn drain_takes_only_constructed_instances() {
        let mut registry = registry();
        for id in ["a", "b", "c"] {
            let (factory, _) = stub_factory();
            registry.register(id, factory, ModuleOptions::new());
        }
        registry.get_or_create("a");
        registry.get_or_create("c");

        let mut drained: Vec<String> = registry
            .drain_instances()
            .into_iter()
            .map(|(id, _)| id)
            .collect();
        drained.sort();

        assert_eq!(drained, vec!["a", "c"]);
        assert_eq!(registry.constructed_count(), 0);
        assert_eq!(registry.marker_ids(), vec!["a", "b", "c"]);
    }
}
