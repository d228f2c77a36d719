//! Marker-driven activation of artwork modules.
//!
//! [`LifecycleManager`] keeps at most one module active. Marker detections
//! switch modules, but only when the current one is not busy; losing a
//! marker never deactivates anything, only an explicit exit does.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::artwork::{ModuleContext, ModuleFactory, ModuleHandle, ModuleOptions};
use crate::error::isolate;
use crate::presentation::Presentation;
use crate::registry::ModuleRegistry;
use crate::ExhibitError;

/// Event emitted by the marker tracking layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerEvent {
    Found(String),
    Lost(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManagerState {
    Idle,
    Active(String),
}

/// What a marker event did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerOutcome {
    Activated,
    /// The marker's module was already the active one.
    AlreadyActive,
    /// The active module was busy; the event was dropped.
    IgnoredBusy,
    /// No module is registered for the marker.
    Unregistered,
    /// Construction or activation failed. A construction failure leaves the
    /// current module active; an activation failure leaves the manager idle.
    Failed,
    /// Marker-lost events never change state.
    Ignored,
}

struct ActiveModule {
    marker_id: String,
    instance: ModuleHandle,
}

pub struct LifecycleManager {
    registry: ModuleRegistry,
    active: Option<ActiveModule>,
    presentation: Arc<dyn Presentation>,
}

impl LifecycleManager {
    pub fn new(context: ModuleContext) -> Self {
        let presentation = context.presentation.clone();
        Self {
            registry: ModuleRegistry::new(context),
            active: None,
            presentation,
        }
    }

    /// Registers the module factory for a marker. Called once per marker at
    /// setup time.
    pub fn register_module(
        &mut self,
        marker_id: impl Into<String>,
        factory: ModuleFactory,
        options: ModuleOptions,
    ) -> bool {
        self.registry.register(marker_id, factory, options)
    }

    pub fn handle(&mut self, event: &MarkerEvent) -> MarkerOutcome {
        match event {
            MarkerEvent::Found(marker_id) => self.on_marker_found(marker_id),
            MarkerEvent::Lost(marker_id) => self.on_marker_lost(marker_id),
        }
    }

    pub fn on_marker_found(&mut self, marker_id: &str) -> MarkerOutcome {
        if self.is_busy() {
            tracing::debug!(
                marker_id,
                active = ?self.active_module_id(),
                "active module busy, marker ignored"
            );
            return MarkerOutcome::IgnoredBusy;
        }

        if !self.registry.contains(marker_id) {
            tracing::warn!(marker_id, "no module registered for marker");
            return MarkerOutcome::Unregistered;
        }

        if self.active_module_id() == Some(marker_id) {
            return MarkerOutcome::AlreadyActive;
        }

        // Construct before deactivating: a failed construction must leave the
        // current artwork active.
        let Some(instance) = self.registry.get_or_create(marker_id) else {
            return MarkerOutcome::Failed;
        };

        let had_active = self.deactivate_current();

        let activated = {
            let mut module = instance.lock();
            let result = isolate(|| module.activate());
            if result.is_err() {
                // Undo whatever the module managed to set up.
                if let Err(reason) = isolate(|| module.deactivate()) {
                    let err = ExhibitError::Deactivation {
                        marker_id: marker_id.to_string(),
                        reason,
                    };
                    tracing::warn!(error = %err, "rollback after failed activation failed");
                }
            }
            result
        };

        if let Err(reason) = activated {
            let err = ExhibitError::Activation {
                marker_id: marker_id.to_string(),
                reason,
            };
            tracing::warn!(error = %err, "module activation failed");
            if had_active {
                self.presentation.hide_exit_controls();
                self.presentation.show_instructions();
            }
            return MarkerOutcome::Failed;
        }

        tracing::info!(marker_id, "module activated");
        self.active = Some(ActiveModule {
            marker_id: marker_id.to_string(),
            instance,
        });
        self.presentation.show_exit_controls();
        self.presentation.hide_instructions();
        MarkerOutcome::Activated
    }

    /// The active module stays up after its marker leaves the camera view.
    pub fn on_marker_lost(&mut self, marker_id: &str) -> MarkerOutcome {
        tracing::debug!(marker_id, active = ?self.active_module_id(), "marker lost");
        MarkerOutcome::Ignored
    }

    /// The visitor pressed "exit": deactivate the current module and return
    /// to the instructions screen. Returns whether anything was active.
    pub fn request_exit(&mut self) -> bool {
        if self.active.is_none() {
            return false;
        }
        self.deactivate_current();
        self.presentation.hide_exit_controls();
        self.presentation.show_instructions();
        true
    }

    /// Whether the active module reports itself busy.
    pub fn is_busy(&self) -> bool {
        let Some(active) = &self.active else {
            return false;
        };
        let module = active.instance.lock();
        match isolate(|| Ok(module.is_busy())) {
            Ok(busy) => busy,
            Err(reason) => {
                tracing::warn!(marker_id = %active.marker_id, %reason, "busy check failed");
                false
            }
        }
    }

    pub fn active_module_id(&self) -> Option<&str> {
        self.active.as_ref().map(|active| active.marker_id.as_str())
    }

    pub fn active_instance(&self) -> Option<ModuleHandle> {
        self.active.as_ref().map(|active| active.instance.clone())
    }

    pub fn state(&self) -> ManagerState {
        match self.active_module_id() {
            Some(marker_id) => ManagerState::Active(marker_id.to_string()),
            None => ManagerState::Idle,
        }
    }

    pub fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    pub fn context(&self) -> &ModuleContext {
        self.registry.context()
    }

    /// Deactivates the active module, then cleans up every constructed
    /// instance. Failures are logged per module and never stop the sweep.
    pub fn teardown(&mut self) {
        let orphan = self.active.as_ref().map(|active| active.instance.clone());
        self.deactivate_current();

        let mut instances = self.registry.drain_instances();
        if let Some(orphan) = orphan {
            // Left behind by a re-registration of its marker.
            if !instances.iter().any(|(_, instance)| Arc::ptr_eq(instance, &orphan)) {
                instances.push(("<replaced>".to_string(), orphan));
            }
        }

        for (marker_id, instance) in instances {
            let mut module = instance.lock();
            if let Err(reason) = isolate(|| module.cleanup()) {
                let err = ExhibitError::Cleanup { marker_id, reason };
                tracing::warn!(error = %err, "module cleanup failed");
            }
        }
        tracing::info!("lifecycle manager torn down");
    }

    /// Public teardown entry point, called once at session end.
    pub fn cleanup(&mut self) {
        self.teardown();
    }

    /// Clears the active slot before anything else runs so that a failing
    /// `deactivate` cannot leave the manager stuck. Returns whether a module
    /// was active.
    fn deactivate_current(&mut self) -> bool {
        let Some(active) = self.active.take() else {
            return false;
        };
        let mut module = active.instance.lock();
        match isolate(|| module.deactivate()) {
            Ok(()) => tracing::info!(marker_id = %active.marker_id, "module deactivated"),
            Err(reason) => {
                let err = ExhibitError::Deactivation {
                    marker_id: active.marker_id.clone(),
                    reason,
                };
                tracing::warn!(error = %err, "module deactivation failed");
            }
        }
        true
    }
}

impl fmt::Debug for LifecycleManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleManager")
            .field("active", &self.active_module_id())
            .field("registry", &self.registry)
            .finish()
    }
}
