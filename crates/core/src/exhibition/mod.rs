use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::artwork::{ModuleContext, ModuleFactory, ModuleOptions, VisualizationContainer};
use crate::config::ExhibitConfig;
use crate::gallery::ArtworkCatalog;
use crate::lifecycle::{LifecycleManager, MarkerEvent, MarkerOutcome};
use crate::presentation::Presentation;
use crate::{ExhibitError, Result};

/// Everything that can happen to a running exhibition: marker tracking,
/// visitor input, and clock ticks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExhibitEvent {
    Found(String),
    Lost(String),
    /// The visitor pressed the exit control.
    Exit,
    /// The visitor pressed the data button of the active artwork.
    PopupToggle(String),
    /// Seconds of wall time elapsed since the previous tick.
    Tick(f32),
}

impl ExhibitEvent {
    /// Parses a JSON array of events, e.g.
    /// `[{"found": "m1"}, {"tick": 0.5}, "exit"]`.
    pub fn parse_script(raw: &str) -> Result<Vec<Self>> {
        Ok(serde_json::from_str(raw)?)
    }
}

/// A running exhibition: the lifecycle manager plus the shared resources it
/// and its modules were built with.
#[derive(Debug)]
pub struct Exhibition {
    manager: LifecycleManager,
    context: ModuleContext,
}

impl Exhibition {
    pub fn new(container: VisualizationContainer, presentation: Arc<dyn Presentation>) -> Self {
        let context = ModuleContext::new(container, presentation);
        Self {
            manager: LifecycleManager::new(context.clone()),
            context,
        }
    }

    /// Builds an exhibition and registers every configured marker. Markers
    /// whose artwork kind has no factory in `catalog` are skipped.
    pub fn from_config(
        config: &ExhibitConfig,
        catalog: &ArtworkCatalog,
        presentation: Arc<dyn Presentation>,
    ) -> Self {
        let mut exhibition = Self::new(
            VisualizationContainer::new(config.container_id.clone()),
            presentation,
        );
        for marker in &config.markers {
            let Some(factory) = catalog.factory(marker.artwork) else {
                let err = ExhibitError::config(format!(
                    "no constructor for artwork {:?} of marker `{}`",
                    marker.artwork, marker.marker_id
                ));
                tracing::warn!(error = %err, "registration dropped");
                continue;
            };
            exhibition.register_module(marker.marker_id.clone(), factory, marker.options.clone());
        }
        tracing::info!(
            markers = exhibition.manager.registry().len(),
            container = exhibition.context.container.id(),
            "exhibition ready"
        );
        exhibition
    }

    pub fn register_module(
        &mut self,
        marker_id: impl Into<String>,
        factory: ModuleFactory,
        options: ModuleOptions,
    ) -> bool {
        self.manager.register_module(marker_id, factory, options)
    }

    /// Applies one event. Returns the marker outcome for marker events.
    pub fn dispatch(&mut self, event: &ExhibitEvent) -> Option<MarkerOutcome> {
        match event {
            ExhibitEvent::Found(marker_id) => {
                Some(self.manager.handle(&MarkerEvent::Found(marker_id.clone())))
            }
            ExhibitEvent::Lost(marker_id) => {
                Some(self.manager.handle(&MarkerEvent::Lost(marker_id.clone())))
            }
            ExhibitEvent::Exit => {
                self.manager.request_exit();
                None
            }
            ExhibitEvent::PopupToggle(marker_id) => {
                self.toggle_popup(marker_id);
                None
            }
            ExhibitEvent::Tick(seconds) => {
                self.context.scheduler.tick(*seconds);
                None
            }
        }
    }

    /// Toggles the data overlay of `marker_id`, but only while its artwork is
    /// the active one.
    pub fn toggle_popup(&self, marker_id: &str) {
        if self.manager.active_module_id() == Some(marker_id) {
            self.context.popups.toggle(marker_id);
            if self.context.popups.is_visible(marker_id) {
                self.context.popups.start_cycling(marker_id);
            }
        } else {
            tracing::debug!(marker_id, "popup toggle ignored for inactive artwork");
        }
    }

    pub fn manager(&self) -> &LifecycleManager {
        &self.manager
    }

    pub fn manager_mut(&mut self) -> &mut LifecycleManager {
        &mut self.manager
    }

    pub fn context(&self) -> &ModuleContext {
        &self.context
    }

    /// Session end: tear the modules down, then release the coordinators and
    /// cancel whatever tasks are left.
    pub fn teardown(&mut self) {
        self.manager.teardown();
        self.context.popups.teardown();
        self.context.audio.teardown();
        self.context.scheduler.clear();
    }
}
