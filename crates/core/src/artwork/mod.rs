//! Lifecycle contract shared by every artwork module.
//!
//! The manager only ever talks to modules through [`ArtworkModule`]; how a
//! module renders, animates, or plays sound is its own business.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

use crate::audio::AudioCoordinator;
use crate::popup::PopupCoordinator;
use crate::presentation::{NullPresentation, Presentation};
use crate::timeline::Scheduler;
use crate::Result;

/// Free-form constructor options attached to a marker.
pub type ModuleOptions = serde_json::Map<String, Value>;

/// A constructed module, shared between the registry and the manager.
pub type ModuleHandle = Arc<Mutex<Box<dyn ArtworkModule>>>;

/// Builds a module for a marker. Called at most once per registration.
pub type ModuleFactory =
    Arc<dyn Fn(&ModuleContext, &ModuleOptions) -> Result<Box<dyn ArtworkModule>> + Send + Sync>;

/// Capability set every artwork implements.
pub trait ArtworkModule: Send + fmt::Debug {
    /// One-time setup right after construction.
    fn initialize(&mut self) -> Result<()> {
        Ok(())
    }

    fn activate(&mut self) -> Result<()>;

    /// Must cancel every task the module scheduled.
    fn deactivate(&mut self) -> Result<()>;

    /// Releases coordinator registrations. Called once, at teardown.
    fn cleanup(&mut self) -> Result<()>;

    fn is_active(&self) -> bool;

    /// Whether the module is mid-animation or showing an overlay. A busy
    /// active module is never interrupted by marker detection.
    fn is_busy(&self) -> bool;
}

/// Handle to the single element every artwork draws into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisualizationContainer {
    id: String,
}

impl VisualizationContainer {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl Default for VisualizationContainer {
    fn default() -> Self {
        Self::new("visualization-container")
    }
}

/// Everything a factory receives besides its options.
#[derive(Clone, Debug)]
pub struct ModuleContext {
    /// Marker the module is being built for. Doubles as its audio and popup
    /// registration id.
    pub marker_id: String,
    pub container: VisualizationContainer,
    pub audio: AudioCoordinator,
    pub popups: PopupCoordinator,
    pub scheduler: Scheduler,
    pub presentation: Arc<dyn Presentation>,
}

impl ModuleContext {
    pub fn new(container: VisualizationContainer, presentation: Arc<dyn Presentation>) -> Self {
        Self {
            marker_id: String::new(),
            container,
            audio: AudioCoordinator::with_presentation(presentation.clone()),
            popups: PopupCoordinator::new(),
            scheduler: Scheduler::new(),
            presentation,
        }
    }

    /// Same shared resources, scoped to one marker.
    pub fn for_marker(&self, marker_id: &str) -> Self {
        Self {
            marker_id: marker_id.to_string(),
            ..self.clone()
        }
    }
}

impl Default for ModuleContext {
    fn default() -> Self {
        Self::new(VisualizationContainer::default(), Arc::new(NullPresentation))
    }
}

/// Wraps a closure as a [`ModuleFactory`].
pub fn factory<F>(f: F) -> ModuleFactory
where
    F: Fn(&ModuleContext, &ModuleOptions) -> Result<Box<dyn ArtworkModule>> + Send + Sync + 'static,
{
    Arc::new(f)
}

pub(crate) fn f32_option(options: &ModuleOptions, key: &str, default: f32) -> f32 {
    options
        .get(key)
        .and_then(Value::as_f64)
        .map_or(default, |value| value as f32)
}

pub(crate) fn bool_option(options: &ModuleOptions, key: &str, default: bool) -> bool {
    options.get(key).and_then(Value::as_bool).unwrap_or(default)
}

pub(crate) fn string_list_option(options: &ModuleOptions, key: &str) -> Vec<String> {
    options
        .get(key)
        .and_then(Value::as_array)
        .map(|values| {
            values
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
