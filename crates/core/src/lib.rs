//! Core library for the AR Exhibit installation.
//!
//! Physical markers trigger one of several artwork modules. The
//! [`LifecycleManager`] decides which single module is active, the
//! [`AudioCoordinator`] and [`PopupCoordinator`] arbitrate the shared audio
//! slot and data overlay, and the [`Scheduler`] drives every animation and
//! cycling loop as a cancellable task. Rendering, marker tracking, and page
//! presentation are external; they plug in through [`ArtworkModule`],
//! [`MarkerEvent`], and [`Presentation`].

pub mod artwork;
pub mod audio;
pub mod config;
pub mod error;
pub mod exhibition;
pub mod gallery;
pub mod lifecycle;
pub mod popup;
pub mod presentation;
pub mod registry;
pub mod timeline;

pub use artwork::{
    factory, ArtworkModule, ModuleContext, ModuleFactory, ModuleHandle, ModuleOptions,
    VisualizationContainer,
};
pub use audio::{AudioCoordinator, AudioKind, PlayableAudio};
pub use config::{ExhibitConfig, MarkerConfig};
pub use error::{ExhibitError, Result};
pub use exhibition::{ExhibitEvent, Exhibition};
pub use gallery::{
    AnimatedArtwork, ArtworkCatalog, ArtworkKind, AudioArtwork, DataOverlayArtwork,
    SimulatedAudio,
};
pub use lifecycle::{LifecycleManager, ManagerState, MarkerEvent, MarkerOutcome};
pub use popup::{PopupController, PopupCoordinator};
pub use presentation::{NullPresentation, Presentation, TracingPresentation};
pub use registry::{ModuleDescriptor, ModuleRegistry};
pub use timeline::{PlaybackClock, Scheduler, TaskControl, TaskHandle};
