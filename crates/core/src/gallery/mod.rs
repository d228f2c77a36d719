//! Artwork variants shipped with the exhibition.
//!
//! Rendering lives outside this crate; each variant here only models the
//! lifecycle side of an artwork: the loops it schedules, the audio it plays,
//! and the overlay it shows.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::artwork::{
    bool_option, f32_option, factory, string_list_option, ArtworkModule, ModuleContext,
    ModuleFactory, ModuleOptions,
};
use crate::audio::{AudioCoordinator, AudioKind, PlayableAudio};
use crate::popup::{PopupController, PopupCoordinator};
use crate::timeline::{Scheduler, TaskControl, TaskHandle};
use crate::{ExhibitError, Result};

const DEFAULT_ANIMATION_SECONDS: f32 = 4.0;
const DEFAULT_CYCLE_SECONDS: f32 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtworkKind {
    Animated,
    Audio,
    DataOverlay,
}

#[derive(Debug, Default)]
struct AnimationState {
    active: bool,
    running: bool,
    frames: u64,
}

/// Plays an intro animation on activation and reports busy until it ends.
///
/// Options: `duration_seconds` (default 4), `continuous` (never ends, so the
/// artwork stays busy until the visitor exits).
#[derive(Debug)]
pub struct AnimatedArtwork {
    marker_id: String,
    scheduler: Scheduler,
    duration: f32,
    continuous: bool,
    state: Arc<Mutex<AnimationState>>,
    task: Option<TaskHandle>,
}

impl AnimatedArtwork {
    pub fn new(context: &ModuleContext, options: &ModuleOptions) -> Self {
        Self {
            marker_id: context.marker_id.clone(),
            scheduler: context.scheduler.clone(),
            duration: f32_option(options, "duration_seconds", DEFAULT_ANIMATION_SECONDS).max(0.0),
            continuous: bool_option(options, "continuous", false),
            state: Arc::default(),
            task: None,
        }
    }

    pub fn frames_rendered(&self) -> u64 {
        self.state.lock().frames
    }

    fn cancel_task(&mut self) {
        if let Some(task) = self.task.take() {
            task.cancel();
        }
    }
}

impl ArtworkModule for AnimatedArtwork {
    fn activate(&mut self) -> Result<()> {
        self.cancel_task();
        {
            let mut state = self.state.lock();
            state.active = true;
            state.running = true;
        }

        let state = self.state.clone();
        let started_at = self.scheduler.now();
        let duration = self.duration;
        let continuous = self.continuous;
        self.task = Some(self.scheduler.schedule_frame(move |now| {
            let mut state = state.lock();
            if !state.active {
                return TaskControl::Stop;
            }
            state.frames += 1;
            if !continuous && now - started_at >= duration {
                state.running = false;
                return TaskControl::Stop;
            }
            TaskControl::Continue
        }));
        tracing::debug!(marker_id = %self.marker_id, "animation started");
        Ok(())
    }

    fn deactivate(&mut self) -> Result<()> {
        self.cancel_task();
        let mut state = self.state.lock();
        state.active = false;
        state.running = false;
        Ok(())
    }

    fn cleanup(&mut self) -> Result<()> {
        self.deactivate()
    }

    fn is_active(&self) -> bool {
        self.state.lock().active
    }

    fn is_busy(&self) -> bool {
        self.state.lock().running && self.task.as_ref().is_some_and(TaskHandle::is_pending)
    }
}

/// Stand-in for a decoded audio clip; tracks transport state only.
#[derive(Debug, Default, Clone)]
pub struct SimulatedAudio {
    state: Arc<Mutex<SimulatedAudioState>>,
}

#[derive(Debug, Default)]
struct SimulatedAudioState {
    playing: bool,
    position: f32,
}

impl SimulatedAudio {
    pub fn position(&self) -> f32 {
        self.state.lock().position
    }

    /// Moves the playhead forward while playing.
    pub fn advance(&self, seconds: f32) {
        let mut state = self.state.lock();
        if state.playing {
            state.position += seconds.max(0.0);
        }
    }
}

impl PlayableAudio for SimulatedAudio {
    fn play(&mut self) -> Result<()> {
        self.state.lock().playing = true;
        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        self.state.lock().playing = false;
        Ok(())
    }

    fn rewind(&mut self) -> Result<()> {
        self.state.lock().position = 0.0;
        Ok(())
    }

    fn is_playing(&self) -> bool {
        self.state.lock().playing
    }
}

/// Soundscape artwork: plays its clip through the audio coordinator while
/// active. Never busy, so another marker can interrupt it.
///
/// Options: `audio_kind` (`"element"` or `"context"`, default element).
#[derive(Debug)]
pub struct AudioArtwork {
    marker_id: String,
    audio: AudioCoordinator,
    scheduler: Scheduler,
    kind: AudioKind,
    clip: SimulatedAudio,
    active: Arc<Mutex<bool>>,
    transport: Option<TaskHandle>,
}

impl AudioArtwork {
    pub fn new(context: &ModuleContext, options: &ModuleOptions) -> Result<Self> {
        let kind = match options.get("audio_kind") {
            None => AudioKind::Element,
            Some(value) => serde_json::from_value(value.clone()).map_err(|err| {
                let marker_id = &context.marker_id;
                ExhibitError::config(format!("invalid audio_kind for `{marker_id}`: {err}"))
            })?,
        };
        Ok(Self {
            marker_id: context.marker_id.clone(),
            audio: context.audio.clone(),
            scheduler: context.scheduler.clone(),
            kind,
            clip: SimulatedAudio::default(),
            active: Arc::default(),
            transport: None,
        })
    }

    pub fn clip(&self) -> &SimulatedAudio {
        &self.clip
    }
}

impl ArtworkModule for AudioArtwork {
    fn initialize(&mut self) -> Result<()> {
        self.audio
            .register(self.marker_id.clone(), Box::new(self.clip.clone()), self.kind);
        Ok(())
    }

    fn activate(&mut self) -> Result<()> {
        *self.active.lock() = true;
        self.audio.play(&self.marker_id);

        let active = self.active.clone();
        let clip = self.clip.clone();
        let mut last = self.scheduler.now();
        self.transport = Some(self.scheduler.schedule_frame(move |now| {
            if !*active.lock() {
                return TaskControl::Stop;
            }
            clip.advance(now - last);
            last = now;
            TaskControl::Continue
        }));
        Ok(())
    }

    fn deactivate(&mut self) -> Result<()> {
        if let Some(task) = self.transport.take() {
            task.cancel();
        }
        *self.active.lock() = false;
        self.audio.stop(&self.marker_id);
        Ok(())
    }

    fn cleanup(&mut self) -> Result<()> {
        self.deactivate()?;
        self.audio.unregister(&self.marker_id);
        Ok(())
    }

    fn is_active(&self) -> bool {
        *self.active.lock()
    }

    fn is_busy(&self) -> bool {
        false
    }
}

#[derive(Debug, Default)]
struct OverlayState {
    visible: bool,
    datasets: Vec<String>,
    index: usize,
}

impl OverlayState {
    fn advance(&mut self) {
        if !self.datasets.is_empty() {
            self.index = (self.index + 1) % self.datasets.len();
        }
    }
}

/// Popup controller backing [`DataOverlayArtwork`].
#[derive(Debug)]
struct DatasetOverlay {
    state: Arc<Mutex<OverlayState>>,
    scheduler: Scheduler,
    cycle_seconds: f32,
    cycling: Option<TaskHandle>,
}

impl PopupController for DatasetOverlay {
    fn show_data_overlay(&mut self) -> Result<()> {
        self.state.lock().visible = true;
        Ok(())
    }

    fn hide_data_overlay(&mut self) -> Result<()> {
        self.state.lock().visible = false;
        Ok(())
    }

    fn cycle_to_next_dataset(&mut self) -> Result<()> {
        self.state.lock().advance();
        Ok(())
    }

    fn start_data_cycling(&mut self) -> Result<()> {
        self.stop_data_cycling()?;
        let state = self.state.clone();
        self.cycling = Some(self.scheduler.schedule_interval(self.cycle_seconds, move |_| {
            let mut state = state.lock();
            if !state.visible {
                return TaskControl::Stop;
            }
            state.advance();
            TaskControl::Continue
        }));
        Ok(())
    }

    fn stop_data_cycling(&mut self) -> Result<()> {
        if let Some(task) = self.cycling.take() {
            task.cancel();
        }
        Ok(())
    }
}

/// Data sculpture with a cycling dataset overlay. Busy while the overlay is
/// open.
///
/// Options: `datasets` (list of names), `cycle_seconds` (default 5),
/// `show_on_activate` (default false; otherwise the visitor opens it).
#[derive(Debug)]
pub struct DataOverlayArtwork {
    marker_id: String,
    popups: PopupCoordinator,
    overlay: Arc<Mutex<OverlayState>>,
    scheduler: Scheduler,
    cycle_seconds: f32,
    show_on_activate: bool,
    active: bool,
}

impl DataOverlayArtwork {
    pub fn new(context: &ModuleContext, options: &ModuleOptions) -> Self {
        let overlay = OverlayState {
            datasets: string_list_option(options, "datasets"),
            ..OverlayState::default()
        };
        Self {
            marker_id: context.marker_id.clone(),
            popups: context.popups.clone(),
            overlay: Arc::new(Mutex::new(overlay)),
            scheduler: context.scheduler.clone(),
            cycle_seconds: f32_option(options, "cycle_seconds", DEFAULT_CYCLE_SECONDS),
            show_on_activate: bool_option(options, "show_on_activate", false),
            active: false,
        }
    }

    /// Name of the dataset currently on display.
    pub fn current_dataset(&self) -> Option<String> {
        let overlay = self.overlay.lock();
        overlay.datasets.get(overlay.index).cloned()
    }
}

impl ArtworkModule for DataOverlayArtwork {
    fn initialize(&mut self) -> Result<()> {
        let controller = DatasetOverlay {
            state: self.overlay.clone(),
            scheduler: self.scheduler.clone(),
            cycle_seconds: self.cycle_seconds,
            cycling: None,
        };
        self.popups.register(self.marker_id.clone(), Box::new(controller));
        Ok(())
    }

    fn activate(&mut self) -> Result<()> {
        self.active = true;
        if self.show_on_activate {
            self.popups.show(&self.marker_id);
            self.popups.start_cycling(&self.marker_id);
        }
        Ok(())
    }

    fn deactivate(&mut self) -> Result<()> {
        self.popups.hide(&self.marker_id);
        self.active = false;
        Ok(())
    }

    fn cleanup(&mut self) -> Result<()> {
        self.active = false;
        self.popups.unregister(&self.marker_id);
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn is_busy(&self) -> bool {
        self.overlay.lock().visible
    }
}

/// Maps configured artwork kinds to their factories.
#[derive(Clone)]
pub struct ArtworkCatalog {
    factories: HashMap<ArtworkKind, ModuleFactory>,
}

impl ArtworkCatalog {
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Catalog with every built-in artwork.
    pub fn standard() -> Self {
        let mut catalog = Self::empty();
        catalog.insert(
            ArtworkKind::Animated,
            factory(|context, options| {
                let artwork = AnimatedArtwork::new(context, options);
                let module: Box<dyn ArtworkModule> = Box::new(artwork);
                Ok(module)
            }),
        );
        catalog.insert(
            ArtworkKind::Audio,
            factory(|context, options| {
                let module: Box<dyn ArtworkModule> = Box::new(AudioArtwork::new(context, options)?);
                Ok(module)
            }),
        );
        catalog.insert(
            ArtworkKind::DataOverlay,
            factory(|context, options| {
                let module: Box<dyn ArtworkModule> =
                    Box::new(DataOverlayArtwork::new(context, options));
                Ok(module)
            }),
        );
        catalog
    }

    pub fn insert(&mut self, kind: ArtworkKind, factory: ModuleFactory) {
        self.factories.insert(kind, factory);
    }

    pub fn factory(&self, kind: ArtworkKind) -> Option<ModuleFactory> {
        self.factories.get(&kind).cloned()
    }
}

impl Default for ArtworkCatalog {
    fn default() -> Self {
        Self::standard()
    }
}

impl fmt::Debug for ArtworkCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<_> = self.factories.keys().collect();
        kinds.sort_by_key(|kind| format!("{kind:?}"));
        f.debug_struct("ArtworkCatalog").field("kinds", &kinds).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn options(value: serde_json::Value) -> ModuleOptions {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn animation_is_busy_until_its_duration_elapses() {
        let context = ModuleContext::default().for_marker("thermal");
        let options = options(json!({"duration_seconds": 1.0}));
        let mut artwork = AnimatedArtwork::new(&context, &options);

        artwork.activate().unwrap();
        assert!(artwork.is_busy());
        context.scheduler.tick(0.5);
        assert!(artwork.is_busy());
        context.scheduler.tick(0.5);
        assert!(!artwork.is_busy());
        assert!(artwork.is_active());
        assert_eq!(artwork.frames_rendered(), 2);
    }

    #[test]
    fn continuous_animation_stays_busy_until_deactivated() {
        let context = ModuleContext::default().for_marker("waves");
        let mut artwork = AnimatedArtwork::new(&context, &options(json!({"continuous": true})));

        artwork.activate().unwrap();
        for _ in 0..100 {
            context.scheduler.tick(0.1);
        }
        assert!(artwork.is_busy());

        artwork.deactivate().unwrap();
        assert!(!artwork.is_busy());
        assert_eq!(context.scheduler.pending(), 0);
        let frames = artwork.frames_rendered();
        context.scheduler.tick(0.1);
        assert_eq!(artwork.frames_rendered(), frames);
    }

    #[test]
    fn audio_artworks_hand_over_playback() {
        let context = ModuleContext::default();
        let first_ctx = context.for_marker("first");
        let second_ctx = context.for_marker("second");
        let mut first = AudioArtwork::new(&first_ctx, &ModuleOptions::new()).unwrap();
        let mut second =
            AudioArtwork::new(&second_ctx, &options(json!({"audio_kind": "context"}))).unwrap();
        first.initialize().unwrap();
        second.initialize().unwrap();

        first.activate().unwrap();
        context.scheduler.tick(2.0);
        assert!(first.clip().position() > 0.0);

        second.activate().unwrap();
        assert!(!first.clip().is_playing());
        assert_eq!(first.clip().position(), 0.0);
        assert!(second.clip().is_playing());
        assert_eq!(context.audio.current_playing_id().as_deref(), Some("second"));

        second.cleanup().unwrap();
        assert!(!context.audio.is_registered("second"));
        assert_eq!(context.audio.current_playing_id(), None);
    }

    #[test]
    fn invalid_audio_kind_is_a_configuration_error() {
        let context = ModuleContext::default().for_marker("bad");
        let err = AudioArtwork::new(&context, &options(json!({"audio_kind": "theremin"})))
            .unwrap_err();
        assert!(matches!(err, ExhibitError::Configuration(_)));
    }

    #[test]
    fn overlay_cycles_datasets_while_visible() {
        let context = ModuleContext::default().for_marker("sculpture");
        let mut artwork = DataOverlayArtwork::new(
            &context,
            &options(json!({
                "datasets": ["co2", "ice", "sea"],
                "cycle_seconds": 1.0,
                "show_on_activate": true,
            })),
        );
        artwork.initialize().unwrap();

        artwork.activate().unwrap();
        assert!(artwork.is_busy());
        assert_eq!(artwork.current_dataset().as_deref(), Some("co2"));
        context.scheduler.tick(1.0);
        assert_eq!(artwork.current_dataset().as_deref(), Some("ice"));

        artwork.deactivate().unwrap();
        assert!(!artwork.is_busy());
        context.scheduler.tick(1.0);
        assert_eq!(artwork.current_dataset().as_deref(), Some("ice"));
        assert_eq!(context.scheduler.pending(), 0);
    }

    #[test]
    fn overlay_opened_by_the_visitor_makes_the_artwork_busy() {
        let context = ModuleContext::default().for_marker("sculpture");
        let mut artwork = DataOverlayArtwork::new(&context, &ModuleOptions::new());
        artwork.initialize().unwrap();
        artwork.activate().unwrap();
        assert!(!artwork.is_busy());

        context.popups.toggle("sculpture");
        assert!(artwork.is_busy());
        context.popups.toggle("sculpture");
        assert!(!artwork.is_busy());
    }

    #[test]
    fn standard_catalog_builds_every_kind() {
        let catalog = ArtworkCatalog::standard();
        let context = ModuleContext::default().for_marker("m");
        for kind in [ArtworkKind::Animated, ArtworkKind::Audio, ArtworkKind::DataOverlay] {
            let factory = catalog.factory(kind).unwrap();
            let module = factory(&context, &ModuleOptions::new()).unwrap();
            assert!(!module.is_active());
        }
        assert!(ArtworkCatalog::empty().factory(ArtworkKind::Audio).is_none());
    }
}
