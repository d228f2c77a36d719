use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::isolate;
use crate::presentation::{NullPresentation, Presentation};
use crate::Result;

/// How a registered source is stopped and started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioKind {
    /// Media-element style source: stopping pauses and rewinds to 0.
    Element,
    /// Audio-graph style source: stopping suspends the whole context.
    Context,
}

/// Anything the coordinator can start and stop.
pub trait PlayableAudio: Send + fmt::Debug {
    fn play(&mut self) -> Result<()>;
    fn pause(&mut self) -> Result<()>;
    /// Moves the playhead back to the start.
    fn rewind(&mut self) -> Result<()>;
    fn suspend(&mut self) -> Result<()> {
        self.pause()
    }
    fn resume(&mut self) -> Result<()> {
        self.play()
    }
    fn is_playing(&self) -> bool;
}

#[derive(Debug)]
struct AudioRegistration {
    source: Box<dyn PlayableAudio>,
    kind: AudioKind,
}

#[derive(Debug, Default)]
struct AudioState {
    registry: HashMap<String, AudioRegistration>,
    current_playing_id: Option<String>,
}

/// Process-wide arbiter guaranteeing that at most one registered source is
/// playing.
///
/// Create one at startup and hand clones to the lifecycle manager and to
/// every module that plays sound.
#[derive(Clone)]
pub struct AudioCoordinator {
    shared: Arc<Mutex<AudioState>>,
    presentation: Arc<dyn Presentation>,
}

impl AudioCoordinator {
    pub fn new() -> Self {
        Self::with_presentation(Arc::new(NullPresentation))
    }

    /// Creates a coordinator that reports stopped sources to `presentation`
    /// so their progress UI can be hidden.
    pub fn with_presentation(presentation: Arc<dyn Presentation>) -> Self {
        Self {
            shared: Arc::new(Mutex::new(AudioState::default())),
            presentation,
        }
    }

    /// Registers `source` under `id`, replacing any previous registration.
    pub fn register(&self, id: impl Into<String>, source: Box<dyn PlayableAudio>, kind: AudioKind) {
        let id = id.into();
        let mut state = self.shared.lock();
        if state
            .registry
            .insert(id.clone(), AudioRegistration { source, kind })
            .is_some()
        {
            tracing::debug!(audio_id = %id, "replaced audio registration");
            if state.current_playing_id.as_deref() == Some(id.as_str()) {
                state.current_playing_id = None;
            }
        }
    }

    /// Removes a registration, stopping it first when it is the one playing.
    pub fn unregister(&self, id: &str) {
        let mut state = self.shared.lock();
        let Some(mut registration) = state.registry.remove(id) else {
            return;
        };
        if state.current_playing_id.as_deref() == Some(id) {
            state.current_playing_id = None;
            self.stop_source(id, &mut registration);
        }
    }

    /// Stops every other source, then starts `id`. Returns whether the start
    /// was issued.
    pub fn play(&self, id: &str) -> bool {
        let mut state = self.shared.lock();
        if !state.registry.contains_key(id) {
            tracing::warn!(audio_id = id, "play requested for unregistered audio");
            return false;
        }

        for (other_id, registration) in state.registry.iter_mut() {
            if other_id != id {
                self.stop_source(other_id, registration);
            }
        }
        state.current_playing_id = None;

        let Some(registration) = state.registry.get_mut(id) else {
            return false;
        };
        let kind = registration.kind;
        let source = &mut registration.source;
        let started = isolate(|| match kind {
            AudioKind::Element => source.play(),
            AudioKind::Context => source.resume(),
        });

        match started {
            Ok(()) => {
                state.current_playing_id = Some(id.to_string());
                true
            }
            Err(reason) => {
                tracing::warn!(audio_id = id, %reason, "audio failed to start");
                false
            }
        }
    }

    /// Stops only `id`.
    pub fn stop(&self, id: &str) {
        let mut state = self.shared.lock();
        if let Some(registration) = state.registry.get_mut(id) {
            self.stop_source(id, registration);
        }
        if state.current_playing_id.as_deref() == Some(id) {
            state.current_playing_id = None;
        }
    }

    pub fn stop_all(&self) {
        let mut state = self.shared.lock();
        for (id, registration) in state.registry.iter_mut() {
            self.stop_source(id, registration);
        }
        state.current_playing_id = None;
    }

    pub fn current_playing_id(&self) -> Option<String> {
        self.shared.lock().current_playing_id.clone()
    }

    pub fn is_registered(&self, id: &str) -> bool {
        self.shared.lock().registry.contains_key(id)
    }

    pub fn is_playing(&self, id: &str) -> bool {
        self.shared
            .lock()
            .registry
            .get(id)
            .is_some_and(|registration| registration.source.is_playing())
    }

    pub fn len(&self) -> usize {
        self.shared.lock().registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stops everything and drops all registrations.
    pub fn teardown(&self) {
        self.stop_all();
        self.shared.lock().registry.clear();
    }

    fn stop_source(&self, id: &str, registration: &mut AudioRegistration) {
        let source = &mut registration.source;
        let outcome = match registration.kind {
            AudioKind::Element => {
                let paused = isolate(|| source.pause());
                let rewound = isolate(|| source.rewind());
                paused.and(rewound)
            }
            AudioKind::Context => isolate(|| source.suspend()),
        };
        if let Err(reason) = outcome {
            tracing::warn!(audio_id = id, %reason, "audio failed to stop");
        }
        self.presentation.hide_audio_progress(id);
    }
}

impl Default for AudioCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for AudioCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.lock();
        f.debug_struct("AudioCoordinator")
            .field("registered", &state.registry.len())
            .field("current_playing_id", &state.current_playing_id)
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::PlayableAudio;
    use crate::{ExhibitError, Result};

    #[derive(Debug, Default, Clone)]
    pub(crate) struct StubAudioState {
        pub playing: bool,
        pub position: f32,
        pub plays: usize,
        pub pauses: usize,
        pub suspends: usize,
        pub fail_pause: bool,
        pub fail_play: bool,
    }

    /// Fake source whose state stays observable after it is boxed.
    #[derive(Debug, Clone, Default)]
    pub(crate) struct StubAudio {
        pub state: Arc<Mutex<StubAudioState>>,
    }

    impl StubAudio {
        pub(crate) fn snapshot(&self) -> StubAudioState {
            self.state.lock().clone()
        }
    }

    impl PlayableAudio for StubAudio {
        fn play(&mut self) -> Result<()> {
            let mut state = self.state.lock();
            if state.fail_play {
                return Err(ExhibitError::msg("autoplay blocked"));
            }
            state.plays += 1;
            state.playing = true;
            state.position = 12.5;
            Ok(())
        }

        fn pause(&mut self) -> Result<()> {
            let mut state = self.state.lock();
            state.pauses += 1;
            if state.fail_pause {
                return Err(ExhibitError::msg("pause rejected"));
            }
            state.playing = false;
            Ok(())
        }

        fn rewind(&mut self) -> Result<()> {
            self.state.lock().position = 0.0;
            Ok(())
        }

        fn suspend(&mut self) -> Result<()> {
            let mut state = self.state.lock();
            state.suspends += 1;
            state.playing = false;
            Ok(())
        }

        fn is_playing(&self) -> bool {
            self.state.lock().playing
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::StubAudio;
    use super::*;
    use crate::presentation::testing::RecordingPresentation;

    fn register_stub(audio: &AudioCoordinator, id: &str, kind: AudioKind) -> StubAudio {
        let stub = StubAudio::default();
        audio.register(id, Box::new(stub.clone()), kind);
        stub
    }

    #[test]
    fn playing_one_source_stops_the_previous_one() {
        let audio = AudioCoordinator::new();
        let a = register_stub(&audio, "a", AudioKind::Element);
        let b = register_stub(&audio, "b", AudioKind::Element);

        assert!(audio.play("a"));
        assert!(audio.play("b"));

        let a = a.snapshot();
        assert!(!a.playing);
        assert_eq!(a.position, 0.0);
        assert!(b.snapshot().playing);
        assert_eq!(audio.current_playing_id().as_deref(), Some("b"));
    }

    #[test]
    fn context_sources_are_suspended_and_resumed() {
        let audio = AudioCoordinator::new();
        let graph = register_stub(&audio, "graph", AudioKind::Context);
        let clip = register_stub(&audio, "clip", AudioKind::Element);

        audio.play("graph");
        assert!(graph.snapshot().playing);
        audio.play("clip");

        let graph = graph.snapshot();
        assert!(!graph.playing);
        assert!(graph.suspends >= 1);
        assert!(clip.snapshot().playing);
    }

    #[test]
    fn a_failing_stop_does_not_block_other_sources() {
        let audio = AudioCoordinator::new();
        let stubborn = register_stub(&audio, "stubborn", AudioKind::Element);
        let quiet = register_stub(&audio, "quiet", AudioKind::Element);
        let target = register_stub(&audio, "target", AudioKind::Element);
        stubborn.state.lock().fail_pause = true;

        audio.play("quiet");
        assert!(audio.play("target"));

        assert!(!quiet.snapshot().playing);
        assert_eq!(stubborn.snapshot().position, 0.0);
        assert!(target.snapshot().playing);
        assert_eq!(audio.current_playing_id().as_deref(), Some("target"));
    }

    #[test]
    fn failed_start_leaves_nothing_current() {
        let audio = AudioCoordinator::new();
        let a = register_stub(&audio, "a", AudioKind::Element);
        let b = register_stub(&audio, "b", AudioKind::Element);
        b.state.lock().fail_play = true;

        audio.play("a");
        assert!(!audio.play("b"));

        assert!(!a.snapshot().playing);
        assert_eq!(audio.current_playing_id(), None);
    }

    #[test]
    fn stop_hides_progress_and_clears_current() {
        let presentation = Arc::new(RecordingPresentation::default());
        let audio = AudioCoordinator::with_presentation(presentation.clone());
        let a = register_stub(&audio, "a", AudioKind::Element);

        audio.play("a");
        audio.stop("a");

        assert!(!a.snapshot().playing);
        assert_eq!(audio.current_playing_id(), None);
        assert_eq!(presentation.calls(), vec!["hide_audio_progress:a"]);
    }

    #[test]
    fn unregister_stops_the_current_source() {
        let audio = AudioCoordinator::new();
        let a = register_stub(&audio, "a", AudioKind::Element);

        audio.play("a");
        audio.unregister("a");

        assert!(!a.snapshot().playing);
        assert!(!audio.is_registered("a"));
        assert_eq!(audio.current_playing_id(), None);
        assert!(!audio.play("a"));
    }

    #[test]
    fn teardown_stops_and_forgets_everything() {
        let audio = AudioCoordinator::new();
        let a = register_stub(&audio, "a", AudioKind::Element);
        register_stub(&audio, "b", AudioKind::Context);

        audio.play("a");
        audio.teardown();

        assert!(!a.snapshot().playing);
        assert!(audio.is_empty());
    }
}
