//! Visibility hooks into the page layer.
//!
//! The lifecycle manager and the audio coordinator only *request* UI changes;
//! they never own any presentation logic. Every hook is fire-and-forget.

use std::fmt::Debug;

pub trait Presentation: Send + Sync + Debug {
    fn show_exit_controls(&self);
    fn hide_exit_controls(&self);
    fn show_instructions(&self);
    fn hide_instructions(&self);
    /// Hides the playback progress element tied to an audio registration.
    fn hide_audio_progress(&self, audio_id: &str);
}

/// Hooks that do nothing, for headless runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullPresentation;

impl Presentation for NullPresentation {
    fn show_exit_controls(&self) {}
    fn hide_exit_controls(&self) {}
    fn show_instructions(&self) {}
    fn hide_instructions(&self) {}
    fn hide_audio_progress(&self, _audio_id: &str) {}
}

/// Hooks that report every request through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingPresentation;

impl Presentation for TracingPresentation {
    fn show_exit_controls(&self) {
        tracing::info!(target: "presentation", "show exit controls");
    }

    fn hide_exit_controls(&self) {
        tracing::info!(target: "presentation", "hide exit controls");
    }

    fn show_instructions(&self) {
        tracing::info!(target: "presentation", "show instructions");
    }

    fn hide_instructions(&self) {
        tracing::info!(target: "presentation", "hide instructions");
    }

    fn hide_audio_progress(&self, audio_id: &str) {
        tracing::debug!(target: "presentation", audio_id, "hide audio progress");
    }
}
