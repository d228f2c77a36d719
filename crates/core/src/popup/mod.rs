use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::isolate;
use crate::Result;

/// Data overlay owned by one artwork.
pub trait PopupController: Send + fmt::Debug {
    fn show_data_overlay(&mut self) -> Result<()>;
    fn hide_data_overlay(&mut self) -> Result<()>;
    fn cycle_to_next_dataset(&mut self) -> Result<()>;
    fn start_data_cycling(&mut self) -> Result<()>;
    fn stop_data_cycling(&mut self) -> Result<()>;
}

#[derive(Debug)]
struct PopupRegistration {
    controller: Box<dyn PopupController>,
    is_visible: bool,
}

impl PopupRegistration {
    fn call(
        &mut self,
        id: &str,
        step: &'static str,
        f: impl FnOnce(&mut dyn PopupController) -> Result<()>,
    ) {
        let controller = self.controller.as_mut();
        if let Err(reason) = isolate(|| f(controller)) {
            tracing::warn!(popup_id = id, step, %reason, "popup controller failed");
        }
    }

    fn close(&mut self, id: &str) {
        self.call(id, "stop_data_cycling", |c| c.stop_data_cycling());
        self.call(id, "hide_data_overlay", |c| c.hide_data_overlay());
        self.is_visible = false;
    }
}

#[derive(Debug, Default)]
struct PopupState {
    registry: HashMap<String, PopupRegistration>,
    current_visible_id: Option<String>,
}

/// Process-wide arbiter guaranteeing that at most one data overlay is
/// visible.
#[derive(Clone, Default)]
pub struct PopupCoordinator {
    shared: Arc<Mutex<PopupState>>,
}

impl PopupCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `controller` under `id`. An existing registration for the
    /// same id is fully unregistered first so its cycling cannot outlive it.
    pub fn register(&self, id: impl Into<String>, controller: Box<dyn PopupController>) {
        let id = id.into();
        let mut state = self.shared.lock();
        Self::remove(&mut state, &id);
        state.registry.insert(
            id,
            PopupRegistration {
                controller,
                is_visible: false,
            },
        );
    }

    pub fn unregister(&self, id: &str) {
        let mut state = self.shared.lock();
        Self::remove(&mut state, id);
    }

    /// Hides every other visible popup, then shows `id`.
    pub fn show(&self, id: &str) {
        let mut state = self.shared.lock();
        if !state.registry.contains_key(id) {
            tracing::warn!(popup_id = id, "show requested for unregistered popup");
            return;
        }

        for (other_id, registration) in state.registry.iter_mut() {
            if other_id != id && registration.is_visible {
                registration.close(other_id);
            }
        }

        if let Some(registration) = state.registry.get_mut(id) {
            registration.call(id, "show_data_overlay", |c| c.show_data_overlay());
            registration.is_visible = true;
        }
        state.current_visible_id = Some(id.to_string());
    }

    pub fn hide(&self, id: &str) {
        let mut state = self.shared.lock();
        let Some(registration) = state.registry.get_mut(id) else {
            return;
        };
        registration.close(id);
        if state.current_visible_id.as_deref() == Some(id) {
            state.current_visible_id = None;
        }
    }

    pub fn toggle(&self, id: &str) {
        if self.is_visible(id) {
            self.hide(id);
        } else if self.is_registered(id) {
            self.show(id);
        }
    }

    /// Advances the dataset of a visible popup; no-op otherwise.
    pub fn cycle_dataset(&self, id: &str) {
        self.with_visible(id, "cycle_to_next_dataset", |c| c.cycle_to_next_dataset());
    }

    /// Starts automatic cycling on a visible popup; no-op otherwise.
    pub fn start_cycling(&self, id: &str) {
        self.with_visible(id, "start_data_cycling", |c| c.start_data_cycling());
    }

    pub fn stop_cycling(&self, id: &str) {
        let mut state = self.shared.lock();
        if let Some(registration) = state.registry.get_mut(id) {
            registration.call(id, "stop_data_cycling", |c| c.stop_data_cycling());
        }
    }

    pub fn hide_all(&self) {
        let mut state = self.shared.lock();
        for (id, registration) in state.registry.iter_mut() {
            if registration.is_visible {
                registration.close(id);
            }
        }
        state.current_visible_id = None;
    }

    pub fn is_visible(&self, id: &str) -> bool {
        self.shared
            .lock()
            .registry
            .get(id)
            .is_some_and(|registration| registration.is_visible)
    }

    pub fn is_registered(&self, id: &str) -> bool {
        self.shared.lock().registry.contains_key(id)
    }

    pub fn current_visible_id(&self) -> Option<String> {
        self.shared.lock().current_visible_id.clone()
    }

    /// Hides everything and drops all registrations.
    pub fn teardown(&self) {
        let mut state = self.shared.lock();
        let ids: Vec<String> = state.registry.keys().cloned().collect();
        for id in ids {
            Self::remove(&mut state, &id);
        }
    }

    fn with_visible(
        &self,
        id: &str,
        step: &'static str,
        f: impl FnOnce(&mut dyn PopupController) -> Result<()>,
    ) {
        let mut state = self.shared.lock();
        match state.registry.get_mut(id) {
            Some(registration) if registration.is_visible => registration.call(id, step, f),
            _ => tracing::debug!(popup_id = id, step, "ignored for hidden popup"),
        }
    }

    fn remove(state: &mut PopupState, id: &str) {
        let Some(mut registration) = state.registry.remove(id) else {
            return;
        };
        if registration.is_visible {
            registration.close(id);
        } else {
            registration.call(id, "stop_data_cycling", |c| c.stop_data_cycling());
        }
        if state.current_visible_id.as_deref() == Some(id) {
            state.current_visible_id = None;
        }
    }
}

impl fmt::Debug for PopupCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.lock();
        f.debug_struct("PopupCoordinator")
            .field("registered", &state.registry.len())
            .field("current_visible_id", &state.current_visible_id)
            .finish()
    }
}


#[cfg(test)]
mod tests {
    use super::testing::JournalPopup;
    use super::*;

    fn setup(names: &[&str]) -> (PopupCoordinator, Arc<Mutex<Vec<String>>>) {
        let popups = PopupCoordinator::new();
        let journal = Arc::new(Mutex::new(Vec::new()));
        for name in names {
            popups.register(*name, Box::new(JournalPopup::new(name, &journal)));
        }
        (popups, journal)
    }

    #[test]
    fn showing_one_popup_hides_the_other_first() {
        let (popups, journal) = setup(&["a", "b"]);

        popups.show("a");
        popups.show("b");

        let calls = journal.lock().clone();
        let hide_a = calls.iter().position(|c| c == "a:hide").unwrap();
        let show_b = calls.iter().position(|c| c == "b:show").unwrap();
        assert!(hide_a < show_b);
        let stop_a = calls.iter().position(|c| c == "a:stop_cycling").unwrap();
        assert!(stop_a < hide_a);

        assert!(!popups.is_visible("a"));
        assert!(popups.is_visible("b"));
        assert_eq!(popups.current_visible_id().as_deref(), Some("b"));
    }

    #[test]
    fn cycling_a_hidden_popup_is_a_no_op() {
        let (popups, journal) = setup(&["a"]);

        popups.cycle_dataset("a");
        popups.start_cycling("a");
        assert!(journal.lock().is_empty());

        popups.show("a");
        popups.cycle_dataset("a");
        assert_eq!(journal.lock().last().map(String::as_str), Some("a:cycle"));
    }

    #[test]
    fn toggle_flips_visibility() {
        let (popups, _journal) = setup(&["a"]);

        popups.toggle("a");
        assert!(popups.is_visible("a"));
        popups.toggle("a");
        assert!(!popups.is_visible("a"));
        assert_eq!(popups.current_visible_id(), None);

        popups.toggle("missing");
        assert_eq!(popups.current_visible_id(), None);
    }

    #[test]
    fn reregistering_stops_the_previous_controller() {
        let (popups, journal) = setup(&["a"]);
        popups.show("a");

        popups.register("a", Box::new(JournalPopup::new("a2", &journal)));

        let calls = journal.lock().clone();
        assert!(calls.contains(&"a:stop_cycling".to_string()));
        assert!(calls.contains(&"a:hide".to_string()));
        assert!(!popups.is_visible("a"));
        assert_eq!(popups.current_visible_id(), None);
    }

    #[test]
    fn a_failing_hide_still_updates_visibility() {
        let popups = PopupCoordinator::new();
        let journal = Arc::new(Mutex::new(Vec::new()));
        let mut broken = JournalPopup::new("a", &journal);
        broken.fail_hide = true;
        popups.register("a", Box::new(broken));
        popups.register("b", Box::new(JournalPopup::new("b", &journal)));

        popups.show("a");
        popups.show("b");

        assert!(!popups.is_visible("a"));
        assert!(popups.is_visible("b"));
    }

    #[test]
    fn teardown_hides_and_clears() {
        let (popups, journal) = setup(&["a", "b"]);
        popups.show("b");

        popups.teardown();

        assert!(!popups.is_registered("a"));
        assert!(!popups.is_registered("b"));
        assert!(journal.lock().contains(&"b:hide".to_string()));
        assert_eq!(popups.current_visible_id(), None);
    }
}
