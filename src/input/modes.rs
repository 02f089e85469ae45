use crate::core::geo::LngLat;
use crate::events::{EventBus, HostEvent};
use crate::prelude::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// A generic pointer interaction routed to the active mode
#[derive(Debug, Clone, PartialEq)]
pub struct InteractionEvent {
    pub kind: InteractionKind,
    /// Geographic position, when the surface resolved one
    pub lnglat: Option<LngLat>,
    /// Screen position in surface pixels
    pub point: Option<(f64, f64)>,
}

impl InteractionEvent {
    pub fn click(lnglat: LngLat) -> Self {
        Self {
            kind: InteractionKind::Click,
            lnglat: Some(lnglat),
            point: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionKind {
    Click,
    DoubleClick,
    Move,
    DragStart,
    Drag,
    DragEnd,
}

/// Handler invoked for interactions while the owning mode is the active
/// exclusive mode; returns whether it consumed the event.
pub type InteractionHandler = Arc<dyn Fn(&InteractionEvent) -> bool + Send + Sync>;

/// Registration options for a mode
#[derive(Debug, Clone, Copy, Default)]
pub struct ModeOptions {
    /// Exclusive modes displace each other; at most one is active at a time
    pub exclusive: bool,
    /// Informational ranking. Activation order, not priority, decides the
    /// active exclusive mode.
    pub priority: i32,
}

struct ModeEntry {
    exclusive: bool,
    priority: i32,
    handler: Option<InteractionHandler>,
    active: bool,
    activated_seq: u64,
}

#[derive(Default)]
struct ModeState {
    modes: HashMap<String, ModeEntry>,
    next_seq: u64,
    events: Option<EventBus>,
}

impl ModeState {
    fn active_exclusive(&self) -> Option<(&String, &ModeEntry)> {
        self.modes
            .iter()
            .filter(|(_, entry)| entry.exclusive && entry.active)
            .max_by_key(|(_, entry)| entry.activated_seq)
    }
}

/// Exclusivity arbitration for interaction modes (draw, measure, inspect).
///
/// At most one exclusive mode is active at any time: activating an exclusive
/// mode deactivates every other active exclusive mode within the same call,
/// so no observer ever sees two exclusive modes active. Non-exclusive modes
/// compose freely and never affect each other.
#[derive(Clone, Default)]
pub struct InteractionModeStore {
    state: Arc<Mutex<ModeState>>,
}

impl InteractionModeStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, ModeState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Wires the bus on which `mode:changed` events are emitted
    pub fn attach_events(&self, events: EventBus) {
        self.state().events = Some(events);
    }

    /// Registers a mode. Returns a grant that unregisters it.
    pub fn register<F>(&self, mode_id: &str, options: ModeOptions, handler: Option<F>) -> ModeGrant
    where
        F: Fn(&InteractionEvent) -> bool + Send + Sync + 'static,
    {
        let mut state = self.state();
        state.modes.insert(
            mode_id.to_string(),
            ModeEntry {
                exclusive: options.exclusive,
                priority: options.priority,
                handler: handler.map(|h| Arc::new(h) as InteractionHandler),
                active: false,
                activated_seq: 0,
            },
        );

        ModeGrant {
            store: self.clone(),
            mode_id: mode_id.to_string(),
        }
    }

    /// Activates or deactivates a mode.
    ///
    /// Activating an exclusive mode deactivates the other active exclusive
    /// modes first, then activates the target, all inside one logical step.
    /// Unknown mode ids are ignored with a warning.
    pub fn set_active(&self, mode_id: &str, active: bool) {
        let (changed, events, active_mode) = {
            let mut state = self.state();
            if !state.modes.contains_key(mode_id) {
                log::warn!("set_active on unknown mode '{}'", mode_id);
                return;
            }

            let target_exclusive = state.modes[mode_id].exclusive;
            let mut changed = false;

            if active && target_exclusive {
                // Deactivations strictly before the activation: the handoff
                // is invisible to any observer of this store.
                for (id, entry) in state.modes.iter_mut() {
                    if id != mode_id && entry.exclusive && entry.active {
                        entry.active = false;
                        changed = true;
                        log::debug!("mode '{}' displaced", id);
                    }
                }
            }

            state.next_seq += 1;
            let seq = state.next_seq;
            if let Some(entry) = state.modes.get_mut(mode_id) {
                if entry.active != active {
                    entry.active = active;
                    changed = true;
                }
                if active {
                    entry.activated_seq = seq;
                }
            }

            let active_mode = state.active_exclusive().map(|(id, _)| id.clone());
            (changed, state.events.clone(), active_mode)
        };

        if changed {
            if let Some(events) = events {
                events.emit(&HostEvent::ModeChanged {
                    active: active_mode,
                });
            }
        }
    }

    /// Whether the given mode is currently active
    pub fn is_active(&self, mode_id: &str) -> bool {
        self.state()
            .modes
            .get(mode_id)
            .map(|entry| entry.active)
            .unwrap_or(false)
    }

    /// The most recently activated exclusive mode, if any
    pub fn active_mode(&self) -> Option<String> {
        self.state().active_exclusive().map(|(id, _)| id.clone())
    }

    /// Every active mode id, exclusive or not
    pub fn all_active(&self) -> Vec<String> {
        let mut active: Vec<(u64, String)> = self
            .state()
            .modes
            .iter()
            .filter(|(_, entry)| entry.active)
            .map(|(id, entry)| (entry.activated_seq, id.clone()))
            .collect();
        active.sort();
        active.into_iter().map(|(_, id)| id).collect()
    }

    /// Informational priority a mode was registered with
    pub fn priority_of(&self, mode_id: &str) -> Option<i32> {
        self.state().modes.get(mode_id).map(|entry| entry.priority)
    }

    /// Delegates an interaction to the active exclusive mode's handler.
    /// Returns `false` when no exclusive mode is active or the active mode
    /// has no handler.
    pub fn handle_interaction(&self, event: &InteractionEvent) -> bool {
        let handler = {
            let state = self.state();
            state
                .active_exclusive()
                .and_then(|(_, entry)| entry.handler.clone())
        };
        match handler {
            Some(handler) => handler(event),
            None => false,
        }
    }

    /// Deactivates and unregisters every mode
    pub fn clear(&self) {
        self.state().modes.clear();
    }

    fn unregister(&self, mode_id: &str) {
        self.state().modes.remove(mode_id);
    }
}

/// Handle returned by [`InteractionModeStore::register`]
pub struct ModeGrant {
    store: InteractionModeStore,
    mode_id: String,
}

impl ModeGrant {
    pub fn unregister(&self) {
        self.store.unregister(&self.mode_id);
    }
}
