use crate::core::viewport::ViewportState;
use crate::events::{EventBus, HostEvent};
use crate::prelude::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// Callback invoked with the originator's viewport on each broadcast
pub type SyncCallback = Arc<dyn Fn(&ViewportState) + Send + Sync>;

struct SyncMember {
    id: String,
    callback: SyncCallback,
}

#[derive(Default)]
struct SyncState {
    groups: HashMap<String, Vec<SyncMember>>,
    events: Option<EventBus>,
}

/// View-synchronization coordination service.
///
/// Explicitly constructed and passed to whoever needs it; there is no
/// process-wide instance. Members join a group under an opaque group id; a
/// broadcast delivers the originator's viewport to every member of the group
/// except the originator itself.
#[derive(Clone, Default)]
pub struct SyncCoordinator {
    state: Arc<Mutex<SyncState>>,
}

impl SyncCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, SyncState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Wires the bus on which `sync:broadcast` events are emitted
    pub fn attach_events(&self, events: EventBus) {
        self.state().events = Some(events);
    }

    /// Joins `member_id` to a group. Re-joining replaces the callback.
    /// Returns a membership handle that leaves the group.
    pub fn join<F>(&self, group: &str, member_id: &str, callback: F) -> SyncMembership
    where
        F: Fn(&ViewportState) + Send + Sync + 'static,
    {
        let mut state = self.state();
        let members = state.groups.entry(group.to_string()).or_default();
        members.retain(|m| m.id != member_id);
        members.push(SyncMember {
            id: member_id.to_string(),
            callback: Arc::new(callback),
        });

        SyncMembership {
            coordinator: self.clone(),
            group: group.to_string(),
            member_id: member_id.to_string(),
        }
    }

    /// Removes a member from a group. Unknown members are ignored.
    pub fn leave(&self, group: &str, member_id: &str) {
        let mut state = self.state();
        if let Some(members) = state.groups.get_mut(group) {
            members.retain(|m| m.id != member_id);
            if members.is_empty() {
                state.groups.remove(group);
            }
        }
    }

    /// Notifies every member of `group` except the originator.
    /// Returns how many members were notified.
    pub fn broadcast(&self, group: &str, originator: &str, view: &ViewportState) -> usize {
        let (callbacks, events) = {
            let state = self.state();
            let callbacks: Vec<SyncCallback> = state
                .groups
                .get(group)
                .map(|members| {
                    members
                        .iter()
                        .filter(|m| m.id != originator)
                        .map(|m| m.callback.clone())
                        .collect()
                })
                .unwrap_or_default();
            (callbacks, state.events.clone())
        };

        for callback in &callbacks {
            callback(view);
        }

        if !callbacks.is_empty() {
            if let Some(events) = events {
                events.emit(&HostEvent::SyncBroadcast {
                    group: group.to_string(),
                    origin: originator.to_string(),
                });
            }
        }
        callbacks.len()
    }

    /// Member ids currently in a group
    pub fn members(&self, group: &str) -> Vec<String> {
        self.state()
            .groups
            .get(group)
            .map(|members| members.iter().map(|m| m.id.clone()).collect())
            .unwrap_or_default()
    }
}

/// Handle returned by [`SyncCoordinator::join`]
pub struct SyncMembership {
    coordinator: SyncCoordinator,
    group: String,
    member_id: String,
}

impl SyncMembership {
    /// Leaves the group. Idempotent.
    pub fn leave(&self) {
        self.coordinator.leave(&self.group, &self.member_id);
    }
}
