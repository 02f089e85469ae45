use crate::core::surface::MapSurface;
use crate::events::EventBus;
use crate::input::{CursorArbiter, InteractionModeStore, KeyboardArbiter};
use crate::prelude::HashMap;
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard};

/// A plugin's private key-value state.
///
/// Isolated per plugin and never visible to other plugins; the host reads
/// it only through the lifecycle manager's serialize/hydrate operations.
#[derive(Clone, Default)]
pub struct StateBucket {
    values: Arc<Mutex<HashMap<String, Value>>>,
}

impl StateBucket {
    pub fn new() -> Self {
        Self::default()
    }

    fn values(&self) -> MutexGuard<'_, HashMap<String, Value>> {
        self.values
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.values().get(key).cloned()
    }

    pub fn set(&self, key: &str, value: Value) {
        self.values().insert(key.to_string(), value);
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        self.values().remove(key)
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.values().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.values().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values().is_empty()
    }

    pub fn clear(&self) {
        self.values().clear();
    }

    /// A plain JSON-object view of the bucket, keys sorted
    pub fn to_object(&self) -> Value {
        let values = self.values();
        let mut keys: Vec<&String> = values.keys().collect();
        keys.sort();

        let mut object = serde_json::Map::new();
        for key in keys {
            object.insert(key.clone(), values[key].clone());
        }
        Value::Object(object)
    }

    /// Populates the bucket key-by-key from a JSON object's own keys.
    /// Non-object values are ignored.
    pub fn populate_from(&self, data: &Value) {
        if let Some(object) = data.as_object() {
            let mut values = self.values();
            for (key, value) in object {
                values.insert(key.clone(), value.clone());
            }
        }
    }
}

/// Everything a plugin may touch, handed to its lifecycle hooks.
///
/// All handles are cheap clones of the host's own components; the state
/// bucket is the plugin's private one.
#[derive(Clone)]
pub struct PluginContext {
    map: Arc<dyn MapSurface>,
    events: EventBus,
    modes: InteractionModeStore,
    cursor: CursorArbiter,
    keyboard: KeyboardArbiter,
    state: StateBucket,
}

impl PluginContext {
    pub(crate) fn new(
        map: Arc<dyn MapSurface>,
        events: EventBus,
        modes: InteractionModeStore,
        cursor: CursorArbiter,
        keyboard: KeyboardArbiter,
        state: StateBucket,
    ) -> Self {
        Self {
            map,
            events,
            modes,
            cursor,
            keyboard,
            state,
        }
    }

    /// The map surface
    pub fn map(&self) -> &Arc<dyn MapSurface> {
        &self.map
    }

    /// The host event bus; the only channel between plugins
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// The interaction mode store
    pub fn modes(&self) -> &InteractionModeStore {
        &self.modes
    }

    /// The cursor arbiter
    pub fn cursor(&self) -> &CursorArbiter {
        &self.cursor
    }

    /// The keyboard shortcut arbiter
    pub fn keyboard(&self) -> &KeyboardArbiter {
        &self.keyboard
    }

    /// This plugin's private state bucket
    pub fn state(&self) -> &StateBucket {
        &self.state
    }
}
