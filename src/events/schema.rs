use crate::core::viewport::ViewportState;
use crate::errors::ErrorRecord;
use serde_json::Value;

/// All events that can travel over the host event bus.
///
/// The payload union is closed: host chrome and built-in components publish
/// the typed variants, while plugins talk to each other through `Custom`
/// events carrying a namespaced name (e.g. `"draw:finished"`) and a JSON
/// payload. This is the only communication channel between plugins; they must
/// not hold direct references to each other.
#[derive(Debug, Clone)]
pub enum HostEvent {
    /// An error was captured by the central reporter
    CoreError { record: ErrorRecord },
    /// A plugin finished activating and joined the registry
    PluginRegistered { plugin_id: String },
    /// A plugin was removed from the registry
    PluginUnregistered { plugin_id: String },
    /// The active exclusive interaction mode changed
    ModeChanged { active: Option<String> },
    /// The effective pointer cursor changed
    CursorChanged { cursor: String },
    /// A basemap swap completed successfully
    BasemapChanged {
        style_url: String,
        reapplied_layers: usize,
    },
    /// A workspace snapshot was produced
    StateSerialized { version: u32 },
    /// A workspace snapshot was restored
    StateRestored { from_version: u32, migrated: bool },
    /// The map view changed (center, zoom, bearing or pitch)
    ViewChanged { viewport: ViewportState },
    /// A view-sync broadcast went out to a group
    SyncBroadcast { group: String, origin: String },
    /// A plugin-defined event
    Custom { name: String, payload: Value },
}

/// Subscription key derived from an event's variant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventKind {
    CoreError,
    PluginRegistered,
    PluginUnregistered,
    ModeChanged,
    CursorChanged,
    BasemapChanged,
    StateSerialized,
    StateRestored,
    ViewChanged,
    SyncBroadcast,
    Custom(String),
}

impl HostEvent {
    /// Returns the subscription key for this event
    pub fn kind(&self) -> EventKind {
        match self {
            HostEvent::CoreError { .. } => EventKind::CoreError,
            HostEvent::PluginRegistered { .. } => EventKind::PluginRegistered,
            HostEvent::PluginUnregistered { .. } => EventKind::PluginUnregistered,
            HostEvent::ModeChanged { .. } => EventKind::ModeChanged,
            HostEvent::CursorChanged { .. } => EventKind::CursorChanged,
            HostEvent::BasemapChanged { .. } => EventKind::BasemapChanged,
            HostEvent::StateSerialized { .. } => EventKind::StateSerialized,
            HostEvent::StateRestored { .. } => EventKind::StateRestored,
            HostEvent::ViewChanged { .. } => EventKind::ViewChanged,
            HostEvent::SyncBroadcast { .. } => EventKind::SyncBroadcast,
            HostEvent::Custom { name, .. } => EventKind::Custom(name.clone()),
        }
    }

    /// Builds a plugin-defined event
    pub fn custom(name: impl Into<String>, payload: Value) -> Self {
        HostEvent::Custom {
            name: name.into(),
            payload,
        }
    }
}

impl EventKind {
    /// Canonical event name, used in logs
    pub fn name(&self) -> &str {
        match self {
            EventKind::CoreError => "core:error",
            EventKind::PluginRegistered => "plugin:registered",
            EventKind::PluginUnregistered => "plugin:unregistered",
            EventKind::ModeChanged => "mode:changed",
            EventKind::CursorChanged => "cursor:changed",
            EventKind::BasemapChanged => "basemap:changed",
            EventKind::StateSerialized => "state:serialized",
            EventKind::StateRestored => "state:restored",
            EventKind::ViewChanged => "view:changed",
            EventKind::SyncBroadcast => "sync:broadcast",
            EventKind::Custom(name) => name,
        }
    }

    /// Subscription key for a plugin-defined event name
    pub fn custom(name: impl Into<String>) -> Self {
        EventKind::Custom(name.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        let event = HostEvent::PluginRegistered {
            plugin_id: "@scope/draw".to_string(),
        };
        assert_eq!(event.kind(), EventKind::PluginRegistered);
        assert_eq!(event.kind().name(), "plugin:registered");
    }

    #[test]
    fn test_custom_events_keyed_by_name() {
        let event = HostEvent::custom("draw:finished", serde_json::json!({ "shapes": 3 }));
        assert_eq!(event.kind(), EventKind::custom("draw:finished"));
        assert_ne!(event.kind(), EventKind::custom("measure:finished"));
        assert_eq!(event.kind().name(), "draw:finished");
    }
}
