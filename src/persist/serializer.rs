use crate::core::surface::MapSurface;
use crate::core::viewport::ViewportState;
use crate::errors::{reporter::ErrorReporter, ErrorCategory};
use crate::events::{EventBus, HostEvent};
use crate::layers::registry::LayerRegistry;
use crate::persist::migrate::{MigrationInfo, MigrationRegistry};
use crate::persist::snapshot::{PersistedSnapshot, MIN_SUPPORTED_VERSION, SCHEMA_VERSION};
use crate::plugins::manager::PluginManager;
use crate::{HostError, Result};
use serde_json::{json, Value};
use std::sync::Arc;

/// What a restore run accomplished
#[derive(Debug, Clone, PartialEq)]
pub struct RestoreReport {
    /// Migration chain that ran, when the snapshot was older than current
    pub migration: Option<MigrationInfo>,
    /// Layers whose visibility was re-applied to the surface
    pub layers_applied: usize,
    /// Plugins whose payload was hydrated
    pub plugins_hydrated: usize,
}

/// Builds and restores versioned snapshots of viewport, layers and plugin
/// state.
///
/// Restore is best-effort: a plugin that fails to hydrate or a layer that no
/// longer exists is reported and skipped, never aborting the rest of the
/// workspace. Partial failure is the default mode here.
#[derive(Clone)]
pub struct StateSerializer {
    map: Arc<dyn MapSurface>,
    layers: Arc<dyn LayerRegistry>,
    plugins: PluginManager,
    migrations: Arc<MigrationRegistry>,
    events: EventBus,
    reporter: ErrorReporter,
}

impl StateSerializer {
    pub fn new(
        map: Arc<dyn MapSurface>,
        layers: Arc<dyn LayerRegistry>,
        plugins: PluginManager,
        migrations: Arc<MigrationRegistry>,
        events: EventBus,
        reporter: ErrorReporter,
    ) -> Self {
        Self {
            map,
            layers,
            plugins,
            migrations,
            events,
            reporter,
        }
    }

    /// Produces a snapshot of the current application state, stamped with
    /// the current schema version.
    ///
    /// A plugin whose serializer fails is reported and omitted; everything
    /// else still makes it into the snapshot.
    pub fn serialize_state(&self) -> PersistedSnapshot {
        let mut snapshot = PersistedSnapshot::new(ViewportState::capture(self.map.as_ref()));
        snapshot.layers = self.layers.all_layers();

        for id in self.plugins.all_plugins() {
            match self.plugins.serialize_plugin(&id) {
                Ok(payload) => {
                    snapshot.plugins.insert(id, payload);
                }
                Err(error) => {
                    let source = format!("serialize plugin '{}'", id);
                    self.reporter.report(&source, ErrorCategory::Plugin, &error);
                }
            }
        }

        self.events.emit(&HostEvent::StateSerialized {
            version: snapshot.version,
        });
        snapshot
    }

    /// Snapshot as a JSON string, for storage backends
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.serialize_state())?)
    }

    /// Validates a raw snapshot value and migrates it to the current schema.
    ///
    /// A version below the supported floor is a hard failure. A version
    /// newer than this build is reported as a warning and decoded best
    /// effort, unknown fields ignored.
    pub fn deserialize_state(
        &self,
        mut value: Value,
    ) -> Result<(PersistedSnapshot, Option<MigrationInfo>)> {
        let version = value
            .get("version")
            .and_then(Value::as_u64)
            .map(|v| v as u32)
            .ok_or_else(|| {
                HostError::InvalidConfig("snapshot has no 'version' field".to_string())
            })?;

        if version < MIN_SUPPORTED_VERSION {
            return Err(HostError::SchemaVersionTooOld {
                found: version,
                minimum: MIN_SUPPORTED_VERSION,
            });
        }

        let mut migration = None;
        if version > SCHEMA_VERSION {
            let newer = HostError::SchemaVersionNewer {
                found: version,
                current: SCHEMA_VERSION,
            };
            self.reporter
                .report("deserialize snapshot", ErrorCategory::General, &newer);
            // Best effort: decode what this build understands.
            if let Some(object) = value.as_object_mut() {
                object.insert("version".to_string(), json!(SCHEMA_VERSION));
            }
        } else if version < SCHEMA_VERSION {
            let (migrated, info) = self.migrations.migrate(value, version)?;
            value = migrated;
            migration = Some(info);
        }

        let snapshot: PersistedSnapshot = serde_json::from_value(value)?;
        Ok((snapshot, migration))
    }

    /// Restores a snapshot: viewport first, then layer visibility, then
    /// plugin payloads.
    pub fn restore(&self, value: Value) -> Result<RestoreReport> {
        let from_version = value.get("version").and_then(Value::as_u64).unwrap_or(0) as u32;
        let (snapshot, migration) = self.deserialize_state(value)?;

        self.map.fly_to(&snapshot.viewport);

        let mut layers_applied = 0;
        for layer in &snapshot.layers {
            if !self.map.has_layer(&layer.id) {
                log::debug!("snapshot layer '{}' not present on surface", layer.id);
                continue;
            }
            let visibility = if layer.visible { "visible" } else { "none" };
            match self
                .map
                .set_layout_property(&layer.id, "visibility", json!(visibility))
            {
                Ok(()) => layers_applied += 1,
                Err(error) => {
                    let source = format!("restore layer '{}'", layer.id);
                    self.reporter.report(&source, ErrorCategory::Layer, &error);
                }
            }
        }

        let mut plugins_hydrated = 0;
        for (id, payload) in &snapshot.plugins {
            if !self.plugins.has(id) {
                log::debug!("snapshot plugin '{}' not registered, payload kept aside", id);
                continue;
            }
            // A payload that records its own schema version opts into
            // plugin-level migration.
            let payload_version = payload
                .get("_version")
                .and_then(Value::as_u64)
                .map(|v| v as u32);
            match self
                .plugins
                .hydrate_plugin(id, payload.clone(), payload_version)
            {
                Ok(()) => plugins_hydrated += 1,
                Err(error) => {
                    let source = format!("hydrate plugin '{}'", id);
                    self.reporter.report(&source, ErrorCategory::Plugin, &error);
                }
            }
        }

        self.events.emit(&HostEvent::StateRestored {
            from_version,
            migrated: migration.is_some(),
        });

        Ok(RestoreReport {
            migration,
            layers_applied,
            plugins_hydrated,
        })
    }

    /// Restores a snapshot from its JSON string form
    pub fn restore_from_json(&self, json: &str) -> Result<RestoreReport> {
        self.restore(serde_json::from_str(json)?)
    }
}
