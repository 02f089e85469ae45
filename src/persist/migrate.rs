use crate::persist::snapshot::{MIN_SUPPORTED_VERSION, SCHEMA_VERSION};
use crate::{HostError, Result};
use serde_json::{json, Value};
use std::sync::Arc;

/// Record of a completed migration run, kept for observability
#[derive(Debug, Clone, PartialEq)]
pub struct MigrationInfo {
    pub from_version: u32,
    pub to_version: u32,
    /// Labels of the steps that ran, in order
    pub steps: Vec<String>,
}

type StepFn = Arc<dyn Fn(Value) -> Result<Value> + Send + Sync>;

struct MigrationStep {
    from: u32,
    label: String,
    apply: StepFn,
}

/// Ordered registry of snapshot migration steps.
///
/// A snapshot recorded at an older version passes through every step
/// between its version and the current schema version, in ascending order,
/// before it is decoded.
pub struct MigrationRegistry {
    steps: Vec<MigrationStep>,
}

impl MigrationRegistry {
    /// An empty registry, for tests that build their own chain
    pub fn empty() -> Self {
        Self { steps: Vec::new() }
    }

    /// The built-in chain covering every schema version this crate has
    /// shipped
    pub fn builtin() -> Self {
        let mut registry = Self::empty();

        // v1 snapshots predate rotated/tilted views.
        registry.register(1, "viewport-bearing-pitch", |mut value| {
            if let Some(viewport) = value.get_mut("viewport").and_then(Value::as_object_mut) {
                viewport.entry("bearing").or_insert(json!(0.0));
                viewport.entry("pitch").or_insert(json!(0.0));
            }
            Ok(value)
        });

        // v2 kept plugin payloads under "extensions" and had no layer
        // categories.
        registry.register(2, "extensions-to-plugins", |mut value| {
            if let Some(object) = value.as_object_mut() {
                if !object.contains_key("plugins") {
                    if let Some(extensions) = object.remove("extensions") {
                        object.insert("plugins".to_string(), extensions);
                    }
                }
            }
            if let Some(layers) = value.get_mut("layers").and_then(Value::as_array_mut) {
                for layer in layers {
                    if let Some(layer) = layer.as_object_mut() {
                        layer.entry("category").or_insert(json!("overlay"));
                    }
                }
            }
            Ok(value)
        });

        registry
    }

    /// Registers the step that upgrades version `from` to `from + 1`
    pub fn register<F>(&mut self, from: u32, label: &str, apply: F)
    where
        F: Fn(Value) -> Result<Value> + Send + Sync + 'static,
    {
        self.steps.push(MigrationStep {
            from,
            label: label.to_string(),
            apply: Arc::new(apply),
        });
        self.steps.sort_by_key(|step| step.from);
    }

    /// Runs every step from `from` up to the current schema version.
    ///
    /// The returned value carries `version == SCHEMA_VERSION`; the info
    /// records which steps ran. Versions below the supported floor and gaps
    /// in the chain are hard failures.
    pub fn migrate(&self, mut value: Value, from: u32) -> Result<(Value, MigrationInfo)> {
        if from < MIN_SUPPORTED_VERSION {
            return Err(HostError::SchemaVersionTooOld {
                found: from,
                minimum: MIN_SUPPORTED_VERSION,
            });
        }

        let mut info = MigrationInfo {
            from_version: from,
            to_version: SCHEMA_VERSION,
            steps: Vec::new(),
        };

        for version in from..SCHEMA_VERSION {
            let step = self
                .steps
                .iter()
                .find(|step| step.from == version)
                .ok_or_else(|| {
                    HostError::InvalidConfig(format!(
                        "no migration step from snapshot version {}",
                        version
                    ))
                })?;

            log::debug!("running snapshot migration '{}'", step.label);
            value = (step.apply)(value)?;
            if let Some(object) = value.as_object_mut() {
                object.insert("version".to_string(), json!(version + 1));
            }
            info.steps.push(step.label.clone());
        }

        Ok((value, info))
    }
}

impl Default for MigrationRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v1_snapshot() -> Value {
        json!({
            "version": 1,
            "viewport": { "center": [13.4, 52.5], "zoom": 11.0 },
            "layers": [ { "id": "tracks", "type": "line", "visible": true, "opacity": 1.0, "order": 0 } ],
            "extensions": { "@acme/draw": { "shapes": [] } }
        })
    }

    #[test]
    fn test_full_chain_ascending() {
        let registry = MigrationRegistry::builtin();
        let (value, info) = registry.migrate(v1_snapshot(), 1).unwrap();

        assert_eq!(value["version"], json!(SCHEMA_VERSION));
        assert_eq!(value["viewport"]["bearing"], json!(0.0));
        assert_eq!(value["viewport"]["pitch"], json!(0.0));
        assert_eq!(value["layers"][0]["category"], json!("overlay"));
        assert!(value.get("extensions").is_none());
        assert!(value["plugins"]["@acme/draw"].is_object());

        assert_eq!(info.from_version, 1);
        assert_eq!(info.to_version, SCHEMA_VERSION);
        assert_eq!(
            info.steps,
            vec!["viewport-bearing-pitch", "extensions-to-plugins"]
        );
    }

    #[test]
    fn test_partial_chain_from_v2() {
        let registry = MigrationRegistry::builtin();
        let mut snapshot = v1_snapshot();
        snapshot["version"] = json!(2);
        snapshot["viewport"]["bearing"] = json!(90.0);

        let (value, info) = registry.migrate(snapshot, 2).unwrap();
        // The v1 step did not run; the recorded bearing survives.
        assert_eq!(value["viewport"]["bearing"], json!(90.0));
        assert_eq!(info.steps, vec!["extensions-to-plugins"]);
    }

    #[test]
    fn test_below_floor_is_hard_failure() {
        let registry = MigrationRegistry::builtin();
        let result = registry.migrate(v1_snapshot(), 0);
        assert!(matches!(
            result,
            Err(HostError::SchemaVersionTooOld { found: 0, minimum: MIN_SUPPORTED_VERSION })
        ));
    }

    #[test]
    fn test_gap_in_chain_fails() {
        let mut registry = MigrationRegistry::empty();
        registry.register(1, "only-v1", Ok);
        let result = registry.migrate(v1_snapshot(), 1);
        assert!(matches!(result, Err(HostError::InvalidConfig(_))));
    }
}
