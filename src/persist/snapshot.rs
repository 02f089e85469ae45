use crate::core::viewport::ViewportState;
use crate::layers::registry::LayerDescriptor;
use crate::{HostError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Current workspace snapshot schema version.
///
/// History: v1 stored a flat center/zoom viewport, v2 added bearing and
/// pitch, v3 renamed the top-level `extensions` key to `plugins` and gave
/// layers a category.
pub const SCHEMA_VERSION: u32 = 3;

/// Snapshots below this version are refused outright
pub const MIN_SUPPORTED_VERSION: u32 = 1;

/// A versioned snapshot of the full application state: viewport, layers and
/// every plugin's persisted payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedSnapshot {
    pub version: u32,
    pub viewport: ViewportState,
    #[serde(default)]
    pub layers: Vec<LayerDescriptor>,
    #[serde(default)]
    pub plugins: BTreeMap<String, Value>,
}

impl PersistedSnapshot {
    pub fn new(viewport: ViewportState) -> Self {
        Self {
            version: SCHEMA_VERSION,
            viewport,
            layers: Vec::new(),
            plugins: BTreeMap::new(),
        }
    }
}

/// The `{ _version, _type, ...fields }` envelope wrapped around each
/// persisted per-layer config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigEnvelope {
    #[serde(rename = "_version")]
    pub version: u32,
    #[serde(rename = "_type")]
    pub kind: String,
    #[serde(flatten)]
    pub fields: serde_json::Map<String, Value>,
}

impl ConfigEnvelope {
    pub fn new(version: u32, kind: &str) -> Self {
        Self {
            version,
            kind: kind.to_string(),
            fields: serde_json::Map::new(),
        }
    }

    /// Checks a raw value against the envelope contract for the expected
    /// layer kind. Every problem is accumulated so a single call reports
    /// them all; an empty list means the envelope is valid.
    pub fn validate(value: &Value, expected_kind: &str) -> Vec<HostError> {
        let mut problems = Vec::new();

        let object = match value.as_object() {
            Some(object) => object,
            None => {
                problems.push(HostError::InvalidConfig(
                    "persisted config is not an object".to_string(),
                ));
                return problems;
            }
        };

        match object.get("_version") {
            None => problems.push(HostError::InvalidConfig(
                "missing required field '_version'".to_string(),
            )),
            Some(version) if !version.is_u64() => problems.push(HostError::InvalidConfig(
                "'_version' must be an unsigned integer".to_string(),
            )),
            Some(_) => {}
        }

        match object.get("_type") {
            None => problems.push(HostError::InvalidConfig(
                "missing required field '_type'".to_string(),
            )),
            Some(kind) => match kind.as_str() {
                None => problems.push(HostError::InvalidConfig(
                    "'_type' must be a string".to_string(),
                )),
                Some(found) if found != expected_kind => problems.push(HostError::TypeMismatch {
                    expected: expected_kind.to_string(),
                    found: found.to_string(),
                }),
                Some(_) => {}
            },
        }

        problems
    }

    /// Validates and decodes an envelope, failing on the first accumulated
    /// problem (type mismatches take precedence over missing fields)
    pub fn decode(value: &Value, expected_kind: &str) -> Result<ConfigEnvelope> {
        let mut problems = Self::validate(value, expected_kind);
        if !problems.is_empty() {
            let mismatch = problems
                .iter()
                .position(|p| matches!(p, HostError::TypeMismatch { .. }));
            return Err(problems.remove(mismatch.unwrap_or(0)));
        }
        Ok(serde_json::from_value(value.clone())?)
    }
}
