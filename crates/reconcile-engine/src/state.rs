//! Durable per-resource state handed back and forth between the caller and the engine.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Attribute values keyed by attribute name.
pub type Attributes = Map<String, Value>;

/// The record a caller persists between reconciliation passes.
///
/// The identifier is immutable once minted by Create; Update only refreshes
/// `last_known_attributes` and the version tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedState {
    pub identifier: String,
    pub schema_version: u32,
    #[serde(default)]
    pub last_known_attributes: Attributes,
}

impl PersistedState {
    pub fn new(identifier: impl Into<String>, schema_version: u32, attributes: Attributes) -> Self {
        Self {
            identifier: identifier.into(),
            schema_version,
            last_known_attributes: attributes,
        }
    }

    /// A set attribute. `null` counts as unset.
    pub fn attribute(&self, name: &str) -> Option<&Value> {
        set_value(&self.last_known_attributes, name)
    }
}

pub(crate) fn set_value<'a>(attributes: &'a Attributes, name: &str) -> Option<&'a Value> {
    attributes.get(name).filter(|v| !v.is_null())
}
