use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// An Azure Migrate project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrateProject {
    pub name: String,
    pub resource_group_name: String,
    pub location: String,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

impl MigrateProject {
    pub fn new(name: impl Into<String>, resource_group_name: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            resource_group_name: resource_group_name.into(),
            location: location.into(),
            tags: BTreeMap::new(),
        }
    }

    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }
}
