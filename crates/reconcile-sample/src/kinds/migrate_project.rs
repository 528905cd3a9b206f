//! Azure Migrate projects: `/resourceGroups/{group}/migrateProjects/{name}`.

use crate::model::MigrateProject;
use reconcile_engine::{Attributes, IdError, IdentifierFormat, Payload, RemoteRecord, ResourceKind, ResourceLocator};
use serde_json::{json, Value};

pub struct MigrateProjectKind;

impl ResourceKind for MigrateProjectKind {
    const TYPE_NAME: &'static str = "migrate_project";
    const FORMAT: IdentifierFormat = IdentifierFormat::new(&["resourceGroups"], "migrateProjects");
    type Desired = MigrateProject;

    fn locator(desired: &MigrateProject) -> Result<ResourceLocator, IdError> {
        Self::FORMAT.locator(&[desired.resource_group_name.as_str()], &desired.name)
    }

    fn create_payload(desired: &MigrateProject) -> Payload {
        json!({ "location": desired.location, "tags": desired.tags })
    }

    fn flatten(locator: &ResourceLocator, record: &RemoteRecord) -> Attributes {
        let mut attributes = Attributes::new();
        attributes.insert("name".into(), json!(locator.name));
        attributes.insert("resource_group_name".into(), json!(locator.scope_value("resourceGroups")));
        if let Some(location) = record.property("location") {
            attributes.insert("location".into(), location.clone());
        }
        let tags = record.property("tags").cloned().unwrap_or_else(|| json!({}));
        attributes.insert("tags".into(), tags);
        attributes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flatten_defaults_missing_tags() {
        let desired = MigrateProject::new("proj1", "rg1", "westeurope");
        let locator = MigrateProjectKind::locator(&desired).unwrap();
        let record = RemoteRecord::new(locator.to_string()).with("location", "westeurope");

        let attributes = MigrateProjectKind::flatten(&locator, &record);
        assert_eq!(attributes.get("tags"), Some(&json!({})));
        let observed: MigrateProject = serde_json::from_value(Value::Object(attributes)).unwrap();
        assert_eq!(observed, desired);
    }

    #[test]
    fn test_payload_carries_tags() {
        let desired = MigrateProject::new("proj1", "rg1", "westeurope").tag("env", "dev");
        assert_eq!(
            MigrateProjectKind::create_payload(&desired),
            json!({ "location": "westeurope", "tags": { "env": "dev" } })
        );
    }
}
