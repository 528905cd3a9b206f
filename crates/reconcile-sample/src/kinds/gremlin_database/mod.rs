//! # Gremlin Database Kind
//!
//! Identifier layout:
//!
//! ```text
//! /resourceGroups/{group}/databaseAccounts/{account}/gremlinDatabases/{name}
//! ```
//!
//! Throughput is a setting backed by the `throughputSettings/default` sub-resource. It
//! can only be changed later if the database was created with one.

pub mod migration;

use crate::model::GremlinDatabase;
use reconcile_engine::{
    Attributes, IdError, IdentifierFormat, Payload, RemoteRecord, ResourceKind, ResourceLocator, Setting,
    StateMigrator,
};
use serde_json::{json, Value};

pub struct GremlinDatabaseKind;

const THROUGHPUT: [Setting; 1] = [Setting {
    attribute: "throughput",
    resource_type: "throughputSettings",
    name: "default",
    field: "throughput",
}];

impl ResourceKind for GremlinDatabaseKind {
    const TYPE_NAME: &'static str = "cosmosdb_gremlin_database";
    const FORMAT: IdentifierFormat = IdentifierFormat::new(&["resourceGroups", "databaseAccounts"], "gremlinDatabases");
    type Desired = GremlinDatabase;

    fn locator(desired: &GremlinDatabase) -> Result<ResourceLocator, IdError> {
        Self::FORMAT.locator(
            &[desired.resource_group_name.as_str(), desired.account_name.as_str()],
            &desired.name,
        )
    }

    fn create_payload(desired: &GremlinDatabase) -> Payload {
        let mut payload = json!({ "name": desired.name });
        if let Some(throughput) = desired.throughput {
            payload["throughput"] = Value::from(throughput);
        }
        payload
    }

    fn update_payload(desired: &GremlinDatabase) -> Payload {
        json!({ "name": desired.name })
    }

    fn flatten(locator: &ResourceLocator, _record: &RemoteRecord) -> Attributes {
        let mut attributes = Attributes::new();
        attributes.insert("name".into(), json!(locator.name));
        attributes.insert("resource_group_name".into(), json!(locator.scope_value("resourceGroups")));
        attributes.insert("account_name".into(), json!(locator.scope_value("databaseAccounts")));
        attributes
    }

    fn settings() -> &'static [Setting] {
        &THROUGHPUT
    }

    fn migrator() -> StateMigrator {
        StateMigrator::new().step(migration::v0_to_v1)
    }
}
