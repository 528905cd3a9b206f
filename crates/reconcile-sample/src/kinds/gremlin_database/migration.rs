//! State upgraders for Gremlin databases.
//!
//! Version 0 records were flat attribute maps carrying the legacy identifier, where the
//! database sat under an `apis/gremlin` pair:
//!
//! ```text
//! /resourceGroups/rg1/databaseAccounts/acct1/apis/gremlin/databases/db1
//! ```

use serde_json::{json, Value};

const LEGACY_SEGMENTS: &str = "/apis/gremlin/databases/";
const CURRENT_SEGMENT: &str = "/gremlinDatabases/";

/// v0 -> v1: rewrite the legacy identifier and nest the flat attributes.
pub fn v0_to_v1(raw: Value) -> Result<Value, String> {
    let Value::Object(mut fields) = raw else {
        return Err("expected an object".into());
    };
    let legacy = fields
        .remove("id")
        .or_else(|| fields.remove("identifier"))
        .ok_or("record has no identifier")?;
    let legacy = legacy.as_str().ok_or("identifier is not a string")?;
    if legacy.matches(LEGACY_SEGMENTS).count() > 1 {
        return Err(format!("ambiguous legacy identifier {legacy:?}"));
    }
    let identifier = legacy.replacen(LEGACY_SEGMENTS, CURRENT_SEGMENT, 1);
    fields.remove("schema_version");

    Ok(json!({
        "identifier": identifier,
        "last_known_attributes": fields,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinds::GremlinDatabaseKind;
    use reconcile_engine::ResourceKind;

    #[test]
    fn test_rewrites_legacy_identifier() {
        let raw = json!({
            "id": "/resourceGroups/rg1/databaseAccounts/acct1/apis/gremlin/databases/db1",
            "name": "db1",
            "resource_group_name": "rg1",
            "account_name": "acct1",
            "throughput": 400,
        });
        let state = GremlinDatabaseKind::migrator().migrate(raw, 0).unwrap();
        assert_eq!(
            state.identifier,
            "/resourceGroups/rg1/databaseAccounts/acct1/gremlinDatabases/db1"
        );
        assert_eq!(state.schema_version, 1);
        assert_eq!(state.attribute("throughput"), Some(&json!(400)));
        assert_eq!(state.attribute("name"), Some(&json!("db1")));
    }

    #[test]
    fn test_current_identifiers_pass_through() {
        let raw = json!({ "id": "/resourceGroups/rg1/databaseAccounts/acct1/gremlinDatabases/db1" });
        let upgraded = v0_to_v1(raw).unwrap();
        assert_eq!(
            upgraded["identifier"],
            "/resourceGroups/rg1/databaseAccounts/acct1/gremlinDatabases/db1"
        );
    }

    #[test]
    fn test_rejects_records_without_identifier() {
        assert!(v0_to_v1(json!({ "name": "db1" })).is_err());
        assert!(v0_to_v1(json!({ "id": 7 })).is_err());
        assert!(v0_to_v1(json!(["not", "an", "object"])).is_err());
    }
}
