//! # State Version Migrator
//!
//! Brings a persisted state record written by an older engine version up to the
//! current layout before any other engine logic looks at it.
//!
//! Upgraders are registered in order with [`StateMigrator::step`]; the i-th upgrader
//! takes a record from version `i` to version `i + 1`, so the chain can't skip a
//! version. The current version is the number of registered upgraders.
//!
//! ```rust
//! use reconcile_engine::StateMigrator;
//! use serde_json::{json, Value};
//!
//! fn rename_id(mut raw: Value) -> Result<Value, String> {
//!     let id = raw.get("id").cloned().ok_or("record has no id")?;
//!     raw["identifier"] = id;
//!     Ok(raw)
//! }
//!
//! let migrator = StateMigrator::new().step(rename_id);
//! let state = migrator.migrate(json!({ "id": "/group/rg1/things/a" }), 0).unwrap();
//! assert_eq!(state.identifier, "/group/rg1/things/a");
//! assert_eq!(state.schema_version, 1);
//! ```

use crate::error::MigrationError;
use crate::state::PersistedState;
use serde_json::Value;
use tracing::debug;

/// A pure transform from one state layout to the next.
pub type StateUpgrader = fn(Value) -> Result<Value, String>;

/// Ordered chain of [`StateUpgrader`]s.
#[derive(Debug, Clone, Default)]
pub struct StateMigrator {
    steps: Vec<StateUpgrader>,
}

impl StateMigrator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the upgrader from version `current_version()` to the next one.
    pub fn step(mut self, upgrader: StateUpgrader) -> Self {
        self.steps.push(upgrader);
        self
    }

    pub fn current_version(&self) -> u32 {
        self.steps.len() as u32
    }

    /// Upgrades `raw` to the current layout.
    ///
    /// A `schema_version` tag inside the record wins over `declared_version`, which is
    /// only consulted for legacy records that carry no tag. A record already at the
    /// current version passes through unchanged, so running this on every load is safe.
    pub fn migrate(&self, raw: Value, declared_version: u32) -> Result<PersistedState, MigrationError> {
        if !raw.is_object() {
            return Err(MigrationError::Malformed("state record is not an object".into()));
        }
        let current = self.current_version();
        let found = match raw.get("schema_version") {
            Some(tag) => tag
                .as_u64()
                .and_then(|v| u32::try_from(v).ok())
                .ok_or_else(|| MigrationError::Malformed(format!("invalid schema_version {tag}")))?,
            None => declared_version,
        };
        if found > current {
            return Err(MigrationError::UnsupportedStateVersion { found, current });
        }

        let mut record = raw;
        for (from, upgrade) in self.steps.iter().enumerate().skip(found as usize) {
            debug!(from, to = from + 1, "Upgrading state");
            record = upgrade(record).map_err(|reason| MigrationError::UpgradeFailed {
                from: from as u32,
                reason,
            })?;
            if !record.is_object() {
                return Err(MigrationError::UpgradeFailed {
                    from: from as u32,
                    reason: "upgrader produced a non-object record".into(),
                });
            }
        }
        record["schema_version"] = Value::from(current);

        serde_json::from_value(record).map_err(|e| MigrationError::Malformed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    // v0: {"id": ..., flat attributes}
    fn v0_to_v1(raw: Value) -> Result<Value, String> {
        let Value::Object(mut fields) = raw else {
            return Err("expected an object".into());
        };
        let id = fields.remove("id").ok_or("legacy record has no id")?;
        fields.remove("schema_version");
        Ok(json!({ "identifier": id, "last_known_attributes": fields }))
    }

    // v1 -> v2: legacy `databases` segment renamed
    fn v1_to_v2(mut raw: Value) -> Result<Value, String> {
        let renamed = raw["identifier"]
            .as_str()
            .ok_or("identifier is not a string")?
            .replace("/databases/", "/gremlinDatabases/");
        raw["identifier"] = Value::from(renamed);
        Ok(raw)
    }

    fn migrator() -> StateMigrator {
        StateMigrator::new().step(v0_to_v1).step(v1_to_v2)
    }

    #[test]
    fn test_applies_steps_in_order() {
        let raw = json!({ "id": "/group/rg1/account/a/databases/db1", "throughput": 400 });
        let state = migrator().migrate(raw, 0).unwrap();
        assert_eq!(state.identifier, "/group/rg1/account/a/gremlinDatabases/db1");
        assert_eq!(state.schema_version, 2);
        assert_eq!(state.attribute("throughput"), Some(&json!(400)));
    }

    #[test]
    fn test_starts_from_declared_version() {
        let raw = json!({ "identifier": "/group/rg1/account/a/databases/db1" });
        let state = migrator().migrate(raw, 1).unwrap();
        assert_eq!(state.identifier, "/group/rg1/account/a/gremlinDatabases/db1");
        assert!(state.last_known_attributes.is_empty());
    }

    #[test]
    fn test_embedded_tag_wins_over_declared_version() {
        let raw = json!({
            "identifier": "/group/rg1/account/a/databases/db1",
            "schema_version": 2,
        });
        // declared 0 would run v0_to_v1 and fail on the missing id
        let state = migrator().migrate(raw, 0).unwrap();
        assert_eq!(state.identifier, "/group/rg1/account/a/databases/db1");
    }

    #[test]
    fn test_rejects_future_versions() {
        let raw = json!({ "identifier": "/group/rg1/things/a" });
        assert_eq!(
            migrator().migrate(raw, 3).unwrap_err(),
            MigrationError::UnsupportedStateVersion { found: 3, current: 2 }
        );
        let tagged = json!({ "identifier": "/group/rg1/things/a", "schema_version": 9 });
        assert!(matches!(
            StateMigrator::new().migrate(tagged, 0),
            Err(MigrationError::UnsupportedStateVersion { found: 9, current: 0 })
        ));
    }

    #[test]
    fn test_failed_step_names_its_version() {
        let raw = json!({ "throughput": 400 });
        assert!(matches!(
            migrator().migrate(raw, 0),
            Err(MigrationError::UpgradeFailed { from: 0, .. })
        ));
    }

    #[test]
    fn test_malformed_records() {
        assert!(matches!(
            migrator().migrate(json!("nope"), 0),
            Err(MigrationError::Malformed(_))
        ));
        assert!(matches!(
            StateMigrator::new().migrate(json!({ "last_known_attributes": {} }), 0),
            Err(MigrationError::Malformed(_))
        ));
    }

    proptest! {
        #[test]
        fn property_migration_is_idempotent(
            name in "[a-z0-9]{1,10}",
            throughput in proptest::option::of(400u32..10_000),
            version in 0u32..=2,
        ) {
            let identifier = format!("/group/rg1/account/a/databases/{name}");
            let raw = match version {
                0 => json!({ "id": identifier, "throughput": throughput }),
                1 => json!({ "identifier": identifier, "last_known_attributes": { "throughput": throughput } }),
                _ => json!({ "identifier": identifier, "schema_version": 2, "last_known_attributes": {} }),
            };
            let once = migrator().migrate(raw, version).unwrap();
            let twice = migrator()
                .migrate(serde_json::to_value(&once).unwrap(), version)
                .unwrap();
            prop_assert_eq!(once, twice);
        }
    }
}
