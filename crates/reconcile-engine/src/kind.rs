//! # ResourceKind Trait
//!
//! The `ResourceKind` trait is the small per-kind descriptor every resource type
//! implements to be driven by the generic [`Reconciler`](crate::Reconciler). It names
//! the identifier layout, maps the desired configuration onto request payloads and maps
//! provider records back into attributes. The state machine itself is written once.
//!
//! # Attributes
//!
//! The engine compares desired and last-known values attribute by attribute, so
//! [`flatten`](ResourceKind::flatten) must produce a map shaped like the serialized
//! [`Desired`](ResourceKind::Desired) value: same keys, same encodings. `null` and an
//! absent key both mean "unset".
//!
//! # Settings
//!
//! Some attributes live on a sub-resource of their own (a capacity setting distinct
//! from the base object). Each [`Setting`] names one of them; the engine reads it with a
//! secondary lookup and updates it with a separate mutation, treating a missing
//! sub-resource as "unset" on read and as a recoverable warning on update.

use crate::error::IdError;
use crate::locator::{IdentifierFormat, ResourceLocator};
use crate::migration::StateMigrator;
use crate::remote::{Payload, RemoteRecord};
use crate::state::Attributes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt::Debug;

/// An attribute backed by a sub-resource nested under the base object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Setting {
    /// Attribute name in the desired configuration and in persisted state.
    pub attribute: &'static str,
    /// Segment type of the sub-resource, e.g. `throughputSettings`.
    pub resource_type: &'static str,
    /// Segment value of the sub-resource, e.g. `default`.
    pub name: &'static str,
    /// Property of the sub-resource's record that holds the value.
    pub field: &'static str,
}

impl Setting {
    pub fn locator(&self, parent: &ResourceLocator) -> ResourceLocator {
        parent.child(self.resource_type, self.name)
    }
}

pub trait ResourceKind: Send + Sync + 'static {
    /// Human-readable kind name used in logs.
    const TYPE_NAME: &'static str;

    const FORMAT: IdentifierFormat;

    /// The user-declared configuration of one instance.
    type Desired: Clone + Debug + Serialize + DeserializeOwned + Send + Sync;

    /// The deterministic locator of the instance, derived from its scope and name.
    fn locator(desired: &Self::Desired) -> Result<ResourceLocator, IdError>;

    fn create_payload(desired: &Self::Desired) -> Payload;

    fn update_payload(desired: &Self::Desired) -> Payload {
        Self::create_payload(desired)
    }

    /// Maps a provider record back into desired-shaped attributes.
    fn flatten(locator: &ResourceLocator, record: &RemoteRecord) -> Attributes;

    fn settings() -> &'static [Setting] {
        &[]
    }

    fn setting_payload(setting: &Setting, value: &Value) -> Payload {
        let mut body = serde_json::Map::new();
        body.insert(setting.field.to_string(), value.clone());
        Value::Object(body)
    }

    /// Ordered state upgraders. The default has none, so the current version is 0.
    fn migrator() -> StateMigrator {
        StateMigrator::new()
    }
}
