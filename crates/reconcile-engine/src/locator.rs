//! # Identifier Codec
//!
//! Converts between the opaque identifier persisted in local state and the structured
//! [`ResourceLocator`] the engine works with.
//!
//! ## Grammar
//!
//! An identifier is a `/`-prefixed, `/`-delimited sequence of alternating segment-type
//! and segment-value tokens. The last pair names the resource itself, every pair before
//! it is scope:
//!
//! ```text
//! /group/rg1/account/acct1/gremlinDatabases/db1
//!  └──── scope ──────────┘ └─ type ───────┘ └ name
//! ```
//!
//! Identifiers are case-preserved and compared by exact string equality. Re-encoding a
//! decoded locator reproduces the input byte for byte.
//!
//! ## Kind-specific formats
//!
//! [`ResourceLocator::decode`] accepts any well-formed identifier. Resource kinds
//! describe their expected layout with an [`IdentifierFormat`], whose
//! [`decode`](IdentifierFormat::decode) additionally rejects missing, extra and
//! out-of-order segments.

use crate::error::IdError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One `type/value` pair of a resource's scope path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Segment {
    pub kind: String,
    pub value: String,
}

impl Segment {
    pub fn new(kind: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            value: value.into(),
        }
    }
}

/// Structured decomposition of a resource identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceLocator {
    pub scope: Vec<Segment>,
    pub resource_type: String,
    pub name: String,
}

impl ResourceLocator {
    /// A locator with an empty scope. Use [`within`](Self::within) to add scope segments.
    pub fn new(resource_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            scope: Vec::new(),
            resource_type: resource_type.into(),
            name: name.into(),
        }
    }

    /// Appends a scope segment.
    pub fn within(mut self, kind: impl Into<String>, value: impl Into<String>) -> Self {
        self.scope.push(Segment::new(kind, value));
        self
    }

    /// Value of the first scope segment of the given type.
    pub fn scope_value(&self, kind: &str) -> Option<&str> {
        self.scope
            .iter()
            .find(|s| s.kind == kind)
            .map(|s| s.value.as_str())
    }

    /// Locator of a sub-resource nested under this one
    /// (e.g. `.../gremlinDatabases/db1/throughputSettings/default`).
    pub fn child(&self, resource_type: impl Into<String>, name: impl Into<String>) -> Self {
        let mut scope = self.scope.clone();
        scope.push(Segment::new(self.resource_type.clone(), self.name.clone()));
        Self {
            scope,
            resource_type: resource_type.into(),
            name: name.into(),
        }
    }

    pub fn encode(&self) -> Result<String, IdError> {
        if self.scope.is_empty() {
            return Err(IdError::MalformedLocator("scope path is empty".into()));
        }
        for segment in &self.scope {
            check_token("scope segment type", &segment.kind)?;
            check_token(&format!("value of scope segment {:?}", segment.kind), &segment.value)?;
        }
        check_token("resource type", &self.resource_type)?;
        check_token("resource name", &self.name)?;
        Ok(self.to_string())
    }

    pub fn decode(input: &str) -> Result<Self, IdError> {
        let mut pairs = split_pairs(input)?;
        if pairs.len() < 2 {
            return Err(unparseable(input, "expected at least one scope segment before the resource"));
        }
        let (resource_type, name) = pairs.pop().unwrap_or_default();
        Ok(Self {
            scope: pairs
                .into_iter()
                .map(|(kind, value)| Segment::new(kind, value))
                .collect(),
            resource_type: resource_type.to_string(),
            name: name.to_string(),
        })
    }
}

/// Renders the identifier form without validating it. Used for error context where a
/// locator may be malformed; use [`ResourceLocator::encode`] to mint identifiers.
impl fmt::Display for ResourceLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.scope {
            write!(f, "/{}/{}", segment.kind, segment.value)?;
        }
        write!(f, "/{}/{}", self.resource_type, self.name)
    }
}

impl FromStr for ResourceLocator {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s)
    }
}

fn check_token(what: &str, token: &str) -> Result<(), IdError> {
    if token.is_empty() {
        return Err(IdError::MalformedLocator(format!("{what} is empty")));
    }
    if token.contains('/') {
        return Err(IdError::MalformedLocator(format!(
            "{what} {token:?} contains a '/'"
        )));
    }
    Ok(())
}

fn unparseable(input: &str, reason: impl Into<String>) -> IdError {
    IdError::UnparseableIdentifier {
        input: input.to_string(),
        reason: reason.into(),
    }
}

fn split_pairs(input: &str) -> Result<Vec<(&str, &str)>, IdError> {
    let rest = input
        .strip_prefix('/')
        .ok_or_else(|| unparseable(input, "identifier must start with '/'"))?;
    let tokens: Vec<&str> = rest.split('/').collect();
    if tokens.iter().any(|t| t.is_empty()) {
        return Err(unparseable(input, "identifier contains an empty segment"));
    }
    if tokens.len() % 2 != 0 {
        return Err(unparseable(
            input,
            format!("segment {:?} has no value", tokens[tokens.len() - 1]),
        ));
    }
    Ok(tokens.chunks(2).map(|pair| (pair[0], pair[1])).collect())
}

/// The identifier layout of one resource kind: the ordered scope segment types
/// followed by the resource type segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdentifierFormat {
    pub scope: &'static [&'static str],
    pub resource_type: &'static str,
}

impl IdentifierFormat {
    pub const fn new(scope: &'static [&'static str], resource_type: &'static str) -> Self {
        Self {
            scope,
            resource_type,
        }
    }

    /// Builds the deterministic locator for a resource from its scope values (in format
    /// order) and name.
    pub fn locator(&self, scope_values: &[&str], name: &str) -> Result<ResourceLocator, IdError> {
        if scope_values.len() != self.scope.len() {
            return Err(IdError::MalformedLocator(format!(
                "expected {} scope values for {:?}, got {}",
                self.scope.len(),
                self.resource_type,
                scope_values.len()
            )));
        }
        let locator = self
            .scope
            .iter()
            .zip(scope_values)
            .fold(ResourceLocator::new(self.resource_type, name), |l, (k, v)| {
                l.within(*k, *v)
            });
        locator.encode()?;
        Ok(locator)
    }

    /// Decodes an identifier, requiring exactly this format's segments in this order.
    pub fn decode(&self, input: &str) -> Result<ResourceLocator, IdError> {
        let pairs = split_pairs(input)?;
        let expected = self.scope.iter().copied().chain(Some(self.resource_type));
        for (i, want) in expected.enumerate() {
            match pairs.get(i) {
                Some((kind, _)) if *kind == want => {}
                _ if pairs.iter().any(|(kind, _)| *kind == want) => {
                    return Err(unparseable(input, format!("segment {want:?} is out of order")));
                }
                _ => {
                    return Err(IdError::MissingSegment {
                        input: input.to_string(),
                        segment: want.to_string(),
                    });
                }
            }
        }
        if pairs.len() != self.scope.len() + 1 {
            return Err(unparseable(input, "unexpected trailing segments"));
        }
        ResourceLocator::decode(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const DATABASE: IdentifierFormat =
        IdentifierFormat::new(&["group", "account"], "gremlinDatabases");

    #[test]
    fn test_decode_scenario_identifier() {
        let locator = DATABASE
            .decode("/group/rg1/account/acct1/gremlinDatabases/db1")
            .unwrap();
        assert_eq!(locator.scope_value("group"), Some("rg1"));
        assert_eq!(locator.scope_value("account"), Some("acct1"));
        assert_eq!(locator.resource_type, "gremlinDatabases");
        assert_eq!(locator.name, "db1");
    }

    #[test]
    fn test_format_locator_encodes() {
        let locator = DATABASE.locator(&["rg1", "acct1"], "db1").unwrap();
        assert_eq!(
            locator.encode().unwrap(),
            "/group/rg1/account/acct1/gremlinDatabases/db1"
        );
        assert!(matches!(
            DATABASE.locator(&["rg1"], "db1"),
            Err(IdError::MalformedLocator(_))
        ));
    }

    #[test]
    fn test_encode_rejects_empty_parts() {
        let no_scope = ResourceLocator::new("gremlinDatabases", "db1");
        assert!(matches!(no_scope.encode(), Err(IdError::MalformedLocator(_))));

        let empty_name = ResourceLocator::new("gremlinDatabases", "").within("group", "rg1");
        assert!(matches!(empty_name.encode(), Err(IdError::MalformedLocator(_))));

        let empty_value = ResourceLocator::new("gremlinDatabases", "db1").within("group", "");
        assert!(matches!(empty_value.encode(), Err(IdError::MalformedLocator(_))));

        let slash = ResourceLocator::new("gremlinDatabases", "a/b").within("group", "rg1");
        assert!(matches!(slash.encode(), Err(IdError::MalformedLocator(_))));
    }

    #[test]
    fn test_decode_rejects_bad_grammar() {
        for input in [
            "",
            "group/rg1/gremlinDatabases/db1",
            "/group/rg1/gremlinDatabases/db1/",
            "/group//gremlinDatabases/db1",
            "/group/rg1/gremlinDatabases",
            "/gremlinDatabases/db1",
        ] {
            assert!(
                matches!(
                    ResourceLocator::decode(input),
                    Err(IdError::UnparseableIdentifier { .. })
                ),
                "{input:?} should not parse"
            );
        }
    }

    #[test]
    fn test_format_reports_missing_segment() {
        let err = DATABASE
            .decode("/group/rg1/gremlinDatabases/db1")
            .unwrap_err();
        assert_eq!(
            err,
            IdError::MissingSegment {
                input: "/group/rg1/gremlinDatabases/db1".into(),
                segment: "account".into(),
            }
        );
    }

    #[test]
    fn test_format_rejects_out_of_order_and_extra_segments() {
        assert!(matches!(
            DATABASE.decode("/account/acct1/group/rg1/gremlinDatabases/db1"),
            Err(IdError::UnparseableIdentifier { .. })
        ));
        assert!(matches!(
            DATABASE.decode("/group/rg1/account/acct1/gremlinDatabases/db1/throughputSettings/default"),
            Err(IdError::UnparseableIdentifier { .. })
        ));
    }

    #[test]
    fn test_segment_types_are_case_sensitive() {
        assert!(matches!(
            DATABASE.decode("/Group/rg1/account/acct1/gremlinDatabases/db1"),
            Err(IdError::MissingSegment { .. })
        ));
        // values keep their case
        let locator = DATABASE
            .decode("/group/RG1/account/acct1/gremlinDatabases/DB1")
            .unwrap();
        assert_eq!(locator.name, "DB1");
        assert_eq!(
            locator.encode().unwrap(),
            "/group/RG1/account/acct1/gremlinDatabases/DB1"
        );
    }

    #[test]
    fn test_child_locator() {
        let db = DATABASE.locator(&["rg1", "acct1"], "db1").unwrap();
        let settings = db.child("throughputSettings", "default");
        assert_eq!(
            settings.encode().unwrap(),
            "/group/rg1/account/acct1/gremlinDatabases/db1/throughputSettings/default"
        );
    }

    fn token() -> impl Strategy<Value = String> {
        "[A-Za-z0-9._-]{1,12}"
    }

    fn locator_strategy() -> impl Strategy<Value = ResourceLocator> {
        (
            proptest::collection::vec((token(), token()), 1..5),
            token(),
            token(),
        )
            .prop_map(|(scope, resource_type, name)| ResourceLocator {
                scope: scope.into_iter().map(|(k, v)| Segment::new(k, v)).collect(),
                resource_type,
                name,
            })
    }

    proptest! {
        #[test]
        fn property_decode_inverts_encode(locator in locator_strategy()) {
            let encoded = locator.encode().unwrap();
            let decoded = ResourceLocator::decode(&encoded).unwrap();
            prop_assert_eq!(&decoded, &locator);
            prop_assert_eq!(decoded.encode().unwrap(), encoded);
        }
    }
}
