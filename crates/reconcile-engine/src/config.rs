//! # Engine Configuration
//!
//! Per-verb timeouts, the polling cadence for long-running operations and the import
//! policy for Create. Every field has a default, so an empty JSON object is a valid
//! configuration:
//!
//! ```rust
//! use reconcile_engine::{EngineConfig, ImportMode};
//!
//! let config = EngineConfig::from_json(r#"{ "import_mode": "adopt", "timeouts": { "read": 60000 } }"#).unwrap();
//! assert_eq!(config.import_mode, ImportMode::Adopt);
//! assert_eq!(config.timeouts.read.as_secs(), 60);
//! assert_eq!(config.timeouts.create.as_secs(), 30 * 60);
//! ```

use crate::error::Verb;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Whether Create may touch a remote object that already exists under the same name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportMode {
    /// Look the object up first and fail with `AlreadyExists` if it is there.
    #[default]
    Reject,
    /// Skip the lookup; the create request converges whatever exists.
    Adopt,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    #[serde(with = "millis")]
    pub create: Duration,
    #[serde(with = "millis")]
    pub read: Duration,
    #[serde(with = "millis")]
    pub update: Duration,
    #[serde(with = "millis")]
    pub delete: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            create: Duration::from_secs(30 * 60),
            read: Duration::from_secs(5 * 60),
            update: Duration::from_secs(30 * 60),
            delete: Duration::from_secs(30 * 60),
        }
    }
}

impl Timeouts {
    pub fn for_verb(&self, verb: Verb) -> Duration {
        match verb {
            Verb::Create => self.create,
            Verb::Read | Verb::Import => self.read,
            Verb::Update => self.update,
            Verb::Delete => self.delete,
        }
    }
}

/// Exponential backoff between status polls of a long-running operation.
///
/// Deserialization rejects policies that could not back off: a zero initial interval,
/// an initial interval above the maximum, or a multiplier that is not a finite number
/// of at least 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "PollPolicyFields")]
pub struct PollPolicy {
    #[serde(with = "millis")]
    pub initial_interval: Duration,
    #[serde(with = "millis")]
    pub max_interval: Duration,
    pub multiplier: f64,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_secs(1),
            max_interval: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

impl PollPolicy {
    /// A fixed interval, mostly useful in tests.
    pub fn fixed(interval: Duration) -> Self {
        Self {
            initial_interval: interval,
            max_interval: interval,
            multiplier: 1.0,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.initial_interval.is_zero() {
            return Err("polling.initial_interval must be greater than zero".into());
        }
        if self.initial_interval > self.max_interval {
            return Err(format!(
                "polling.initial_interval ({:?}) exceeds polling.max_interval ({:?})",
                self.initial_interval, self.max_interval
            ));
        }
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(format!(
                "polling.multiplier must be a finite number >= 1, got {}",
                self.multiplier
            ));
        }
        Ok(())
    }

    /// The interval after `current`, never above `max_interval`. Saturates instead of
    /// overflowing.
    pub fn next_interval(&self, current: Duration) -> Duration {
        let multiplier = if self.multiplier.is_finite() { self.multiplier.max(1.0) } else { 1.0 };
        Duration::try_from_secs_f64(current.as_secs_f64() * multiplier)
            .unwrap_or(self.max_interval)
            .min(self.max_interval)
    }
}

#[derive(Deserialize)]
#[serde(default)]
struct PollPolicyFields {
    #[serde(with = "millis")]
    initial_interval: Duration,
    #[serde(with = "millis")]
    max_interval: Duration,
    multiplier: f64,
}

impl Default for PollPolicyFields {
    fn default() -> Self {
        let PollPolicy {
            initial_interval,
            max_interval,
            multiplier,
        } = PollPolicy::default();
        Self {
            initial_interval,
            max_interval,
            multiplier,
        }
    }
}

impl TryFrom<PollPolicyFields> for PollPolicy {
    type Error = String;

    fn try_from(fields: PollPolicyFields) -> Result<Self, Self::Error> {
        let policy = PollPolicy {
            initial_interval: fields.initial_interval,
            max_interval: fields.max_interval,
            multiplier: fields.multiplier,
        };
        policy.validate()?;
        Ok(policy)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub timeouts: Timeouts,
    pub polling: PollPolicy,
    pub import_mode: ImportMode,
}

impl EngineConfig {
    pub fn from_json(input: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(input)
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_provider_timeouts() {
        let config = EngineConfig::from_json("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.timeouts.for_verb(Verb::Read), Duration::from_secs(300));
        assert_eq!(config.timeouts.for_verb(Verb::Delete), Duration::from_secs(1800));
        assert_eq!(config.import_mode, ImportMode::Reject);
    }

    #[test]
    fn test_backoff_is_capped() {
        let policy = PollPolicy {
            initial_interval: Duration::from_millis(100),
            max_interval: Duration::from_millis(350),
            multiplier: 2.0,
        };
        let second = policy.next_interval(policy.initial_interval);
        assert_eq!(second, Duration::from_millis(200));
        assert_eq!(policy.next_interval(second), Duration::from_millis(350));
        assert_eq!(
            PollPolicy::fixed(Duration::from_millis(5)).next_interval(Duration::from_millis(5)),
            Duration::from_millis(5)
        );
    }

    #[test]
    fn test_round_trips_through_json() {
        let config = EngineConfig {
            import_mode: ImportMode::Adopt,
            polling: PollPolicy::fixed(Duration::from_millis(250)),
            ..Default::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(EngineConfig::from_json(&json).unwrap(), config);
    }

    #[test]
    fn test_huge_multiplier_saturates_at_max_interval() {
        let policy = PollPolicy {
            initial_interval: Duration::from_secs(1),
            max_interval: Duration::from_secs(30),
            multiplier: 1e300,
        };
        assert_eq!(policy.next_interval(policy.initial_interval), Duration::from_secs(30));
        assert_eq!(policy.next_interval(Duration::from_secs(30)), Duration::from_secs(30));

        let unchecked = PollPolicy {
            multiplier: f64::NAN,
            ..PollPolicy::fixed(Duration::from_millis(5))
        };
        assert_eq!(unchecked.next_interval(Duration::from_millis(5)), Duration::from_millis(5));
    }

    #[test]
    fn test_rejects_policies_that_cannot_back_off() {
        let huge = EngineConfig::from_json(r#"{ "polling": { "multiplier": 1e300 } }"#).unwrap();
        assert_eq!(huge.polling.next_interval(Duration::from_secs(1)), Duration::from_secs(30));

        for input in [
            r#"{ "polling": { "initial_interval": 0 } }"#,
            r#"{ "polling": { "initial_interval": 60000, "max_interval": 1000 } }"#,
            r#"{ "polling": { "multiplier": 0.5 } }"#,
        ] {
            let err = EngineConfig::from_json(input).unwrap_err();
            assert!(err.to_string().contains("polling."), "{input}: {err}");
        }
    }

    #[test]
    fn test_partial_polling_section_keeps_defaults() {
        let config = EngineConfig::from_json(r#"{ "polling": { "max_interval": 5000 } }"#).unwrap();
        assert_eq!(config.polling.initial_interval, Duration::from_secs(1));
        assert_eq!(config.polling.max_interval, Duration::from_secs(5));
        assert_eq!(config.polling.multiplier, 2.0);
    }

    #[test]
    fn test_rejects_unknown_import_mode() {
        assert!(EngineConfig::from_json(r#"{ "import_mode": "merge" }"#).is_err());
    }
}
