//! Inventory configuration.
//!
//! Settings can come from a JSON document or from `PSYSMON_*` environment
//! variables. Missing fields fall back to the defaults.

use std::env;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{InventoryError, Result};

/// How string-keyed searches treat keys the entity doesn't know.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FilterPolicy {
    /// Ignore the key and log a warning.
    #[default]
    Lenient,
    /// Reject the search with `InventoryError::UnknownFilterKey`.
    Strict,
}

impl FromStr for FilterPolicy {
    type Err = InventoryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lenient" => Ok(Self::Lenient),
            "strict" => Ok(Self::Strict),
            other => Err(InventoryError::Config(format!(
                "unknown filter policy '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InventoryConfig {
    pub filter_policy: FilterPolicy,
    /// Run merges against a staged copy and commit only on success.
    pub atomic_merge: bool,
    /// Level name understood by `log::LevelFilter` (error, warn, info, debug, trace).
    pub log_level: String,
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            filter_policy: FilterPolicy::Lenient,
            atomic_merge: true,
            log_level: "info".to_string(),
        }
    }
}

impl InventoryConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.level_filter()?;
        Ok(config)
    }

    /// Build a configuration from `PSYSMON_FILTER_POLICY`,
    /// `PSYSMON_ATOMIC_MERGE` and `PSYSMON_LOG_LEVEL`.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(policy) = env::var("PSYSMON_FILTER_POLICY") {
            config.filter_policy = policy.parse()?;
        }
        if let Ok(atomic) = env::var("PSYSMON_ATOMIC_MERGE") {
            config.atomic_merge = parse_bool(&atomic).ok_or_else(|| {
                InventoryError::Config(format!("PSYSMON_ATOMIC_MERGE: invalid value '{}'", atomic))
            })?;
        }
        if let Ok(level) = env::var("PSYSMON_LOG_LEVEL") {
            config.log_level = level;
        }

        config.level_filter()?;
        Ok(config)
    }

    pub fn level_filter(&self) -> Result<log::LevelFilter> {
        log::LevelFilter::from_str(&self.log_level)
            .map_err(|_| InventoryError::Config(format!("unknown log level '{}'", self.log_level)))
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = InventoryConfig::default();
        assert_eq!(config.filter_policy, FilterPolicy::Lenient);
        assert!(config.atomic_merge);
        assert_eq!(config.level_filter().unwrap(), log::LevelFilter::Info);
    }

    #[test]
    fn test_from_json_partial() {
        let config = InventoryConfig::from_json(r#"{"filter_policy": "strict"}"#).unwrap();
        assert_eq!(config.filter_policy, FilterPolicy::Strict);
        assert!(config.atomic_merge);
    }

    #[test]
    fn test_from_json_bad_level() {
        let result = InventoryConfig::from_json(r#"{"log_level": "loud"}"#);
        assert!(matches!(result, Err(InventoryError::Config(_))));
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("Yes"), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }
}
