//! Structured logging utilities.
//!
//! Every inventory log line starts with the inventory name and, where one
//! applies, the code of the entity being worked on.

use std::fmt;

use crate::config::InventoryConfig;

/// Logging context for operations on one inventory.
///
/// The entity is kept as kind and code, so a line about a station reads
/// `[inventory=field-2020] [station=S1:XX:00]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogContext {
    pub inventory: String,
    pub entity: Option<(&'static str, String)>,
}

impl LogContext {
    pub fn new(inventory: &str) -> Self {
        Self {
            inventory: inventory.to_string(),
            entity: None,
        }
    }

    /// Context for one entity, e.g. `with_entity("recorder", "R1")`.
    pub fn with_entity(&self, kind: &'static str, code: impl fmt::Display) -> Self {
        Self {
            inventory: self.inventory.clone(),
            entity: Some((kind, code.to_string())),
        }
    }
}

impl fmt::Display for LogContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.entity {
            Some((kind, code)) => write!(f, "[inventory={}] [{}={}]", self.inventory, kind, code),
            None => write!(f, "[inventory={}]", self.inventory),
        }
    }
}

/// Install the `env_logger` backend at the configured level.
///
/// Safe to call more than once; only the first call installs the logger.
pub fn init_logger(config: &InventoryConfig) {
    let level = config.level_filter().unwrap_or(log::LevelFilter::Info);
    let _ = env_logger::builder()
        .filter_level(level)
        .format_timestamp_millis()
        .try_init();
}
