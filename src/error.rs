//! Error taxonomy of the geometry inventory.
//!
//! Duplicate identities are not errors: the `add_*` operations log a warning
//! and return `None`. Everything listed here is a hard failure that
//! propagates to the caller.

use thiserror::Error;

use crate::timebox::TimeSpan;

#[derive(Debug, Error)]
pub enum InventoryError {
    /// A time-boxed assignment or parameter would overlap an existing one.
    #[error("{subject} is already deployed {span}")]
    IntervalConflict { subject: String, span: TimeSpan },

    /// The start of an interval is not before its end.
    #[error("invalid interval {span}: start must be before end")]
    InvalidInterval { span: TimeSpan },

    #[error("no {kind} found for {key}")]
    UnresolvedReference { kind: &'static str, key: String },

    /// More than one entity matches a unique identity. Indicates a broken
    /// inventory.
    #[error("{count} {kind}s found for {key}, expected exactly one")]
    AmbiguousReference {
        kind: &'static str,
        key: String,
        count: usize,
    },

    #[error("the {kind} is not part of an inventory")]
    Detached { kind: &'static str },

    #[error("unknown search key '{key}' for {entity}")]
    UnknownFilterKey { entity: &'static str, key: String },

    #[error("unknown slot position '{0}', expected front, back or both")]
    InvalidSlotPosition(String),

    #[error("unknown report level '{0}', expected station or channel")]
    InvalidReportLevel(String),

    #[error("the {kind} {key} is still assigned and can't be removed")]
    AssignedEntity { kind: &'static str, key: String },

    #[error("unsupported coordinate system '{0}'")]
    UnsupportedCoordinateSystem(String),

    #[error("the inventory contains no stations")]
    NoStations,

    #[error("more than one parameter found for {subject}")]
    AmbiguousParameter { subject: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, InventoryError>;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_interval_conflict_message() {
        let span = TimeSpan::new(Some(Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap()), None);
        let err = InventoryError::IntervalConflict {
            subject: "component 1001:Z".to_string(),
            span,
        };
        let msg = err.to_string();
        assert!(msg.contains("already deployed from 2020-01-01"));
        assert!(msg.ends_with("to running"));
    }

    #[test]
    fn test_detached_message() {
        let err = InventoryError::Detached { kind: "channel" };
        assert_eq!(err.to_string(), "the channel is not part of an inventory");
    }
}
