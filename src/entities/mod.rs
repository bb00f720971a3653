//! Domain records of the geometry inventory.
//!
//! - `network` - networks, stations and channels
//! - `recorder` - data recorders and their streams
//! - `sensor` - sensors and their components
//! - `parameters` - time-bounded stream and component parameters
//! - `array` - station arrays
//!
//! Records are built as standalone values and handed to the `Inventory`,
//! which stores them and wires up parents and assignments. Every setter
//! marks the record dirty when the value actually changes.

pub mod array;
pub mod network;
pub mod parameters;
pub mod recorder;
pub mod sensor;

pub use array::*;
pub use network::*;
pub use parameters::*;
pub use recorder::*;
pub use sensor::*;

use chrono::Utc;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::timebox::Timestamp;

/// Who created a record, on behalf of whom, and when.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    pub author_uri: Option<String>,
    pub agency_uri: Option<String>,
    pub creation_time: Timestamp,
}

impl Provenance {
    pub fn now() -> Self {
        Self {
            author_uri: None,
            agency_uri: None,
            creation_time: Utc::now(),
        }
    }

    pub fn with_author(mut self, author_uri: &str, agency_uri: &str) -> Self {
        self.author_uri = Some(author_uri.to_string());
        self.agency_uri = Some(agency_uri.to_string());
        self
    }
}

impl Default for Provenance {
    fn default() -> Self {
        Self::now()
    }
}

/// Equality used for change tracking, in which NaN equals NaN.
pub(crate) trait SameValue {
    fn same_value(&self, other: &Self) -> bool;
}

impl SameValue for f64 {
    fn same_value(&self, other: &Self) -> bool {
        self == other || (self.is_nan() && other.is_nan())
    }
}

impl SameValue for String {
    fn same_value(&self, other: &Self) -> bool {
        self == other
    }
}

impl SameValue for Complex64 {
    fn same_value(&self, other: &Self) -> bool {
        self.re.same_value(&other.re) && self.im.same_value(&other.im)
    }
}

impl<T: SameValue> SameValue for Option<T> {
    fn same_value(&self, other: &Self) -> bool {
        match (self, other) {
            (Some(a), Some(b)) => a.same_value(b),
            (None, None) => true,
            _ => false,
        }
    }
}

impl<T: SameValue> SameValue for Vec<T> {
    fn same_value(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().zip(other).all(|(a, b)| a.same_value(b))
    }
}

/// Store `value` in `slot`, flagging `changed` if it differs.
pub(crate) fn assign<T: SameValue>(slot: &mut T, value: T, changed: &mut bool) -> bool {
    if slot.same_value(&value) {
        return false;
    }
    *slot = value;
    *changed = true;
    true
}
