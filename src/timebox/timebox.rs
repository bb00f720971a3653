//! Time-bounded wrapper around an assigned item.

use std::ops::Deref;

use serde::{Deserialize, Serialize};

use super::interval::{Interval, TimeSpan, Timestamp};
use crate::error::Result;

/// An item assigned for `[start_time, end_time)`.
///
/// Two boxes are equal when they hold the same item over the same span.
/// Reads of the item's own attributes go straight through `Deref`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeBox<T> {
    pub item: T,
    pub start_time: Option<Timestamp>,
    pub end_time: Option<Timestamp>,
}

impl<T> TimeBox<T> {
    /// Create a box, rejecting a start that is not before the end.
    pub fn new(item: T, start_time: Option<Timestamp>, end_time: Option<Timestamp>) -> Result<Self> {
        TimeSpan::new(start_time, end_time).validate()?;
        Ok(Self {
            item,
            start_time,
            end_time,
        })
    }

    pub fn start_time_string(&self) -> String {
        self.span().start_string()
    }

    pub fn end_time_string(&self) -> String {
        self.span().end_string()
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> TimeBox<U> {
        TimeBox {
            item: f(self.item),
            start_time: self.start_time,
            end_time: self.end_time,
        }
    }
}

impl<T> Interval for TimeBox<T> {
    fn start_time(&self) -> Option<Timestamp> {
        self.start_time
    }

    fn end_time(&self) -> Option<Timestamp> {
        self.end_time
    }
}

impl<T> Deref for TimeBox<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.item
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_new_rejects_reversed_bounds() {
        let start = Utc.with_ymd_and_hms(2020, 2, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        assert!(TimeBox::new("x", Some(start), Some(end)).is_err());
    }

    #[test]
    fn test_equality_and_deref() {
        let start = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let a = TimeBox::new("stream".to_string(), Some(start), None).unwrap();
        let b = TimeBox::new("stream".to_string(), Some(start), None).unwrap();
        let c = TimeBox::new("stream".to_string(), None, None).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 6);
        assert_eq!(c.start_time_string(), "big bang");
        assert_eq!(c.end_time_string(), "running");
    }
}
