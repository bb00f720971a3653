//! Half-open time intervals with optional bounds.
//!
//! An absent start reaches back to the big bang, an absent end is still
//! running. All time-filtered lookups of the inventory go through
//! [`intersects`].

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{InventoryError, Result};

pub type Timestamp = DateTime<Utc>;

/// Check whether the interval `[start, end)` overlaps the query window.
///
/// A missing query bound disables that side of the check.
pub fn intersects(
    start: Option<Timestamp>,
    end: Option<Timestamp>,
    query_start: Option<Timestamp>,
    query_end: Option<Timestamp>,
) -> bool {
    let ends_after_start = match (end, query_start) {
        (Some(end), Some(query_start)) => end > query_start,
        _ => true,
    };
    let starts_before_end = match (start, query_end) {
        (Some(start), Some(query_end)) => start < query_end,
        _ => true,
    };
    ends_after_start && starts_before_end
}

/// A start/end pair, displayed as `from <start> to <end>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct TimeSpan {
    pub start: Option<Timestamp>,
    pub end: Option<Timestamp>,
}

impl TimeSpan {
    pub fn new(start: Option<Timestamp>, end: Option<Timestamp>) -> Self {
        Self { start, end }
    }

    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Reject spans whose start is not before their end.
    pub fn validate(self) -> Result<Self> {
        match (self.start, self.end) {
            (Some(start), Some(end)) if start >= end => {
                Err(InventoryError::InvalidInterval { span: self })
            }
            _ => Ok(self),
        }
    }

    pub fn start_string(&self) -> String {
        self.start
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "big bang".to_string())
    }

    pub fn end_string(&self) -> String {
        self.end
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "running".to_string())
    }

    /// Overlap of two spans, `None` if they don't intersect.
    pub fn intersection(&self, other: &TimeSpan) -> Option<TimeSpan> {
        if !intersects(self.start, self.end, other.start, other.end) {
            return None;
        }
        let start = match (self.start, other.start) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
        let end = match (self.end, other.end) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        Some(TimeSpan { start, end })
    }
}

impl fmt::Display for TimeSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "from {} to {}", self.start_string(), self.end_string())
    }
}

/// Anything with optional start and end times.
pub trait Interval {
    fn start_time(&self) -> Option<Timestamp>;
    fn end_time(&self) -> Option<Timestamp>;

    fn span(&self) -> TimeSpan {
        TimeSpan::new(self.start_time(), self.end_time())
    }

    fn intersects(&self, start: Option<Timestamp>, end: Option<Timestamp>) -> bool {
        intersects(self.start_time(), self.end_time(), start, end)
    }

    /// `start <= at < end`, absent bounds being unlimited.
    fn contains(&self, at: Timestamp) -> bool {
        self.start_time().map_or(true, |start| start <= at)
            && self.end_time().map_or(true, |end| end > at)
    }

    fn same_span<I: Interval + ?Sized>(&self, other: &I) -> bool {
        self.start_time() == other.start_time() && self.end_time() == other.end_time()
    }
}

impl Interval for TimeSpan {
    fn start_time(&self) -> Option<Timestamp> {
        self.start
    }

    fn end_time(&self) -> Option<Timestamp> {
        self.end
    }
}

/// Where to look for a free slot in a timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotPosition {
    Front,
    Back,
    Both,
}

impl FromStr for SlotPosition {
    type Err = InventoryError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "front" => Ok(Self::Front),
            "back" => Ok(Self::Back),
            "both" => Ok(Self::Both),
            other => Err(InventoryError::InvalidSlotPosition(other.to_string())),
        }
    }
}

/// Time-filtered reads and slot search over a collection of intervals.
pub trait Timeline<I: Interval> {
    /// Items intersecting `[start, end)`.
    fn active_between(&self, start: Option<Timestamp>, end: Option<Timestamp>) -> Vec<&I>;

    /// Items active at one instant.
    fn active_at(&self, at: Timestamp) -> Vec<&I>;

    /// First item overlapping the span, if any.
    fn conflict_with(&self, span: &TimeSpan) -> Option<&I>;

    /// Open span before the first or after the last item.
    ///
    /// An empty timeline is free everywhere. `Back` needs a closed last item,
    /// `Front` needs a first item with a start; `Both` tries back, then front.
    fn free_slot(&self, position: SlotPosition) -> Option<TimeSpan>;
}

impl<I: Interval> Timeline<I> for [I] {
    fn active_between(&self, start: Option<Timestamp>, end: Option<Timestamp>) -> Vec<&I> {
        self.iter().filter(|item| item.intersects(start, end)).collect()
    }

    fn active_at(&self, at: Timestamp) -> Vec<&I> {
        self.iter().filter(|item| item.contains(at)).collect()
    }

    fn conflict_with(&self, span: &TimeSpan) -> Option<&I> {
        self.iter().find(|item| item.intersects(span.start, span.end))
    }

    fn free_slot(&self, position: SlotPosition) -> Option<TimeSpan> {
        if self.is_empty() {
            return Some(TimeSpan::unbounded());
        }

        let mut sorted: Vec<&I> = self.iter().collect();
        sorted.sort_by_key(|item| item.start_time());

        let back = || {
            let last = sorted[sorted.len() - 1];
            last.end_time()
                .map(|end| TimeSpan::new(Some(end + Duration::seconds(1)), None))
        };
        let front = || {
            sorted[0]
                .start_time()
                .map(|start| TimeSpan::new(None, Some(start - Duration::seconds(1))))
        };

        match position {
            SlotPosition::Back => back(),
            SlotPosition::Front => front(),
            SlotPosition::Both => back().or_else(front),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn day(d: u32) -> Timestamp {
        Utc.with_ymd_and_hms(2020, 1, d, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_intersects_half_open() {
        assert!(intersects(Some(day(1)), Some(day(5)), Some(day(4)), Some(day(6))));
        // Touching at the boundary is not an overlap
        assert!(!intersects(Some(day(1)), Some(day(5)), Some(day(5)), Some(day(6))));
        assert!(!intersects(Some(day(5)), Some(day(9)), Some(day(1)), Some(day(5))));
    }

    #[test]
    fn test_intersects_open_bounds() {
        assert!(intersects(None, None, Some(day(3)), Some(day(4))));
        assert!(intersects(Some(day(3)), None, None, None));
        assert!(!intersects(Some(day(3)), None, None, Some(day(2))));
        assert!(!intersects(None, Some(day(3)), Some(day(3)), None));
    }

    #[test]
    fn test_span_display() {
        assert_eq!(TimeSpan::unbounded().to_string(), "from big bang to running");
    }

    #[test]
    fn test_validate() {
        assert!(TimeSpan::new(Some(day(2)), Some(day(1))).validate().is_err());
        assert!(TimeSpan::new(Some(day(2)), Some(day(2))).validate().is_err());
        assert!(TimeSpan::new(Some(day(1)), Some(day(2))).validate().is_ok());
        assert!(TimeSpan::new(Some(day(1)), None).validate().is_ok());
    }

    #[test]
    fn test_intersection() {
        let a = TimeSpan::new(Some(day(1)), None);
        let b = TimeSpan::new(None, Some(day(5)));
        assert_eq!(a.intersection(&b), Some(TimeSpan::new(Some(day(1)), Some(day(5)))));

        let c = TimeSpan::new(Some(day(6)), None);
        assert_eq!(b.intersection(&c), None);
    }

    #[test]
    fn test_free_slot_empty() {
        let spans: Vec<TimeSpan> = Vec::new();
        assert_eq!(spans.free_slot(SlotPosition::Back), Some(TimeSpan::unbounded()));
    }

    #[test]
    fn test_free_slot_back_and_front() {
        let spans = vec![
            TimeSpan::new(Some(day(10)), Some(day(20))),
            TimeSpan::new(Some(day(2)), Some(day(5))),
        ];
        let back = spans.free_slot(SlotPosition::Back).unwrap();
        assert_eq!(back.start, Some(day(20) + Duration::seconds(1)));
        assert_eq!(back.end, None);

        let front = spans.free_slot(SlotPosition::Front).unwrap();
        assert_eq!(front.start, None);
        assert_eq!(front.end, Some(day(2) - Duration::seconds(1)));
    }

    #[test]
    fn test_free_slot_both_falls_back_to_front() {
        let spans = vec![TimeSpan::new(Some(day(10)), None)];
        assert_eq!(spans.free_slot(SlotPosition::Back), None);
        let slot = spans.free_slot(SlotPosition::Both).unwrap();
        assert_eq!(slot.end, Some(day(10) - Duration::seconds(1)));

        let unbounded = vec![TimeSpan::unbounded()];
        assert_eq!(unbounded.free_slot(SlotPosition::Both), None);
    }

    #[test]
    fn test_slot_position_parse() {
        assert_eq!("both".parse::<SlotPosition>().unwrap(), SlotPosition::Both);
        assert!("middle".parse::<SlotPosition>().is_err());
    }

    #[test]
    fn test_active_at() {
        let spans = vec![
            TimeSpan::new(Some(day(1)), Some(day(5))),
            TimeSpan::new(Some(day(5)), None),
        ];
        assert_eq!(spans.active_at(day(5)), vec![&spans[1]]);
        assert_eq!(spans.active_at(day(4)), vec![&spans[0]]);
    }
}
