//! Time-bounded calibration parameters.
//!
//! Parameters of one stream or one component never overlap. Insertion
//! checks the intersection rule against every existing parameter; merging
//! matches parameters by exact span.

use num_complex::Complex64;

use super::{assign, Provenance};
use crate::error::{InventoryError, Result};
use crate::timebox::{Interval, TimeSpan, Timeline, Timestamp};

/// Behaviour shared by the two parameter kinds.
pub trait TimedParameter: Interval + Clone {
    /// Copy the mergeable values of `other`, returning whether anything changed.
    fn update_from(&mut self, other: &Self) -> bool;

    fn has_changed(&self) -> bool;

    fn set_changed(&mut self, changed: bool);

    fn db_id(&self) -> Option<i64>;

    fn set_db_id(&mut self, id: Option<i64>);

    fn set_span(&mut self, span: TimeSpan);
}

/// Gain and bitweight of a recorder stream.
#[derive(Debug, Clone, PartialEq)]
pub struct RecorderStreamParameter {
    db_id: Option<i64>,
    start_time: Option<Timestamp>,
    end_time: Option<Timestamp>,
    gain: Option<f64>,
    bitweight: Option<f64>,
    provenance: Provenance,
    has_changed: bool,
}

impl RecorderStreamParameter {
    pub fn new(
        start_time: Option<Timestamp>,
        end_time: Option<Timestamp>,
        gain: Option<f64>,
        bitweight: Option<f64>,
    ) -> Self {
        Self {
            db_id: None,
            start_time,
            end_time,
            gain,
            bitweight,
            provenance: Provenance::now(),
            has_changed: false,
        }
    }

    pub fn with_provenance(mut self, provenance: Provenance) -> Self {
        self.provenance = provenance;
        self
    }

    pub fn gain(&self) -> Option<f64> {
        self.gain
    }

    pub fn bitweight(&self) -> Option<f64> {
        self.bitweight
    }

    pub fn provenance(&self) -> &Provenance {
        &self.provenance
    }

    pub fn set_gain(&mut self, gain: Option<f64>) {
        assign(&mut self.gain, gain, &mut self.has_changed);
    }

    pub fn set_bitweight(&mut self, bitweight: Option<f64>) {
        assign(&mut self.bitweight, bitweight, &mut self.has_changed);
    }

    pub fn start_time_string(&self) -> String {
        self.span().start_string()
    }

    pub fn end_time_string(&self) -> String {
        self.span().end_string()
    }
}

impl Interval for RecorderStreamParameter {
    fn start_time(&self) -> Option<Timestamp> {
        self.start_time
    }

    fn end_time(&self) -> Option<Timestamp> {
        self.end_time
    }
}

impl TimedParameter for RecorderStreamParameter {
    fn update_from(&mut self, other: &Self) -> bool {
        let mut changed = false;
        changed |= assign(&mut self.gain, other.gain, &mut self.has_changed);
        changed |= assign(&mut self.bitweight, other.bitweight, &mut self.has_changed);
        changed |= assign(
            &mut self.provenance.author_uri,
            other.provenance.author_uri.clone(),
            &mut self.has_changed,
        );
        changed |= assign(
            &mut self.provenance.agency_uri,
            other.provenance.agency_uri.clone(),
            &mut self.has_changed,
        );
        changed
    }

    fn has_changed(&self) -> bool {
        self.has_changed
    }

    fn set_changed(&mut self, changed: bool) {
        self.has_changed = changed;
    }

    fn db_id(&self) -> Option<i64> {
        self.db_id
    }

    fn set_db_id(&mut self, id: Option<i64>) {
        self.db_id = id;
    }

    fn set_span(&mut self, span: TimeSpan) {
        self.start_time = span.start;
        self.end_time = span.end;
    }
}

/// Sensitivity and transfer function of a sensor component.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorComponentParameter {
    db_id: Option<i64>,
    start_time: Option<Timestamp>,
    end_time: Option<Timestamp>,
    sensitivity: Option<f64>,
    tf_type: Option<String>,
    tf_units: Option<String>,
    tf_normalization_factor: Option<f64>,
    tf_normalization_frequency: Option<f64>,
    tf_poles: Vec<Complex64>,
    tf_zeros: Vec<Complex64>,
    provenance: Provenance,
    has_changed: bool,
}

impl SensorComponentParameter {
    pub fn new(
        start_time: Option<Timestamp>,
        end_time: Option<Timestamp>,
        sensitivity: Option<f64>,
    ) -> Self {
        Self {
            db_id: None,
            start_time,
            end_time,
            sensitivity,
            tf_type: None,
            tf_units: None,
            tf_normalization_factor: None,
            tf_normalization_frequency: None,
            tf_poles: Vec::new(),
            tf_zeros: Vec::new(),
            provenance: Provenance::now(),
            has_changed: false,
        }
    }

    pub fn with_provenance(mut self, provenance: Provenance) -> Self {
        self.provenance = provenance;
        self
    }

    /// Set the transfer function description.
    ///
    /// # Arguments
    /// * `tf_type` - e.g. "laplace" or "digital"
    /// * `units` - units of the transfer function input, e.g. "m/s"
    /// * `normalization_factor` - A0 normalization factor
    /// * `normalization_frequency` - frequency at which the factor applies
    pub fn set_transfer_function(
        &mut self,
        tf_type: Option<&str>,
        units: Option<&str>,
        normalization_factor: Option<f64>,
        normalization_frequency: Option<f64>,
    ) {
        let flag = &mut self.has_changed;
        assign(&mut self.tf_type, tf_type.map(str::to_string), flag);
        assign(&mut self.tf_units, units.map(str::to_string), flag);
        assign(&mut self.tf_normalization_factor, normalization_factor, flag);
        assign(&mut self.tf_normalization_frequency, normalization_frequency, flag);
    }

    pub fn add_complex_pole(&mut self, pole: Complex64) {
        self.tf_poles.push(pole);
        self.has_changed = true;
    }

    pub fn add_complex_zero(&mut self, zero: Complex64) {
        self.tf_zeros.push(zero);
        self.has_changed = true;
    }

    pub fn set_sensitivity(&mut self, sensitivity: Option<f64>) {
        assign(&mut self.sensitivity, sensitivity, &mut self.has_changed);
    }

    pub fn sensitivity(&self) -> Option<f64> {
        self.sensitivity
    }

    pub fn tf_type(&self) -> Option<&str> {
        self.tf_type.as_deref()
    }

    pub fn tf_units(&self) -> Option<&str> {
        self.tf_units.as_deref()
    }

    pub fn tf_normalization_factor(&self) -> Option<f64> {
        self.tf_normalization_factor
    }

    pub fn tf_normalization_frequency(&self) -> Option<f64> {
        self.tf_normalization_frequency
    }

    pub fn poles(&self) -> &[Complex64] {
        &self.tf_poles
    }

    pub fn zeros(&self) -> &[Complex64] {
        &self.tf_zeros
    }

    pub fn provenance(&self) -> &Provenance {
        &self.provenance
    }

    pub fn start_time_string(&self) -> String {
        self.span().start_string()
    }

    pub fn end_time_string(&self) -> String {
        self.span().end_string()
    }
}

impl Interval for SensorComponentParameter {
    fn start_time(&self) -> Option<Timestamp> {
        self.start_time
    }

    fn end_time(&self) -> Option<Timestamp> {
        self.end_time
    }
}

impl TimedParameter for SensorComponentParameter {
    fn update_from(&mut self, other: &Self) -> bool {
        let flag = &mut self.has_changed;
        let mut changed = false;
        changed |= assign(&mut self.sensitivity, other.sensitivity, flag);
        changed |= assign(&mut self.tf_type, other.tf_type.clone(), flag);
        changed |= assign(&mut self.tf_units, other.tf_units.clone(), flag);
        changed |= assign(
            &mut self.tf_normalization_factor,
            other.tf_normalization_factor,
            flag,
        );
        changed |= assign(
            &mut self.tf_normalization_frequency,
            other.tf_normalization_frequency,
            flag,
        );
        changed |= assign(&mut self.tf_poles, other.tf_poles.clone(), flag);
        changed |= assign(&mut self.tf_zeros, other.tf_zeros.clone(), flag);
        changed |= assign(
            &mut self.provenance.author_uri,
            other.provenance.author_uri.clone(),
            flag,
        );
        changed |= assign(
            &mut self.provenance.agency_uri,
            other.provenance.agency_uri.clone(),
            flag,
        );
        changed
    }

    fn has_changed(&self) -> bool {
        self.has_changed
    }

    fn set_changed(&mut self, changed: bool) {
        self.has_changed = changed;
    }

    fn db_id(&self) -> Option<i64> {
        self.db_id
    }

    fn set_db_id(&mut self, id: Option<i64>) {
        self.db_id = id;
    }

    fn set_span(&mut self, span: TimeSpan) {
        self.start_time = span.start;
        self.end_time = span.end;
    }
}

/// Insert `param` keeping the list sorted by start time.
///
/// Fails if the span is invalid or overlaps an existing parameter.
pub(crate) fn insert_parameter<P: TimedParameter>(
    params: &mut Vec<P>,
    mut param: P,
    owner: &str,
) -> Result<()> {
    let span = param.span().validate()?;
    if let Some(existing) = params.conflict_with(&span) {
        return Err(InventoryError::IntervalConflict {
            subject: format!("a parameter of {}", owner),
            span: existing.span(),
        });
    }
    param.set_changed(true);
    params.push(param);
    params.sort_by_key(|p| p.start_time());
    Ok(())
}

/// Give the parameter at `position` the span built by `change`.
///
/// Fails if the new span is invalid or overlaps another parameter, leaving
/// the list untouched. Returns whether the span changed.
pub(crate) fn change_parameter_span<P: TimedParameter>(
    params: &mut Vec<P>,
    position: usize,
    owner: &str,
    change: impl FnOnce(TimeSpan) -> TimeSpan,
) -> Result<bool> {
    let Some(current) = params.get(position) else {
        return Err(InventoryError::UnresolvedReference {
            kind: "parameter",
            key: format!("position {} of {}", position, owner),
        });
    };
    let span = change(current.span()).validate()?;
    if span == current.span() {
        return Ok(false);
    }
    let clash = params
        .iter()
        .enumerate()
        .find(|(index, p)| *index != position && p.intersects(span.start, span.end));
    if let Some((_, existing)) = clash {
        return Err(InventoryError::IntervalConflict {
            subject: format!("a parameter of {}", owner),
            span: existing.span(),
        });
    }

    let param = &mut params[position];
    param.set_span(span);
    param.set_changed(true);
    params.sort_by_key(|p| p.start_time());
    Ok(true)
}

/// Remove the parameter with exactly this span.
pub(crate) fn remove_parameter<P: TimedParameter>(params: &mut Vec<P>, span: &TimeSpan) -> Option<P> {
    let position = params.iter().position(|p| p.same_span(span))?;
    Some(params.remove(position))
}

/// Reconcile `params` with `incoming`.
///
/// Parameters with an identical span are updated in place and keep their
/// database id, unmatched incoming parameters are added, and existing
/// parameters absent from `incoming` are dropped. Returns whether the list
/// changed.
pub(crate) fn merge_parameters<P: TimedParameter>(
    params: &mut Vec<P>,
    incoming: &[P],
    owner: &str,
) -> Result<bool> {
    let mut matched = vec![false; params.len()];
    let mut additions = Vec::new();
    let mut changed = false;

    for candidate in incoming {
        match params.iter().position(|p| p.same_span(candidate)) {
            Some(index) => {
                changed |= params[index].update_from(candidate);
                matched[index] = true;
            }
            None => additions.push(candidate.clone()),
        }
    }

    let before = params.len();
    let mut flags = matched.into_iter();
    params.retain(|_| flags.next().unwrap_or(false));
    changed |= params.len() != before;

    for mut param in additions {
        param.set_db_id(None);
        insert_parameter(params, param, owner)?;
        changed = true;
    }

    Ok(changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn day(d: u32) -> Timestamp {
        Utc.with_ymd_and_hms(2021, 3, d, 0, 0, 0).unwrap()
    }

    fn param(start: u32, end: Option<u32>, gain: f64) -> RecorderStreamParameter {
        RecorderStreamParameter::new(Some(day(start)), end.map(day), Some(gain), Some(1e-6))
    }

    #[test]
    fn test_insert_rejects_overlap() {
        let mut params = Vec::new();
        insert_parameter(&mut params, param(1, Some(10), 1.0), "stream 101").unwrap();
        let err = insert_parameter(&mut params, param(5, None, 2.0), "stream 101").unwrap_err();
        assert!(err.to_string().contains("a parameter of stream 101"));
        // Adjacent span is fine
        insert_parameter(&mut params, param(10, None, 2.0), "stream 101").unwrap();
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn test_insert_keeps_sorted() {
        let mut params = Vec::new();
        insert_parameter(&mut params, param(10, None, 2.0), "s").unwrap();
        insert_parameter(&mut params, param(1, Some(5), 1.0), "s").unwrap();
        assert_eq!(params[0].start_time(), Some(day(1)));
    }

    #[test]
    fn test_merge_updates_in_place() {
        let mut params = Vec::new();
        let mut existing = param(1, Some(10), 1.0);
        existing.set_db_id(Some(42));
        params.push(existing);

        let changed = merge_parameters(&mut params, &[param(1, Some(10), 32.0)], "s").unwrap();
        assert!(changed);
        assert_eq!(params.len(), 1);
        assert_eq!(params[0].gain(), Some(32.0));
        assert_eq!(params[0].db_id(), Some(42));
    }

    #[test]
    fn test_merge_drops_unmatched_and_adds_new() {
        let mut params = vec![param(1, Some(10), 1.0), param(10, Some(20), 1.0)];
        let incoming = vec![param(1, Some(10), 1.0), param(12, None, 4.0)];
        merge_parameters(&mut params, &incoming, "s").unwrap();
        assert_eq!(params.len(), 2);
        assert_eq!(params[1].start_time(), Some(day(12)));
        assert_eq!(params[1].gain(), Some(4.0));
    }

    #[test]
    fn test_merge_identical_is_unchanged() {
        let mut params = vec![param(1, Some(10), 1.0)];
        let incoming = params.clone();
        assert!(!merge_parameters(&mut params, &incoming, "s").unwrap());
    }

    #[test]
    fn test_transfer_function() {
        let mut p = SensorComponentParameter::new(Some(day(1)), None, Some(400.0));
        p.set_transfer_function(Some("laplace"), Some("m/s"), Some(1.0), Some(1.0));
        p.add_complex_pole(Complex64::new(-4.44, 4.44));
        p.add_complex_pole(Complex64::new(-4.44, -4.44));
        p.add_complex_zero(Complex64::new(0.0, 0.0));
        assert_eq!(p.tf_type(), Some("laplace"));
        assert_eq!(p.poles().len(), 2);
        assert_eq!(p.zeros().len(), 1);
        assert!(p.has_changed());
    }

    #[test]
    fn test_remove_parameter_by_span() {
        let mut params = vec![param(1, Some(10), 1.0)];
        let span = TimeSpan::new(Some(day(1)), Some(day(10)));
        assert!(remove_parameter(&mut params, &span).is_some());
        assert!(params.is_empty());
    }

    #[test]
    fn test_change_span_rejects_overlap_and_keeps_list() {
        let mut params = vec![param(1, Some(10), 1.0), param(10, Some(20), 2.0)];
        let before = params.clone();

        let err = change_parameter_span(&mut params, 0, "s", |span| TimeSpan::new(span.start, Some(day(12))))
            .unwrap_err();
        assert!(matches!(err, InventoryError::IntervalConflict { .. }));
        let err = change_parameter_span(&mut params, 1, "s", |span| TimeSpan::new(Some(day(25)), span.end))
            .unwrap_err();
        assert!(matches!(err, InventoryError::InvalidInterval { .. }));
        assert!(change_parameter_span(&mut params, 2, "s", |span| span).is_err());
        assert_eq!(params, before);
    }

    #[test]
    fn test_change_span_resorts() {
        let mut params = vec![param(5, Some(10), 1.0), param(10, None, 2.0)];
        let changed =
            change_parameter_span(&mut params, 1, "s", |_| TimeSpan::new(Some(day(1)), Some(day(5)))).unwrap();
        assert!(changed);
        assert_eq!(params[0].gain(), Some(2.0));
        assert_eq!(params[0].end_time(), Some(day(5)));
        assert!(!change_parameter_span(&mut params, 0, "s", |span| span).unwrap());
    }
}
