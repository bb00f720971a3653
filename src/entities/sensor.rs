//! Sensors and their components.

use super::parameters::{
    change_parameter_span, insert_parameter, remove_parameter, SensorComponentParameter, TimedParameter,
};
use super::{assign, Provenance};
use crate::error::Result;
use crate::inventory::{ComponentId, SensorId};
use crate::timebox::{SlotPosition, TimeSpan, Timeline, Timestamp};

/// A seismic sensor, identified by its serial number.
#[derive(Debug, Clone)]
pub struct Sensor {
    db_id: Option<i64>,
    serial: String,
    model: String,
    producer: String,
    description: Option<String>,
    provenance: Provenance,
    pub(crate) components: Vec<ComponentId>,
    pub(crate) attached: bool,
    pub(crate) has_changed: bool,
}

impl Sensor {
    pub fn new(serial: &str, model: &str, producer: &str) -> Self {
        Self {
            db_id: None,
            serial: serial.to_string(),
            model: model.to_string(),
            producer: producer.to_string(),
            description: None,
            provenance: Provenance::now(),
            components: Vec::new(),
            attached: false,
            has_changed: false,
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn with_provenance(mut self, provenance: Provenance) -> Self {
        self.provenance = provenance;
        self
    }

    pub fn serial(&self) -> &str {
        &self.serial
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn producer(&self) -> &str {
        &self.producer
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn provenance(&self) -> &Provenance {
        &self.provenance
    }

    pub fn components(&self) -> &[ComponentId] {
        &self.components
    }

    pub fn has_changed(&self) -> bool {
        self.has_changed
    }

    pub fn db_id(&self) -> Option<i64> {
        self.db_id
    }

    pub fn set_db_id(&mut self, id: Option<i64>) {
        self.db_id = id;
    }

    pub fn set_description(&mut self, description: Option<String>) -> bool {
        assign(&mut self.description, description, &mut self.has_changed)
    }

    /// Copy of the attributes without components or inventory membership.
    pub(crate) fn detached_copy(&self) -> Self {
        Self {
            db_id: None,
            components: Vec::new(),
            attached: false,
            has_changed: false,
            ..self.clone()
        }
    }

    pub(crate) fn set_changed(&mut self, changed: bool) {
        self.has_changed = changed;
    }
}

/// One measuring axis of a sensor (e.g. Z, N, E).
#[derive(Debug, Clone)]
pub struct SensorComponent {
    db_id: Option<i64>,
    name: String,
    description: Option<String>,
    input_unit: Option<String>,
    output_unit: Option<String>,
    deliver_unit: Option<String>,
    provenance: Provenance,
    parameters: Vec<SensorComponentParameter>,
    pub(crate) sensor: Option<SensorId>,
    pub(crate) has_changed: bool,
}

impl SensorComponent {
    pub fn new(name: &str) -> Self {
        Self {
            db_id: None,
            name: name.to_string(),
            description: None,
            input_unit: None,
            output_unit: None,
            deliver_unit: None,
            provenance: Provenance::now(),
            parameters: Vec::new(),
            sensor: None,
            has_changed: false,
        }
    }

    /// Set the physical units of the component.
    ///
    /// # Arguments
    /// * `input` - measured quantity, e.g. "m/s"
    /// * `output` - sensor output, e.g. "V"
    /// * `deliver` - quantity delivered to the recorder, e.g. "V"
    pub fn with_units(mut self, input: &str, output: &str, deliver: &str) -> Self {
        self.input_unit = Some(input.to_string());
        self.output_unit = Some(output.to_string());
        self.deliver_unit = Some(deliver.to_string());
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn with_provenance(mut self, provenance: Provenance) -> Self {
        self.provenance = provenance;
        self
    }

    pub fn with_parameter(mut self, parameter: SensorComponentParameter) -> Result<Self> {
        self.add_parameter(parameter)?;
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn input_unit(&self) -> Option<&str> {
        self.input_unit.as_deref()
    }

    pub fn output_unit(&self) -> Option<&str> {
        self.output_unit.as_deref()
    }

    pub fn deliver_unit(&self) -> Option<&str> {
        self.deliver_unit.as_deref()
    }

    pub fn provenance(&self) -> &Provenance {
        &self.provenance
    }

    pub fn sensor(&self) -> Option<SensorId> {
        self.sensor
    }

    pub fn parameters(&self) -> &[SensorComponentParameter] {
        &self.parameters
    }

    pub fn has_changed(&self) -> bool {
        self.has_changed || self.parameters.iter().any(TimedParameter::has_changed)
    }

    pub fn db_id(&self) -> Option<i64> {
        self.db_id
    }

    pub fn set_db_id(&mut self, id: Option<i64>) {
        self.db_id = id;
    }

    pub fn set_description(&mut self, description: Option<String>) -> bool {
        assign(&mut self.description, description, &mut self.has_changed)
    }

    pub fn set_input_unit(&mut self, unit: Option<String>) -> bool {
        assign(&mut self.input_unit, unit, &mut self.has_changed)
    }

    pub fn set_output_unit(&mut self, unit: Option<String>) -> bool {
        assign(&mut self.output_unit, unit, &mut self.has_changed)
    }

    pub fn set_deliver_unit(&mut self, unit: Option<String>) -> bool {
        assign(&mut self.deliver_unit, unit, &mut self.has_changed)
    }

    /// Add a sensitivity/transfer function parameter.
    ///
    /// Fails with `IntervalConflict` if it overlaps an existing parameter.
    pub fn add_parameter(&mut self, parameter: SensorComponentParameter) -> Result<()> {
        let owner = format!("component {}", self.name);
        insert_parameter(&mut self.parameters, parameter, &owner)?;
        self.has_changed = true;
        Ok(())
    }

    pub fn remove_parameter(&mut self, span: &TimeSpan) -> Option<SensorComponentParameter> {
        let removed = remove_parameter(&mut self.parameters, span);
        if removed.is_some() {
            self.has_changed = true;
        }
        removed
    }

    /// Move the start of the parameter at `position`.
    ///
    /// Fails with `InvalidInterval` if the start is not before the end and
    /// with `IntervalConflict` if the parameter would overlap another one.
    /// Returns whether the span changed.
    pub fn change_parameter_start_time(
        &mut self,
        position: usize,
        start: Option<Timestamp>,
    ) -> Result<bool> {
        let owner = format!("component {}", self.name);
        let changed = change_parameter_span(&mut self.parameters, position, &owner, |span| {
            TimeSpan::new(start, span.end)
        })?;
        self.has_changed |= changed;
        Ok(changed)
    }

    /// Move the end of the parameter at `position`, `None` for running.
    pub fn change_parameter_end_time(
        &mut self,
        position: usize,
        end: Option<Timestamp>,
    ) -> Result<bool> {
        let owner = format!("component {}", self.name);
        let changed = change_parameter_span(&mut self.parameters, position, &owner, |span| {
            TimeSpan::new(span.start, end)
        })?;
        self.has_changed |= changed;
        Ok(changed)
    }

    pub fn get_parameter(
        &self,
        start: Option<Timestamp>,
        end: Option<Timestamp>,
    ) -> Vec<&SensorComponentParameter> {
        self.parameters.active_between(start, end)
    }

    pub fn parameter_at(&self, at: Timestamp) -> Vec<&SensorComponentParameter> {
        self.parameters.active_at(at)
    }

    pub fn free_parameter_slot(&self, position: SlotPosition) -> Option<TimeSpan> {
        self.parameters.free_slot(position)
    }

    pub(crate) fn parameters_mut(&mut self) -> &mut Vec<SensorComponentParameter> {
        &mut self.parameters
    }

    /// Copy of the attributes and parameters without the parent sensor.
    pub(crate) fn detached_copy(&self) -> Self {
        let mut copy = Self {
            db_id: None,
            sensor: None,
            has_changed: false,
            ..self.clone()
        };
        for parameter in &mut copy.parameters {
            parameter.set_db_id(None);
        }
        copy
    }

    pub(crate) fn set_changed(&mut self, changed: bool) {
        self.has_changed = changed;
        for parameter in &mut self.parameters {
            parameter.set_changed(changed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timebox::Interval;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_component_units() {
        let component = SensorComponent::new("Z").with_units("m/s", "V", "V");
        assert_eq!(component.input_unit(), Some("m/s"));
        assert_eq!(component.deliver_unit(), Some("V"));
        assert!(!component.has_changed());
    }

    #[test]
    fn test_parameter_conflict() {
        let t0 = Utc.with_ymd_and_hms(2018, 1, 1, 0, 0, 0).unwrap();
        let mut component = SensorComponent::new("Z")
            .with_parameter(SensorComponentParameter::new(Some(t0), None, Some(400.0)))
            .unwrap();
        let err = component
            .add_parameter(SensorComponentParameter::new(None, None, Some(1.0)))
            .unwrap_err();
        assert!(err.to_string().contains("component Z"));
        assert!(component.has_changed());
    }

    #[test]
    fn test_change_parameter_times() {
        let t = |year| Utc.with_ymd_and_hms(year, 1, 1, 0, 0, 0).unwrap();
        let mut component = SensorComponent::new("Z")
            .with_parameter(SensorComponentParameter::new(Some(t(2018)), Some(t(2019)), Some(400.0)))
            .unwrap()
            .with_parameter(SensorComponentParameter::new(Some(t(2019)), None, Some(420.0)))
            .unwrap();
        component.set_changed(false);

        // Closing the running parameter
        assert!(component.change_parameter_end_time(1, Some(t(2021))).unwrap());
        assert_eq!(component.parameters()[1].end_time(), Some(t(2021)));
        assert!(component.has_changed());

        let err = component.change_parameter_start_time(1, Some(t(2018))).unwrap_err();
        assert!(err.to_string().contains("a parameter of component Z"));
        let err = component.change_parameter_end_time(0, Some(t(2017))).unwrap_err();
        assert!(matches!(err, crate::error::InventoryError::InvalidInterval { .. }));

        assert!(component.change_parameter_start_time(0, None).unwrap());
        assert_eq!(component.parameters()[0].start_time(), None);
        assert!(!component.change_parameter_end_time(1, Some(t(2021))).unwrap());
    }
}
