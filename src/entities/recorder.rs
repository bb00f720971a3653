//! Data recorders and their streams.

use super::parameters::{
    change_parameter_span, insert_parameter, remove_parameter, RecorderStreamParameter, TimedParameter,
};
use super::{assign, Provenance};
use crate::error::Result;
use crate::inventory::{ComponentId, RecorderId, StreamId};
use crate::timebox::{SlotPosition, TimeBox, TimeSpan, Timeline, Timestamp};

/// A data recorder, identified by its serial number.
#[derive(Debug, Clone)]
pub struct Recorder {
    db_id: Option<i64>,
    serial: String,
    model: String,
    producer: String,
    description: Option<String>,
    provenance: Provenance,
    pub(crate) streams: Vec<StreamId>,
    pub(crate) attached: bool,
    pub(crate) has_changed: bool,
}

impl Recorder {
    pub fn new(serial: &str, model: &str, producer: &str) -> Self {
        Self {
            db_id: None,
            serial: serial.to_string(),
            model: model.to_string(),
            producer: producer.to_string(),
            description: None,
            provenance: Provenance::now(),
            streams: Vec::new(),
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

    pub fn streams(&self) -> &[StreamId] {
        &self.streams
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

    /// Copy of the attributes without streams or inventory membership.
    pub(crate) fn detached_copy(&self) -> Self {
        Self {
            db_id: None,
            streams: Vec::new(),
            attached: false,
            has_changed: false,
            ..self.clone()
        }
    }

    pub(crate) fn set_changed(&mut self, changed: bool) {
        self.has_changed = changed;
    }
}

/// One output stream of a recorder.
///
/// Carries its gain/bitweight history and the sensor components wired to
/// it over time.
#[derive(Debug, Clone)]
pub struct RecorderStream {
    db_id: Option<i64>,
    name: String,
    label: Option<String>,
    provenance: Provenance,
    parameters: Vec<RecorderStreamParameter>,
    pub(crate) recorder: Option<RecorderId>,
    pub(crate) components: Vec<TimeBox<ComponentId>>,
    pub(crate) has_changed: bool,
}

impl RecorderStream {
    pub fn new(name: &str, label: Option<&str>) -> Self {
        Self {
            db_id: None,
            name: name.to_string(),
            label: label.map(str::to_string),
            provenance: Provenance::now(),
            parameters: Vec::new(),
            recorder: None,
            components: Vec::new(),
            has_changed: false,
        }
    }

    pub fn with_provenance(mut self, provenance: Provenance) -> Self {
        self.provenance = provenance;
        self
    }

    /// Builder form of `add_parameter`.
    pub fn with_parameter(mut self, parameter: RecorderStreamParameter) -> Result<Self> {
        self.add_parameter(parameter)?;
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn provenance(&self) -> &Provenance {
        &self.provenance
    }

    pub fn recorder(&self) -> Option<RecorderId> {
        self.recorder
    }

    pub fn components(&self) -> &[TimeBox<ComponentId>] {
        &self.components
    }

    pub fn parameters(&self) -> &[RecorderStreamParameter] {
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

    pub fn set_label(&mut self, label: Option<String>) -> bool {
        assign(&mut self.label, label, &mut self.has_changed)
    }

    /// Add a gain/bitweight parameter.
    ///
    /// Fails with `IntervalConflict` if it overlaps an existing parameter.
    pub fn add_parameter(&mut self, parameter: RecorderStreamParameter) -> Result<()> {
        let owner = format!("stream {}", self.name);
        insert_parameter(&mut self.parameters, parameter, &owner)?;
        self.has_changed = true;
        Ok(())
    }

    /// Remove the parameter with exactly this span.
    pub fn remove_parameter(&mut self, span: &TimeSpan) -> Option<RecorderStreamParameter> {
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
        let owner = format!("stream {}", self.name);
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
        let owner = format!("stream {}", self.name);
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
    ) -> Vec<&RecorderStreamParameter> {
        self.parameters.active_between(start, end)
    }

    pub fn parameter_at(&self, at: Timestamp) -> Vec<&RecorderStreamParameter> {
        self.parameters.active_at(at)
    }

    pub fn free_parameter_slot(&self, position: SlotPosition) -> Option<TimeSpan> {
        self.parameters.free_slot(position)
    }

    pub(crate) fn parameters_mut(&mut self) -> &mut Vec<RecorderStreamParameter> {
        &mut self.parameters
    }

    /// Copy of the attributes and parameters without wiring.
    pub(crate) fn detached_copy(&self) -> Self {
        let mut copy = Self {
            db_id: None,
            recorder: None,
            components: Vec::new(),
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
