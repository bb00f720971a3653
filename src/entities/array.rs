//! Station arrays.

use super::{assign, Provenance};
use crate::inventory::StationId;
use crate::timebox::TimeBox;

/// A named group of stations, each member for a span of time.
#[derive(Debug, Clone)]
pub struct Array {
    db_id: Option<i64>,
    name: String,
    description: Option<String>,
    provenance: Provenance,
    pub(crate) stations: Vec<TimeBox<StationId>>,
    pub(crate) attached: bool,
    pub(crate) has_changed: bool,
}

impl Array {
    pub fn new(name: &str) -> Self {
        Self {
            db_id: None,
            name: name.to_string(),
            description: None,
            provenance: Provenance::now(),
            stations: Vec::new(),
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

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn provenance(&self) -> &Provenance {
        &self.provenance
    }

    pub fn stations(&self) -> &[TimeBox<StationId>] {
        &self.stations
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

    pub(crate) fn set_changed(&mut self, changed: bool) {
        self.has_changed = changed;
    }

    pub(crate) fn detached_copy(&self) -> Self {
        Self {
            db_id: None,
            stations: Vec::new(),
            attached: false,
            has_changed: false,
            ..self.clone()
        }
    }
}
