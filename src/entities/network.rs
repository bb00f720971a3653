//! Networks, stations and channels.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{assign, Provenance};
use crate::inventory::{ChannelId, NetworkId, StationId, StreamId};
use crate::timebox::TimeBox;

/// Location code used when a station is created without one.
pub const DEFAULT_LOCATION: &str = "--";

/// A seismic network, identified by its name (network code).
#[derive(Debug, Clone)]
pub struct Network {
    db_id: Option<i64>,
    name: String,
    description: Option<String>,
    kind: Option<String>,
    provenance: Provenance,
    pub(crate) stations: Vec<StationId>,
    pub(crate) attached: bool,
    pub(crate) has_changed: bool,
}

impl Network {
    pub fn new(name: &str) -> Self {
        Self {
            db_id: None,
            name: name.to_string(),
            description: None,
            kind: None,
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

    pub fn with_kind(mut self, kind: &str) -> Self {
        self.kind = Some(kind.to_string());
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

    /// Network type, e.g. "permanent" or "temporary".
    pub fn kind(&self) -> Option<&str> {
        self.kind.as_deref()
    }

    pub fn provenance(&self) -> &Provenance {
        &self.provenance
    }

    pub fn stations(&self) -> &[StationId] {
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

    pub fn set_kind(&mut self, kind: Option<String>) -> bool {
        assign(&mut self.kind, kind, &mut self.has_changed)
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

    pub(crate) fn set_changed(&mut self, changed: bool) {
        self.has_changed = changed;
    }
}

/// A station position, identified by name and location within its network.
#[derive(Debug, Clone)]
pub struct Station {
    db_id: Option<i64>,
    name: String,
    location: String,
    description: Option<String>,
    x: f64,
    y: f64,
    z: f64,
    coord_system: String,
    provenance: Provenance,
    pub(crate) network: Option<NetworkId>,
    pub(crate) channels: Vec<ChannelId>,
    pub(crate) has_changed: bool,
}

impl Station {
    /// Create a station.
    ///
    /// # Arguments
    /// * `name` - station code
    /// * `location` - location code, `"--"` if empty
    /// * `x`, `y`, `z` - coordinates in `coord_system`, z is the elevation in meters
    /// * `coord_system` - coordinate system code, e.g. "epsg:4326"
    pub fn new(name: &str, location: &str, x: f64, y: f64, z: f64, coord_system: &str) -> Self {
        let location = if location.trim().is_empty() {
            DEFAULT_LOCATION
        } else {
            location
        };
        Self {
            db_id: None,
            name: name.to_string(),
            location: location.to_string(),
            description: None,
            x,
            y,
            z,
            coord_system: coord_system.to_string(),
            provenance: Provenance::now(),
            network: None,
            channels: Vec::new(),
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

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn x(&self) -> f64 {
        self.x
    }

    pub fn y(&self) -> f64 {
        self.y
    }

    pub fn z(&self) -> f64 {
        self.z
    }

    pub fn coord_system(&self) -> &str {
        &self.coord_system
    }

    pub fn provenance(&self) -> &Provenance {
        &self.provenance
    }

    pub fn network(&self) -> Option<NetworkId> {
        self.network
    }

    pub fn channels(&self) -> &[ChannelId] {
        &self.channels
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

    /// Move the station. Returns whether any coordinate changed.
    pub fn set_position(&mut self, x: f64, y: f64, z: f64, coord_system: &str) -> bool {
        let flag = &mut self.has_changed;
        let mut changed = assign(&mut self.x, x, flag);
        changed |= assign(&mut self.y, y, flag);
        changed |= assign(&mut self.z, z, flag);
        changed |= assign(&mut self.coord_system, coord_system.to_string(), flag);
        changed
    }

    pub(crate) fn detached_copy(&self) -> Self {
        Self {
            db_id: None,
            network: None,
            channels: Vec::new(),
            has_changed: false,
            ..self.clone()
        }
    }

    pub(crate) fn set_changed(&mut self, changed: bool) {
        self.has_changed = changed;
    }
}

/// A recording channel of a station.
#[derive(Debug, Clone)]
pub struct Channel {
    db_id: Option<i64>,
    name: String,
    description: Option<String>,
    provenance: Provenance,
    pub(crate) station: Option<StationId>,
    pub(crate) streams: Vec<TimeBox<StreamId>>,
    pub(crate) has_changed: bool,
}

impl Channel {
    pub fn new(name: &str) -> Self {
        Self {
            db_id: None,
            name: name.to_string(),
            description: None,
            provenance: Provenance::now(),
            station: None,
            streams: Vec::new(),
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

    pub fn station(&self) -> Option<StationId> {
        self.station
    }

    pub fn streams(&self) -> &[TimeBox<StreamId>] {
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

    pub(crate) fn detached_copy(&self) -> Self {
        Self {
            db_id: None,
            station: None,
            streams: Vec::new(),
            has_changed: false,
            ..self.clone()
        }
    }

    pub(crate) fn set_changed(&mut self, changed: bool) {
        self.has_changed = changed;
    }
}

/// Station, network, location code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Snl {
    pub station: String,
    pub network: String,
    pub location: String,
}

impl Snl {
    pub fn new(station: &str, network: &str, location: &str) -> Self {
        Self {
            station: station.to_string(),
            network: network.to_string(),
            location: location.to_string(),
        }
    }
}

impl fmt::Display for Snl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.station, self.network, self.location)
    }
}

/// Station, channel, network, location code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Scnl {
    pub station: String,
    pub channel: String,
    pub network: String,
    pub location: String,
}

impl fmt::Display for Scnl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}",
            self.station, self.channel, self.network, self.location
        )
    }
}
