//! The geometry inventory aggregate.
//!
//! - `arena` - typed handle storage
//! - `inventory` - the aggregate root, add/remove, dirty tracking
//! - `query` - search filters and time-filtered lookups
//! - `assign` - time-boxed wiring of streams, components and array members
//! - `merge` - reconciliation of an incoming inventory
//! - `geo` - coordinate transforms and UTM helpers
//! - `report` - tabular station and channel views

pub mod arena;
pub mod assign;
pub mod geo;
#[allow(clippy::module_inception)]
pub mod inventory;
pub mod merge;
pub mod query;
pub mod report;

pub use arena::{Arena, Id};
pub use geo::*;
pub use inventory::*;
pub use merge::MergeReport;
pub use query::*;
pub use report::*;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::entities::{
    Array, Channel, Network, Recorder, RecorderStream, Sensor, SensorComponent, Station,
};

pub type NetworkId = Id<Network>;
pub type StationId = Id<Station>;
pub type ChannelId = Id<Channel>;
pub type RecorderId = Id<Recorder>;
pub type StreamId = Id<RecorderStream>;
pub type SensorId = Id<Sensor>;
pub type ComponentId = Id<SensorComponent>;
pub type ArrayId = Id<Array>;

/// Handle to any entity of the inventory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityRef {
    Network(NetworkId),
    Station(StationId),
    Channel(ChannelId),
    Recorder(RecorderId),
    RecorderStream(StreamId),
    Sensor(SensorId),
    SensorComponent(ComponentId),
    Array(ArrayId),
}

impl EntityRef {
    /// Kind name used in log lines and error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            EntityRef::Network(_) => "network",
            EntityRef::Station(_) => "station",
            EntityRef::Channel(_) => "channel",
            EntityRef::Recorder(_) => "recorder",
            EntityRef::RecorderStream(_) => "recorder stream",
            EntityRef::Sensor(_) => "sensor",
            EntityRef::SensorComponent(_) => "sensor component",
            EntityRef::Array(_) => "array",
        }
    }
}

/// Inventory-wide identity of a recorder stream.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreamKey {
    pub serial: String,
    pub model: String,
    pub producer: String,
    pub name: String,
}

impl StreamKey {
    pub fn new(serial: &str, model: &str, producer: &str, name: &str) -> Self {
        Self {
            serial: serial.to_string(),
            model: model.to_string(),
            producer: producer.to_string(),
            name: name.to_string(),
        }
    }
}

impl fmt::Display for StreamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "stream {} of recorder {} ({}, {})",
            self.name, self.serial, self.model, self.producer
        )
    }
}

/// Inventory-wide identity of a sensor component.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ComponentKey {
    pub serial: String,
    pub model: String,
    pub producer: String,
    pub name: String,
}

impl ComponentKey {
    pub fn new(serial: &str, model: &str, producer: &str, name: &str) -> Self {
        Self {
            serial: serial.to_string(),
            model: model.to_string(),
            producer: producer.to_string(),
            name: name.to_string(),
        }
    }
}

impl fmt::Display for ComponentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "component {} of sensor {} ({}, {})",
            self.name, self.serial, self.model, self.producer
        )
    }
}

/// Inventory-wide identity of a station.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StationKey {
    pub network: String,
    pub name: String,
    pub location: String,
}

impl StationKey {
    pub fn new(network: &str, name: &str, location: &str) -> Self {
        Self {
            network: network.to_string(),
            name: name.to_string(),
            location: location.to_string(),
        }
    }
}

impl fmt::Display for StationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "station {}:{}:{}", self.network, self.name, self.location)
    }
}
