//! Dictionary (JSON) form of an inventory.
//!
//! The nested form mirrors the ownership tree and references assigned
//! entities by identity key, so it can be rebuilt into a fresh inventory.
//! The seed form flattens every channel into one row per recorder stream
//! and sensor component deployment. Database ids and dirty flags are not
//! exported.

use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::InventoryConfig;
use crate::entities::{
    Array, Channel, Network, Provenance, Recorder, RecorderStream, RecorderStreamParameter,
    Sensor, SensorComponent, SensorComponentParameter, Station,
};
use crate::error::Result;
use crate::inventory::{
    ArrayId, ChannelId, ComponentId, ComponentKey, EntityRef, Inventory, NetworkId, RecorderId,
    SensorId, StationId, StationKey, StreamId, StreamKey,
};
use crate::timebox::{Interval, TimeBox, Timestamp};

/// Layout of an exported dictionary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DictStyle {
    #[default]
    Nested,
    Seed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryDict {
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub sensors: Vec<SensorDict>,
    #[serde(default)]
    pub recorders: Vec<RecorderDict>,
    #[serde(default)]
    pub networks: Vec<NetworkDict>,
    #[serde(default)]
    pub arrays: Vec<ArrayDict>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorDict {
    pub serial: String,
    pub model: String,
    pub producer: String,
    pub description: Option<String>,
    #[serde(flatten)]
    pub provenance: Provenance,
    #[serde(default)]
    pub components: Vec<ComponentDict>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentDict {
    pub name: String,
    pub description: Option<String>,
    pub input_unit: Option<String>,
    pub output_unit: Option<String>,
    pub deliver_unit: Option<String>,
    #[serde(flatten)]
    pub provenance: Provenance,
    #[serde(default)]
    pub parameters: Vec<ComponentParameterDict>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentParameterDict {
    pub start_time: Option<Timestamp>,
    pub end_time: Option<Timestamp>,
    pub sensitivity: Option<f64>,
    pub tf_type: Option<String>,
    pub tf_units: Option<String>,
    pub tf_normalization_factor: Option<f64>,
    pub tf_normalization_frequency: Option<f64>,
    #[serde(default)]
    pub tf_poles: Vec<Complex64>,
    #[serde(default)]
    pub tf_zeros: Vec<Complex64>,
    #[serde(flatten)]
    pub provenance: Provenance,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecorderDict {
    pub serial: String,
    pub model: String,
    pub producer: String,
    pub description: Option<String>,
    #[serde(flatten)]
    pub provenance: Provenance,
    #[serde(default)]
    pub streams: Vec<StreamDict>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamDict {
    pub name: String,
    pub label: Option<String>,
    #[serde(flatten)]
    pub provenance: Provenance,
    #[serde(default)]
    pub parameters: Vec<StreamParameterDict>,
    #[serde(default)]
    pub components: Vec<TimeBox<ComponentKey>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamParameterDict {
    pub start_time: Option<Timestamp>,
    pub end_time: Option<Timestamp>,
    pub gain: Option<f64>,
    pub bitweight: Option<f64>,
    #[serde(flatten)]
    pub provenance: Provenance,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkDict {
    pub name: String,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    #[serde(flatten)]
    pub provenance: Provenance,
    #[serde(default)]
    pub stations: Vec<StationDict>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationDict {
    pub name: String,
    pub location: String,
    pub description: Option<String>,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub coord_system: String,
    #[serde(flatten)]
    pub provenance: Provenance,
    #[serde(default)]
    pub channels: Vec<ChannelDict>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelDict {
    pub name: String,
    pub description: Option<String>,
    #[serde(flatten)]
    pub provenance: Provenance,
    #[serde(default)]
    pub streams: Vec<TimeBox<StreamKey>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrayDict {
    pub name: String,
    pub description: Option<String>,
    #[serde(flatten)]
    pub provenance: Provenance,
    #[serde(default)]
    pub stations: Vec<TimeBox<StationKey>>,
}

/// Dictionary of a single entity, tagged with its kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "entity", rename_all = "snake_case")]
pub enum EntityDict {
    Network(NetworkDict),
    Station(StationDict),
    Channel(ChannelDict),
    Recorder(RecorderDict),
    RecorderStream(StreamDict),
    Sensor(SensorDict),
    SensorComponent(ComponentDict),
    Array(ArrayDict),
}

// Seed style

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedInventoryDict {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub networks: Vec<SeedNetworkDict>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedNetworkDict {
    pub name: String,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub stations: Vec<SeedStationDict>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedStationDict {
    pub name: String,
    pub location: String,
    pub description: Option<String>,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub coord_system: String,
    #[serde(flatten)]
    pub provenance: Provenance,
    pub channels: Vec<SeedChannelDict>,
}

/// One deployment of a channel: a stream and a component wired together.
///
/// The span is the part of the stream assignment the component
/// assignment covers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedChannelDict {
    pub name: String,
    pub description: Option<String>,
    pub start_time: Option<Timestamp>,
    pub end_time: Option<Timestamp>,
    pub stream_name: String,
    pub stream_label: Option<String>,
    pub recorder_serial: String,
    pub recorder_model: String,
    pub recorder_producer: String,
    pub sensor_serial: String,
    pub sensor_model: String,
    pub sensor_producer: String,
    pub component_name: String,
}

/// Translate assignment handles to keys, skipping handles without one.
fn keyed<T: Copy, K>(boxes: &[TimeBox<T>], key: impl Fn(T) -> Option<K>) -> Vec<TimeBox<K>> {
    boxes
        .iter()
        .filter_map(|b| key(b.item).map(|k| b.map(|_| k)))
        .collect()
}

impl Inventory {
    // Export

    pub fn as_dict(&self) -> InventoryDict {
        InventoryDict {
            name: self.name().to_string(),
            kind: self.kind().map(str::to_string),
            sensors: self.sensors().iter().filter_map(|id| self.sensor_dict(*id)).collect(),
            recorders: self
                .recorders()
                .iter()
                .filter_map(|id| self.recorder_dict(*id))
                .collect(),
            networks: self
                .networks()
                .iter()
                .filter_map(|id| self.network_dict(*id))
                .collect(),
            arrays: self.arrays().iter().filter_map(|id| self.array_dict(*id)).collect(),
        }
    }

    /// The inventory in the requested layout as a JSON value.
    pub fn export(&self, style: DictStyle) -> Result<Value> {
        let value = match style {
            DictStyle::Nested => serde_json::to_value(self.as_dict())?,
            DictStyle::Seed => serde_json::to_value(self.as_seed_dict())?,
        };
        Ok(value)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.as_dict())?)
    }

    /// Dictionary of one entity with its owned subtree.
    pub fn entity_dict(&self, entity: EntityRef) -> Option<EntityDict> {
        Some(match entity {
            EntityRef::Network(id) => EntityDict::Network(self.network_dict(id)?),
            EntityRef::Station(id) => EntityDict::Station(self.station_dict(id)?),
            EntityRef::Channel(id) => EntityDict::Channel(self.channel_dict(id)?),
            EntityRef::Recorder(id) => EntityDict::Recorder(self.recorder_dict(id)?),
            EntityRef::RecorderStream(id) => EntityDict::RecorderStream(self.stream_dict(id)?),
            EntityRef::Sensor(id) => EntityDict::Sensor(self.sensor_dict(id)?),
            EntityRef::SensorComponent(id) => EntityDict::SensorComponent(self.component_dict(id)?),
            EntityRef::Array(id) => EntityDict::Array(self.array_dict(id)?),
        })
    }

    fn sensor_dict(&self, id: SensorId) -> Option<SensorDict> {
        let sensor = self.sensor(id)?;
        Some(SensorDict {
            serial: sensor.serial().to_string(),
            model: sensor.model().to_string(),
            producer: sensor.producer().to_string(),
            description: sensor.description().map(str::to_string),
            provenance: sensor.provenance().clone(),
            components: sensor
                .components()
                .iter()
                .filter_map(|c| self.component_dict(*c))
                .collect(),
        })
    }

    fn component_dict(&self, id: ComponentId) -> Option<ComponentDict> {
        let component = self.component(id)?;
        Some(ComponentDict {
            name: component.name().to_string(),
            description: component.description().map(str::to_string),
            input_unit: component.input_unit().map(str::to_string),
            output_unit: component.output_unit().map(str::to_string),
            deliver_unit: component.deliver_unit().map(str::to_string),
            provenance: component.provenance().clone(),
            parameters: component
                .parameters()
                .iter()
                .map(|p| ComponentParameterDict {
                    start_time: p.start_time(),
                    end_time: p.end_time(),
                    sensitivity: p.sensitivity(),
                    tf_type: p.tf_type().map(str::to_string),
                    tf_units: p.tf_units().map(str::to_string),
                    tf_normalization_factor: p.tf_normalization_factor(),
                    tf_normalization_frequency: p.tf_normalization_frequency(),
                    tf_poles: p.poles().to_vec(),
                    tf_zeros: p.zeros().to_vec(),
                    provenance: p.provenance().clone(),
                })
                .collect(),
        })
    }

    fn recorder_dict(&self, id: RecorderId) -> Option<RecorderDict> {
        let recorder = self.recorder(id)?;
        Some(RecorderDict {
            serial: recorder.serial().to_string(),
            model: recorder.model().to_string(),
            producer: recorder.producer().to_string(),
            description: recorder.description().map(str::to_string),
            provenance: recorder.provenance().clone(),
            streams: recorder
                .streams()
                .iter()
                .filter_map(|s| self.stream_dict(*s))
                .collect(),
        })
    }

    fn stream_dict(&self, id: StreamId) -> Option<StreamDict> {
        let stream = self.stream(id)?;
        Some(StreamDict {
            name: stream.name().to_string(),
            label: stream.label().map(str::to_string),
            provenance: stream.provenance().clone(),
            parameters: stream
                .parameters()
                .iter()
                .map(|p| StreamParameterDict {
                    start_time: p.start_time(),
                    end_time: p.end_time(),
                    gain: p.gain(),
                    bitweight: p.bitweight(),
                    provenance: p.provenance().clone(),
                })
                .collect(),
            components: keyed(stream.components(), |c| self.component_key(c)),
        })
    }

    fn network_dict(&self, id: NetworkId) -> Option<NetworkDict> {
        let network = self.network(id)?;
        Some(NetworkDict {
            name: network.name().to_string(),
            description: network.description().map(str::to_string),
            kind: network.kind().map(str::to_string),
            provenance: network.provenance().clone(),
            stations: network
                .stations()
                .iter()
                .filter_map(|s| self.station_dict(*s))
                .collect(),
        })
    }

    fn station_dict(&self, id: StationId) -> Option<StationDict> {
        let station = self.station(id)?;
        Some(StationDict {
            name: station.name().to_string(),
            location: station.location().to_string(),
            description: station.description().map(str::to_string),
            x: station.x(),
            y: station.y(),
            z: station.z(),
            coord_system: station.coord_system().to_string(),
            provenance: station.provenance().clone(),
            channels: station
                .channels()
                .iter()
                .filter_map(|c| self.channel_dict(*c))
                .collect(),
        })
    }

    fn channel_dict(&self, id: ChannelId) -> Option<ChannelDict> {
        let channel = self.channel(id)?;
        Some(ChannelDict {
            name: channel.name().to_string(),
            description: channel.description().map(str::to_string),
            provenance: channel.provenance().clone(),
            streams: keyed(channel.streams(), |s| self.stream_key(s)),
        })
    }

    fn array_dict(&self, id: ArrayId) -> Option<ArrayDict> {
        let array = self.array(id)?;
        Some(ArrayDict {
            name: array.name().to_string(),
            description: array.description().map(str::to_string),
            provenance: array.provenance().clone(),
            stations: keyed(array.stations(), |s| self.station_key(s)),
        })
    }

    /// Channel-centric flattened view.
    ///
    /// Each channel becomes one row per stream assignment and component
    /// assignment of that stream overlapping it, clipped to the overlap.
    pub fn as_seed_dict(&self) -> SeedInventoryDict {
        let networks = self
            .networks()
            .iter()
            .filter_map(|id| self.network(*id))
            .map(|network| SeedNetworkDict {
                name: network.name().to_string(),
                description: network.description().map(str::to_string),
                kind: network.kind().map(str::to_string),
                stations: network
                    .stations()
                    .iter()
                    .filter_map(|id| self.station(*id))
                    .map(|station| SeedStationDict {
                        name: station.name().to_string(),
                        location: station.location().to_string(),
                        description: station.description().map(str::to_string),
                        x: station.x(),
                        y: station.y(),
                        z: station.z(),
                        coord_system: station.coord_system().to_string(),
                        provenance: station.provenance().clone(),
                        channels: station
                            .channels()
                            .iter()
                            .filter_map(|id| self.channel(*id))
                            .flat_map(|channel| self.seed_rows(channel))
                            .collect(),
                    })
                    .collect(),
            })
            .collect();

        SeedInventoryDict {
            name: self.name().to_string(),
            kind: self.kind().map(str::to_string),
            networks,
        }
    }

    fn seed_rows(&self, channel: &Channel) -> Vec<SeedChannelDict> {
        let mut rows = Vec::new();
        for stream_box in channel.streams() {
            let Some(stream) = self.stream(stream_box.item) else {
                continue;
            };
            let Some(recorder) = stream.recorder().and_then(|r| self.recorder(r)) else {
                continue;
            };
            for component_box in stream.components() {
                let Some(span) = stream_box.span().intersection(&component_box.span()) else {
                    continue;
                };
                let Some(component) = self.component(component_box.item) else {
                    continue;
                };
                let Some(sensor) = component.sensor().and_then(|s| self.sensor(s)) else {
                    continue;
                };
                rows.push(SeedChannelDict {
                    name: channel.name().to_string(),
                    description: channel.description().map(str::to_string),
                    start_time: span.start,
                    end_time: span.end,
                    stream_name: stream.name().to_string(),
                    stream_label: stream.label().map(str::to_string),
                    recorder_serial: recorder.serial().to_string(),
                    recorder_model: recorder.model().to_string(),
                    recorder_producer: recorder.producer().to_string(),
                    sensor_serial: sensor.serial().to_string(),
                    sensor_model: sensor.model().to_string(),
                    sensor_producer: sensor.producer().to_string(),
                    component_name: component.name().to_string(),
                });
            }
        }
        rows
    }

    // Import

    /// Rebuild an inventory from its nested dictionary.
    ///
    /// Duplicate identities in the dictionary are skipped with a warning,
    /// as with the `add_*` operations. Assignments are resolved by key and
    /// fail like `add_component` / `add_stream` / `add_array_station`.
    /// The result carries no dirty flags.
    pub fn from_dict(dict: &InventoryDict) -> Result<Inventory> {
        Self::from_dict_with_config(dict, InventoryConfig::default())
    }

    pub fn from_dict_with_config(dict: &InventoryDict, config: InventoryConfig) -> Result<Inventory> {
        let mut inventory = Inventory::with_config(&dict.name, config);
        inventory.set_kind(dict.kind.clone());

        for sensor_dict in &dict.sensors {
            inventory.import_sensor(sensor_dict)?;
        }
        for recorder_dict in &dict.recorders {
            inventory.import_recorder(recorder_dict)?;
        }
        for network_dict in &dict.networks {
            inventory.import_network(network_dict)?;
        }
        for array_dict in &dict.arrays {
            inventory.import_array(array_dict)?;
        }

        inventory.clear_changes();
        log::info!(
            "{} INVENTORY_IMPORTED networks={} recorders={} sensors={} arrays={}",
            inventory.log_context(),
            inventory.networks().len(),
            inventory.recorders().len(),
            inventory.sensors().len(),
            inventory.arrays().len()
        );
        Ok(inventory)
    }

    pub fn from_json(json: &str) -> Result<Inventory> {
        let dict: InventoryDict = serde_json::from_str(json)?;
        Self::from_dict(&dict)
    }

    fn import_sensor(&mut self, dict: &SensorDict) -> Result<()> {
        let mut sensor = Sensor::new(&dict.serial, &dict.model, &dict.producer)
            .with_provenance(dict.provenance.clone());
        sensor.set_description(dict.description.clone());
        let Some(id) = self.add_sensor(sensor) else {
            return Ok(());
        };

        for component_dict in &dict.components {
            let mut component = SensorComponent::new(&component_dict.name)
                .with_provenance(component_dict.provenance.clone());
            component.set_description(component_dict.description.clone());
            component.set_input_unit(component_dict.input_unit.clone());
            component.set_output_unit(component_dict.output_unit.clone());
            component.set_deliver_unit(component_dict.deliver_unit.clone());
            for p in &component_dict.parameters {
                let mut parameter = SensorComponentParameter::new(p.start_time, p.end_time, p.sensitivity)
                    .with_provenance(p.provenance.clone());
                parameter.set_transfer_function(
                    p.tf_type.as_deref(),
                    p.tf_units.as_deref(),
                    p.tf_normalization_factor,
                    p.tf_normalization_frequency,
                );
                p.tf_poles.iter().for_each(|pole| parameter.add_complex_pole(*pole));
                p.tf_zeros.iter().for_each(|zero| parameter.add_complex_zero(*zero));
                component.add_parameter(parameter)?;
            }
            self.add_sensor_component(id, component);
        }
        Ok(())
    }

    fn import_recorder(&mut self, dict: &RecorderDict) -> Result<()> {
        let mut recorder = Recorder::new(&dict.serial, &dict.model, &dict.producer)
            .with_provenance(dict.provenance.clone());
        recorder.set_description(dict.description.clone());
        let Some(id) = self.add_recorder(recorder) else {
            return Ok(());
        };

        for stream_dict in &dict.streams {
            let mut stream = RecorderStream::new(&stream_dict.name, stream_dict.label.as_deref())
                .with_provenance(stream_dict.provenance.clone());
            for p in &stream_dict.parameters {
                stream.add_parameter(
                    RecorderStreamParameter::new(p.start_time, p.end_time, p.gain, p.bitweight)
                        .with_provenance(p.provenance.clone()),
                )?;
            }
            let Some(stream_id) = self.add_recorder_stream(id, stream) else {
                continue;
            };
            for assignment in &stream_dict.components {
                self.add_component(
                    stream_id,
                    &assignment.item,
                    assignment.start_time,
                    assignment.end_time,
                )?;
            }
        }
        Ok(())
    }

    fn import_network(&mut self, dict: &NetworkDict) -> Result<()> {
        let mut network = Network::new(&dict.name).with_provenance(dict.provenance.clone());
        network.set_description(dict.description.clone());
        network.set_kind(dict.kind.clone());
        let Some(id) = self.add_network(network) else {
            return Ok(());
        };

        for station_dict in &dict.stations {
            let mut station = Station::new(
                &station_dict.name,
                &station_dict.location,
                station_dict.x,
                station_dict.y,
                station_dict.z,
                &station_dict.coord_system,
            )
            .with_provenance(station_dict.provenance.clone());
            station.set_description(station_dict.description.clone());
            let Some(station_id) = self.add_station(id, station) else {
                continue;
            };

            for channel_dict in &station_dict.channels {
                let mut channel =
                    Channel::new(&channel_dict.name).with_provenance(channel_dict.provenance.clone());
                channel.set_description(channel_dict.description.clone());
                let Some(channel_id) = self.add_channel(station_id, channel) else {
                    continue;
                };
                for assignment in &channel_dict.streams {
                    self.add_stream(
                        channel_id,
                        &assignment.item,
                        assignment.start_time,
                        assignment.end_time,
                    )?;
                }
            }
        }
        Ok(())
    }

    fn import_array(&mut self, dict: &ArrayDict) -> Result<()> {
        let mut array = Array::new(&dict.name).with_provenance(dict.provenance.clone());
        array.set_description(dict.description.clone());
        let Some(id) = self.add_array(array) else {
            return Ok(());
        };
        for membership in &dict.stations {
            let station = self.resolve_station(&membership.item)?;
            self.add_array_station(id, station, membership.start_time, membership.end_time)?;
        }
        Ok(())
    }
}

/// Two inventories are equal when their nested dictionaries are.
impl PartialEq for Inventory {
    fn eq(&self, other: &Self) -> bool {
        self.as_dict() == other.as_dict()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timebox::TimeSpan;
    use chrono::{TimeZone, Utc};

    fn t(month: u32) -> Timestamp {
        Utc.with_ymd_and_hms(2020, month, 1, 0, 0, 0).unwrap()
    }

    fn sample() -> Inventory {
        let mut inv = Inventory::new("dict").with_kind("field");
        let sensor = inv.add_sensor(Sensor::new("S-1", "L4C", "Sercel")).unwrap();
        let mut parameter = SensorComponentParameter::new(Some(t(1)), None, Some(276.8));
        parameter.set_transfer_function(Some("laplace"), Some("m/s"), Some(1.0), Some(1.0));
        parameter.add_complex_pole(Complex64::new(-4.21, 4.66));
        parameter.add_complex_zero(Complex64::new(0.0, 0.0));
        inv.add_sensor_component(
            sensor,
            SensorComponent::new("Z").with_parameter(parameter).unwrap(),
        )
        .unwrap();

        let recorder = inv.add_recorder(Recorder::new("R1", "Cube", "Omnirecs")).unwrap();
        let stream = inv
            .add_recorder_stream(recorder, RecorderStream::new("101", Some("Z")))
            .unwrap();
        inv.add_component(stream, &ComponentKey::new("S-1", "L4C", "Sercel", "Z"), Some(t(2)), Some(t(4)))
            .unwrap();

        let net = inv.add_network(Network::new("XX").with_kind("temporary")).unwrap();
        let station = inv
            .add_station(net, Station::new("S1", "00", 1.0, 2.0, 3.0, "epsg:4326"))
            .unwrap();
        let channel = inv.add_channel(station, Channel::new("HHZ")).unwrap();
        inv.add_stream(channel, &StreamKey::new("R1", "Cube", "Omnirecs", "101"), Some(t(1)), Some(t(3)))
            .unwrap();
        inv
    }

    #[test]
    fn test_json_round_trip() {
        let inv = sample();
        let json = inv.to_json().unwrap();
        let restored = Inventory::from_json(&json).unwrap();
        assert_eq!(restored, inv);
        assert!(!restored.has_changed());
    }

    #[test]
    fn test_nested_dict_references_by_key() {
        let dict = sample().as_dict();
        let channel = &dict.networks[0].stations[0].channels[0];
        assert_eq!(channel.streams[0].item, StreamKey::new("R1", "Cube", "Omnirecs", "101"));
        assert_eq!(dict.kind.as_deref(), Some("field"));

        let value = serde_json::to_value(&dict).unwrap();
        assert_eq!(value["networks"][0]["type"], "temporary");
        assert!(value["sensors"][0]["components"][0].get("db_id").is_none());
    }

    #[test]
    fn test_seed_rows_are_clipped() {
        let seed = sample().as_seed_dict();
        let rows = &seed.networks[0].stations[0].channels;
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(TimeSpan::new(row.start_time, row.end_time), TimeSpan::new(Some(t(2)), Some(t(3))));
        assert_eq!(row.sensor_serial, "S-1");
        assert_eq!(row.stream_label.as_deref(), Some("Z"));
    }

    #[test]
    fn test_entity_dict_is_tagged() {
        let inv = sample();
        let net = inv.networks()[0];
        let value = serde_json::to_value(inv.entity_dict(EntityRef::Network(net)).unwrap()).unwrap();
        assert_eq!(value["entity"], "network");
        assert_eq!(value["name"], "XX");
    }

    #[test]
    fn test_unresolved_assignment_fails_import() {
        let mut dict = sample().as_dict();
        dict.recorders.clear();
        let err = Inventory::from_dict(&dict).unwrap_err();
        assert!(err.to_string().contains("no recorder stream found"));
    }
}
