//! Searching the inventory.
//!
//! Each entity kind has a typed filter built with chained setters; unset
//! fields match everything. For callers that only have string pairs (the
//! Python host), `SearchFilter::from_pairs` maps known keys onto the typed
//! filter and applies the configured `FilterPolicy` to unknown ones.

use super::{
    ArrayId, ChannelId, ComponentId, ComponentKey, Inventory, NetworkId, RecorderId, SensorId,
    StationId, StationKey, StreamId, StreamKey,
};
use crate::config::FilterPolicy;
use crate::entities::{Channel, Network, Recorder, RecorderStream, Sensor, SensorComponent, Station};
use crate::error::{InventoryError, Result};
use crate::logging::LogContext;
use crate::timebox::{TimeBox, Timeline, Timestamp};

fn matches(filter: &Option<String>, value: &str) -> bool {
    filter.as_deref().map_or(true, |f| f == value)
}

fn matches_opt(filter: &Option<String>, value: Option<&str>) -> bool {
    match filter {
        Some(f) => value == Some(f.as_str()),
        None => true,
    }
}

/// String-keyed construction of a typed filter.
pub trait SearchFilter: Default {
    /// Entity name used in log lines and errors.
    const ENTITY: &'static str;

    /// Set the field named `key`. Returns `false` for unknown keys.
    fn set_key(&mut self, key: &str, value: &str) -> bool;

    fn from_pairs<'a, I>(pairs: I, policy: FilterPolicy, ctx: &LogContext) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut filter = Self::default();
        for (key, value) in pairs {
            if filter.set_key(key, value) {
                continue;
            }
            match policy {
                FilterPolicy::Lenient => {
                    log::warn!("{} SEARCH_KEY_UNKNOWN entity={} key={}", ctx, Self::ENTITY, key);
                }
                FilterPolicy::Strict => {
                    return Err(InventoryError::UnknownFilterKey {
                        entity: Self::ENTITY,
                        key: key.to_string(),
                    });
                }
            }
        }
        Ok(filter)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NetworkFilter {
    pub name: Option<String>,
    pub kind: Option<String>,
}

impl NetworkFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn kind(mut self, kind: &str) -> Self {
        self.kind = Some(kind.to_string());
        self
    }

    fn accepts(&self, network: &Network) -> bool {
        matches(&self.name, network.name()) && matches_opt(&self.kind, network.kind())
    }
}

impl SearchFilter for NetworkFilter {
    const ENTITY: &'static str = "network";

    fn set_key(&mut self, key: &str, value: &str) -> bool {
        match key {
            "name" => self.name = Some(value.to_string()),
            "type" | "kind" => self.kind = Some(value.to_string()),
            _ => return false,
        }
        true
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StationFilter {
    pub network: Option<String>,
    pub name: Option<String>,
    pub location: Option<String>,
}

impl StationFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn network(mut self, network: &str) -> Self {
        self.network = Some(network.to_string());
        self
    }

    pub fn name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn location(mut self, location: &str) -> Self {
        self.location = Some(location.to_string());
        self
    }

    fn accepts(&self, network: Option<&str>, station: &Station) -> bool {
        matches_opt(&self.network, network)
            && matches(&self.name, station.name())
            && matches(&self.location, station.location())
    }
}

impl From<&StationKey> for StationFilter {
    fn from(key: &StationKey) -> Self {
        Self::new()
            .network(&key.network)
            .name(&key.name)
            .location(&key.location)
    }
}

impl SearchFilter for StationFilter {
    const ENTITY: &'static str = "station";

    fn set_key(&mut self, key: &str, value: &str) -> bool {
        match key {
            "network" | "network_name" => self.network = Some(value.to_string()),
            "name" => self.name = Some(value.to_string()),
            "location" => self.location = Some(value.to_string()),
            _ => return false,
        }
        true
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChannelFilter {
    pub network: Option<String>,
    pub station: Option<String>,
    pub location: Option<String>,
    pub name: Option<String>,
}

impl ChannelFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn network(mut self, network: &str) -> Self {
        self.network = Some(network.to_string());
        self
    }

    pub fn station(mut self, station: &str) -> Self {
        self.station = Some(station.to_string());
        self
    }

    pub fn location(mut self, location: &str) -> Self {
        self.location = Some(location.to_string());
        self
    }

    pub fn name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }
}

impl SearchFilter for ChannelFilter {
    const ENTITY: &'static str = "channel";

    fn set_key(&mut self, key: &str, value: &str) -> bool {
        match key {
            "network" => self.network = Some(value.to_string()),
            "station" => self.station = Some(value.to_string()),
            "location" => self.location = Some(value.to_string()),
            "name" => self.name = Some(value.to_string()),
            _ => return false,
        }
        true
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecorderFilter {
    pub serial: Option<String>,
    pub model: Option<String>,
    pub producer: Option<String>,
}

impl RecorderFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn serial(mut self, serial: &str) -> Self {
        self.serial = Some(serial.to_string());
        self
    }

    pub fn model(mut self, model: &str) -> Self {
        self.model = Some(model.to_string());
        self
    }

    pub fn producer(mut self, producer: &str) -> Self {
        self.producer = Some(producer.to_string());
        self
    }

    fn accepts(&self, recorder: &Recorder) -> bool {
        matches(&self.serial, recorder.serial())
            && matches(&self.model, recorder.model())
            && matches(&self.producer, recorder.producer())
    }
}

impl SearchFilter for RecorderFilter {
    const ENTITY: &'static str = "recorder";

    fn set_key(&mut self, key: &str, value: &str) -> bool {
        match key {
            "serial" => self.serial = Some(value.to_string()),
            "model" => self.model = Some(value.to_string()),
            "producer" => self.producer = Some(value.to_string()),
            _ => return false,
        }
        true
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamFilter {
    pub serial: Option<String>,
    pub model: Option<String>,
    pub producer: Option<String>,
    pub name: Option<String>,
    pub label: Option<String>,
}

impl StreamFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn serial(mut self, serial: &str) -> Self {
        self.serial = Some(serial.to_string());
        self
    }

    pub fn model(mut self, model: &str) -> Self {
        self.model = Some(model.to_string());
        self
    }

    pub fn producer(mut self, producer: &str) -> Self {
        self.producer = Some(producer.to_string());
        self
    }

    pub fn name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn label(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }

    fn accepts(&self, recorder: Option<&Recorder>, stream: &RecorderStream) -> bool {
        matches_opt(&self.serial, recorder.map(Recorder::serial))
            && matches_opt(&self.model, recorder.map(Recorder::model))
            && matches_opt(&self.producer, recorder.map(Recorder::producer))
            && matches(&self.name, stream.name())
            && matches_opt(&self.label, stream.label())
    }
}

impl From<&StreamKey> for StreamFilter {
    fn from(key: &StreamKey) -> Self {
        Self::new()
            .serial(&key.serial)
            .model(&key.model)
            .producer(&key.producer)
            .name(&key.name)
    }
}

impl SearchFilter for StreamFilter {
    const ENTITY: &'static str = "recorder stream";

    fn set_key(&mut self, key: &str, value: &str) -> bool {
        match key {
            "serial" => self.serial = Some(value.to_string()),
            "model" => self.model = Some(value.to_string()),
            "producer" => self.producer = Some(value.to_string()),
            "name" => self.name = Some(value.to_string()),
            "label" => self.label = Some(value.to_string()),
            _ => return false,
        }
        true
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SensorFilter {
    pub serial: Option<String>,
    pub model: Option<String>,
    pub producer: Option<String>,
}

impl SensorFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn serial(mut self, serial: &str) -> Self {
        self.serial = Some(serial.to_string());
        self
    }

    pub fn model(mut self, model: &str) -> Self {
        self.model = Some(model.to_string());
        self
    }

    pub fn producer(mut self, producer: &str) -> Self {
        self.producer = Some(producer.to_string());
        self
    }

    fn accepts(&self, sensor: &Sensor) -> bool {
        matches(&self.serial, sensor.serial())
            && matches(&self.model, sensor.model())
            && matches(&self.producer, sensor.producer())
    }
}

impl SearchFilter for SensorFilter {
    const ENTITY: &'static str = "sensor";

    fn set_key(&mut self, key: &str, value: &str) -> bool {
        match key {
            "serial" => self.serial = Some(value.to_string()),
            "model" => self.model = Some(value.to_string()),
            "producer" => self.producer = Some(value.to_string()),
            _ => return false,
        }
        true
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComponentFilter {
    pub serial: Option<String>,
    pub model: Option<String>,
    pub producer: Option<String>,
    pub name: Option<String>,
}

impl ComponentFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn serial(mut self, serial: &str) -> Self {
        self.serial = Some(serial.to_string());
        self
    }

    pub fn model(mut self, model: &str) -> Self {
        self.model = Some(model.to_string());
        self
    }

    pub fn producer(mut self, producer: &str) -> Self {
        self.producer = Some(producer.to_string());
        self
    }

    pub fn name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    fn accepts(&self, sensor: Option<&Sensor>, component: &SensorComponent) -> bool {
        matches_opt(&self.serial, sensor.map(Sensor::serial))
            && matches_opt(&self.model, sensor.map(Sensor::model))
            && matches_opt(&self.producer, sensor.map(Sensor::producer))
            && matches(&self.name, component.name())
    }
}

impl From<&ComponentKey> for ComponentFilter {
    fn from(key: &ComponentKey) -> Self {
        Self::new()
            .serial(&key.serial)
            .model(&key.model)
            .producer(&key.producer)
            .name(&key.name)
    }
}

impl SearchFilter for ComponentFilter {
    const ENTITY: &'static str = "sensor component";

    fn set_key(&mut self, key: &str, value: &str) -> bool {
        match key {
            "serial" => self.serial = Some(value.to_string()),
            "model" => self.model = Some(value.to_string()),
            "producer" => self.producer = Some(value.to_string()),
            "name" => self.name = Some(value.to_string()),
            _ => return false,
        }
        true
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArrayFilter {
    pub name: Option<String>,
}

impl ArrayFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }
}

impl SearchFilter for ArrayFilter {
    const ENTITY: &'static str = "array";

    fn set_key(&mut self, key: &str, value: &str) -> bool {
        match key {
            "name" => self.name = Some(value.to_string()),
            _ => return false,
        }
        true
    }
}

impl Inventory {
    /// Build a filter from string pairs using this inventory's filter policy.
    pub fn filter_from_pairs<'a, F, I>(&self, pairs: I) -> Result<F>
    where
        F: SearchFilter,
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        F::from_pairs(pairs, self.config().filter_policy, &self.log_context())
    }

    // Iteration over the attached tree

    pub(crate) fn attached_networks(&self) -> impl Iterator<Item = (NetworkId, &Network)> + '_ {
        self.network_ids
            .iter()
            .filter_map(move |id| self.network(*id).map(|n| (*id, n)))
    }

    pub(crate) fn attached_stations(
        &self,
    ) -> impl Iterator<Item = (StationId, &Network, &Station)> + '_ {
        self.attached_networks().flat_map(move |(_, network)| {
            network
                .stations
                .iter()
                .filter_map(move |id| self.station(*id).map(|s| (*id, network, s)))
        })
    }

    pub(crate) fn attached_channels(
        &self,
    ) -> impl Iterator<Item = (ChannelId, &Network, &Station, &Channel)> + '_ {
        self.attached_stations().flat_map(move |(_, network, station)| {
            station
                .channels
                .iter()
                .filter_map(move |id| self.channel(*id).map(|c| (*id, network, station, c)))
        })
    }

    pub(crate) fn attached_recorders(&self) -> impl Iterator<Item = (RecorderId, &Recorder)> + '_ {
        self.recorder_ids
            .iter()
            .filter_map(move |id| self.recorder(*id).map(|r| (*id, r)))
    }

    pub(crate) fn attached_streams(
        &self,
    ) -> impl Iterator<Item = (StreamId, &Recorder, &RecorderStream)> + '_ {
        self.attached_recorders().flat_map(move |(_, recorder)| {
            recorder
                .streams
                .iter()
                .filter_map(move |id| self.stream(*id).map(|s| (*id, recorder, s)))
        })
    }

    pub(crate) fn attached_sensors(&self) -> impl Iterator<Item = (SensorId, &Sensor)> + '_ {
        self.sensor_ids
            .iter()
            .filter_map(move |id| self.sensor(*id).map(|s| (*id, s)))
    }

    pub(crate) fn attached_components(
        &self,
    ) -> impl Iterator<Item = (ComponentId, &Sensor, &SensorComponent)> + '_ {
        self.attached_sensors().flat_map(move |(_, sensor)| {
            sensor
                .components
                .iter()
                .filter_map(move |id| self.component(*id).map(|c| (*id, sensor, c)))
        })
    }

    // Searches

    pub fn get_network(&self, filter: &NetworkFilter) -> Vec<NetworkId> {
        self.attached_networks()
            .filter(|(_, n)| filter.accepts(n))
            .map(|(id, _)| id)
            .collect()
    }

    pub fn get_station(&self, filter: &StationFilter) -> Vec<StationId> {
        self.attached_stations()
            .filter(|(_, n, s)| filter.accepts(Some(n.name()), s))
            .map(|(id, _, _)| id)
            .collect()
    }

    pub fn get_channel(&self, filter: &ChannelFilter) -> Vec<ChannelId> {
        self.attached_channels()
            .filter(|(_, n, s, c)| {
                matches(&filter.network, n.name())
                    && matches(&filter.station, s.name())
                    && matches(&filter.location, s.location())
                    && matches(&filter.name, c.name())
            })
            .map(|(id, _, _, _)| id)
            .collect()
    }

    pub fn get_recorder(&self, filter: &RecorderFilter) -> Vec<RecorderId> {
        self.attached_recorders()
            .filter(|(_, r)| filter.accepts(r))
            .map(|(id, _)| id)
            .collect()
    }

    pub fn get_stream(&self, filter: &StreamFilter) -> Vec<StreamId> {
        self.attached_streams()
            .filter(|(_, r, s)| filter.accepts(Some(*r), s))
            .map(|(id, _, _)| id)
            .collect()
    }

    pub fn get_sensor(&self, filter: &SensorFilter) -> Vec<SensorId> {
        self.attached_sensors()
            .filter(|(_, s)| filter.accepts(s))
            .map(|(id, _)| id)
            .collect()
    }

    pub fn get_component(&self, filter: &ComponentFilter) -> Vec<ComponentId> {
        self.attached_components()
            .filter(|(_, s, c)| filter.accepts(Some(*s), c))
            .map(|(id, _, _)| id)
            .collect()
    }

    pub fn get_array(&self, filter: &ArrayFilter) -> Vec<ArrayId> {
        self.array_ids
            .iter()
            .copied()
            .filter(|id| {
                self.array(*id)
                    .map_or(false, |a| matches(&filter.name, a.name()))
            })
            .collect()
    }

    // Time-filtered lookups of assignments

    /// Stream assignments of a channel intersecting `[start, end)`.
    pub fn channel_streams(
        &self,
        channel: ChannelId,
        filter: &StreamFilter,
        start: Option<Timestamp>,
        end: Option<Timestamp>,
    ) -> Result<Vec<&TimeBox<StreamId>>> {
        let channel = self.require_channel(channel)?;
        Ok(channel
            .streams
            .active_between(start, end)
            .into_iter()
            .filter(|b| {
                self.stream(b.item).map_or(false, |s| {
                    let recorder = s.recorder.and_then(|r| self.recorder(r));
                    filter.accepts(recorder, s)
                })
            })
            .collect())
    }

    /// Component assignments of a stream intersecting `[start, end)`.
    pub fn stream_components(
        &self,
        stream: StreamId,
        filter: &ComponentFilter,
        start: Option<Timestamp>,
        end: Option<Timestamp>,
    ) -> Result<Vec<&TimeBox<ComponentId>>> {
        let stream = self.require_stream(stream)?;
        Ok(stream
            .components
            .active_between(start, end)
            .into_iter()
            .filter(|b| {
                self.component(b.item).map_or(false, |c| {
                    let sensor = c.sensor.and_then(|s| self.sensor(s));
                    filter.accepts(sensor, c)
                })
            })
            .collect())
    }

    /// Station memberships of an array intersecting `[start, end)`.
    pub fn array_stations(
        &self,
        array: ArrayId,
        filter: &StationFilter,
        start: Option<Timestamp>,
        end: Option<Timestamp>,
    ) -> Result<Vec<&TimeBox<StationId>>> {
        let array = self.require_array(array)?;
        Ok(array
            .stations
            .active_between(start, end)
            .into_iter()
            .filter(|b| {
                self.station(b.item).map_or(false, |s| {
                    let network = s.network.and_then(|n| self.network(n)).map(Network::name);
                    filter.accepts(network, s)
                })
            })
            .collect())
    }

    /// Channels wired to a matching stream during `[start, end)`.
    pub fn get_channel_from_stream(
        &self,
        filter: &StreamFilter,
        start: Option<Timestamp>,
        end: Option<Timestamp>,
    ) -> Vec<ChannelId> {
        self.attached_channels()
            .filter(|(id, _, _, _)| {
                self.channel_streams(*id, filter, start, end)
                    .map_or(false, |boxes| !boxes.is_empty())
            })
            .map(|(id, _, _, _)| id)
            .collect()
    }

    /// Attached channels holding any assignment of the stream.
    pub fn assigned_channels(&self, stream: StreamId) -> Vec<ChannelId> {
        self.attached_channels()
            .filter(|(_, _, _, c)| c.streams.iter().any(|b| b.item == stream))
            .map(|(id, _, _, _)| id)
            .collect()
    }

    /// Attached streams holding any assignment of the component.
    pub fn assigned_streams(&self, component: ComponentId) -> Vec<StreamId> {
        self.attached_streams()
            .filter(|(_, _, s)| s.components.iter().any(|b| b.item == component))
            .map(|(id, _, _)| id)
            .collect()
    }

    /// Attached arrays holding any membership of the station.
    pub fn assigned_arrays(&self, station: StationId) -> Vec<ArrayId> {
        self.array_ids
            .iter()
            .copied()
            .filter(|id| {
                self.array(*id)
                    .map_or(false, |a| a.stations.iter().any(|b| b.item == station))
            })
            .collect()
    }

    // Identity keys

    pub fn stream_key(&self, stream: StreamId) -> Option<StreamKey> {
        let s = self.stream(stream)?;
        let r = self.recorder(s.recorder?)?;
        Some(StreamKey::new(r.serial(), r.model(), r.producer(), s.name()))
    }

    pub fn component_key(&self, component: ComponentId) -> Option<ComponentKey> {
        let c = self.component(component)?;
        let s = self.sensor(c.sensor?)?;
        Some(ComponentKey::new(s.serial(), s.model(), s.producer(), c.name()))
    }

    pub fn station_key(&self, station: StationId) -> Option<StationKey> {
        let s = self.station(station)?;
        let n = self.network(s.network?)?;
        Some(StationKey::new(n.name(), s.name(), s.location()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Inventory {
        let mut inv = Inventory::new("query");
        let xx = inv.add_network(Network::new("XX")).unwrap();
        let yy = inv.add_network(Network::new("YY").with_kind("temporary")).unwrap();
        for (net, name) in [(xx, "S1"), (xx, "S2"), (yy, "S1")] {
            let sta = inv
                .add_station(net, Station::new(name, "00", 0.0, 0.0, 0.0, "epsg:4326"))
                .unwrap();
            for cha in ["HHZ", "HHN", "HHE"] {
                inv.add_channel(sta, Channel::new(cha)).unwrap();
            }
        }
        let rec = inv.add_recorder(Recorder::new("R1", "Cube", "Omnirecs")).unwrap();
        inv.add_recorder_stream(rec, RecorderStream::new("101", Some("Z"))).unwrap();
        inv.add_recorder_stream(rec, RecorderStream::new("102", Some("N"))).unwrap();
        let sen = inv.add_sensor(Sensor::new("1001", "L4C", "Sercel")).unwrap();
        inv.add_sensor_component(sen, SensorComponent::new("Z")).unwrap();
        inv
    }

    #[test]
    fn test_get_station_by_network() {
        let inv = sample();
        assert_eq!(inv.get_station(&StationFilter::new().name("S1")).len(), 2);
        assert_eq!(
            inv.get_station(&StationFilter::new().name("S1").network("YY")).len(),
            1
        );
    }

    #[test]
    fn test_get_channel() {
        let inv = sample();
        assert_eq!(inv.get_channel(&ChannelFilter::new()).len(), 9);
        let hhz = inv.get_channel(&ChannelFilter::new().network("XX").station("S2").name("HHZ"));
        assert_eq!(hhz.len(), 1);
        assert_eq!(inv.scnl(hhz[0]).unwrap().to_string(), "S2:HHZ:XX:00");
    }

    #[test]
    fn test_get_stream_by_recorder_fields() {
        let inv = sample();
        assert_eq!(inv.get_stream(&StreamFilter::new().serial("R1")).len(), 2);
        assert_eq!(inv.get_stream(&StreamFilter::new().label("N")).len(), 1);
        assert!(inv.get_stream(&StreamFilter::new().model("Taurus")).is_empty());
    }

    #[test]
    fn test_get_network_kind() {
        let inv = sample();
        assert_eq!(inv.get_network(&NetworkFilter::new().kind("temporary")).len(), 1);
    }

    #[test]
    fn test_detached_entities_not_found() {
        let mut inv = sample();
        inv.remove_sensor("1001").unwrap();
        assert!(inv.get_component(&ComponentFilter::new().name("Z")).is_empty());
    }

    #[test]
    fn test_from_pairs_lenient() {
        let ctx = LogContext::new("query");
        let filter = ChannelFilter::from_pairs(
            [("station", "S1"), ("colour", "red")],
            FilterPolicy::Lenient,
            &ctx,
        )
        .unwrap();
        assert_eq!(filter, ChannelFilter::new().station("S1"));
    }

    #[test]
    fn test_from_pairs_strict() {
        let ctx = LogContext::new("query");
        let result = StationFilter::from_pairs([("colour", "red")], FilterPolicy::Strict, &ctx);
        assert!(matches!(
            result,
            Err(InventoryError::UnknownFilterKey { entity: "station", .. })
        ));
    }

    #[test]
    fn test_filter_from_pairs_uses_config() {
        let inv = sample();
        let filter: RecorderFilter = inv.filter_from_pairs([("serial", "R1"), ("x", "y")]).unwrap();
        assert_eq!(inv.get_recorder(&filter).len(), 1);
    }
}
