//! The inventory aggregate root.
//!
//! Owns every entity in typed arenas. The ownership tree (network ->
//! station -> channel, recorder -> stream, sensor -> component) is kept as
//! handle lists on the parents plus a back-reference on each child. An
//! entity is attached when its chain of parents reaches one of the root
//! lists of the inventory.
//!
//! Adding a duplicate identity is not an error: the add operation logs a
//! warning and returns `None`. Removing detaches; the entity stays
//! addressable by its handle and can be attached again.

use uuid::Uuid;

use super::arena::{Arena, Id};
use super::{
    ArrayId, ChannelId, ComponentId, EntityRef, NetworkId, RecorderId, SensorId, StationId,
    StreamId,
};
use crate::config::InventoryConfig;
use crate::entities::{
    Array, Channel, Network, Recorder, RecorderStream, Scnl, Sensor, SensorComponent, Snl,
    Station,
};
use crate::error::{InventoryError, Result};
use crate::logging::LogContext;
use crate::timebox::{Interval, TimeBox, TimeSpan};

/// Arena storage for every entity kind.
#[derive(Debug, Clone)]
pub(crate) struct Store {
    pub networks: Arena<Network>,
    pub stations: Arena<Station>,
    pub channels: Arena<Channel>,
    pub recorders: Arena<Recorder>,
    pub streams: Arena<RecorderStream>,
    pub sensors: Arena<Sensor>,
    pub components: Arena<SensorComponent>,
    pub arrays: Arena<Array>,
}

impl Store {
    fn new(owner: Uuid) -> Self {
        Self {
            networks: Arena::new(owner),
            stations: Arena::new(owner),
            channels: Arena::new(owner),
            recorders: Arena::new(owner),
            streams: Arena::new(owner),
            sensors: Arena::new(owner),
            components: Arena::new(owner),
            arrays: Arena::new(owner),
        }
    }
}

/// The geometry inventory.
#[derive(Debug, Clone)]
pub struct Inventory {
    name: String,
    kind: Option<String>,
    instance: Uuid,
    config: InventoryConfig,
    pub(crate) store: Store,
    pub(crate) network_ids: Vec<NetworkId>,
    pub(crate) recorder_ids: Vec<RecorderId>,
    pub(crate) sensor_ids: Vec<SensorId>,
    pub(crate) array_ids: Vec<ArrayId>,
    pub(crate) has_changed: bool,
}

impl Inventory {
    pub fn new(name: &str) -> Self {
        Self::with_config(name, InventoryConfig::default())
    }

    pub fn with_config(name: &str, config: InventoryConfig) -> Self {
        let instance = Uuid::new_v4();
        Self {
            name: name.to_string(),
            kind: None,
            instance,
            config,
            store: Store::new(instance),
            network_ids: Vec::new(),
            recorder_ids: Vec::new(),
            sensor_ids: Vec::new(),
            array_ids: Vec::new(),
            has_changed: false,
        }
    }

    pub fn with_kind(mut self, kind: &str) -> Self {
        self.kind = Some(kind.to_string());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> Option<&str> {
        self.kind.as_deref()
    }

    pub fn set_kind(&mut self, kind: Option<String>) {
        if self.kind != kind {
            self.kind = kind;
            self.has_changed = true;
        }
    }

    pub fn config(&self) -> &InventoryConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: InventoryConfig) {
        self.config = config;
    }

    /// Unique id of this inventory instance, shared by all its handles.
    pub fn instance_id(&self) -> Uuid {
        self.instance
    }

    pub fn log_context(&self) -> LogContext {
        LogContext::new(&self.name)
    }

    /// Log context naming one entity by its code.
    pub fn entity_context(&self, entity: EntityRef) -> LogContext {
        let code = self.entity_code(entity).unwrap_or_else(|| "?".to_string());
        self.log_context().with_entity(entity.kind(), code)
    }

    /// Short code of an entity as used in log lines.
    ///
    /// Stations and channels use their SNL and SCNL while attached, streams
    /// and components are prefixed by the serial of their instrument.
    pub fn entity_code(&self, entity: EntityRef) -> Option<String> {
        match entity {
            EntityRef::Network(id) => self.network(id).map(|n| n.name().to_string()),
            EntityRef::Station(id) => self
                .snl(id)
                .map(|snl| snl.to_string())
                .or_else(|| self.station(id).map(|s| s.name().to_string())),
            EntityRef::Channel(id) => self
                .scnl(id)
                .map(|scnl| scnl.to_string())
                .or_else(|| self.channel(id).map(|c| c.name().to_string())),
            EntityRef::Recorder(id) => self.recorder(id).map(|r| r.serial().to_string()),
            EntityRef::RecorderStream(id) => {
                let stream = self.stream(id)?;
                Some(match stream.recorder.and_then(|r| self.recorder(r)) {
                    Some(recorder) => format!("{}:{}", recorder.serial(), stream.name()),
                    None => stream.name().to_string(),
                })
            }
            EntityRef::Sensor(id) => self.sensor(id).map(|s| s.serial().to_string()),
            EntityRef::SensorComponent(id) => {
                let component = self.component(id)?;
                Some(match component.sensor.and_then(|s| self.sensor(s)) {
                    Some(sensor) => format!("{}:{}", sensor.serial(), component.name()),
                    None => component.name().to_string(),
                })
            }
            EntityRef::Array(id) => self.array(id).map(|a| a.name().to_string()),
        }
    }

    /// Drop all content. Handles issued before become invalid.
    pub fn clear(&mut self) {
        let mut fresh = Self::with_config(&self.name, self.config.clone());
        fresh.kind = self.kind.take();
        fresh.has_changed = true;
        *self = fresh;
        log::info!("{} INVENTORY_CLEARED", self.log_context());
    }

    // Root lists

    pub fn networks(&self) -> &[NetworkId] {
        &self.network_ids
    }

    pub fn recorders(&self) -> &[RecorderId] {
        &self.recorder_ids
    }

    pub fn sensors(&self) -> &[SensorId] {
        &self.sensor_ids
    }

    pub fn arrays(&self) -> &[ArrayId] {
        &self.array_ids
    }

    // Entity access

    pub fn network(&self, id: NetworkId) -> Option<&Network> {
        self.store.networks.get(id)
    }

    pub fn network_mut(&mut self, id: NetworkId) -> Option<&mut Network> {
        self.store.networks.get_mut(id)
    }

    pub fn station(&self, id: StationId) -> Option<&Station> {
        self.store.stations.get(id)
    }

    pub fn station_mut(&mut self, id: StationId) -> Option<&mut Station> {
        self.store.stations.get_mut(id)
    }

    pub fn channel(&self, id: ChannelId) -> Option<&Channel> {
        self.store.channels.get(id)
    }

    pub fn channel_mut(&mut self, id: ChannelId) -> Option<&mut Channel> {
        self.store.channels.get_mut(id)
    }

    pub fn recorder(&self, id: RecorderId) -> Option<&Recorder> {
        self.store.recorders.get(id)
    }

    pub fn recorder_mut(&mut self, id: RecorderId) -> Option<&mut Recorder> {
        self.store.recorders.get_mut(id)
    }

    pub fn stream(&self, id: StreamId) -> Option<&RecorderStream> {
        self.store.streams.get(id)
    }

    /// Mutable stream access. The owning recorder is flagged as changed.
    pub fn stream_mut(&mut self, id: StreamId) -> Option<&mut RecorderStream> {
        let recorder = self.store.streams.get(id)?.recorder;
        if let Some(recorder) = recorder.and_then(|r| self.store.recorders.get_mut(r)) {
            recorder.has_changed = true;
        }
        self.store.streams.get_mut(id)
    }

    pub fn sensor(&self, id: SensorId) -> Option<&Sensor> {
        self.store.sensors.get(id)
    }

    pub fn sensor_mut(&mut self, id: SensorId) -> Option<&mut Sensor> {
        self.store.sensors.get_mut(id)
    }

    pub fn component(&self, id: ComponentId) -> Option<&SensorComponent> {
        self.store.components.get(id)
    }

    pub fn component_mut(&mut self, id: ComponentId) -> Option<&mut SensorComponent> {
        self.store.components.get_mut(id)
    }

    pub fn array(&self, id: ArrayId) -> Option<&Array> {
        self.store.arrays.get(id)
    }

    pub fn array_mut(&mut self, id: ArrayId) -> Option<&mut Array> {
        self.store.arrays.get_mut(id)
    }

    pub(crate) fn require_station(&self, id: StationId) -> Result<&Station> {
        self.station(id)
            .ok_or(InventoryError::Detached { kind: "station" })
    }

    pub(crate) fn require_channel(&self, id: ChannelId) -> Result<&Channel> {
        self.channel(id)
            .ok_or(InventoryError::Detached { kind: "channel" })
    }

    pub(crate) fn require_stream(&self, id: StreamId) -> Result<&RecorderStream> {
        self.stream(id)
            .ok_or(InventoryError::Detached { kind: "recorder stream" })
    }

    pub(crate) fn require_component(&self, id: ComponentId) -> Result<&SensorComponent> {
        self.component(id)
            .ok_or(InventoryError::Detached { kind: "sensor component" })
    }

    pub(crate) fn require_array(&self, id: ArrayId) -> Result<&Array> {
        self.array(id).ok_or(InventoryError::Detached { kind: "array" })
    }

    // Attachment

    /// Whether the entity's chain of parents reaches this inventory.
    pub fn is_attached(&self, entity: EntityRef) -> bool {
        match entity {
            EntityRef::Network(id) => self.network_attached(id),
            EntityRef::Station(id) => self.station_attached(id),
            EntityRef::Channel(id) => self.channel_attached(id),
            EntityRef::Recorder(id) => self.recorder_attached(id),
            EntityRef::RecorderStream(id) => self.stream_attached(id),
            EntityRef::Sensor(id) => self.sensor_attached(id),
            EntityRef::SensorComponent(id) => self.component_attached(id),
            EntityRef::Array(id) => self.array(id).map_or(false, |a| a.attached),
        }
    }

    fn network_attached(&self, id: NetworkId) -> bool {
        self.network(id).map_or(false, |n| n.attached)
    }

    fn station_attached(&self, id: StationId) -> bool {
        self.station(id)
            .and_then(|s| s.network)
            .map_or(false, |n| self.network_attached(n))
    }

    fn channel_attached(&self, id: ChannelId) -> bool {
        self.channel(id)
            .and_then(|c| c.station)
            .map_or(false, |s| self.station_attached(s))
    }

    fn recorder_attached(&self, id: RecorderId) -> bool {
        self.recorder(id).map_or(false, |r| r.attached)
    }

    fn stream_attached(&self, id: StreamId) -> bool {
        self.stream(id)
            .and_then(|s| s.recorder)
            .map_or(false, |r| self.recorder_attached(r))
    }

    fn sensor_attached(&self, id: SensorId) -> bool {
        self.sensor(id).map_or(false, |s| s.attached)
    }

    fn component_attached(&self, id: ComponentId) -> bool {
        self.component(id)
            .and_then(|c| c.sensor)
            .map_or(false, |s| self.sensor_attached(s))
    }

    // Child lookup by identity

    pub(crate) fn find_network(&self, name: &str) -> Option<NetworkId> {
        self.network_ids
            .iter()
            .copied()
            .find(|id| self.network(*id).map_or(false, |n| n.name() == name))
    }

    pub(crate) fn find_recorder(&self, serial: &str) -> Option<RecorderId> {
        self.recorder_ids
            .iter()
            .copied()
            .find(|id| self.recorder(*id).map_or(false, |r| r.serial() == serial))
    }

    pub(crate) fn find_sensor(&self, serial: &str) -> Option<SensorId> {
        self.sensor_ids
            .iter()
            .copied()
            .find(|id| self.sensor(*id).map_or(false, |s| s.serial() == serial))
    }

    pub(crate) fn find_array(&self, name: &str) -> Option<ArrayId> {
        self.array_ids
            .iter()
            .copied()
            .find(|id| self.array(*id).map_or(false, |a| a.name() == name))
    }

    pub(crate) fn find_station_in(
        &self,
        network: NetworkId,
        name: &str,
        location: &str,
    ) -> Option<StationId> {
        self.network(network)?.stations.iter().copied().find(|id| {
            self.station(*id)
                .map_or(false, |s| s.name() == name && s.location() == location)
        })
    }

    pub(crate) fn find_channel_in(&self, station: StationId, name: &str) -> Option<ChannelId> {
        self.station(station)?
            .channels
            .iter()
            .copied()
            .find(|id| self.channel(*id).map_or(false, |c| c.name() == name))
    }

    pub(crate) fn find_stream_in(&self, recorder: RecorderId, name: &str) -> Option<StreamId> {
        self.recorder(recorder)?
            .streams
            .iter()
            .copied()
            .find(|id| self.stream(*id).map_or(false, |s| s.name() == name))
    }

    pub(crate) fn find_component_in(&self, sensor: SensorId, name: &str) -> Option<ComponentId> {
        self.sensor(sensor)?
            .components
            .iter()
            .copied()
            .find(|id| self.component(*id).map_or(false, |c| c.name() == name))
    }

    // Adding

    /// Add a network. Returns `None` if a network with the same name exists.
    pub fn add_network(&mut self, mut network: Network) -> Option<NetworkId> {
        if self.find_network(network.name()).is_some() {
            log::warn!(
                "{} NETWORK_DUPLICATE name={}",
                self.log_context(),
                network.name()
            );
            return None;
        }
        network.attached = true;
        network.has_changed = true;
        let name = network.name().to_string();
        let id = self.store.networks.insert(network)?;
        self.network_ids.push(id);
        self.has_changed = true;
        log::debug!("{} NETWORK_ADDED name={}", self.log_context(), name);
        Some(id)
    }

    /// Add a station to a network.
    ///
    /// Returns `None` if the network already holds a station with the same
    /// name and location.
    pub fn add_station(&mut self, network: NetworkId, mut station: Station) -> Option<StationId> {
        let ctx = self.log_context();
        if self.network(network).is_none() {
            log::error!("{} STATION_ADD_FAILED name={} reason=unknown_network", ctx, station.name());
            return None;
        }
        if self
            .find_station_in(network, station.name(), station.location())
            .is_some()
        {
            log::warn!(
                "{} STATION_DUPLICATE name={} location={}",
                ctx,
                station.name(),
                station.location()
            );
            return None;
        }
        station.network = Some(network);
        station.has_changed = true;
        let id = self.store.stations.insert(station)?;
        if let Some(parent) = self.store.networks.get_mut(network) {
            parent.stations.push(id);
            parent.has_changed = true;
        }
        Some(id)
    }

    /// Attach a detached station to a network, e.g. to move it.
    pub fn attach_station(&mut self, network: NetworkId, station: StationId) -> Option<StationId> {
        let ctx = self.log_context();
        let (name, location) = match self.station(station) {
            Some(s) if s.network.is_none() => (s.name().to_string(), s.location().to_string()),
            Some(s) => {
                log::warn!("{} STATION_ATTACH_FAILED name={} reason=attached", ctx, s.name());
                return None;
            }
            None => {
                log::error!("{} STATION_ATTACH_FAILED reason=unknown_station", ctx);
                return None;
            }
        };
        if self.network(network).is_none() {
            log::error!("{} STATION_ATTACH_FAILED name={} reason=unknown_network", ctx, name);
            return None;
        }
        if self.find_station_in(network, &name, &location).is_some() {
            log::warn!("{} STATION_DUPLICATE name={} location={}", ctx, name, location);
            return None;
        }
        if let Some(s) = self.store.stations.get_mut(station) {
            s.network = Some(network);
            s.has_changed = true;
        }
        if let Some(parent) = self.store.networks.get_mut(network) {
            parent.stations.push(station);
            parent.has_changed = true;
        }
        log::info!("{} STATION_ATTACHED", self.entity_context(EntityRef::Station(station)));
        Some(station)
    }

    /// Add a channel to a station. Returns `None` if the name is taken.
    pub fn add_channel(&mut self, station: StationId, mut channel: Channel) -> Option<ChannelId> {
        let ctx = self.log_context();
        if self.station(station).is_none() {
            log::error!("{} CHANNEL_ADD_FAILED name={} reason=unknown_station", ctx, channel.name());
            return None;
        }
        if self.find_channel_in(station, channel.name()).is_some() {
            log::warn!("{} CHANNEL_DUPLICATE name={}", ctx, channel.name());
            return None;
        }
        channel.station = Some(station);
        channel.has_changed = true;
        let id = self.store.channels.insert(channel)?;
        if let Some(parent) = self.store.stations.get_mut(station) {
            parent.channels.push(id);
            parent.has_changed = true;
        }
        Some(id)
    }

    /// Add a recorder. Returns `None` if the serial number is taken.
    pub fn add_recorder(&mut self, mut recorder: Recorder) -> Option<RecorderId> {
        if self.find_recorder(recorder.serial()).is_some() {
            log::warn!(
                "{} RECORDER_DUPLICATE serial={}",
                self.log_context(),
                recorder.serial()
            );
            return None;
        }
        recorder.attached = true;
        recorder.has_changed = true;
        let id = self.store.recorders.insert(recorder)?;
        self.recorder_ids.push(id);
        self.has_changed = true;
        Some(id)
    }

    /// Add a stream to a recorder. Returns `None` if the name is taken.
    pub fn add_recorder_stream(
        &mut self,
        recorder: RecorderId,
        mut stream: RecorderStream,
    ) -> Option<StreamId> {
        let ctx = self.log_context();
        if self.recorder(recorder).is_none() {
            log::error!("{} STREAM_ADD_FAILED name={} reason=unknown_recorder", ctx, stream.name());
            return None;
        }
        if self.find_stream_in(recorder, stream.name()).is_some() {
            log::warn!("{} STREAM_DUPLICATE name={}", ctx, stream.name());
            return None;
        }
        stream.recorder = Some(recorder);
        stream.has_changed = true;
        let id = self.store.streams.insert(stream)?;
        if let Some(parent) = self.store.recorders.get_mut(recorder) {
            parent.streams.push(id);
            parent.has_changed = true;
        }
        Some(id)
    }

    /// Add a sensor. Returns `None` if the serial number is taken.
    pub fn add_sensor(&mut self, mut sensor: Sensor) -> Option<SensorId> {
        if self.find_sensor(sensor.serial()).is_some() {
            log::warn!(
                "{} SENSOR_DUPLICATE serial={}",
                self.log_context(),
                sensor.serial()
            );
            return None;
        }
        sensor.attached = true;
        sensor.has_changed = true;
        let id = self.store.sensors.insert(sensor)?;
        self.sensor_ids.push(id);
        self.has_changed = true;
        Some(id)
    }

    /// Add a component to a sensor. Returns `None` if the name is taken.
    pub fn add_sensor_component(
        &mut self,
        sensor: SensorId,
        mut component: SensorComponent,
    ) -> Option<ComponentId> {
        let ctx = self.log_context();
        if self.sensor(sensor).is_none() {
            log::error!(
                "{} COMPONENT_ADD_FAILED name={} reason=unknown_sensor",
                ctx,
                component.name()
            );
            return None;
        }
        if self.find_component_in(sensor, component.name()).is_some() {
            log::warn!("{} COMPONENT_DUPLICATE name={}", ctx, component.name());
            return None;
        }
        component.sensor = Some(sensor);
        component.has_changed = true;
        let id = self.store.components.insert(component)?;
        if let Some(parent) = self.store.sensors.get_mut(sensor) {
            parent.components.push(id);
            parent.has_changed = true;
        }
        Some(id)
    }

    /// Add an array. Returns `None` if the name is taken.
    pub fn add_array(&mut self, mut array: Array) -> Option<ArrayId> {
        if self.find_array(array.name()).is_some() {
            log::warn!("{} ARRAY_DUPLICATE name={}", self.log_context(), array.name());
            return None;
        }
        array.attached = true;
        array.has_changed = true;
        let id = self.store.arrays.insert(array)?;
        self.array_ids.push(id);
        self.has_changed = true;
        Some(id)
    }

    // Removing

    /// Detach the network with this name.
    ///
    /// More than one match means the inventory is broken; nothing is removed.
    /// Fails while one of its stations is a member of an array.
    pub fn remove_network(&mut self, name: &str) -> Result<Option<NetworkId>> {
        let ctx = self.log_context().with_entity("network", name);
        let Some(id) = find_root(&self.network_ids, &self.store.networks, &ctx, |n| n.name() == name) else {
            return Ok(None);
        };
        let member = self.network(id).and_then(|n| {
            n.stations
                .iter()
                .copied()
                .find(|s| !self.assigned_arrays(*s).is_empty())
        });
        if let Some(station) = member {
            let code = self.entity_code(EntityRef::Station(station)).unwrap_or_default();
            log::warn!("{} NETWORK_REMOVE_REJECTED reason=array_member station={}", ctx, code);
            return Err(InventoryError::AssignedEntity {
                kind: "network",
                key: name.to_string(),
            });
        }

        self.network_ids.retain(|other| *other != id);
        if let Some(network) = self.store.networks.get_mut(id) {
            network.attached = false;
        }
        self.has_changed = true;
        log::info!("{} NETWORK_REMOVED", ctx);
        Ok(Some(id))
    }

    /// Detach the recorder with this serial.
    ///
    /// Fails while one of its streams is assigned to a channel.
    pub fn remove_recorder(&mut self, serial: &str) -> Result<Option<RecorderId>> {
        let ctx = self.log_context().with_entity("recorder", serial);
        let Some(id) = find_root(&self.recorder_ids, &self.store.recorders, &ctx, |r| r.serial() == serial) else {
            return Ok(None);
        };
        let assigned = self.recorder(id).and_then(|r| {
            r.streams
                .iter()
                .copied()
                .find(|s| !self.assigned_channels(*s).is_empty())
        });
        if let Some(stream) = assigned {
            let name = self.stream(stream).map(|s| s.name().to_string()).unwrap_or_default();
            log::warn!("{} RECORDER_REMOVE_REJECTED reason=assigned stream={}", ctx, name);
            return Err(InventoryError::AssignedEntity {
                kind: "recorder",
                key: serial.to_string(),
            });
        }

        self.recorder_ids.retain(|other| *other != id);
        if let Some(recorder) = self.store.recorders.get_mut(id) {
            recorder.attached = false;
        }
        self.has_changed = true;
        log::info!("{} RECORDER_REMOVED", ctx);
        Ok(Some(id))
    }

    /// Detach the sensor with this serial.
    ///
    /// Fails while one of its components is assigned to a stream.
    pub fn remove_sensor(&mut self, serial: &str) -> Result<Option<SensorId>> {
        let ctx = self.log_context().with_entity("sensor", serial);
        let Some(id) = find_root(&self.sensor_ids, &self.store.sensors, &ctx, |s| s.serial() == serial) else {
            return Ok(None);
        };
        let assigned = self.sensor(id).and_then(|s| {
            s.components
                .iter()
                .copied()
                .find(|c| !self.assigned_streams(*c).is_empty())
        });
        if let Some(component) = assigned {
            let name = self.component(component).map(|c| c.name().to_string()).unwrap_or_default();
            log::warn!("{} SENSOR_REMOVE_REJECTED reason=assigned component={}", ctx, name);
            return Err(InventoryError::AssignedEntity {
                kind: "sensor",
                key: serial.to_string(),
            });
        }

        self.sensor_ids.retain(|other| *other != id);
        if let Some(sensor) = self.store.sensors.get_mut(id) {
            sensor.attached = false;
        }
        self.has_changed = true;
        log::info!("{} SENSOR_REMOVED", ctx);
        Ok(Some(id))
    }

    pub fn remove_array(&mut self, name: &str) -> Option<ArrayId> {
        let ctx = self.log_context().with_entity("array", name);
        let id = find_root(&self.array_ids, &self.store.arrays, &ctx, |a| a.name() == name)?;
        self.array_ids.retain(|other| *other != id);
        if let Some(array) = self.store.arrays.get_mut(id) {
            array.attached = false;
        }
        self.has_changed = true;
        log::info!("{} ARRAY_REMOVED", ctx);
        Some(id)
    }

    /// Detach the station addressed by station, network and location code.
    pub fn remove_station(&mut self, snl: &Snl) -> Result<Option<StationId>> {
        let station = self
            .find_network(&snl.network)
            .and_then(|network| self.find_station_in(network, &snl.station, &snl.location));
        match station {
            Some(station) => self.detach_station(station),
            None => Ok(None),
        }
    }

    /// Detach a station from its network, keeping its channels.
    ///
    /// Fails while the station is a member of an array.
    pub fn detach_station(&mut self, station: StationId) -> Result<Option<StationId>> {
        let Some(network) = self.station(station).and_then(|s| s.network) else {
            return Ok(None);
        };
        let ctx = self.entity_context(EntityRef::Station(station));
        if !self.assigned_arrays(station).is_empty() {
            log::warn!("{} STATION_REMOVE_REJECTED reason=array_member", ctx);
            return Err(InventoryError::AssignedEntity {
                kind: "station",
                key: self.entity_code(EntityRef::Station(station)).unwrap_or_default(),
            });
        }

        if let Some(parent) = self.store.networks.get_mut(network) {
            parent.stations.retain(|id| *id != station);
            parent.has_changed = true;
        }
        if let Some(s) = self.store.stations.get_mut(station) {
            s.network = None;
            s.has_changed = true;
        }
        log::info!("{} STATION_REMOVED", ctx);
        Ok(Some(station))
    }

    /// Detach a channel from its station, keeping its stream assignments.
    pub fn remove_channel(&mut self, station: StationId, name: &str) -> Option<ChannelId> {
        let channel = self.find_channel_in(station, name)?;
        let ctx = self.entity_context(EntityRef::Channel(channel));
        if let Some(parent) = self.store.stations.get_mut(station) {
            parent.channels.retain(|id| *id != channel);
            parent.has_changed = true;
        }
        if let Some(c) = self.store.channels.get_mut(channel) {
            c.station = None;
            c.has_changed = true;
        }
        log::info!("{} CHANNEL_REMOVED", ctx);
        Some(channel)
    }

    /// Detach a stream from its recorder.
    ///
    /// Fails while the stream is still assigned to a channel.
    pub fn remove_recorder_stream(&mut self, recorder: RecorderId, name: &str) -> Result<Option<StreamId>> {
        let Some(stream) = self.find_stream_in(recorder, name) else {
            return Ok(None);
        };
        let ctx = self.entity_context(EntityRef::RecorderStream(stream));
        if !self.assigned_channels(stream).is_empty() {
            log::warn!("{} STREAM_REMOVE_REJECTED reason=assigned", ctx);
            return Err(InventoryError::AssignedEntity {
                kind: "recorder stream",
                key: name.to_string(),
            });
        }
        if let Some(parent) = self.store.recorders.get_mut(recorder) {
            parent.streams.retain(|id| *id != stream);
            parent.has_changed = true;
        }
        if let Some(s) = self.store.streams.get_mut(stream) {
            s.recorder = None;
            s.has_changed = true;
        }
        log::info!("{} STREAM_REMOVED", ctx);
        Ok(Some(stream))
    }

    /// Detach a component from its sensor.
    ///
    /// Fails while the component is still assigned to a stream.
    pub fn remove_sensor_component(
        &mut self,
        sensor: SensorId,
        name: &str,
    ) -> Result<Option<ComponentId>> {
        let Some(component) = self.find_component_in(sensor, name) else {
            return Ok(None);
        };
        let ctx = self.entity_context(EntityRef::SensorComponent(component));
        if !self.assigned_streams(component).is_empty() {
            log::warn!("{} COMPONENT_REMOVE_REJECTED reason=assigned", ctx);
            return Err(InventoryError::AssignedEntity {
                kind: "sensor component",
                key: name.to_string(),
            });
        }
        if let Some(parent) = self.store.sensors.get_mut(sensor) {
            parent.components.retain(|id| *id != component);
            parent.has_changed = true;
        }
        if let Some(c) = self.store.components.get_mut(component) {
            c.sensor = None;
            c.has_changed = true;
        }
        log::info!("{} COMPONENT_REMOVED", ctx);
        Ok(Some(component))
    }

    // Codes and derived spans

    pub fn snl(&self, station: StationId) -> Option<Snl> {
        let s = self.station(station)?;
        let network = self.network(s.network?)?;
        Some(Snl::new(s.name(), network.name(), s.location()))
    }

    pub fn scnl(&self, channel: ChannelId) -> Option<Scnl> {
        let c = self.channel(channel)?;
        let snl = self.snl(c.station?)?;
        Some(Scnl {
            station: snl.station,
            channel: c.name().to_string(),
            network: snl.network,
            location: snl.location,
        })
    }

    /// Span covered by the channel's stream assignments.
    pub fn channel_span(&self, channel: ChannelId) -> Option<TimeSpan> {
        covering_span(&self.channel(channel)?.streams)
    }

    /// Span covered by the stream assignments of all channels of a station.
    pub fn station_span(&self, station: StationId) -> Option<TimeSpan> {
        let boxes: Vec<TimeBox<StreamId>> = self
            .station(station)?
            .channels
            .iter()
            .filter_map(|id| self.channel(*id))
            .flat_map(|c| c.streams.iter().copied())
            .collect();
        covering_span(&boxes)
    }

    /// Distinct channel names of a station in the order they were added.
    pub fn unique_channel_names(&self, station: StationId) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        let channels = self.station(station).map(|s| s.channels.as_slice()).unwrap_or_default();
        for channel in channels.iter().filter_map(|id| self.channel(*id)) {
            if !names.iter().any(|n| n == channel.name()) {
                names.push(channel.name().to_string());
            }
        }
        names
    }

    /// Serial numbers of the recorders ever wired to the station's channels.
    pub fn assigned_recorders(&self, station: StationId) -> Vec<String> {
        let mut serials: Vec<String> = self
            .station(station)
            .map(|s| s.channels.as_slice())
            .unwrap_or_default()
            .iter()
            .filter_map(|id| self.channel(*id))
            .flat_map(|c| c.streams.iter())
            .filter_map(|b| self.stream(b.item))
            .filter_map(|s| s.recorder.and_then(|r| self.recorder(r)))
            .map(|r| r.serial().to_string())
            .collect();
        serials.sort();
        serials.dedup();
        serials
    }

    // Dirty tracking

    /// Whether anything in the inventory changed since the last `clear_changes`.
    pub fn has_changed(&self) -> bool {
        self.has_changed || !self.changed_entities().is_empty()
    }

    /// Every entity carrying the dirty flag, attached or not.
    pub fn changed_entities(&self) -> Vec<EntityRef> {
        let store = &self.store;
        let mut changed = Vec::new();
        changed.extend(store.networks.iter().filter(|(_, e)| e.has_changed()).map(|(id, _)| EntityRef::Network(id)));
        changed.extend(store.stations.iter().filter(|(_, e)| e.has_changed()).map(|(id, _)| EntityRef::Station(id)));
        changed.extend(store.channels.iter().filter(|(_, e)| e.has_changed()).map(|(id, _)| EntityRef::Channel(id)));
        changed.extend(store.recorders.iter().filter(|(_, e)| e.has_changed()).map(|(id, _)| EntityRef::Recorder(id)));
        changed.extend(store.streams.iter().filter(|(_, e)| e.has_changed()).map(|(id, _)| EntityRef::RecorderStream(id)));
        changed.extend(store.sensors.iter().filter(|(_, e)| e.has_changed()).map(|(id, _)| EntityRef::Sensor(id)));
        changed.extend(store.components.iter().filter(|(_, e)| e.has_changed()).map(|(id, _)| EntityRef::SensorComponent(id)));
        changed.extend(store.arrays.iter().filter(|(_, e)| e.has_changed()).map(|(id, _)| EntityRef::Array(id)));
        changed
    }

    /// Reset every dirty flag, e.g. after the state was written to storage.
    pub fn clear_changes(&mut self) {
        self.has_changed = false;
        let store = &mut self.store;
        store.networks.iter_mut().for_each(|e| e.set_changed(false));
        store.stations.iter_mut().for_each(|e| e.set_changed(false));
        store.channels.iter_mut().for_each(|e| e.set_changed(false));
        store.recorders.iter_mut().for_each(|e| e.set_changed(false));
        store.streams.iter_mut().for_each(|e| e.set_changed(false));
        store.sensors.iter_mut().for_each(|e| e.set_changed(false));
        store.components.iter_mut().for_each(|e| e.set_changed(false));
        store.arrays.iter_mut().for_each(|e| e.set_changed(false));
    }

    /// Flag a stream and its recorder as changed.
    pub(crate) fn mark_stream_changed(&mut self, stream: StreamId) {
        let recorder = match self.store.streams.get_mut(stream) {
            Some(s) => {
                s.has_changed = true;
                s.recorder
            }
            None => None,
        };
        if let Some(r) = recorder.and_then(|r| self.store.recorders.get_mut(r)) {
            r.has_changed = true;
        }
    }
}

/// The single root entry matching `pred`.
fn find_root<T>(
    ids: &[Id<T>],
    arena: &Arena<T>,
    ctx: &LogContext,
    pred: impl Fn(&T) -> bool,
) -> Option<Id<T>> {
    let matches: Vec<Id<T>> = ids
        .iter()
        .copied()
        .filter(|id| arena.get(*id).map_or(false, &pred))
        .collect();
    match matches.as_slice() {
        [] => None,
        [id] => Some(*id),
        many => {
            log::error!("{} REMOVE_AMBIGUOUS count={}", ctx, many.len());
            None
        }
    }
}

/// Earliest start and latest end of a set of boxes, absent bounds winning.
fn covering_span<T>(boxes: &[TimeBox<T>]) -> Option<TimeSpan> {
    if boxes.is_empty() {
        return None;
    }
    let start = if boxes.iter().any(|b| b.start_time().is_none()) {
        None
    } else {
        boxes.iter().filter_map(|b| b.start_time()).min()
    };
    let end = if boxes.iter().any(|b| b.end_time().is_none()) {
        None
    } else {
        boxes.iter().filter_map(|b| b.end_time()).max()
    };
    Some(TimeSpan::new(start, end))
}
