//! Time-boxed wiring between entities.
//!
//! A channel carries recorder streams, a stream carries sensor components
//! and an array carries stations, each for a span of time. References are
//! resolved through the inventory by identity key, so the entity being wired
//! must be attached. A target holds at most one assignment at any time.

use super::{
    ArrayId, ChannelId, ComponentFilter, ComponentId, ComponentKey, EntityRef, Inventory,
    StationFilter, StationId, StationKey, StreamFilter, StreamId, StreamKey,
};
use crate::error::{InventoryError, Result};
use crate::timebox::{Interval, SlotPosition, TimeBox, TimeSpan, Timeline, Timestamp};

fn single<T: Copy>(found: Vec<T>, kind: &'static str, key: String) -> Result<T> {
    match found.as_slice() {
        [] => Err(InventoryError::UnresolvedReference { kind, key }),
        [one] => Ok(*one),
        many => Err(InventoryError::AmbiguousReference {
            kind,
            key,
            count: many.len(),
        }),
    }
}

impl Inventory {
    pub fn resolve_component(&self, key: &ComponentKey) -> Result<ComponentId> {
        single(
            self.get_component(&ComponentFilter::from(key)),
            "sensor component",
            key.to_string(),
        )
    }

    pub fn resolve_stream(&self, key: &StreamKey) -> Result<StreamId> {
        single(
            self.get_stream(&StreamFilter::from(key)),
            "recorder stream",
            key.to_string(),
        )
    }

    pub fn resolve_station(&self, key: &StationKey) -> Result<StationId> {
        single(
            self.get_station(&StationFilter::from(key)),
            "station",
            key.to_string(),
        )
    }

    /// Wire a sensor component to a stream for `[start, end)`.
    ///
    /// # Arguments
    /// * `stream` - the attached stream receiving the component
    /// * `key` - serial, model, producer and name of the component
    /// * `start`, `end` - deployment span, `None` for big bang / running
    ///
    /// # Returns
    /// The handle of the assigned component.
    pub fn add_component(
        &mut self,
        stream: StreamId,
        key: &ComponentKey,
        start: Option<Timestamp>,
        end: Option<Timestamp>,
    ) -> Result<ComponentId> {
        let span = TimeSpan::new(start, end).validate()?;
        if !self.is_attached(EntityRef::RecorderStream(stream)) {
            return Err(InventoryError::Detached { kind: "recorder stream" });
        }
        let component = self.resolve_component(key)?;

        let target = self.require_stream(stream)?;
        if let Some(existing) = target.components.conflict_with(&span) {
            return Err(InventoryError::IntervalConflict {
                subject: format!("a component of stream {}", target.name()),
                span: existing.span(),
            });
        }

        let ctx = self.entity_context(EntityRef::RecorderStream(stream));
        if let Some(target) = self.store.streams.get_mut(stream) {
            target.components.push(TimeBox::new(component, start, end)?);
            log::info!("{} COMPONENT_ASSIGNED {} span=\"{}\"", ctx, key, span);
        }
        self.mark_stream_changed(stream);
        Ok(component)
    }

    /// Wire a recorder stream to a channel for `[start, end)`.
    ///
    /// Same rules as `add_component`, one level up.
    pub fn add_stream(
        &mut self,
        channel: ChannelId,
        key: &StreamKey,
        start: Option<Timestamp>,
        end: Option<Timestamp>,
    ) -> Result<StreamId> {
        let span = TimeSpan::new(start, end).validate()?;
        if !self.is_attached(EntityRef::Channel(channel)) {
            return Err(InventoryError::Detached { kind: "channel" });
        }
        let stream = self.resolve_stream(key)?;

        let target = self.require_channel(channel)?;
        if let Some(existing) = target.streams.conflict_with(&span) {
            return Err(InventoryError::IntervalConflict {
                subject: format!("a stream of channel {}", target.name()),
                span: existing.span(),
            });
        }

        let ctx = self.entity_context(EntityRef::Channel(channel));
        if let Some(target) = self.store.channels.get_mut(channel) {
            target.streams.push(TimeBox::new(stream, start, end)?);
            target.has_changed = true;
            log::info!("{} STREAM_ASSIGNED {} span=\"{}\"", ctx, key, span);
        }
        Ok(stream)
    }

    /// Make a station member of an array for `[start, end)`.
    ///
    /// Array and station must both be attached to this inventory. The same
    /// station can't be a member twice at the same time.
    pub fn add_array_station(
        &mut self,
        array: ArrayId,
        station: StationId,
        start: Option<Timestamp>,
        end: Option<Timestamp>,
    ) -> Result<StationId> {
        let span = TimeSpan::new(start, end).validate()?;
        if !self.is_attached(EntityRef::Array(array)) {
            return Err(InventoryError::Detached { kind: "array" });
        }
        if !self.is_attached(EntityRef::Station(station)) {
            return Err(InventoryError::Detached { kind: "station" });
        }

        let target = self.require_array(array)?;
        let memberships: Vec<TimeBox<StationId>> = target
            .stations
            .iter()
            .filter(|b| b.item == station)
            .copied()
            .collect();
        if let Some(existing) = memberships.conflict_with(&span) {
            let code = self
                .snl(station)
                .map(|snl| snl.to_string())
                .unwrap_or_default();
            return Err(InventoryError::IntervalConflict {
                subject: format!("station {} of array {}", code, target.name()),
                span: existing.span(),
            });
        }

        let ctx = self.entity_context(EntityRef::Array(array));
        let code = self.entity_code(EntityRef::Station(station)).unwrap_or_default();
        if let Some(target) = self.store.arrays.get_mut(array) {
            target.stations.push(TimeBox::new(station, start, end)?);
            target.has_changed = true;
            log::info!("{} ARRAY_STATION_ADDED station={} span=\"{}\"", ctx, code, span);
        }
        Ok(station)
    }

    /// Remove the component assignments of a stream matching the filter
    /// and intersecting `[start, end)`.
    pub fn remove_component_assignment(
        &mut self,
        stream: StreamId,
        filter: &ComponentFilter,
        start: Option<Timestamp>,
        end: Option<Timestamp>,
    ) -> Result<Vec<TimeBox<ComponentId>>> {
        let doomed: Vec<TimeBox<ComponentId>> = self
            .stream_components(stream, filter, start, end)?
            .into_iter()
            .copied()
            .collect();
        if doomed.is_empty() {
            return Ok(doomed);
        }
        if let Some(target) = self.store.streams.get_mut(stream) {
            target.components.retain(|b| !doomed.contains(b));
        }
        self.mark_stream_changed(stream);
        Ok(doomed)
    }

    /// Remove the stream assignments of a channel matching the filter and
    /// intersecting `[start, end)`.
    pub fn remove_stream_assignment(
        &mut self,
        channel: ChannelId,
        filter: &StreamFilter,
        start: Option<Timestamp>,
        end: Option<Timestamp>,
    ) -> Result<Vec<TimeBox<StreamId>>> {
        let doomed: Vec<TimeBox<StreamId>> = self
            .channel_streams(channel, filter, start, end)?
            .into_iter()
            .copied()
            .collect();
        if let Some(target) = self.store.channels.get_mut(channel) {
            if !doomed.is_empty() {
                target.streams.retain(|b| !doomed.contains(b));
                target.has_changed = true;
            }
        }
        Ok(doomed)
    }

    /// Remove array memberships matching the filter and intersecting
    /// `[start, end)`.
    pub fn remove_array_station(
        &mut self,
        array: ArrayId,
        filter: &StationFilter,
        start: Option<Timestamp>,
        end: Option<Timestamp>,
    ) -> Result<Vec<TimeBox<StationId>>> {
        let doomed: Vec<TimeBox<StationId>> = self
            .array_stations(array, filter, start, end)?
            .into_iter()
            .copied()
            .collect();
        if let Some(target) = self.store.arrays.get_mut(array) {
            if !doomed.is_empty() {
                target.stations.retain(|b| !doomed.contains(b));
                target.has_changed = true;
            }
        }
        Ok(doomed)
    }

    pub fn free_component_slot(
        &self,
        stream: StreamId,
        position: SlotPosition,
    ) -> Result<Option<TimeSpan>> {
        Ok(self.require_stream(stream)?.components.free_slot(position))
    }

    pub fn free_stream_slot(
        &self,
        channel: ChannelId,
        position: SlotPosition,
    ) -> Result<Option<TimeSpan>> {
        Ok(self.require_channel(channel)?.streams.free_slot(position))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{Array, Channel, Network, Recorder, RecorderStream, Sensor, SensorComponent, Station};
    use chrono::{TimeZone, Utc};

    fn t(month: u32) -> Timestamp {
        Utc.with_ymd_and_hms(2020, month, 1, 0, 0, 0).unwrap()
    }

    struct Fixture {
        inv: Inventory,
        channel: ChannelId,
        stream: StreamId,
    }

    fn fixture() -> Fixture {
        let mut inv = Inventory::new("assign");
        let net = inv.add_network(Network::new("XX")).unwrap();
        let sta = inv
            .add_station(net, Station::new("S1", "00", 0.0, 0.0, 0.0, "epsg:4326"))
            .unwrap();
        let channel = inv.add_channel(sta, Channel::new("HHZ")).unwrap();
        let rec = inv.add_recorder(Recorder::new("R1", "Cube", "Omnirecs")).unwrap();
        let stream = inv.add_recorder_stream(rec, RecorderStream::new("101", None)).unwrap();
        let sen = inv.add_sensor(Sensor::new("1001", "L4C", "Sercel")).unwrap();
        inv.add_sensor_component(sen, SensorComponent::new("Z")).unwrap();
        Fixture { inv, channel, stream }
    }

    #[test]
    fn test_add_component_and_conflict() {
        let Fixture { mut inv, stream, .. } = fixture();
        let key = ComponentKey::new("1001", "L4C", "Sercel", "Z");
        inv.add_component(stream, &key, Some(t(1)), Some(t(6))).unwrap();

        let err = inv.add_component(stream, &key, Some(t(3)), None).unwrap_err();
        assert!(matches!(err, InventoryError::IntervalConflict { .. }));
        assert!(err.to_string().contains("already deployed from 2020-01-01"));

        inv.add_component(stream, &key, Some(t(6)), None).unwrap();
        assert_eq!(inv.stream(stream).unwrap().components().len(), 2);
    }

    #[test]
    fn test_add_component_unresolved() {
        let Fixture { mut inv, stream, .. } = fixture();
        let key = ComponentKey::new("9999", "L4C", "Sercel", "Z");
        let err = inv.add_component(stream, &key, None, None).unwrap_err();
        assert!(matches!(err, InventoryError::UnresolvedReference { .. }));
    }

    #[test]
    fn test_add_stream_to_detached_channel() {
        let Fixture { mut inv, channel, .. } = fixture();
        inv.remove_network("XX").unwrap();
        let key = StreamKey::new("R1", "Cube", "Omnirecs", "101");
        let err = inv.add_stream(channel, &key, None, None).unwrap_err();
        assert!(matches!(err, InventoryError::Detached { kind: "channel" }));
    }

    #[test]
    fn test_reversed_span_rejected() {
        let Fixture { mut inv, channel, .. } = fixture();
        let key = StreamKey::new("R1", "Cube", "Omnirecs", "101");
        let err = inv.add_stream(channel, &key, Some(t(5)), Some(t(2))).unwrap_err();
        assert!(matches!(err, InventoryError::InvalidInterval { .. }));
    }

    #[test]
    fn test_remove_stream_assignment() {
        let Fixture { mut inv, channel, stream } = fixture();
        let key = StreamKey::new("R1", "Cube", "Omnirecs", "101");
        inv.add_stream(channel, &key, Some(t(1)), Some(t(2))).unwrap();
        inv.add_stream(channel, &key, Some(t(2)), None).unwrap();

        assert_eq!(inv.assigned_channels(stream), vec![channel]);
        let removed = inv
            .remove_stream_assignment(channel, &StreamFilter::new(), Some(t(3)), None)
            .unwrap();
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].start_time, Some(t(2)));
        assert_eq!(inv.channel(channel).unwrap().streams().len(), 1);
    }

    #[test]
    fn test_assigned_stream_cannot_be_removed() {
        let Fixture { mut inv, channel, .. } = fixture();
        let key = StreamKey::new("R1", "Cube", "Omnirecs", "101");
        inv.add_stream(channel, &key, None, None).unwrap();
        let rec = inv.recorders()[0];
        assert!(inv.remove_recorder_stream(rec, "101").is_err());
    }

    #[test]
    fn test_free_stream_slot() {
        let Fixture { mut inv, channel, .. } = fixture();
        assert_eq!(
            inv.free_stream_slot(channel, SlotPosition::Both).unwrap(),
            Some(TimeSpan::unbounded())
        );
        let key = StreamKey::new("R1", "Cube", "Omnirecs", "101");
        inv.add_stream(channel, &key, Some(t(1)), Some(t(2))).unwrap();
        let slot = inv.free_stream_slot(channel, SlotPosition::Back).unwrap().unwrap();
        assert!(slot.start.unwrap() > t(2));
    }

    #[test]
    fn test_array_membership() {
        let Fixture { mut inv, .. } = fixture();
        let array = inv.add_array(Array::new("A1")).unwrap();
        let station = inv.resolve_station(&StationKey::new("XX", "S1", "00")).unwrap();
        inv.add_array_station(array, station, Some(t(1)), None).unwrap();
        assert!(inv.add_array_station(array, station, Some(t(2)), None).is_err());

        let found = inv
            .array_stations(array, &StationFilter::new().name("S1"), Some(t(3)), None)
            .unwrap();
        assert_eq!(found.len(), 1);
    }
}
