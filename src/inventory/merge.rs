//! Merging one inventory into another.
//!
//! Entities are matched by identity: sensors and recorders by serial, model
//! and producer, networks and arrays by name, stations by name and location
//! within their network, channels, streams and components by name within
//! their parent. A matched entity takes the scalar attributes of the incoming
//! one, its children are merged recursively and its parameters reconciled by
//! span. Unmatched entities are copied with their whole subtree.
//!
//! Assignment lists (components of a stream, streams of a channel, stations
//! of an array) are replaced by the incoming list, with every reference
//! resolved by key against the target inventory.

use super::{
    ArrayId, ChannelId, ComponentId, Inventory, NetworkId, RecorderFilter, RecorderId,
    SensorFilter, SensorId, StationId, StreamId,
};
use crate::entities::parameters::merge_parameters;
use crate::entities::{
    Array, Channel, Network, Recorder, RecorderStream, Sensor, SensorComponent, Station,
};
use crate::error::{InventoryError, Result};
use crate::timebox::{Interval, TimeBox};

/// Counts of what a merge touched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Entities copied from the incoming inventory.
    pub added: usize,
    /// Existing entities that took incoming values.
    pub merged: usize,
    /// Assignment lists that were replaced.
    pub rewired: usize,
    /// Incoming entities dropped because their identity clashed.
    pub skipped: usize,
}

/// Reject a list in which two related boxes overlap.
fn check_timeline<T>(
    boxes: &[TimeBox<T>],
    subject: &str,
    related: impl Fn(&T, &T) -> bool,
) -> Result<()> {
    for (index, candidate) in boxes.iter().enumerate() {
        let clash = boxes[..index].iter().find(|b| {
            related(&b.item, &candidate.item)
                && b.intersects(candidate.start_time, candidate.end_time)
        });
        if let Some(existing) = clash {
            return Err(InventoryError::IntervalConflict {
                subject: subject.to_string(),
                span: existing.span(),
            });
        }
    }
    Ok(())
}

impl Inventory {
    /// Merge `incoming` into this inventory.
    ///
    /// Sensors go first, then recorders, networks and arrays, so that every
    /// assignment finds its target. With `atomic_merge` set in the
    /// configuration a failing merge leaves the inventory untouched;
    /// otherwise the entities merged before the failure stay merged.
    pub fn merge(&mut self, incoming: &Inventory) -> Result<MergeReport> {
        let ctx = self.log_context();
        log::info!(
            "{} MERGE_START incoming={} sensors={} recorders={} networks={} arrays={}",
            ctx,
            incoming.name(),
            incoming.sensor_ids.len(),
            incoming.recorder_ids.len(),
            incoming.network_ids.len(),
            incoming.array_ids.len()
        );

        let outcome = if self.config().atomic_merge {
            let mut staged = self.clone();
            staged.merge_into(incoming).map(|report| {
                *self = staged;
                report
            })
        } else {
            self.merge_into(incoming)
        };

        match outcome {
            Ok(report) => {
                log::info!(
                    "{} MERGE_COMPLETE added={} merged={} rewired={} skipped={}",
                    ctx,
                    report.added,
                    report.merged,
                    report.rewired,
                    report.skipped
                );
                Ok(report)
            }
            Err(e) => {
                log::error!("{} MERGE_FAILED incoming={} error=\"{}\"", ctx, incoming.name(), e);
                Err(e)
            }
        }
    }

    fn merge_into(&mut self, incoming: &Inventory) -> Result<MergeReport> {
        let mut report = MergeReport::default();
        for (_, sensor) in incoming.attached_sensors() {
            self.merge_sensor(incoming, sensor, &mut report)?;
        }
        for (_, recorder) in incoming.attached_recorders() {
            self.merge_recorder(incoming, recorder, &mut report)?;
        }
        for (_, network) in incoming.attached_networks() {
            self.merge_network(incoming, network, &mut report)?;
        }
        for array in incoming.array_ids.iter().filter_map(|id| incoming.array(*id)) {
            self.merge_array(incoming, array, &mut report)?;
        }
        Ok(report)
    }

    // Sensors

    fn merge_sensor(
        &mut self,
        incoming: &Inventory,
        source: &Sensor,
        report: &mut MergeReport,
    ) -> Result<()> {
        let filter = SensorFilter::new()
            .serial(source.serial())
            .model(source.model())
            .producer(source.producer());
        let Some(&target) = self.get_sensor(&filter).first() else {
            return self.copy_sensor(incoming, source, report);
        };

        if let Some(sensor) = self.store.sensors.get_mut(target) {
            sensor.set_description(source.description().map(str::to_string));
        }
        report.merged += 1;

        for component in source.components.iter().filter_map(|id| incoming.component(*id)) {
            match self.find_component_in(target, component.name()) {
                Some(existing) => self.merge_component(existing, component, report)?,
                None => self.copy_component(target, component, report),
            }
        }
        Ok(())
    }

    fn copy_sensor(
        &mut self,
        incoming: &Inventory,
        source: &Sensor,
        report: &mut MergeReport,
    ) -> Result<()> {
        let Some(target) = self.add_sensor(source.detached_copy()) else {
            report.skipped += 1;
            return Ok(());
        };
        report.added += 1;
        for component in source.components.iter().filter_map(|id| incoming.component(*id)) {
            self.copy_component(target, component, report);
        }
        Ok(())
    }

    fn copy_component(
        &mut self,
        sensor: SensorId,
        source: &SensorComponent,
        report: &mut MergeReport,
    ) {
        match self.add_sensor_component(sensor, source.detached_copy()) {
            Some(_) => report.added += 1,
            None => report.skipped += 1,
        }
    }

    fn merge_component(
        &mut self,
        target: ComponentId,
        source: &SensorComponent,
        report: &mut MergeReport,
    ) -> Result<()> {
        let Some(component) = self.store.components.get_mut(target) else {
            return Ok(());
        };
        component.set_description(source.description().map(str::to_string));
        component.set_input_unit(source.input_unit().map(str::to_string));
        component.set_output_unit(source.output_unit().map(str::to_string));
        component.set_deliver_unit(source.deliver_unit().map(str::to_string));
        let owner = format!("component {}", component.name());
        if merge_parameters(component.parameters_mut(), source.parameters(), &owner)? {
            component.has_changed = true;
        }
        report.merged += 1;
        Ok(())
    }

    // Recorders

    fn merge_recorder(
        &mut self,
        incoming: &Inventory,
        source: &Recorder,
        report: &mut MergeReport,
    ) -> Result<()> {
        let filter = RecorderFilter::new()
            .serial(source.serial())
            .model(source.model())
            .producer(source.producer());
        let Some(&target) = self.get_recorder(&filter).first() else {
            return self.copy_recorder(incoming, source, report);
        };

        if let Some(recorder) = self.store.recorders.get_mut(target) {
            recorder.set_description(source.description().map(str::to_string));
        }
        report.merged += 1;

        for stream in source.streams.iter().filter_map(|id| incoming.stream(*id)) {
            match self.find_stream_in(target, stream.name()) {
                Some(existing) => self.merge_stream(incoming, existing, stream, report)?,
                None => self.copy_stream(incoming, target, stream, report)?,
            }
        }
        Ok(())
    }

    fn copy_recorder(
        &mut self,
        incoming: &Inventory,
        source: &Recorder,
        report: &mut MergeReport,
    ) -> Result<()> {
        let Some(target) = self.add_recorder(source.detached_copy()) else {
            report.skipped += 1;
            return Ok(());
        };
        report.added += 1;
        for stream in source.streams.iter().filter_map(|id| incoming.stream(*id)) {
            self.copy_stream(incoming, target, stream, report)?;
        }
        Ok(())
    }

    fn copy_stream(
        &mut self,
        incoming: &Inventory,
        recorder: RecorderId,
        source: &RecorderStream,
        report: &mut MergeReport,
    ) -> Result<()> {
        let Some(target) = self.add_recorder_stream(recorder, source.detached_copy()) else {
            report.skipped += 1;
            return Ok(());
        };
        report.added += 1;
        self.rewire_stream(incoming, target, source, report)
    }

    fn merge_stream(
        &mut self,
        incoming: &Inventory,
        target: StreamId,
        source: &RecorderStream,
        report: &mut MergeReport,
    ) -> Result<()> {
        let mut changed = false;
        if let Some(stream) = self.store.streams.get_mut(target) {
            changed |= stream.set_label(source.label().map(str::to_string));
            let owner = format!("stream {}", stream.name());
            if merge_parameters(stream.parameters_mut(), source.parameters(), &owner)? {
                stream.has_changed = true;
                changed = true;
            }
        }
        if changed {
            self.mark_stream_changed(target);
        }
        report.merged += 1;
        self.rewire_stream(incoming, target, source, report)
    }

    /// Replace the component assignments of `target` by those of `source`.
    fn rewire_stream(
        &mut self,
        incoming: &Inventory,
        target: StreamId,
        source: &RecorderStream,
        report: &mut MergeReport,
    ) -> Result<()> {
        let ctx = self.log_context();
        let mut wanted = Vec::with_capacity(source.components.len());
        for assignment in &source.components {
            match incoming.component_key(assignment.item) {
                Some(key) => {
                    let component = self.resolve_component(&key)?;
                    wanted.push(assignment.map(|_| component));
                }
                None => log::warn!(
                    "{} MERGE_ASSIGNMENT_SKIPPED stream={} reason=detached_component",
                    ctx,
                    source.name()
                ),
            }
        }

        let current = self.require_stream(target)?;
        check_timeline(
            &wanted,
            &format!("a component of stream {}", current.name()),
            |_, _| true,
        )?;
        if current.components == wanted {
            return Ok(());
        }

        if let Some(stream) = self.store.streams.get_mut(target) {
            log::debug!(
                "{} STREAM_REWIRED stream={} components={}",
                ctx,
                stream.name(),
                wanted.len()
            );
            stream.components = wanted;
        }
        self.mark_stream_changed(target);
        report.rewired += 1;
        Ok(())
    }

    // Networks

    fn merge_network(
        &mut self,
        incoming: &Inventory,
        source: &Network,
        report: &mut MergeReport,
    ) -> Result<()> {
        let Some(target) = self.find_network(source.name()) else {
            return self.copy_network(incoming, source, report);
        };

        if let Some(network) = self.store.networks.get_mut(target) {
            network.set_description(source.description().map(str::to_string));
            network.set_kind(source.kind().map(str::to_string));
        }
        report.merged += 1;

        for station in source.stations.iter().filter_map(|id| incoming.station(*id)) {
            match self.find_station_in(target, station.name(), station.location()) {
                Some(existing) => self.merge_station(incoming, existing, station, report)?,
                None => self.copy_station(incoming, target, station, report)?,
            }
        }
        Ok(())
    }

    fn copy_network(
        &mut self,
        incoming: &Inventory,
        source: &Network,
        report: &mut MergeReport,
    ) -> Result<()> {
        let Some(target) = self.add_network(source.detached_copy()) else {
            report.skipped += 1;
            return Ok(());
        };
        report.added += 1;
        for station in source.stations.iter().filter_map(|id| incoming.station(*id)) {
            self.copy_station(incoming, target, station, report)?;
        }
        Ok(())
    }

    fn copy_station(
        &mut self,
        incoming: &Inventory,
        network: NetworkId,
        source: &Station,
        report: &mut MergeReport,
    ) -> Result<()> {
        let Some(target) = self.add_station(network, source.detached_copy()) else {
            report.skipped += 1;
            return Ok(());
        };
        report.added += 1;
        for channel in source.channels.iter().filter_map(|id| incoming.channel(*id)) {
            self.copy_channel(incoming, target, channel, report)?;
        }
        Ok(())
    }

    fn merge_station(
        &mut self,
        incoming: &Inventory,
        target: StationId,
        source: &Station,
        report: &mut MergeReport,
    ) -> Result<()> {
        if let Some(station) = self.store.stations.get_mut(target) {
            station.set_description(source.description().map(str::to_string));
            station.set_position(source.x(), source.y(), source.z(), source.coord_system());
        }
        report.merged += 1;

        for channel in source.channels.iter().filter_map(|id| incoming.channel(*id)) {
            match self.find_channel_in(target, channel.name()) {
                Some(existing) => {
                    if let Some(c) = self.store.channels.get_mut(existing) {
                        c.set_description(channel.description().map(str::to_string));
                    }
                    report.merged += 1;
                    self.rewire_channel(incoming, existing, channel, report)?;
                }
                None => self.copy_channel(incoming, target, channel, report)?,
            }
        }
        Ok(())
    }

    fn copy_channel(
        &mut self,
        incoming: &Inventory,
        station: StationId,
        source: &Channel,
        report: &mut MergeReport,
    ) -> Result<()> {
        let Some(target) = self.add_channel(station, source.detached_copy()) else {
            report.skipped += 1;
            return Ok(());
        };
        report.added += 1;
        self.rewire_channel(incoming, target, source, report)
    }

    /// Replace the stream assignments of `target` by those of `source`.
    fn rewire_channel(
        &mut self,
        incoming: &Inventory,
        target: ChannelId,
        source: &Channel,
        report: &mut MergeReport,
    ) -> Result<()> {
        let ctx = self.log_context();
        let mut wanted = Vec::with_capacity(source.streams.len());
        for assignment in &source.streams {
            match incoming.stream_key(assignment.item) {
                Some(key) => {
                    let stream = self.resolve_stream(&key)?;
                    wanted.push(assignment.map(|_| stream));
                }
                None => log::warn!(
                    "{} MERGE_ASSIGNMENT_SKIPPED channel={} reason=detached_stream",
                    ctx,
                    source.name()
                ),
            }
        }

        let current = self.require_channel(target)?;
        check_timeline(
            &wanted,
            &format!("a stream of channel {}", current.name()),
            |_, _| true,
        )?;
        if current.streams == wanted {
            return Ok(());
        }

        if let Some(channel) = self.store.channels.get_mut(target) {
            log::debug!(
                "{} CHANNEL_REWIRED channel={} streams={}",
                ctx,
                channel.name(),
                wanted.len()
            );
            channel.streams = wanted;
            channel.has_changed = true;
        }
        report.rewired += 1;
        Ok(())
    }

    // Arrays

    fn merge_array(
        &mut self,
        incoming: &Inventory,
        source: &Array,
        report: &mut MergeReport,
    ) -> Result<()> {
        let target = match self.find_array(source.name()) {
            Some(existing) => {
                if let Some(array) = self.store.arrays.get_mut(existing) {
                    array.set_description(source.description().map(str::to_string));
                }
                report.merged += 1;
                existing
            }
            None => match self.add_array(source.detached_copy()) {
                Some(added) => {
                    report.added += 1;
                    added
                }
                None => {
                    report.skipped += 1;
                    return Ok(());
                }
            },
        };
        self.rewire_array(incoming, target, source, report)
    }

    /// Replace the station memberships of `target` by those of `source`.
    fn rewire_array(
        &mut self,
        incoming: &Inventory,
        target: ArrayId,
        source: &Array,
        report: &mut MergeReport,
    ) -> Result<()> {
        let ctx = self.log_context();
        let mut wanted = Vec::with_capacity(source.stations.len());
        for membership in &source.stations {
            match incoming.station_key(membership.item) {
                Some(key) => {
                    let station = self.resolve_station(&key)?;
                    wanted.push(membership.map(|_| station));
                }
                None => log::warn!(
                    "{} MERGE_ASSIGNMENT_SKIPPED array={} reason=detached_station",
                    ctx,
                    source.name()
                ),
            }
        }

        let current = self.require_array(target)?;
        check_timeline(
            &wanted,
            &format!("a station of array {}", current.name()),
            |a, b| a == b,
        )?;
        if current.stations == wanted {
            return Ok(());
        }

        if let Some(array) = self.store.arrays.get_mut(target) {
            log::debug!(
                "{} ARRAY_REWIRED array={} stations={}",
                ctx,
                array.name(),
                wanted.len()
            );
            array.stations = wanted;
            array.has_changed = true;
        }
        report.rewired += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InventoryConfig;
    use crate::entities::{RecorderStreamParameter, SensorComponentParameter};
    use crate::inventory::{ChannelFilter, ComponentKey, StationKey, StreamFilter, StreamKey};
    use crate::timebox::Timestamp;
    use chrono::{TimeZone, Utc};

    fn t(year: i32, month: u32) -> Timestamp {
        Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0).unwrap()
    }

    /// One fully wired station: XX/S1/00/HHZ <- R1/101 <- S-1/Z.
    fn field_inventory(name: &str) -> Inventory {
        let mut inv = Inventory::new(name);

        let sensor = inv.add_sensor(Sensor::new("S-1", "L4C-3D", "Sercel")).unwrap();
        let component = SensorComponent::new("Z")
            .with_units("m/s", "V", "V")
            .with_parameter(SensorComponentParameter::new(Some(t(2020, 1)), None, Some(276.8)))
            .unwrap();
        inv.add_sensor_component(sensor, component).unwrap();

        let recorder = inv.add_recorder(Recorder::new("R1", "Cube", "Omnirecs")).unwrap();
        let stream = RecorderStream::new("101", Some("Z"))
            .with_parameter(RecorderStreamParameter::new(
                Some(t(2020, 1)),
                None,
                Some(32.0),
                Some(1e-6),
            ))
            .unwrap();
        let stream = inv.add_recorder_stream(recorder, stream).unwrap();
        inv.add_component(
            stream,
            &ComponentKey::new("S-1", "L4C-3D", "Sercel", "Z"),
            Some(t(2020, 1)),
            None,
        )
        .unwrap();

        let network = inv.add_network(Network::new("XX")).unwrap();
        let station = inv
            .add_station(network, Station::new("S1", "00", 15.0, 47.0, 300.0, "epsg:4326"))
            .unwrap();
        let channel = inv.add_channel(station, Channel::new("HHZ")).unwrap();
        inv.add_stream(
            channel,
            &StreamKey::new("R1", "Cube", "Omnirecs", "101"),
            Some(t(2020, 1)),
            Some(t(2020, 2)),
        )
        .unwrap();

        let array = inv.add_array(Array::new("A")).unwrap();
        inv.add_array_station(array, station, Some(t(2020, 1)), None).unwrap();
        inv
    }

    #[test]
    fn test_merge_into_empty_copies_everything() {
        let source = field_inventory("source");
        let mut target = Inventory::new("target");
        let report = target.merge(&source).unwrap();

        assert_eq!(report.rewired, 3);
        assert_eq!(report.skipped, 0);
        assert_eq!(target.sensors().len(), 1);
        assert_eq!(target.recorders().len(), 1);

        let channel = target.get_channel(&ChannelFilter::new().name("HHZ"))[0];
        let boxes = target
            .channel_streams(channel, &StreamFilter::default(), None, None)
            .unwrap();
        assert_eq!(boxes.len(), 1);
        // The assignment points into the target, not the source
        assert!(target.stream(boxes[0].item).is_some());
        assert!(source.stream(boxes[0].item).is_none());
    }

    #[test]
    fn test_merge_is_idempotent() {
        let source = field_inventory("source");
        let mut target = Inventory::new("target");
        target.merge(&source).unwrap();
        target.clear_changes();

        let report = target.merge(&source).unwrap();
        assert_eq!(report.added, 0);
        assert_eq!(report.rewired, 0);
        assert!(!target.has_changed());
    }

    #[test]
    fn test_merge_updates_scalars_and_parameters() {
        let mut target = field_inventory("target");
        target.clear_changes();

        let mut source = field_inventory("source");
        let network = source.find_network("XX").unwrap();
        source.network_mut(network).unwrap().set_description(Some("test net".into()));
        let sensor = source.find_sensor("S-1").unwrap();
        let component = source.find_component_in(sensor, "Z").unwrap();
        source
            .component_mut(component)
            .unwrap()
            .remove_parameter(&crate::timebox::TimeSpan::new(Some(t(2020, 1)), None));
        source
            .component_mut(component)
            .unwrap()
            .add_parameter(SensorComponentParameter::new(Some(t(2021, 1)), None, Some(100.0)))
            .unwrap();

        target.merge(&source).unwrap();

        let network = target.find_network("XX").unwrap();
        assert_eq!(target.network(network).unwrap().description(), Some("test net"));
        let sensor = target.find_sensor("S-1").unwrap();
        let component = target.find_component_in(sensor, "Z").unwrap();
        let params = target.component(component).unwrap().parameters();
        assert_eq!(params.len(), 1);
        assert_eq!(params[0].sensitivity(), Some(100.0));
        assert!(target.has_changed());
    }

    #[test]
    fn test_merge_replaces_assignments() {
        let mut target = field_inventory("target");
        let mut source = field_inventory("source");
        let station = source.resolve_station(&StationKey::new("XX", "S1", "00")).unwrap();
        let channel = source.find_channel_in(station, "HHZ").unwrap();
        source
            .add_stream(
                channel,
                &StreamKey::new("R1", "Cube", "Omnirecs", "101"),
                Some(t(2020, 2)),
                Some(t(2020, 3)),
            )
            .unwrap();

        let report = target.merge(&source).unwrap();
        assert_eq!(report.rewired, 1);

        let station = target.resolve_station(&StationKey::new("XX", "S1", "00")).unwrap();
        let channel = target.find_channel_in(station, "HHZ").unwrap();
        assert_eq!(target.channel(channel).unwrap().streams().len(), 2);
    }

    #[test]
    fn test_atomic_merge_rolls_back() {
        let mut target = Inventory::new("target");
        target.add_network(Network::new("YY")).unwrap();
        // Holding serial R1 under another model makes the incoming recorder clash
        target.add_recorder(Recorder::new("R1", "Taurus", "Nanometrics")).unwrap();
        let before = target.clone();

        let source = field_inventory("source");
        let err = target.merge(&source).unwrap_err();
        assert!(matches!(err, InventoryError::UnresolvedReference { .. }));
        assert_eq!(target.networks(), before.networks());
        assert_eq!(target.recorders(), before.recorders());
        assert!(target.sensors().is_empty());
    }

    #[test]
    fn test_non_atomic_merge_keeps_partial_state() {
        let config = InventoryConfig {
            atomic_merge: false,
            ..InventoryConfig::default()
        };
        let mut target = Inventory::with_config("target", config);
        target.add_recorder(Recorder::new("R1", "Taurus", "Nanometrics")).unwrap();

        let source = field_inventory("source");
        assert!(target.merge(&source).is_err());
        // Sensors are merged before the failing channel assignment
        assert_eq!(target.sensors().len(), 1);
    }

    #[test]
    fn test_serial_clash_is_skipped() {
        let mut target = Inventory::new("target");
        target.add_sensor(Sensor::new("S-1", "Other", "Acme")).unwrap();

        let mut source = Inventory::new("source");
        source.add_sensor(Sensor::new("S-1", "L4C-3D", "Sercel")).unwrap();

        let report = target.merge(&source).unwrap();
        assert_eq!(report.skipped, 1);
        assert_eq!(target.sensors().len(), 1);
    }
}
