//! End-to-end wiring of a small field deployment.

use chrono::{TimeZone, Utc};
use psysmon_geometry::entities::{Channel, Network, Recorder, RecorderStream, Sensor, Station};
use psysmon_geometry::inventory::{ChannelFilter, SensorFilter, StreamFilter, StreamKey};
use psysmon_geometry::{Inventory, InventoryError, Timestamp};

fn day(month: u32, day: u32) -> Timestamp {
    Utc.with_ymd_and_hms(2020, month, day, 0, 0, 0).unwrap()
}

fn field_inventory() -> Inventory {
    let mut inv = Inventory::new("scenario");
    let net = inv.add_network(Network::new("XX")).unwrap();
    let station = inv
        .add_station(net, Station::new("S1", "00", 1.0, 2.0, 3.0, "epsg:4326"))
        .unwrap();
    inv.add_channel(station, Channel::new("HHZ")).unwrap();

    let recorder = inv.add_recorder(Recorder::new("R1", "Cube", "Omnirecs")).unwrap();
    inv.add_recorder_stream(recorder, RecorderStream::new("101", None)).unwrap();
    inv.add_recorder_stream(recorder, RecorderStream::new("102", None)).unwrap();
    inv
}

fn hhz(inv: &Inventory) -> psysmon_geometry::inventory::ChannelId {
    let found = inv.get_channel(&ChannelFilter::new().network("XX").station("S1").name("HHZ"));
    assert_eq!(found.len(), 1);
    found[0]
}

#[test]
fn test_stream_assignment_lookup() {
    let mut inv = field_inventory();
    let channel = hhz(&inv);
    let stream_101 = StreamKey::new("R1", "Cube", "Omnirecs", "101");
    inv.add_stream(channel, &stream_101, Some(day(1, 1)), Some(day(2, 1))).unwrap();

    let active = inv
        .channel_streams(channel, &StreamFilter::default(), Some(day(1, 15)), None)
        .unwrap();
    assert_eq!(active.len(), 1);
    let stream = inv.stream(active[0].item).unwrap();
    assert_eq!(stream.name(), "101");
    assert_eq!(inv.stream_key(active[0].item), Some(stream_101));
}

#[test]
fn test_overlapping_stream_assignment_fails() {
    let mut inv = field_inventory();
    let channel = hhz(&inv);
    inv.add_stream(
        channel,
        &StreamKey::new("R1", "Cube", "Omnirecs", "101"),
        Some(day(1, 1)),
        Some(day(2, 1)),
    )
    .unwrap();

    let err = inv
        .add_stream(
            channel,
            &StreamKey::new("R1", "Cube", "Omnirecs", "102"),
            Some(day(1, 15)),
            Some(day(3, 1)),
        )
        .unwrap_err();
    assert!(matches!(err, InventoryError::IntervalConflict { .. }));
    assert_eq!(inv.channel(channel).unwrap().streams().len(), 1);
}

#[test]
fn test_adjacent_stream_assignment_succeeds() {
    let mut inv = field_inventory();
    let channel = hhz(&inv);
    inv.add_stream(
        channel,
        &StreamKey::new("R1", "Cube", "Omnirecs", "101"),
        Some(day(1, 1)),
        Some(day(2, 1)),
    )
    .unwrap();
    inv.add_stream(
        channel,
        &StreamKey::new("R1", "Cube", "Omnirecs", "102"),
        Some(day(2, 1)),
        Some(day(3, 1)),
    )
    .unwrap();

    let at_boundary = inv
        .channel_streams(channel, &StreamFilter::default(), Some(day(2, 1)), Some(day(2, 2)))
        .unwrap();
    assert_eq!(at_boundary.len(), 1);
    assert_eq!(inv.stream(at_boundary[0].item).unwrap().name(), "102");
}

#[test]
fn test_unknown_stream_key_is_unresolved() {
    let mut inv = field_inventory();
    let channel = hhz(&inv);
    let err = inv
        .add_stream(channel, &StreamKey::new("R9", "Cube", "Omnirecs", "101"), None, None)
        .unwrap_err();
    assert!(matches!(err, InventoryError::UnresolvedReference { .. }));
}

#[test]
fn test_duplicate_sensor_add_is_rejected() {
    let mut inv = field_inventory();
    assert!(inv.add_sensor(Sensor::new("S-1", "L4C", "Sercel")).is_some());
    assert!(inv.add_sensor(Sensor::new("S-1", "STS-2", "Streckeisen")).is_none());
    assert_eq!(inv.sensors().len(), 1);
    assert_eq!(inv.get_sensor(&SensorFilter::new().serial("S-1")).len(), 1);
}
