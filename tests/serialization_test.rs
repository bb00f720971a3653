//! Dictionary round trips and exports.

use chrono::{TimeZone, Utc};
use num_complex::Complex64;
use psysmon_geometry::entities::{
    Array, Channel, Network, Recorder, RecorderStream, RecorderStreamParameter, Sensor,
    SensorComponent, SensorComponentParameter, Station,
};
use psysmon_geometry::inventory::{ComponentKey, StationKey, StreamKey};
use psysmon_geometry::serialization::SeedInventoryDict;
use psysmon_geometry::{DictStyle, EntityDict, EntityRef, Inventory, InventoryDict, Timestamp};

fn t(year: i32, month: u32) -> Timestamp {
    Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0).unwrap()
}

fn l4c_parameter(start: Timestamp, end: Option<Timestamp>) -> SensorComponentParameter {
    let mut parameter = SensorComponentParameter::new(Some(start), end, Some(276.8));
    parameter.set_transfer_function(Some("laplace"), Some("m/s"), Some(1.0), Some(1.0));
    parameter.add_complex_pole(Complex64::new(-4.21, 4.66));
    parameter.add_complex_pole(Complex64::new(-4.21, -4.66));
    parameter.add_complex_zero(Complex64::new(0.0, 0.0));
    parameter.add_complex_zero(Complex64::new(0.0, 0.0));
    parameter
}

fn survey() -> Inventory {
    let mut inv = Inventory::new("survey").with_kind("temporary");

    let sensor = inv
        .add_sensor(Sensor::new("S-1", "L4C-3D", "Sercel").with_description("borehole"))
        .unwrap();
    let component = SensorComponent::new("Z")
        .with_units("m/s", "V", "V")
        .with_parameter(l4c_parameter(t(2020, 1), Some(t(2021, 1))))
        .unwrap()
        .with_parameter(l4c_parameter(t(2021, 1), None))
        .unwrap();
    inv.add_sensor_component(sensor, component).unwrap();

    let recorder = inv.add_recorder(Recorder::new("R1", "Cube", "Omnirecs")).unwrap();
    let stream = RecorderStream::new("101", Some("Z"))
        .with_parameter(RecorderStreamParameter::new(Some(t(2020, 1)), None, Some(32.0), Some(1.5e-7)))
        .unwrap();
    let stream = inv.add_recorder_stream(recorder, stream).unwrap();
    inv.add_component(stream, &ComponentKey::new("S-1", "L4C-3D", "Sercel", "Z"), Some(t(2020, 3)), None)
        .unwrap();

    let net = inv.add_network(Network::new("XX").with_description("survey net")).unwrap();
    let station = inv
        .add_station(net, Station::new("S1", "", 16.37, 48.21, 180.0, "epsg:4326"))
        .unwrap();
    let channel = inv.add_channel(station, Channel::new("HHZ")).unwrap();
    inv.add_stream(
        channel,
        &StreamKey::new("R1", "Cube", "Omnirecs", "101"),
        Some(t(2020, 1)),
        Some(t(2020, 6)),
    )
    .unwrap();

    let array = inv.add_array(Array::new("ring")).unwrap();
    inv.add_array_station(array, station, Some(t(2020, 1)), None).unwrap();
    inv
}

#[test]
fn test_round_trip_keeps_transfer_functions() {
    let inv = survey();
    let restored = Inventory::from_json(&inv.to_json().unwrap()).unwrap();
    assert_eq!(restored, inv);

    let sensor = restored.sensors()[0];
    let component = restored.sensor(sensor).unwrap().components()[0];
    let parameters = restored.component(component).unwrap().parameters();
    assert_eq!(parameters.len(), 2);
    assert_eq!(parameters[0].poles()[1], Complex64::new(-4.21, -4.66));
    assert_eq!(parameters[1].zeros().len(), 2);
}

#[test]
fn test_round_trip_through_value() {
    let inv = survey();
    let value = inv.export(DictStyle::Nested).unwrap();
    let dict: InventoryDict = serde_json::from_value(value).unwrap();
    let restored = Inventory::from_dict(&dict).unwrap();
    assert_eq!(restored.as_dict(), dict);

    let array = &dict.arrays[0];
    assert_eq!(array.stations[0].item, StationKey::new("XX", "S1", "--"));
}

#[test]
fn test_seed_export_flattens_deployments() {
    let value = survey().export(DictStyle::Seed).unwrap();
    let seed: SeedInventoryDict = serde_json::from_value(value).unwrap();
    let rows = &seed.networks[0].stations[0].channels;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].start_time, Some(t(2020, 3)));
    assert_eq!(rows[0].end_time, Some(t(2020, 6)));
    assert_eq!(rows[0].recorder_serial, "R1");
    assert_eq!(rows[0].component_name, "Z");
}

#[test]
fn test_entity_dict_round_trips_through_json() {
    let inv = survey();
    let sensor = inv.sensors()[0];
    let dict = inv.entity_dict(EntityRef::Sensor(sensor)).unwrap();
    let json = serde_json::to_string(&dict).unwrap();
    assert!(json.contains("\"entity\":\"sensor\""));

    let decoded: EntityDict = serde_json::from_str(&json).unwrap();
    let EntityDict::Sensor(sensor_dict) = decoded else {
        panic!("expected a sensor dict");
    };
    assert_eq!(sensor_dict.serial, "S-1");
    assert_eq!(sensor_dict.components[0].parameters.len(), 2);
}

#[test]
fn test_stationxml_exports_closed_streams_as_nothing() {
    let doc = survey().to_stationxml().unwrap();
    assert_eq!(doc.networks.len(), 1);
    assert_eq!(doc.channel_count(), 0);
}
