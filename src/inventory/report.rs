//! Tabular station and channel reports.

use std::fmt::Write as _;
use std::str::FromStr;

use serde::Serialize;

use super::geo::{CoordinateTransform, Wgs84Utm};
use super::{Inventory, StreamFilter};
use crate::error::{InventoryError, Result};
use crate::timebox::{Interval, Timestamp};

/// Granularity of a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataFrameLevel {
    Station,
    Channel,
}

impl FromStr for DataFrameLevel {
    type Err = InventoryError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "station" => Ok(Self::Station),
            "channel" => Ok(Self::Channel),
            other => Err(InventoryError::InvalidReportLevel(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StationRow {
    pub name: String,
    pub network: String,
    pub location: String,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub coord_system: String,
    pub x_utm: f64,
    pub y_utm: f64,
    pub coord_system_utm: String,
    pub description: Option<String>,
}

/// One stream deployment of a channel active at the report time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelRow {
    #[serde(flatten)]
    pub station: StationRow,
    pub channel: String,
    pub recorder_model: String,
    pub recorder_serial: String,
    pub bitweight: Option<f64>,
    pub gain: Option<f64>,
    pub sensor_model: Option<String>,
    pub sensor_serial: Option<String>,
    pub sensitivity: Option<f64>,
    /// `gain * sensitivity / bitweight` in counts per input unit.
    pub overall_sensitivity: Option<f64>,
}

/// Rows of a report, ready for CSV output or JSON serialization.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum InventoryFrame {
    Stations(Vec<StationRow>),
    Channels(Vec<ChannelRow>),
}

const STATION_COLUMNS: [&str; 11] = [
    "name",
    "network",
    "location",
    "x",
    "y",
    "z",
    "coord_system",
    "x_utm",
    "y_utm",
    "coord_system_utm",
    "description",
];

const CHANNEL_COLUMNS: [&str; 9] = [
    "channel",
    "recorder_model",
    "recorder_serial",
    "adc_bitweight [V/count]",
    "adc_preamp_gain",
    "sensor_model",
    "sensor_serial",
    "sensor_sensitivity [V/m/s]",
    "overall_sensitivity [count/m/s]",
];

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn opt_number(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn opt_text(value: Option<&str>) -> String {
    value.map(csv_field).unwrap_or_default()
}

impl StationRow {
    fn csv_fields(&self) -> Vec<String> {
        vec![
            csv_field(&self.name),
            csv_field(&self.network),
            csv_field(&self.location),
            self.x.to_string(),
            self.y.to_string(),
            self.z.to_string(),
            csv_field(&self.coord_system),
            self.x_utm.to_string(),
            self.y_utm.to_string(),
            csv_field(&self.coord_system_utm),
            opt_text(self.description.as_deref()),
        ]
    }
}

impl ChannelRow {
    fn csv_fields(&self) -> Vec<String> {
        let mut fields = self.station.csv_fields();
        fields.extend([
            csv_field(&self.channel),
            csv_field(&self.recorder_model),
            csv_field(&self.recorder_serial),
            opt_number(self.bitweight),
            opt_number(self.gain),
            opt_text(self.sensor_model.as_deref()),
            opt_text(self.sensor_serial.as_deref()),
            opt_number(self.sensitivity),
            opt_number(self.overall_sensitivity),
        ]);
        fields
    }
}

impl InventoryFrame {
    pub fn len(&self) -> usize {
        match self {
            Self::Stations(rows) => rows.len(),
            Self::Channels(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn columns(&self) -> Vec<&'static str> {
        match self {
            Self::Stations(_) => STATION_COLUMNS.to_vec(),
            Self::Channels(_) => {
                let mut columns = STATION_COLUMNS.to_vec();
                columns.extend(CHANNEL_COLUMNS);
                columns
            }
        }
    }

    /// Comma separated values with a header line.
    pub fn to_csv(&self) -> String {
        let rows: Vec<Vec<String>> = match self {
            Self::Stations(rows) => rows.iter().map(StationRow::csv_fields).collect(),
            Self::Channels(rows) => rows.iter().map(ChannelRow::csv_fields).collect(),
        };
        let mut out = self.columns().join(",");
        out.push('\n');
        for row in rows {
            let _ = writeln!(out, "{}", row.join(","));
        }
        out
    }
}

impl Inventory {
    /// Build a report of the attached stations, or of the channel
    /// deployments active at `at`, with positions projected to the best
    /// fitting UTM zone.
    ///
    /// Where a deployment carries more than one parameter or component at
    /// `at`, the earliest is reported.
    pub fn to_dataframe(&self, level: DataFrameLevel, at: Timestamp) -> Result<InventoryFrame> {
        self.to_dataframe_with(level, at, &Wgs84Utm)
    }

    pub fn to_dataframe_with(
        &self,
        level: DataFrameLevel,
        at: Timestamp,
        transform: &dyn CoordinateTransform,
    ) -> Result<InventoryFrame> {
        let zone = self.get_utm_epsg_with(transform)?;

        let mut stations = Vec::new();
        let mut channels = Vec::new();
        for (station_id, network, station) in self.attached_stations() {
            let (lon, lat) = self.station_lon_lat_with(station_id, transform)?;
            let (x_utm, y_utm) = transform.from_lon_lat(zone.epsg(), lon, lat)?;
            let station_row = StationRow {
                name: station.name().to_string(),
                network: network.name().to_string(),
                location: station.location().to_string(),
                x: station.x(),
                y: station.y(),
                z: station.z(),
                coord_system: station.coord_system().to_string(),
                x_utm,
                y_utm,
                coord_system_utm: zone.to_string(),
                description: station.description().map(str::to_string),
            };

            if level == DataFrameLevel::Station {
                stations.push(station_row);
                continue;
            }

            for channel_id in station.channels() {
                let Some(channel) = self.channel(*channel_id) else {
                    continue;
                };
                let active = self.channel_streams(*channel_id, &StreamFilter::default(), None, None)?;
                for assignment in active.into_iter().filter(|b| b.contains(at)) {
                    let Some(stream) = self.stream(assignment.item) else {
                        continue;
                    };
                    let Some(recorder) = stream.recorder().and_then(|r| self.recorder(r)) else {
                        continue;
                    };
                    let stream_param = stream.parameter_at(at).into_iter().next();
                    let component = stream
                        .components()
                        .iter()
                        .find(|b| b.contains(at))
                        .and_then(|b| self.component(b.item));
                    let sensor = component.and_then(|c| c.sensor()).and_then(|s| self.sensor(s));
                    let component_param = component.and_then(|c| c.parameter_at(at).into_iter().next());

                    let gain = stream_param.and_then(|p| p.gain());
                    let bitweight = stream_param.and_then(|p| p.bitweight());
                    let sensitivity = component_param.and_then(|p| p.sensitivity());
                    let overall_sensitivity = match (gain, sensitivity, bitweight) {
                        (Some(g), Some(s), Some(b)) if b != 0.0 => Some(g * s / b),
                        _ => None,
                    };

                    channels.push(ChannelRow {
                        station: station_row.clone(),
                        channel: channel.name().to_string(),
                        recorder_model: recorder.model().to_string(),
                        recorder_serial: recorder.serial().to_string(),
                        bitweight,
                        gain,
                        sensor_model: sensor.map(|s| s.model().to_string()),
                        sensor_serial: sensor.map(|s| s.serial().to_string()),
                        sensitivity,
                        overall_sensitivity,
                    });
                }
            }
        }

        let frame = match level {
            DataFrameLevel::Station => InventoryFrame::Stations(stations),
            DataFrameLevel::Channel => InventoryFrame::Channels(channels),
        };
        log::debug!(
            "{} REPORT_BUILT level={:?} rows={}",
            self.log_context(),
            level,
            frame.len()
        );
        Ok(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{
        Channel, Network, Recorder, RecorderStream, RecorderStreamParameter, Sensor,
        SensorComponent, SensorComponentParameter, Station,
    };
    use crate::inventory::{ComponentKey, StreamKey};
    use chrono::{TimeZone, Utc};

    fn t(year: i32) -> Timestamp {
        Utc.with_ymd_and_hms(year, 1, 1, 0, 0, 0).unwrap()
    }

    fn wired() -> Inventory {
        let mut inv = Inventory::new("report");
        let sensor = inv.add_sensor(Sensor::new("S-1", "L4C", "Sercel")).unwrap();
        inv.add_sensor_component(
            sensor,
            SensorComponent::new("Z")
                .with_parameter(SensorComponentParameter::new(Some(t(2020)), None, Some(200.0)))
                .unwrap(),
        )
        .unwrap();
        let recorder = inv.add_recorder(Recorder::new("R1", "Cube", "Omnirecs")).unwrap();
        let stream = inv
            .add_recorder_stream(
                recorder,
                RecorderStream::new("101", None)
                    .with_parameter(RecorderStreamParameter::new(
                        Some(t(2020)),
                        None,
                        Some(4.0),
                        Some(1e-6),
                    ))
                    .unwrap(),
            )
            .unwrap();
        inv.add_component(stream, &ComponentKey::new("S-1", "L4C", "Sercel", "Z"), Some(t(2020)), None)
            .unwrap();

        let net = inv.add_network(Network::new("XX")).unwrap();
        let station = inv
            .add_station(
                net,
                Station::new("S1", "00", 16.0, 48.0, 300.0, "epsg:4326").with_description("hill, north"),
            )
            .unwrap();
        let channel = inv.add_channel(station, Channel::new("HHZ")).unwrap();
        inv.add_stream(channel, &StreamKey::new("R1", "Cube", "Omnirecs", "101"), Some(t(2020)), None)
            .unwrap();
        inv
    }

    #[test]
    fn test_level_from_str() {
        assert_eq!("station".parse::<DataFrameLevel>().unwrap(), DataFrameLevel::Station);
        assert!("network".parse::<DataFrameLevel>().is_err());
    }

    #[test]
    fn test_station_report() {
        let frame = wired().to_dataframe(DataFrameLevel::Station, t(2021)).unwrap();
        let InventoryFrame::Stations(rows) = &frame else {
            panic!("expected station rows");
        };
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].coord_system_utm, "epsg:32633");

        let csv = frame.to_csv();
        let mut lines = csv.lines();
        assert!(lines.next().unwrap().starts_with("name,network,location,x,y,z"));
        assert!(lines.next().unwrap().ends_with("\"hill, north\""));
    }

    #[test]
    fn test_channel_report_sensitivity() {
        let frame = wired().to_dataframe(DataFrameLevel::Channel, t(2021)).unwrap();
        let InventoryFrame::Channels(rows) = frame else {
            panic!("expected channel rows");
        };
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.recorder_serial, "R1");
        assert_eq!(row.sensor_serial.as_deref(), Some("S-1"));
        let overall = row.overall_sensitivity.unwrap();
        assert!((overall - 4.0 * 200.0 / 1e-6).abs() < 1e-3);
    }

    #[test]
    fn test_channel_report_before_deployment() {
        let frame = wired().to_dataframe(DataFrameLevel::Channel, t(2019)).unwrap();
        assert!(frame.is_empty());
    }
}
