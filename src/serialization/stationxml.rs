//! StationXML export.
//!
//! Only the currently running deployments are exported: for every channel
//! the stream assignments without an end time, and within them one channel
//! epoch per component assignment of the stream. The response is built from
//! the single stream parameter and the single component parameter covering
//! the component assignment.

use std::fmt::Write as _;

use num_complex::Complex64;
use serde::Serialize;

use crate::entities::{
    Recorder, RecorderStream, RecorderStreamParameter, Sensor, SensorComponent,
    SensorComponentParameter,
};
use crate::error::{InventoryError, Result};
use crate::inventory::{ComponentId, Inventory};
use crate::timebox::{Interval, TimeBox, Timestamp};

pub const STATIONXML_SCHEMA_VERSION: &str = "1.1";
pub const STATIONXML_SOURCE: &str = "psysmon";

const PZ_TRANSFER_FUNCTION: &str = "LAPLACE (RADIANS/SECOND)";
const STAGE_GAIN_FREQUENCY: f64 = 0.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StationXml {
    pub source: String,
    pub networks: Vec<XmlNetwork>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct XmlNetwork {
    pub code: String,
    pub description: Option<String>,
    pub stations: Vec<XmlStation>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct XmlStation {
    pub code: String,
    pub latitude: f64,
    pub longitude: f64,
    pub elevation: f64,
    pub site: Option<String>,
    pub channels: Vec<XmlChannel>,
}

/// One epoch of a channel: a component deployed on a running stream.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct XmlChannel {
    pub code: String,
    pub location_code: String,
    pub latitude: f64,
    pub longitude: f64,
    pub elevation: f64,
    pub depth: f64,
    pub start_date: Option<Timestamp>,
    pub end_date: Option<Timestamp>,
    pub data_logger: Equipment,
    pub sensor: Equipment,
    pub response: Response,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Equipment {
    /// "producer - model"
    pub kind: String,
    pub manufacturer: String,
    pub model: String,
    pub serial_number: String,
    pub installation_date: Option<Timestamp>,
    pub removal_date: Option<Timestamp>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Response {
    pub instrument_sensitivity: Option<InstrumentSensitivity>,
    pub stages: Vec<ResponseStage>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstrumentSensitivity {
    pub value: f64,
    pub frequency: f64,
    pub input_units: Option<String>,
    pub output_units: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseStage {
    pub number: u32,
    pub gain: Option<f64>,
    pub gain_frequency: f64,
    pub input_units: Option<String>,
    pub output_units: Option<String>,
    pub description: String,
    pub poles_zeros: Option<PolesZeros>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PolesZeros {
    pub transfer_function_type: String,
    pub normalization_factor: Option<f64>,
    pub normalization_frequency: Option<f64>,
    pub zeros: Vec<Complex64>,
    pub poles: Vec<Complex64>,
}

impl Equipment {
    fn new(
        producer: &str,
        model: &str,
        serial: &str,
        installation_date: Option<Timestamp>,
        removal_date: Option<Timestamp>,
    ) -> Self {
        Self {
            kind: format!("{} - {}", producer, model),
            manufacturer: producer.to_string(),
            model: model.to_string(),
            serial_number: serial.to_string(),
            installation_date,
            removal_date,
        }
    }
}

/// At most one parameter may cover a deployment.
fn single_parameter<'a, P>(found: Vec<&'a P>, subject: impl FnOnce() -> String) -> Result<Option<&'a P>> {
    if found.len() > 1 {
        return Err(InventoryError::AmbiguousParameter { subject: subject() });
    }
    Ok(found.into_iter().next())
}

fn build_response(
    recorder: &Recorder,
    stream: &RecorderStream,
    stream_param: Option<&RecorderStreamParameter>,
    sensor: &Sensor,
    component: &SensorComponent,
    component_param: Option<&SensorComponentParameter>,
) -> Response {
    let mut response = Response::default();

    if let Some(param) = component_param {
        let poles_zeros = (!param.poles().is_empty() && !param.zeros().is_empty()).then(|| PolesZeros {
            transfer_function_type: PZ_TRANSFER_FUNCTION.to_string(),
            normalization_factor: param.tf_normalization_factor(),
            normalization_frequency: param.tf_normalization_frequency(),
            zeros: param.zeros().to_vec(),
            poles: param.poles().to_vec(),
        });
        response.stages.push(ResponseStage {
            number: 0,
            gain: param.sensitivity(),
            gain_frequency: STAGE_GAIN_FREQUENCY,
            input_units: component.output_unit().map(str::to_string),
            output_units: component.deliver_unit().map(str::to_string),
            description: [sensor.producer(), sensor.model(), sensor.serial(), component.name()].join(","),
            poles_zeros,
        });
    }

    if let Some(param) = stream_param {
        let description = [recorder.producer(), recorder.model(), recorder.serial(), stream.name()].join(",");
        response.stages.push(ResponseStage {
            number: 0,
            gain: param.gain(),
            gain_frequency: STAGE_GAIN_FREQUENCY,
            input_units: Some("V".to_string()),
            output_units: Some("V".to_string()),
            description: description.clone(),
            poles_zeros: None,
        });
        response.stages.push(ResponseStage {
            number: 0,
            gain: param.bitweight().filter(|b| *b != 0.0).map(|b| 1.0 / b),
            gain_frequency: STAGE_GAIN_FREQUENCY,
            input_units: Some("V".to_string()),
            output_units: Some("COUNTS".to_string()),
            description,
            poles_zeros: None,
        });
    }

    for (number, stage) in (1..).zip(response.stages.iter_mut()) {
        stage.number = number;
    }

    if let (Some(sensor_param), Some(stream_param)) = (component_param, stream_param) {
        let value = match (sensor_param.sensitivity(), stream_param.gain(), stream_param.bitweight()) {
            (Some(s), Some(g), Some(b)) if b != 0.0 => Some(s * g / b),
            _ => None,
        };
        if let Some(value) = value {
            response.instrument_sensitivity = Some(InstrumentSensitivity {
                value,
                frequency: STAGE_GAIN_FREQUENCY,
                input_units: response.stages.first().and_then(|s| s.input_units.clone()),
                output_units: response.stages.last().and_then(|s| s.output_units.clone()),
            });
        }
    }
    response
}

impl Inventory {
    /// Build the StationXML document of the running deployments.
    ///
    /// Fails with `AmbiguousParameter` when more than one stream or component
    /// parameter covers a component assignment, and with
    /// `UnsupportedCoordinateSystem` for stations that can't be located.
    pub fn to_stationxml(&self) -> Result<StationXml> {
        let mut networks = Vec::new();
        for network in self.networks().iter().filter_map(|id| self.network(*id)) {
            let mut stations = Vec::new();
            for station_id in network.stations() {
                let Some(station) = self.station(*station_id) else {
                    continue;
                };
                let (longitude, latitude) = self.station_lon_lat(*station_id)?;
                let mut channels = Vec::new();

                for channel in station.channels().iter().filter_map(|id| self.channel(*id)) {
                    let running = channel.streams().iter().filter(|b| b.end_time.is_none());
                    for stream_box in running {
                        let Some(stream) = self.stream(stream_box.item) else {
                            continue;
                        };
                        let Some(recorder) = stream.recorder().and_then(|r| self.recorder(r)) else {
                            continue;
                        };
                        let data_logger = Equipment::new(
                            recorder.producer(),
                            recorder.model(),
                            recorder.serial(),
                            stream_box.start_time,
                            stream_box.end_time,
                        );

                        for component_box in stream.components() {
                            let Some(component) = self.component(component_box.item) else {
                                continue;
                            };
                            let Some(sensor) = component.sensor().and_then(|s| self.sensor(s)) else {
                                continue;
                            };
                            channels.push(self.channel_epoch(
                                channel.name(),
                                station.location(),
                                (longitude, latitude, station.z()),
                                component_box,
                                data_logger.clone(),
                                (recorder, stream),
                                (sensor, component),
                            )?);
                        }
                    }
                }

                stations.push(XmlStation {
                    code: station.name().to_string(),
                    latitude,
                    longitude,
                    elevation: station.z(),
                    site: station.description().map(str::to_string),
                    channels,
                });
            }
            networks.push(XmlNetwork {
                code: network.name().to_string(),
                description: network.description().map(str::to_string),
                stations,
            });
        }

        log::debug!(
            "{} STATIONXML_BUILT networks={} channels={}",
            self.log_context(),
            networks.len(),
            networks
                .iter()
                .flat_map(|n| &n.stations)
                .map(|s| s.channels.len())
                .sum::<usize>()
        );
        Ok(StationXml {
            source: STATIONXML_SOURCE.to_string(),
            networks,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn channel_epoch(
        &self,
        code: &str,
        location: &str,
        (longitude, latitude, elevation): (f64, f64, f64),
        component_box: &TimeBox<ComponentId>,
        data_logger: Equipment,
        (recorder, stream): (&Recorder, &RecorderStream),
        (sensor, component): (&Sensor, &SensorComponent),
    ) -> Result<XmlChannel> {
        let (start, end) = (component_box.start_time, component_box.end_time);
        let stream_param = single_parameter(stream.get_parameter(start, end), || {
            format!("stream {} of recorder {} {}", stream.name(), recorder.serial(), component_box.span())
        })?;
        let component_param = single_parameter(component.get_parameter(start, end), || {
            format!("component {} of sensor {} {}", component.name(), sensor.serial(), component_box.span())
        })?;

        Ok(XmlChannel {
            code: code.to_string(),
            location_code: location.to_string(),
            latitude,
            longitude,
            elevation,
            depth: 0.0,
            start_date: start,
            end_date: end,
            data_logger,
            sensor: Equipment::new(sensor.producer(), sensor.model(), sensor.serial(), start, end),
            response: build_response(recorder, stream, stream_param, sensor, component, component_param),
        })
    }
}

// XML rendering

fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

fn date(t: Timestamp) -> String {
    t.format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}

fn date_attributes(start: Option<Timestamp>, end: Option<Timestamp>) -> String {
    let mut attrs = String::new();
    if let Some(start) = start {
        let _ = write!(attrs, " startDate=\"{}\"", date(start));
    }
    if let Some(end) = end {
        let _ = write!(attrs, " endDate=\"{}\"", date(end));
    }
    attrs
}

fn text_element(out: &mut String, indent: usize, tag: &str, value: &str) {
    let _ = writeln!(out, "{:indent$}<{tag}>{}</{tag}>", "", escape(value), indent = indent);
}

fn units_element(out: &mut String, indent: usize, tag: &str, unit: Option<&str>) {
    if let Some(unit) = unit {
        let _ = writeln!(out, "{:indent$}<{tag}>", "", indent = indent);
        text_element(out, indent + 2, "Name", unit);
        let _ = writeln!(out, "{:indent$}</{tag}>", "", indent = indent);
    }
}

impl Equipment {
    fn write_xml(&self, out: &mut String, indent: usize, tag: &str) {
        let _ = writeln!(out, "{:indent$}<{tag}>", "", indent = indent);
        let inner = indent + 2;
        text_element(out, inner, "Type", &self.kind);
        text_element(out, inner, "Manufacturer", &self.manufacturer);
        text_element(out, inner, "Model", &self.model);
        text_element(out, inner, "SerialNumber", &self.serial_number);
        if let Some(t) = self.installation_date {
            text_element(out, inner, "InstallationDate", &date(t));
        }
        if let Some(t) = self.removal_date {
            text_element(out, inner, "RemovalDate", &date(t));
        }
        let _ = writeln!(out, "{:indent$}</{tag}>", "", indent = indent);
    }
}

impl ResponseStage {
    fn write_xml(&self, out: &mut String, indent: usize) {
        let _ = writeln!(out, "{:indent$}<Stage number=\"{}\">", "", self.number, indent = indent);
        let inner = indent + 2;
        if let Some(pz) = &self.poles_zeros {
            let _ = writeln!(out, "{:inner$}<PolesZeros>", "", inner = inner);
            let body = inner + 2;
            text_element(out, body, "Description", &self.description);
            units_element(out, body, "InputUnits", self.input_units.as_deref());
            units_element(out, body, "OutputUnits", self.output_units.as_deref());
            text_element(out, body, "PzTransferFunctionType", &pz.transfer_function_type);
            if let Some(factor) = pz.normalization_factor {
                text_element(out, body, "NormalizationFactor", &factor.to_string());
            }
            if let Some(frequency) = pz.normalization_frequency {
                text_element(out, body, "NormalizationFrequency", &frequency.to_string());
            }
            for (tag, values) in [("Zero", &pz.zeros), ("Pole", &pz.poles)] {
                for (number, value) in values.iter().enumerate() {
                    let _ = writeln!(
                        out,
                        "{:body$}<{tag} number=\"{number}\"><Real>{}</Real><Imaginary>{}</Imaginary></{tag}>",
                        "",
                        value.re,
                        value.im,
                        body = body
                    );
                }
            }
            let _ = writeln!(out, "{:inner$}</PolesZeros>", "", inner = inner);
        } else {
            let _ = writeln!(out, "{:inner$}<Coefficients>", "", inner = inner);
            let body = inner + 2;
            text_element(out, body, "Description", &self.description);
            units_element(out, body, "InputUnits", self.input_units.as_deref());
            units_element(out, body, "OutputUnits", self.output_units.as_deref());
            text_element(out, body, "CfTransferFunctionType", "DIGITAL");
            let _ = writeln!(out, "{:inner$}</Coefficients>", "", inner = inner);
        }
        if let Some(gain) = self.gain {
            let _ = writeln!(out, "{:inner$}<StageGain>", "", inner = inner);
            text_element(out, inner + 2, "Value", &gain.to_string());
            text_element(out, inner + 2, "Frequency", &self.gain_frequency.to_string());
            let _ = writeln!(out, "{:inner$}</StageGain>", "", inner = inner);
        }
        let _ = writeln!(out, "{:indent$}</Stage>", "", indent = indent);
    }
}

impl XmlChannel {
    fn write_xml(&self, out: &mut String, indent: usize) {
        let _ = writeln!(
            out,
            "{:indent$}<Channel code=\"{}\" locationCode=\"{}\"{}>",
            "",
            escape(&self.code),
            escape(&self.location_code),
            date_attributes(self.start_date, self.end_date),
            indent = indent
        );
        let inner = indent + 2;
        text_element(out, inner, "Latitude", &self.latitude.to_string());
        text_element(out, inner, "Longitude", &self.longitude.to_string());
        text_element(out, inner, "Elevation", &self.elevation.to_string());
        text_element(out, inner, "Depth", &self.depth.to_string());
        self.sensor.write_xml(out, inner, "Sensor");
        self.data_logger.write_xml(out, inner, "DataLogger");

        let _ = writeln!(out, "{:inner$}<Response>", "", inner = inner);
        let body = inner + 2;
        if let Some(sensitivity) = &self.response.instrument_sensitivity {
            let _ = writeln!(out, "{:body$}<InstrumentSensitivity>", "", body = body);
            text_element(out, body + 2, "Value", &sensitivity.value.to_string());
            text_element(out, body + 2, "Frequency", &sensitivity.frequency.to_string());
            units_element(out, body + 2, "InputUnits", sensitivity.input_units.as_deref());
            units_element(out, body + 2, "OutputUnits", sensitivity.output_units.as_deref());
            let _ = writeln!(out, "{:body$}</InstrumentSensitivity>", "", body = body);
        }
        for stage in &self.response.stages {
            stage.write_xml(out, body);
        }
        let _ = writeln!(out, "{:inner$}</Response>", "", inner = inner);
        let _ = writeln!(out, "{:indent$}</Channel>", "", indent = indent);
    }
}

impl StationXml {
    pub fn channel_count(&self) -> usize {
        self.networks
            .iter()
            .flat_map(|n| &n.stations)
            .map(|s| s.channels.len())
            .sum()
    }

    /// Render the document as FDSN StationXML.
    pub fn to_xml(&self) -> String {
        let mut out = String::new();
        out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        let _ = writeln!(
            out,
            "<FDSNStationXML xmlns=\"http://www.fdsn.org/xml/station/1\" schemaVersion=\"{}\">",
            STATIONXML_SCHEMA_VERSION
        );
        text_element(&mut out, 2, "Source", &self.source);
        text_element(&mut out, 2, "Created", &date(chrono::Utc::now()));

        for network in &self.networks {
            let _ = writeln!(out, "  <Network code=\"{}\">", escape(&network.code));
            if let Some(description) = &network.description {
                text_element(&mut out, 4, "Description", description);
            }
            for station in &network.stations {
                let _ = writeln!(out, "    <Station code=\"{}\">", escape(&station.code));
                text_element(&mut out, 6, "Latitude", &station.latitude.to_string());
                text_element(&mut out, 6, "Longitude", &station.longitude.to_string());
                text_element(&mut out, 6, "Elevation", &station.elevation.to_string());
                out.push_str("      <Site>\n");
                text_element(&mut out, 8, "Name", station.site.as_deref().unwrap_or(&station.code));
                out.push_str("      </Site>\n");
                text_element(&mut out, 6, "CreationDate", "1970-01-01T00:00:00.000000Z");
                for channel in &station.channels {
                    channel.write_xml(&mut out, 6);
                }
                out.push_str("    </Station>\n");
            }
            out.push_str("  </Network>\n");
        }
        out.push_str("</FDSNStationXML>\n");
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{Channel, Network, Station};
    use crate::inventory::{ComponentKey, StreamKey};
    use chrono::{TimeZone, Utc};

    fn t(year: i32) -> Timestamp {
        Utc.with_ymd_and_hms(year, 1, 1, 0, 0, 0).unwrap()
    }

    fn deployed(stream_end: Option<Timestamp>) -> Inventory {
        let mut inv = Inventory::new("xml");
        let sensor = inv.add_sensor(Sensor::new("S-1", "L4C", "Sercel")).unwrap();
        let mut parameter = SensorComponentParameter::new(Some(t(2020)), None, Some(200.0));
        parameter.set_transfer_function(Some("laplace"), Some("m/s"), Some(1.0), Some(1.0));
        parameter.add_complex_pole(Complex64::new(-4.44, 4.44));
        parameter.add_complex_zero(Complex64::new(0.0, 0.0));
        inv.add_sensor_component(
            sensor,
            SensorComponent::new("Z")
                .with_units("m/s", "V", "V")
                .with_parameter(parameter)
                .unwrap(),
        )
        .unwrap();

        let recorder = inv.add_recorder(Recorder::new("R1", "Cube", "Omnirecs")).unwrap();
        let stream = inv
            .add_recorder_stream(
                recorder,
                RecorderStream::new("101", None)
                    .with_parameter(RecorderStreamParameter::new(Some(t(2020)), None, Some(4.0), Some(1e-6)))
                    .unwrap(),
            )
            .unwrap();
        inv.add_component(stream, &ComponentKey::new("S-1", "L4C", "Sercel", "Z"), Some(t(2020)), None)
            .unwrap();

        let net = inv.add_network(Network::new("XX").with_description("test & net")).unwrap();
        let station = inv
            .add_station(net, Station::new("S1", "00", 16.0, 48.0, 300.0, "epsg:4326"))
            .unwrap();
        let channel = inv.add_channel(station, Channel::new("HHZ")).unwrap();
        inv.add_stream(channel, &StreamKey::new("R1", "Cube", "Omnirecs", "101"), Some(t(2020)), stream_end)
            .unwrap();
        inv
    }

    #[test]
    fn test_response_stages() {
        let doc = deployed(None).to_stationxml().unwrap();
        assert_eq!(doc.channel_count(), 1);
        let channel = &doc.networks[0].stations[0].channels[0];
        assert_eq!(channel.data_logger.kind, "Omnirecs - Cube");
        assert_eq!(channel.sensor.serial_number, "S-1");

        let stages = &channel.response.stages;
        assert_eq!(stages.len(), 3);
        assert!(stages[0].poles_zeros.is_some());
        assert_eq!(stages[0].description, "Sercel,L4C,S-1,Z");
        assert_eq!(stages[1].gain, Some(4.0));
        assert_eq!(stages[2].output_units.as_deref(), Some("COUNTS"));
        assert_eq!(stages.iter().map(|s| s.number).collect::<Vec<_>>(), vec![1, 2, 3]);

        let sensitivity = channel.response.instrument_sensitivity.as_ref().unwrap();
        assert!((sensitivity.value - 200.0 * 4.0 / 1e-6).abs() < 1e-3);
        assert_eq!(sensitivity.input_units.as_deref(), Some("V"));
    }

    #[test]
    fn test_ended_streams_are_skipped() {
        let doc = deployed(Some(t(2021))).to_stationxml().unwrap();
        assert_eq!(doc.networks[0].stations.len(), 1);
        assert_eq!(doc.channel_count(), 0);
    }

    #[test]
    fn test_ambiguous_parameter_fails() {
        let mut inv = deployed(None);
        let stream = inv.resolve_stream(&StreamKey::new("R1", "Cube", "Omnirecs", "101")).unwrap();
        let stream = inv.stream_mut(stream).unwrap();
        stream.remove_parameter(&crate::timebox::TimeSpan::new(Some(t(2020)), None));
        stream
            .add_parameter(RecorderStreamParameter::new(Some(t(2020)), Some(t(2022)), Some(1.0), Some(1e-6)))
            .unwrap();
        stream
            .add_parameter(RecorderStreamParameter::new(Some(t(2022)), None, Some(2.0), Some(1e-6)))
            .unwrap();

        let err = inv.to_stationxml().unwrap_err();
        assert!(matches!(err, InventoryError::AmbiguousParameter { .. }));
    }

    #[test]
    fn test_xml_is_escaped() {
        let xml = deployed(None).to_stationxml().unwrap().to_xml();
        assert!(xml.starts_with("<?xml"));
        assert!(xml.contains("<Description>test &amp; net</Description>"));
        assert!(xml.contains("<Channel code=\"HHZ\" locationCode=\"00\" startDate=\"2020-01-01T00:00:00.000000Z\">"));
        assert!(xml.contains("<PzTransferFunctionType>LAPLACE (RADIANS/SECOND)</PzTransferFunctionType>"));
    }
}
