//! Geographic helpers: coordinate systems, UTM zones and station positions.
//!
//! Station coordinates are stored in the system named by their
//! `coord_system` code (`epsg:<code>`). Conversions go through the
//! `CoordinateTransform` trait; `Wgs84Utm` covers geographic WGS84
//! (EPSG:4326) and the WGS84 UTM zones (EPSG:326xx north, 327xx south).

use std::f64::consts::PI;
use std::fmt;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::{Inventory, StationId};
use crate::entities::Snl;
use crate::error::{InventoryError, Result};

pub const EPSG_WGS84: u32 = 4326;

lazy_static! {
    static ref EPSG_PATTERN: Regex = Regex::new(r"(?i)^\s*epsg:(\d+)\s*$").unwrap();
}

// WGS84 ellipsoid and UTM constants
const WGS84_A: f64 = 6_378_137.0;
const WGS84_F: f64 = 1.0 / 298.257_223_563;
const UTM_K0: f64 = 0.9996;
const UTM_FALSE_EASTING: f64 = 500_000.0;
const UTM_FALSE_NORTHING_SOUTH: f64 = 10_000_000.0;

/// Parse an `epsg:<code>` coordinate system string.
pub fn parse_epsg(coord_system: &str) -> Result<u32> {
    EPSG_PATTERN
        .captures(coord_system)
        .and_then(|caps| caps.get(1))
        .and_then(|code| code.as_str().parse().ok())
        .ok_or_else(|| InventoryError::UnsupportedCoordinateSystem(coord_system.to_string()))
}

/// UTM zone number (1 to 60) containing a longitude in degrees.
pub fn lon_to_utm_zone(lon: f64) -> u8 {
    let zone = ((lon + 180.0) / 6.0).floor() as i64 + 1;
    zone.clamp(1, 60) as u8
}

/// A WGS84 UTM zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtmZone {
    pub zone: u8,
    pub south: bool,
}

impl UtmZone {
    pub fn new(zone: u8, south: bool) -> Self {
        Self { zone, south }
    }

    pub fn from_lon_lat(lon: f64, lat: f64) -> Self {
        Self::new(lon_to_utm_zone(lon), lat < 0.0)
    }

    pub fn from_epsg(code: u32) -> Option<Self> {
        match code {
            32601..=32660 => Some(Self::new((code - 32600) as u8, false)),
            32701..=32760 => Some(Self::new((code - 32700) as u8, true)),
            _ => None,
        }
    }

    pub fn epsg(&self) -> u32 {
        if self.south {
            32700 + u32::from(self.zone)
        } else {
            32600 + u32::from(self.zone)
        }
    }

    /// Longitude of the central meridian in degrees.
    pub fn central_meridian(&self) -> f64 {
        f64::from(self.zone) * 6.0 - 183.0
    }
}

impl fmt::Display for UtmZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "epsg:{}", self.epsg())
    }
}

/// Conversion between a coordinate system and WGS84 longitude/latitude.
pub trait CoordinateTransform {
    /// Convert `(x, y)` in `epsg` to `(lon, lat)` in degrees.
    fn to_lon_lat(&self, epsg: u32, x: f64, y: f64) -> Result<(f64, f64)>;

    /// Convert `(lon, lat)` in degrees to `(x, y)` in `epsg`.
    fn from_lon_lat(&self, epsg: u32, lon: f64, lat: f64) -> Result<(f64, f64)>;
}

/// Transverse Mercator on the WGS84 ellipsoid.
#[derive(Debug, Clone, Copy, Default)]
pub struct Wgs84Utm;

impl Wgs84Utm {
    fn zone(epsg: u32) -> Result<UtmZone> {
        UtmZone::from_epsg(epsg)
            .ok_or_else(|| InventoryError::UnsupportedCoordinateSystem(format!("epsg:{}", epsg)))
    }

    fn forward(zone: UtmZone, lon: f64, lat: f64) -> (f64, f64) {
        let e2 = WGS84_F * (2.0 - WGS84_F);
        let ep2 = e2 / (1.0 - e2);
        let phi = lat.to_radians();
        let lambda0 = zone.central_meridian().to_radians();

        let n = WGS84_A / (1.0 - e2 * phi.sin().powi(2)).sqrt();
        let t = phi.tan().powi(2);
        let c = ep2 * phi.cos().powi(2);
        let a = phi.cos() * (lon.to_radians() - lambda0);
        let m = meridian_arc(phi, e2);

        let x = UTM_K0
            * n
            * (a + (1.0 - t + c) * a.powi(3) / 6.0
                + (5.0 - 18.0 * t + t * t + 72.0 * c - 58.0 * ep2) * a.powi(5) / 120.0)
            + UTM_FALSE_EASTING;
        let mut y = UTM_K0
            * (m + n
                * phi.tan()
                * (a * a / 2.0
                    + (5.0 - t + 9.0 * c + 4.0 * c * c) * a.powi(4) / 24.0
                    + (61.0 - 58.0 * t + t * t + 600.0 * c - 330.0 * ep2) * a.powi(6) / 720.0));
        if zone.south {
            y += UTM_FALSE_NORTHING_SOUTH;
        }
        (x, y)
    }

    fn inverse(zone: UtmZone, x: f64, y: f64) -> (f64, f64) {
        let e2 = WGS84_F * (2.0 - WGS84_F);
        let ep2 = e2 / (1.0 - e2);
        let e1 = (1.0 - (1.0 - e2).sqrt()) / (1.0 + (1.0 - e2).sqrt());
        let northing = if zone.south {
            y - UTM_FALSE_NORTHING_SOUTH
        } else {
            y
        };

        let m = northing / UTM_K0;
        let mu = m / (WGS84_A * (1.0 - e2 / 4.0 - 3.0 * e2.powi(2) / 64.0 - 5.0 * e2.powi(3) / 256.0));
        let phi1 = mu
            + (3.0 * e1 / 2.0 - 27.0 * e1.powi(3) / 32.0) * (2.0 * mu).sin()
            + (21.0 * e1.powi(2) / 16.0 - 55.0 * e1.powi(4) / 32.0) * (4.0 * mu).sin()
            + (151.0 * e1.powi(3) / 96.0) * (6.0 * mu).sin()
            + (1097.0 * e1.powi(4) / 512.0) * (8.0 * mu).sin();

        let sin1 = phi1.sin();
        let c1 = ep2 * phi1.cos().powi(2);
        let t1 = phi1.tan().powi(2);
        let n1 = WGS84_A / (1.0 - e2 * sin1 * sin1).sqrt();
        let r1 = WGS84_A * (1.0 - e2) / (1.0 - e2 * sin1 * sin1).powf(1.5);
        let d = (x - UTM_FALSE_EASTING) / (n1 * UTM_K0);

        let phi = phi1
            - (n1 * phi1.tan() / r1)
                * (d * d / 2.0
                    - (5.0 + 3.0 * t1 + 10.0 * c1 - 4.0 * c1 * c1 - 9.0 * ep2) * d.powi(4) / 24.0
                    + (61.0 + 90.0 * t1 + 298.0 * c1 + 45.0 * t1 * t1 - 252.0 * ep2 - 3.0 * c1 * c1)
                        * d.powi(6)
                        / 720.0);
        let lambda = (d - (1.0 + 2.0 * t1 + c1) * d.powi(3) / 6.0
            + (5.0 - 2.0 * c1 + 28.0 * t1 - 3.0 * c1 * c1 + 8.0 * ep2 + 24.0 * t1 * t1) * d.powi(5)
                / 120.0)
            / phi1.cos();

        (
            zone.central_meridian() + lambda * 180.0 / PI,
            phi * 180.0 / PI,
        )
    }
}

fn meridian_arc(phi: f64, e2: f64) -> f64 {
    let e4 = e2 * e2;
    let e6 = e4 * e2;
    WGS84_A
        * ((1.0 - e2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0) * phi
            - (3.0 * e2 / 8.0 + 3.0 * e4 / 32.0 + 45.0 * e6 / 1024.0) * (2.0 * phi).sin()
            + (15.0 * e4 / 256.0 + 45.0 * e6 / 1024.0) * (4.0 * phi).sin()
            - (35.0 * e6 / 3072.0) * (6.0 * phi).sin())
}

impl CoordinateTransform for Wgs84Utm {
    fn to_lon_lat(&self, epsg: u32, x: f64, y: f64) -> Result<(f64, f64)> {
        if epsg == EPSG_WGS84 {
            return Ok((x, y));
        }
        Ok(Self::inverse(Self::zone(epsg)?, x, y))
    }

    fn from_lon_lat(&self, epsg: u32, lon: f64, lat: f64) -> Result<(f64, f64)> {
        if epsg == EPSG_WGS84 {
            return Ok((lon, lat));
        }
        Ok(Self::forward(Self::zone(epsg)?, lon, lat))
    }
}

/// A station position projected to UTM.
#[derive(Debug, Clone, PartialEq)]
pub struct StationUtm {
    pub station: StationId,
    pub snl: Snl,
    pub x: f64,
    pub y: f64,
    pub zone: UtmZone,
}

impl Inventory {
    /// WGS84 longitude and latitude of a station.
    pub fn station_lon_lat(&self, station: StationId) -> Result<(f64, f64)> {
        self.station_lon_lat_with(station, &Wgs84Utm)
    }

    pub fn station_lon_lat_with(
        &self,
        station: StationId,
        transform: &dyn CoordinateTransform,
    ) -> Result<(f64, f64)> {
        let station = self.require_station(station)?;
        let epsg = parse_epsg(station.coord_system())?;
        transform.to_lon_lat(epsg, station.x(), station.y())
    }

    /// UTM zone best fitting the stations of the inventory.
    ///
    /// The zone is taken at the centre of the bounding box of all station
    /// positions; the hemisphere follows the sign of its latitude.
    pub fn get_utm_epsg(&self) -> Result<UtmZone> {
        self.get_utm_epsg_with(&Wgs84Utm)
    }

    pub fn get_utm_epsg_with(&self, transform: &dyn CoordinateTransform) -> Result<UtmZone> {
        let mut positions = Vec::new();
        for (id, _, _) in self.attached_stations() {
            positions.push(self.station_lon_lat_with(id, transform)?);
        }
        if positions.is_empty() {
            log::error!("{} UTM_ZONE_FAILED reason=no_stations", self.log_context());
            return Err(InventoryError::NoStations);
        }

        let (lon_min, lon_max, lat_min, lat_max) = positions.iter().fold(
            (f64::MAX, f64::MIN, f64::MAX, f64::MIN),
            |(lo_min, lo_max, la_min, la_max), (lon, lat)| {
                (lo_min.min(*lon), lo_max.max(*lon), la_min.min(*lat), la_max.max(*lat))
            },
        );
        let lon = (lon_min + lon_max) / 2.0;
        let lat = (lat_min + lat_max) / 2.0;
        let zone = UtmZone::from_lon_lat(lon, lat);
        log::debug!("{} UTM_ZONE zone={} stations={}", self.log_context(), zone, positions.len());
        Ok(zone)
    }

    /// Every attached station projected to the best fitting UTM zone.
    pub fn compute_utm_coordinates(&self) -> Result<Vec<StationUtm>> {
        self.compute_utm_coordinates_with(&Wgs84Utm)
    }

    pub fn compute_utm_coordinates_with(
        &self,
        transform: &dyn CoordinateTransform,
    ) -> Result<Vec<StationUtm>> {
        let zone = self.get_utm_epsg_with(transform)?;
        let mut projected = Vec::new();
        for (id, network, station) in self.attached_stations() {
            let (lon, lat) = self.station_lon_lat_with(id, transform)?;
            let (x, y) = transform.from_lon_lat(zone.epsg(), lon, lat)?;
            projected.push(StationUtm {
                station: id,
                snl: Snl::new(station.name(), network.name(), station.location()),
                x,
                y,
                zone,
            });
        }
        Ok(projected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{Network, Station};

    #[test]
    fn test_parse_epsg() {
        assert_eq!(parse_epsg("epsg:4326").unwrap(), 4326);
        assert_eq!(parse_epsg(" EPSG:32633 ").unwrap(), 32633);
        assert!(matches!(
            parse_epsg("wgs84"),
            Err(InventoryError::UnsupportedCoordinateSystem(_))
        ));
    }

    #[test]
    fn test_utm_zone() {
        assert_eq!(lon_to_utm_zone(15.5), 33);
        assert_eq!(lon_to_utm_zone(-180.0), 1);
        assert_eq!(lon_to_utm_zone(180.0), 60);
        assert_eq!(UtmZone::new(33, false).epsg(), 32633);
        assert_eq!(UtmZone::new(19, true).epsg(), 32719);
        assert_eq!(UtmZone::from_epsg(32719), Some(UtmZone::new(19, true)));
        assert_eq!(UtmZone::new(33, false).central_meridian(), 15.0);
    }

    #[test]
    fn test_central_meridian_projects_to_false_easting() {
        let (x, y) = Wgs84Utm.from_lon_lat(32633, 15.0, 0.0).unwrap();
        assert!((x - 500_000.0).abs() < 1e-6);
        assert!(y.abs() < 1e-6);
    }

    #[test]
    fn test_forward_inverse() {
        // Vienna
        let (x, y) = Wgs84Utm.from_lon_lat(32633, 16.3738, 48.2082).unwrap();
        assert!((x - 601_000.0).abs() < 2_000.0);
        assert!((y - 5_340_000.0).abs() < 5_000.0);

        let (lon, lat) = Wgs84Utm.to_lon_lat(32633, x, y).unwrap();
        assert!((lon - 16.3738).abs() < 1e-5);
        assert!((lat - 48.2082).abs() < 1e-5);
    }

    #[test]
    fn test_southern_hemisphere() {
        let (x, y) = Wgs84Utm.from_lon_lat(32719, -70.0, -33.0).unwrap();
        assert!(y > 6_000_000.0 && y < 10_000_000.0);
        let (lon, lat) = Wgs84Utm.to_lon_lat(32719, x, y).unwrap();
        assert!((lon + 70.0).abs() < 1e-5);
        assert!((lat + 33.0).abs() < 1e-5);
    }

    #[test]
    fn test_get_utm_epsg_needs_stations() {
        let inv = Inventory::new("empty");
        assert!(matches!(inv.get_utm_epsg(), Err(InventoryError::NoStations)));
    }

    #[test]
    fn test_compute_utm_coordinates() {
        let mut inv = Inventory::new("geo");
        let net = inv.add_network(Network::new("XX")).unwrap();
        inv.add_station(net, Station::new("S1", "00", 15.8, 48.1, 200.0, "epsg:4326"))
            .unwrap();
        inv.add_station(net, Station::new("S2", "00", 16.2, 48.3, 250.0, "epsg:4326"))
            .unwrap();

        let zone = inv.get_utm_epsg().unwrap();
        assert_eq!(zone, UtmZone::new(33, false));

        let rows = inv.compute_utm_coordinates().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].snl.to_string(), "S1:XX:00");
        assert!(rows[0].x < rows[1].x);
    }

    #[test]
    fn test_projected_station_position() {
        let mut inv = Inventory::new("geo");
        let net = inv.add_network(Network::new("XX")).unwrap();
        let (x, y) = Wgs84Utm.from_lon_lat(32633, 16.0, 47.5).unwrap();
        let station = inv
            .add_station(net, Station::new("S1", "", x, y, 0.0, "epsg:32633"))
            .unwrap();
        let (lon, lat) = inv.station_lon_lat(station).unwrap();
        assert!((lon - 16.0).abs() < 1e-5);
        assert!((lat - 47.5).abs() < 1e-5);
    }
}
