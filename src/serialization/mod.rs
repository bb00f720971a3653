//! Import and export formats of the inventory.
//!
//! - `dict` - nested and seed-style dictionaries (JSON)
//! - `stationxml` - FDSN StationXML of the running deployments

pub mod dict;
pub mod stationxml;

pub use dict::*;
pub use stationxml::*;
