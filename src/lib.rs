//! psysmon geometry - deployment history of a seismic network
//!
//! This crate holds the geometry inventory of the psysmon workbench: which
//! recorder and sensor were installed at which station, and when. It is
//! exposed to Python via PyO3 (feature `python`). The implementation
//! prioritizes:
//!
//! 1. **Consistency** - assignments never overlap, merges are atomic by default
//! 2. **Logging** - every decision point logged with inventory context
//! 3. **Plain data** - entities are values, wiring lives in the inventory
//!
//! ## Architecture
//!
//! The crate is organized into modules:
//! - `timebox` - time spans, the intersection rule and time-boxed assignments
//! - `entities` - networks, stations, channels, recorders, sensors, arrays
//! - `inventory` - the aggregate root: storage, search, assignment, merge,
//!   UTM helpers and reports
//! - `serialization` - nested/seed dictionaries and StationXML
//! - `config` - filter policy, merge atomicity and log level
//! - `logging` - structured logging with inventory context
//! - `error` - the error taxonomy

pub mod config;
pub mod entities;
pub mod error;
pub mod inventory;
pub mod logging;
pub mod serialization;
pub mod timebox;

#[cfg(feature = "python")]
mod python;

pub use config::{FilterPolicy, InventoryConfig};
pub use error::{InventoryError, Result};
pub use inventory::{EntityRef, Inventory, MergeReport};
pub use logging::init_logger;
pub use serialization::{DictStyle, EntityDict, InventoryDict, StationXml};
pub use timebox::{TimeBox, TimeSpan, Timestamp};
