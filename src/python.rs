//! Python bindings for the workbench host.
//!
//! Inventories cross the boundary as nested-dictionary JSON strings; every
//! call rebuilds the inventory, runs one operation and hands back JSON,
//! CSV or XML text.

use std::collections::HashMap;

use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use pyo3::types::PyDict;

use crate::config::InventoryConfig;
use crate::error::InventoryError;
use crate::inventory::{ChannelFilter, DataFrameLevel, Inventory};
use crate::logging::init_logger;
use crate::serialization::{DictStyle, InventoryDict};
use crate::timebox::Timestamp;

fn to_py_err(err: InventoryError) -> PyErr {
    PyValueError::new_err(err.to_string())
}

fn load_config(config_json: Option<&str>) -> PyResult<InventoryConfig> {
    match config_json {
        Some(json) => InventoryConfig::from_json(json).map_err(to_py_err),
        None => Ok(InventoryConfig::default()),
    }
}

fn load_inventory(json: &str, config: &InventoryConfig) -> PyResult<Inventory> {
    let dict: InventoryDict =
        serde_json::from_str(json).map_err(|e| to_py_err(InventoryError::from(e)))?;
    Inventory::from_dict_with_config(&dict, config.clone()).map_err(to_py_err)
}

/// Merge `incoming_json` into `target_json`.
///
/// # Returns
/// The merged inventory as JSON and a dict with the merge counts.
#[pyfunction]
#[pyo3(signature = (target_json, incoming_json, config_json=None))]
fn merge_inventories(
    py: Python<'_>,
    target_json: &str,
    incoming_json: &str,
    config_json: Option<&str>,
) -> PyResult<(String, Py<PyAny>)> {
    let config = load_config(config_json)?;
    init_logger(&config);

    let mut target = load_inventory(target_json, &config)?;
    let incoming = load_inventory(incoming_json, &config)?;
    let report = target.merge(&incoming).map_err(to_py_err)?;

    let counts = PyDict::new(py);
    counts.set_item("added", report.added)?;
    counts.set_item("merged", report.merged)?;
    counts.set_item("rewired", report.rewired)?;
    counts.set_item("skipped", report.skipped)?;

    Ok((target.to_json().map_err(to_py_err)?, counts.into()))
}

/// Seed-style (channel rows) export of an inventory.
#[pyfunction]
fn export_seed(inventory_json: &str) -> PyResult<String> {
    let config = InventoryConfig::default();
    init_logger(&config);
    let inventory = load_inventory(inventory_json, &config)?;
    let value = inventory.export(DictStyle::Seed).map_err(to_py_err)?;
    serde_json::to_string(&value).map_err(|e| to_py_err(e.into()))
}

/// StationXML of the running deployments.
#[pyfunction]
fn export_stationxml(inventory_json: &str) -> PyResult<String> {
    let config = InventoryConfig::default();
    init_logger(&config);
    let inventory = load_inventory(inventory_json, &config)?;
    let document = inventory.to_stationxml().map_err(to_py_err)?;
    Ok(document.to_xml())
}

/// Channel search with string keys (network, station, location, name).
///
/// # Returns
/// `station:channel:network:location` codes of the matching channels.
#[pyfunction]
#[pyo3(signature = (inventory_json, search, config_json=None))]
fn search_channels(
    inventory_json: &str,
    search: HashMap<String, String>,
    config_json: Option<&str>,
) -> PyResult<Vec<String>> {
    let config = load_config(config_json)?;
    init_logger(&config);
    let inventory = load_inventory(inventory_json, &config)?;
    let filter: ChannelFilter = inventory
        .filter_from_pairs(search.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .map_err(to_py_err)?;
    Ok(inventory
        .get_channel(&filter)
        .into_iter()
        .filter_map(|id| inventory.scnl(id))
        .map(|scnl| scnl.to_string())
        .collect())
}

/// Station or channel report at `at` (RFC 3339) as CSV.
#[pyfunction]
#[pyo3(signature = (inventory_json, level, at))]
fn inventory_report(inventory_json: &str, level: &str, at: &str) -> PyResult<String> {
    let config = InventoryConfig::default();
    init_logger(&config);
    let level: DataFrameLevel = level.parse().map_err(to_py_err)?;
    let at: Timestamp = at
        .parse()
        .map_err(|e| PyValueError::new_err(format!("invalid time '{}': {}", at, e)))?;
    let inventory = load_inventory(inventory_json, &config)?;
    let frame = inventory.to_dataframe(level, at).map_err(to_py_err)?;
    Ok(frame.to_csv())
}

/// Python module definition
#[pymodule]
fn psysmon_geometry(_py: Python<'_>, m: &PyModule) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(merge_inventories, m)?)?;
    m.add_function(wrap_pyfunction!(export_seed, m)?)?;
    m.add_function(wrap_pyfunction!(export_stationxml, m)?)?;
    m.add_function(wrap_pyfunction!(search_channels, m)?)?;
    m.add_function(wrap_pyfunction!(inventory_report, m)?)?;
    Ok(())
}
