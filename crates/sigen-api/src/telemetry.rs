//! Telemetry decoding for the MQTT `period` channel.
//!
//! The cloud sends one entry per device, with every value as a string in
//! watts. [`TelemetryRecord::from_entry`] turns an entry into kW with the
//! sign conventions below and never fails: an absent or unparsable field
//! becomes `0.0` and the rest of the entry is still decoded.
//!
//! | Field              | Convention                                        |
//! |--------------------|---------------------------------------------------|
//! | `pv_power_kw`      | always >= 0                                       |
//! | `battery_power_kw` | + discharging / - charging (upstream is inverted) |
//! | `grid_power_kw`    | + importing / - exporting (matches upstream)      |
//! | `load_power_kw`    | always >= 0                                       |

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

const PV_POWER: &str = "pvPowerW";
const BATTERY_POWER: &str = "storageChargeDischargePowerW";
const BATTERY_SOC: &str = "storageSOC%";
const GRID_POWER: &str = "gridActivePowerW";
const LOAD_POWER: &str = "loadActivePowerW";

const WATTS_PER_KW: f64 = 1000.0;

/// One decoded telemetry entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TelemetryRecord {
    pub timestamp: String,
    pub system_id: String,
    pub device_type: String,
    pub pv_power_kw: f64,
    /// Positive while discharging, negative while charging. This is the
    /// negation of the upstream `storageChargeDischargePowerW`.
    pub battery_power_kw: f64,
    pub soc_percent: f64,
    /// Positive while importing, negative while exporting.
    pub grid_power_kw: f64,
    pub load_power_kw: f64,
    /// Every upstream value, stringified.
    pub raw_fields: BTreeMap<String, String>,
}

impl TelemetryRecord {
    /// Decode one raw entry: `{statisticsTime, systemId, deviceType, value: {...}}`.
    pub fn from_entry(entry: &Value) -> Self {
        let values = entry.get("value").and_then(Value::as_object);
        let number = |key: &str| values.and_then(|v| v.get(key)).map_or(0.0, as_f64);

        Self {
            timestamp: string_field(entry, "statisticsTime"),
            system_id: string_field(entry, "systemId"),
            device_type: string_field(entry, "deviceType"),
            pv_power_kw: number(PV_POWER) / WATTS_PER_KW,
            battery_power_kw: -number(BATTERY_POWER) / WATTS_PER_KW,
            soc_percent: number(BATTERY_SOC),
            grid_power_kw: number(GRID_POWER) / WATTS_PER_KW,
            load_power_kw: number(LOAD_POWER) / WATTS_PER_KW,
            raw_fields: values
                .map(|v| {
                    v.iter()
                        .map(|(k, val)| (k.clone(), stringify(val)))
                        .collect()
                })
                .unwrap_or_default(),
        }
    }
}

/// Split a `period` payload (array of entries or a single object) into entries.
pub fn entries(payload: &Value) -> Vec<&Value> {
    match payload {
        Value::Array(items) => items.iter().collect(),
        other => vec![other],
    }
}

// ── Schema-drift diagnostics ─────────────────────────────────────────

/// Remembers every raw field name seen and logs new ones once.
#[derive(Debug, Default)]
pub struct FieldCatalog {
    seen: Mutex<BTreeSet<String>>,
}

impl FieldCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the field names of one entry. Returns the names not seen before.
    pub fn observe(&self, entry: &Value) -> Vec<String> {
        let Some(values) = entry.get("value").and_then(Value::as_object) else {
            return Vec::new();
        };
        let Ok(mut seen) = self.seen.lock() else {
            return Vec::new();
        };

        let fresh: Vec<String> = values
            .keys()
            .filter(|k| seen.insert((*k).clone()))
            .cloned()
            .collect();

        if !fresh.is_empty() {
            info!(
                new = fresh.len(),
                total = seen.len(),
                fields = %seen.iter().map(String::as_str).collect::<Vec<_>>().join(", "),
                "telemetry fields"
            );
        }
        fresh
    }
}

// ── Helpers ──────────────────────────────────────────────────────────

fn string_field(entry: &Value, key: &str) -> String {
    entry.get(key).map(stringify).unwrap_or_default()
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn as_f64(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()).unwrap_or(0.0),
        _ => 0.0,
    }
}
