// App API response types
//
// These types match the `data` payloads the app REST endpoints return.
// Fields use `#[serde(default)]` liberally because payloads vary between
// firmware and account types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ── Station ──────────────────────────────────────────────────────────

/// Station summary from `GET device/owner/station/home`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StationInfo {
    /// Stations identify themselves with a number on some accounts and a
    /// string on others; kept as raw JSON and normalised by [`Self::station_id`].
    #[serde(rename = "stationId")]
    pub station_id_raw: Value,
    #[serde(default)]
    pub has_pv: bool,
    #[serde(default)]
    pub has_ev: bool,
    #[serde(default)]
    pub has_ac_charger: bool,
    #[serde(default)]
    pub ac_sn_list: Vec<String>,
    #[serde(default)]
    pub dc_sn_list: Vec<String>,
    #[serde(default)]
    pub on_grid: bool,
    #[serde(default)]
    pub pv_capacity: Option<f64>,
    #[serde(default)]
    pub battery_capacity: Option<f64>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl StationInfo {
    /// Station id as text, for paths and query strings. JSON bodies take
    /// [`station_id_raw`](Self::station_id_raw) as-is.
    pub fn station_id(&self) -> String {
        match &self.station_id_raw {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }

    /// First AC charger serial, only when the station reports an AC charger.
    pub fn ac_serial(&self) -> Option<&str> {
        if self.has_ac_charger {
            self.ac_sn_list.first().map(String::as_str)
        } else {
            None
        }
    }

    /// First DC serial, if any.
    pub fn dc_serial(&self) -> Option<&str> {
        self.dc_sn_list.first().map(String::as_str)
    }
}

// ── Operational modes ────────────────────────────────────────────────

/// Mode value that means "custom energy profile, match by profile id".
pub const CUSTOM_PROFILE_MODE: i64 = 9;

/// All modes available to a station, from
/// `GET device/energy-profile/mode/all/{stationId}`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationalModes {
    #[serde(default)]
    pub default_working_modes: Vec<WorkingMode>,
    #[serde(default)]
    pub energy_profile_items: Vec<EnergyProfile>,
}

/// A built-in working mode. `value` arrives as a numeric string.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkingMode {
    pub label: String,
    #[serde(deserialize_with = "string_or_number")]
    pub value: String,
}

impl WorkingMode {
    pub fn mode_value(&self) -> Option<i64> {
        self.value.trim().parse().ok()
    }
}

/// A user-defined energy profile.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnergyProfile {
    pub profile_id: i64,
    pub name: String,
}

/// Current mode from `GET device/energy-profile/mode/current/{stationId}`.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentMode {
    pub current_mode: i64,
    #[serde(default)]
    pub current_profile_id: Option<i64>,
}

impl OperationalModes {
    /// Resolve a current-mode reading to its display label.
    ///
    /// Mode `9` is matched by profile id against the custom profiles;
    /// every other value is matched against the built-in modes.
    pub fn label_for(&self, current: CurrentMode) -> Option<&str> {
        if current.current_mode == CUSTOM_PROFILE_MODE {
            let profile_id = current.current_profile_id?;
            self.energy_profile_items
                .iter()
                .find(|p| p.profile_id == profile_id)
                .map(|p| p.name.as_str())
        } else {
            self.default_working_modes
                .iter()
                .find(|m| m.mode_value() == Some(current.current_mode))
                .map(|m| m.label.as_str())
        }
    }
}

// ── Smart loads ──────────────────────────────────────────────────────

/// Smart load card from `GET device/system/device/systemDevice/card`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SmartLoadCard {
    #[serde(default)]
    pub path: Option<i64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl SmartLoadCard {
    pub fn display_name(&self) -> String {
        match (&self.name, self.path) {
            (Some(name), _) => name.clone(),
            (None, Some(path)) => format!("Load {path}"),
            (None, None) => "Load".to_owned(),
        }
    }
}

/// Details for one load from `GET device/tp-device/smart-loads`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SmartLoadDetails {
    #[serde(default)]
    pub smart_load_id: Option<i64>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// Consumption counters from
/// `GET data-process/sigen/station/statistics/real-time-consumption`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SmartLoadConsumption {
    #[serde(default)]
    pub today_consumption: Option<String>,
    #[serde(default)]
    pub month_consumption: Option<String>,
    #[serde(default)]
    pub lifetime_consumption: Option<String>,
}

// ── Helpers ──────────────────────────────────────────────────────────

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, got {other}"
        ))),
    }
}
