use serde_json::{Value, json};
use tracing::debug;

use super::models::{CurrentMode, OperationalModes};
use crate::client::ApiClient;
use crate::error::Error;

/// Profile id sent when selecting a built-in mode.
pub const NO_PROFILE: i64 = -1;

impl ApiClient {
    /// Built-in working modes plus the user's custom energy profiles.
    ///
    /// `GET device/energy-profile/mode/all/{stationId}`
    pub async fn operational_modes(&self, station_id: &str) -> Result<OperationalModes, Error> {
        self.get(&format!("device/energy-profile/mode/all/{station_id}"))
            .await
    }

    /// Raw current-mode reading (mode value + profile id).
    ///
    /// `GET device/energy-profile/mode/current/{stationId}`
    pub async fn current_mode(&self, station_id: &str) -> Result<CurrentMode, Error> {
        self.get(&format!("device/energy-profile/mode/current/{station_id}"))
            .await
    }

    /// Switch the station's operational mode.
    ///
    /// Pass [`NO_PROFILE`] as `profile_id` for built-in modes, and mode `9`
    /// with the profile id for custom profiles. `station_id` goes into the
    /// body as the station reported it (number or string).
    ///
    /// `PUT device/energy-profile/mode`
    pub async fn set_operational_mode(
        &self,
        station_id: &Value,
        mode: i64,
        profile_id: i64,
    ) -> Result<Value, Error> {
        debug!(%station_id, mode, profile_id, "setting operational mode");
        let body = json!({
            "stationId": station_id,
            "operationMode": mode,
            "profileId": profile_id,
        });
        self.put("device/energy-profile/mode", &body).await
    }
}
