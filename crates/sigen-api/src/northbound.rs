// Northbound (developer) API
//
// Board systems onto an app and read/switch the energy-storage operating
// mode. Same `{ code, msg, data }` envelope as the app API; the client
// must hold key or account credentials.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::client::ApiClient;
use crate::error::Error;

/// Northbound operating-mode values.
pub struct NorthboundMode;

impl NorthboundMode {
    /// Maximum self-consumption.
    pub const MSC: i64 = 0;
    /// Fully feed-in to grid.
    pub const FFG: i64 = 5;
    /// Virtual power plant.
    pub const VPP: i64 = 6;
    /// North bound; required before instructions are accepted.
    pub const NBI: i64 = 8;
}

/// Per-system outcome of an onboard/offboard request.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardResult {
    pub system_id: String,
    #[serde(default)]
    pub result: bool,
    #[serde(default)]
    pub code_list: Vec<i64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModeSettings {
    energy_storage_operation_mode: i64,
}

impl ApiClient {
    /// Authorize systems for this app. Must precede instruction calls.
    ///
    /// `POST openapi/board/onboard`
    pub async fn onboard(&self, system_ids: &[String]) -> Result<Vec<BoardResult>, Error> {
        let results: Option<Vec<BoardResult>> =
            self.post("openapi/board/onboard", system_ids).await?;
        let results = results.unwrap_or_default();
        for item in &results {
            if item.result {
                info!(system_id = %item.system_id, "onboarded system");
            } else {
                warn!(system_id = %item.system_id, codes = ?item.code_list, "onboard failed");
            }
        }
        Ok(results)
    }

    /// Revoke this app's authorization for systems.
    ///
    /// `POST openapi/board/offboard`
    pub async fn offboard(&self, system_ids: &[String]) -> Result<Vec<BoardResult>, Error> {
        let results: Option<Vec<BoardResult>> =
            self.post("openapi/board/offboard", system_ids).await?;
        let results = results.unwrap_or_default();
        for item in &results {
            info!(system_id = %item.system_id, result = item.result, "offboarded system");
        }
        Ok(results)
    }

    /// Current energy-storage operating mode.
    ///
    /// `GET openapi/instruction/{systemId}/settings`
    pub async fn query_mode(&self, system_id: &str) -> Result<i64, Error> {
        let settings: ModeSettings = self
            .get(&format!("openapi/instruction/{system_id}/settings"))
            .await?;
        Ok(settings.energy_storage_operation_mode)
    }

    /// Switch the energy-storage operating mode (see [`NorthboundMode`]).
    ///
    /// `PUT openapi/instruction/settings`
    pub async fn switch_mode(&self, system_id: &str, mode: i64) -> Result<Value, Error> {
        let body = json!({
            "systemId": system_id,
            "energyStorageOperationMode": mode,
        });
        self.put("openapi/instruction/settings", &body).await
    }
}
