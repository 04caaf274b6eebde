use serde_json::Value;
use tracing::debug;

use super::models::{SmartLoadCard, SmartLoadConsumption, SmartLoadDetails};
use crate::client::ApiClient;
use crate::error::Error;

pub const SMART_LOAD_OFF: u8 = 0;
pub const SMART_LOAD_ON: u8 = 1;

impl ApiClient {
    /// Basic list of the station's smart loads.
    ///
    /// `GET device/system/device/systemDevice/card?stationId=..&showNewGenerator=true`
    pub async fn smart_load_cards(&self, station_id: &str) -> Result<Vec<SmartLoadCard>, Error> {
        let cards: Option<Vec<SmartLoadCard>> = self
            .get_with_params(
                "device/system/device/systemDevice/card",
                &[
                    ("stationId", station_id.to_owned()),
                    ("showNewGenerator", "true".to_owned()),
                ],
            )
            .await?;
        Ok(cards.unwrap_or_default())
    }

    /// Details for one load, including its numeric `smartLoadId`.
    ///
    /// `GET device/tp-device/smart-loads?stationId=..&loadPath=..`
    pub async fn smart_load_details(
        &self,
        station_id: &str,
        load_path: i64,
    ) -> Result<Option<SmartLoadDetails>, Error> {
        self.get_with_params(
            "device/tp-device/smart-loads",
            &[
                ("stationId", station_id.to_owned()),
                ("loadPath", load_path.to_string()),
            ],
        )
        .await
    }

    /// Today / month / lifetime consumption for one load.
    ///
    /// `GET data-process/sigen/station/statistics/real-time-consumption`
    pub async fn smart_load_consumption(
        &self,
        station_id: &str,
        load_path: i64,
        smart_load_id: i64,
    ) -> Result<SmartLoadConsumption, Error> {
        let consumption: Option<SmartLoadConsumption> = self
            .get_with_params(
                "data-process/sigen/station/statistics/real-time-consumption",
                &[
                    ("stationId", station_id.to_owned()),
                    ("loadPath", load_path.to_string()),
                    ("smartLoadId", smart_load_id.to_string()),
                ],
            )
            .await?;
        Ok(consumption.unwrap_or_default())
    }

    /// Turn a smart load on ([`SMART_LOAD_ON`]) or off ([`SMART_LOAD_OFF`]).
    ///
    /// `PATCH device/tp-device/smart-loads/control-mode/manual/switch`
    pub async fn set_smart_load_state(
        &self,
        station_id: &str,
        load_path: i64,
        state: u8,
    ) -> Result<Value, Error> {
        if state != SMART_LOAD_OFF && state != SMART_LOAD_ON {
            return Err(Error::Validation {
                field: "state".into(),
                reason: format!("smart load state must be 0 (off) or 1 (on), got {state}"),
            });
        }

        debug!(station_id, load_path, state, "switching smart load");
        self.patch_with_params(
            "device/tp-device/smart-loads/control-mode/manual/switch",
            &[
                ("stationId", station_id.to_owned()),
                ("loadPath", load_path.to_string()),
                ("manualSwitch", state.to_string()),
            ],
        )
        .await
    }
}
