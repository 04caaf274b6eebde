use serde_json::Value;

use crate::client::ApiClient;
use crate::error::Error;

impl ApiClient {
    /// One-shot real-time energy flow for a station.
    ///
    /// `GET device/sigen/station/energyflow?id={stationId}`
    pub async fn energy_flow(&self, station_id: &str) -> Result<Value, Error> {
        self.get_with_params(
            "device/sigen/station/energyflow",
            &[("id", station_id.to_owned())],
        )
        .await
    }
}
