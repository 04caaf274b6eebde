use tracing::debug;

use super::models::StationInfo;
use crate::client::ApiClient;
use crate::error::Error;

impl ApiClient {
    /// Station identity, serial numbers, and capabilities.
    ///
    /// `GET device/owner/station/home`
    pub async fn station(&self) -> Result<StationInfo, Error> {
        let station: StationInfo = self.get("device/owner/station/home").await?;
        debug!(
            station_id = %station.station_id(),
            has_pv = station.has_pv,
            has_ev = station.has_ev,
            has_ac_charger = station.has_ac_charger,
            ac_sn_list = ?station.ac_sn_list,
            dc_sn_list = ?station.dc_sn_list,
            on_grid = station.on_grid,
            pv_capacity_kw = ?station.pv_capacity,
            battery_capacity_kwh = ?station.battery_capacity,
            "station info"
        );
        Ok(station)
    }
}
