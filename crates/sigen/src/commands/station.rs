//! Station and energy-flow handlers.

use serde_json::Value;
use sigen_core::{SigenClient, StationInfo};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

fn yes_no(flag: bool) -> String {
    if flag { "yes".into() } else { "no".into() }
}

fn kilo(value: Option<f64>, unit: &str) -> String {
    value.map(|v| format!("{v} {unit}")).unwrap_or_default()
}

fn station_detail(station: &StationInfo) -> String {
    output::detail_block([
        ("Station ID", station.station_id()),
        ("PV", yes_no(station.has_pv)),
        ("EV", yes_no(station.has_ev)),
        ("AC charger", yes_no(station.has_ac_charger)),
        ("On grid", yes_no(station.on_grid)),
        ("PV capacity", kilo(station.pv_capacity, "kW")),
        ("Battery capacity", kilo(station.battery_capacity, "kWh")),
        ("AC serial", station.ac_serial().unwrap_or("-").to_owned()),
        ("DC serial", station.dc_serial().unwrap_or("-").to_owned()),
    ])
}

pub async fn handle_station(client: &SigenClient, global: &GlobalOpts) -> Result<(), CliError> {
    let station = client.station().await?;
    let out = output::render_single(&global.output, station.as_ref(), station_detail, |s| {
        s.station_id()
    })?;
    output::print_output(&out, global.quiet);
    Ok(())
}

// ── Energy flow ─────────────────────────────────────────────────────

fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "-".into(),
        other => other.to_string(),
    }
}

fn flow_detail(flow: &Value) -> String {
    match flow.as_object() {
        Some(fields) => output::detail_block(fields.iter().map(|(k, v)| (k.as_str(), scalar(v)))),
        None => scalar(flow),
    }
}

fn flow_plain(flow: &Value) -> String {
    flow.as_object()
        .map(|fields| {
            fields
                .iter()
                .map(|(k, v)| format!("{k}={}", scalar(v)))
                .collect::<Vec<_>>()
                .join("\n")
        })
        .unwrap_or_else(|| scalar(flow))
}

pub async fn handle_energy(client: &SigenClient, global: &GlobalOpts) -> Result<(), CliError> {
    let flow = client.energy_flow().await?;
    let out = output::render_single(&global.output, &flow, flow_detail, flow_plain)?;
    output::print_output(&out, global.quiet);
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn flow_plain_is_key_value_lines() {
        let flow = json!({ "batterySoc": "81", "pvPower": 3.2 });
        assert_eq!(flow_plain(&flow), "batterySoc=81\npvPower=3.2");
    }
}
