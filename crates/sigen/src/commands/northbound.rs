//! Northbound (developer) API handlers.

use serde::Serialize;
use tabled::Tabled;

use sigen_core::{BoardResult, NorthboundMode, SigenClient};

use crate::cli::{GlobalOpts, NorthboundArgs, NorthboundCommand, NorthboundModeArg};
use crate::error::CliError;
use crate::output;

impl NorthboundModeArg {
    fn value(self) -> i64 {
        match self {
            Self::Msc => NorthboundMode::MSC,
            Self::Ffg => NorthboundMode::FFG,
            Self::Vpp => NorthboundMode::VPP,
            Self::Nbi => NorthboundMode::NBI,
        }
    }
}

fn mode_name(value: i64) -> &'static str {
    match value {
        NorthboundMode::MSC => "msc",
        NorthboundMode::FFG => "ffg",
        NorthboundMode::VPP => "vpp",
        NorthboundMode::NBI => "nbi",
        _ => "unknown",
    }
}

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct BoardRow {
    #[tabled(rename = "System")]
    system: String,
    #[tabled(rename = "Result")]
    result: &'static str,
    #[tabled(rename = "Codes")]
    codes: String,
}

impl From<&BoardResult> for BoardRow {
    fn from(r: &BoardResult) -> Self {
        Self {
            system: r.system_id.clone(),
            result: if r.result { "ok" } else { "failed" },
            codes: r
                .code_list
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(","),
        }
    }
}

#[derive(Serialize)]
struct ModeView {
    system_id: String,
    mode: i64,
    name: &'static str,
}

/// Explicit ids, or the station id when none were given.
async fn target_systems(
    client: &SigenClient,
    system_ids: Vec<String>,
) -> Result<Vec<String>, CliError> {
    if system_ids.is_empty() {
        Ok(vec![client.station_id().await?])
    } else {
        Ok(system_ids)
    }
}

fn render_board(results: &[BoardResult], global: &GlobalOpts) -> Result<(), CliError> {
    let out = output::render_list(&global.output, results, |r| BoardRow::from(r), |r| {
        format!("{} {}", r.system_id, r.result)
    })?;
    output::print_output(&out, global.quiet);
    Ok(())
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    client: &SigenClient,
    args: NorthboundArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        NorthboundCommand::Onboard { system_ids } => {
            let ids = target_systems(client, system_ids).await?;
            let results = client.nb_onboard(&ids).await?;
            render_board(&results, global)
        }

        NorthboundCommand::Offboard { system_ids } => {
            let ids = target_systems(client, system_ids).await?;
            let results = client.nb_offboard(&ids).await?;
            render_board(&results, global)
        }

        NorthboundCommand::Query { system } => {
            let system_id = match system {
                Some(id) => id,
                None => client.station_id().await?,
            };
            let mode = client.nb_query_mode(Some(&system_id)).await?;
            let view = ModeView {
                system_id,
                mode,
                name: mode_name(mode),
            };
            let out = output::render_single(
                &global.output,
                &view,
                |v| {
                    output::detail_block([
                        ("System", v.system_id.clone()),
                        ("Mode", format!("{} ({})", v.name, v.mode)),
                    ])
                },
                |v| v.mode.to_string(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        NorthboundCommand::Switch { mode, system } => {
            client
                .nb_switch_mode(system.as_deref(), mode.value())
                .await?;
            if !global.quiet {
                eprintln!("Northbound mode switched to {}", mode_name(mode.value()));
            }
            Ok(())
        }
    }
}
