//! Operational mode handlers.

use serde::Serialize;
use tabled::Tabled;

use sigen_core::{ModeEntry, ModeSelector, NO_PROFILE, SigenClient};

use crate::cli::{GlobalOpts, ModesArgs, ModesCommand};
use crate::error::CliError;
use crate::output;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct ModeRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Label")]
    label: String,
    #[tabled(rename = "Kind")]
    kind: &'static str,
    #[tabled(rename = "Value")]
    value: String,
}

impl From<&ModeEntry> for ModeRow {
    fn from(entry: &ModeEntry) -> Self {
        let (kind, value) = match entry.selector {
            ModeSelector::Default(v) => ("mode", v.to_string()),
            ModeSelector::Profile(id) => ("profile", id.to_string()),
        };
        Self {
            name: entry.name.clone(),
            label: entry.label.clone(),
            kind,
            value,
        }
    }
}

#[derive(Serialize)]
struct CurrentView {
    label: String,
    mode: i64,
    profile_id: Option<i64>,
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    client: &SigenClient,
    args: ModesArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        ModesCommand::List => {
            let catalog = client.modes().await?;
            let entries: Vec<ModeEntry> = catalog.entries().cloned().collect();
            let out = output::render_list(
                &global.output,
                &entries,
                |e| ModeRow::from(e),
                |e| e.name.clone(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ModesCommand::Current => {
            let current = client.current_mode().await?;
            let label = client.current_mode_label().await?;
            let view = CurrentView {
                label,
                mode: current.current_mode,
                profile_id: current.current_profile_id,
            };
            let color = output::should_color(&global.color);
            let out = output::render_single(
                &global.output,
                &view,
                |v| {
                    output::detail_block([
                        ("Mode", output::highlight(&v.label, color)),
                        ("Value", v.mode.to_string()),
                        (
                            "Profile",
                            v.profile_id.map_or_else(|| "-".into(), |id| id.to_string()),
                        ),
                    ])
                },
                |v| v.label.clone(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ModesCommand::Set {
            name,
            raw,
            profile_id,
        } => {
            match (raw, name) {
                (Some(mode), _) => {
                    client
                        .set_mode_raw(mode, profile_id.unwrap_or(NO_PROFILE))
                        .await?;
                }
                (None, Some(name)) => {
                    client.set_mode_by_name(&name).await?;
                }
                (None, None) => {
                    return Err(CliError::Validation {
                        field: "mode".into(),
                        reason: "give a mode name or --raw <value>".into(),
                    });
                }
            }
            if !global.quiet {
                eprintln!("Mode switched");
            }
            Ok(())
        }
    }
}
