//! Smart load handlers.

use tabled::Tabled;

use sigen_core::{SigenClient, SmartLoad};

use crate::cli::{GlobalOpts, LoadTarget, LoadsArgs, LoadsCommand};
use crate::error::CliError;
use crate::output;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct LoadRow {
    #[tabled(rename = "Path")]
    path: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Today")]
    today: String,
    #[tabled(rename = "Month")]
    month: String,
    #[tabled(rename = "Lifetime")]
    lifetime: String,
}

impl From<&SmartLoad> for LoadRow {
    fn from(load: &SmartLoad) -> Self {
        Self {
            path: load.path.map(|p| p.to_string()).unwrap_or_default(),
            name: load.name.clone(),
            today: load.today_consumption.clone(),
            month: load.month_consumption.clone(),
            lifetime: load.lifetime_consumption.clone(),
        }
    }
}

// ── Handler ─────────────────────────────────────────────────────────

async fn switch(
    client: &SigenClient,
    target: LoadTarget,
    on: bool,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let label = match (target.path, target.name) {
        (Some(path), _) => {
            client.set_smart_load(path, on).await?;
            format!("path {path}")
        }
        (None, Some(name)) => {
            client.set_smart_load_by_name(&name, on).await?;
            name
        }
        (None, None) => {
            return Err(CliError::Validation {
                field: "load".into(),
                reason: "give a load name or --path <number>".into(),
            });
        }
    };

    if !global.quiet {
        let state = output::highlight(if on { "on" } else { "off" }, output::should_color(&global.color));
        eprintln!("Smart load {label} switched {state}");
    }
    Ok(())
}

pub async fn handle(
    client: &SigenClient,
    args: LoadsArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        LoadsCommand::List => {
            let loads = client.smart_loads().await?;
            let out = output::render_list(
                &global.output,
                &loads,
                |l| LoadRow::from(l),
                |l| l.name.clone(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }
        LoadsCommand::On(target) => switch(client, target, true, global).await,
        LoadsCommand::Off(target) => switch(client, target, false, global).await,
    }
}
