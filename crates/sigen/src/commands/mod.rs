//! Command dispatch: bridges CLI args -> `SigenClient` calls -> output formatting.

pub mod config_cmd;
pub mod loads;
pub mod modes;
pub mod northbound;
pub mod station;
pub mod stream;

use sigen_core::SigenClient;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a cloud-bound command to the appropriate handler.
pub async fn dispatch(
    cmd: Command,
    client: &SigenClient,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Station => station::handle_station(client, global).await,
        Command::Energy => station::handle_energy(client, global).await,
        Command::Modes(args) => modes::handle(client, args, global).await,
        Command::Loads(args) => loads::handle(client, args, global).await,
        Command::Northbound(args) => northbound::handle(client, args, global).await,
        Command::Stream(args) => stream::handle(client, args, global).await,
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => Ok(()),
    }
}
