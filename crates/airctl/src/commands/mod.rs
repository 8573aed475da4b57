//! Command dispatch: bridges CLI args -> client calls -> output formatting.

pub mod config_cmd;
pub mod control;
pub mod monitor;
pub mod schedules;
pub mod util;
pub mod watch;

use airctl_core::AirconClient;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a broker-bound command to the appropriate handler.
pub async fn dispatch(
    cmd: Command,
    client: &AirconClient,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Control(args) => control::handle(client, &args, global),
        Command::Schedules(args) => schedules::handle(client, args, global).await,
        Command::Watch => watch::handle(client, global).await,
        Command::Monitor(args) => monitor::handle(client, &args, global).await,
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => Ok(()),
    }
}
