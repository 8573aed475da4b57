//! Shared helpers for command handlers.

use std::io::IsTerminal;

use airctl_core::{ScheduleItem, ScheduleService};

use crate::error::CliError;

/// Look up a schedule by id, refreshing from the gateway first.
pub async fn find_schedule(service: &ScheduleService, id: &str) -> Result<ScheduleItem, CliError> {
    service.list().await?;
    service.find(id).ok_or_else(|| CliError::NotFound {
        resource_type: "schedule".into(),
        identifier: id.into(),
        list_command: "schedules list".into(),
    })
}

/// Prompt for confirmation, auto-approving if `--yes` was passed.
///
/// Without a terminal to prompt on, `--yes` is required.
pub fn confirm(message: &str, action: &str, yes_flag: bool) -> Result<bool, CliError> {
    if yes_flag {
        return Ok(true);
    }
    if !std::io::stdin().is_terminal() {
        return Err(CliError::NonInteractiveRequiresYes {
            action: action.into(),
        });
    }
    dialoguer::Confirm::new()
        .with_prompt(message)
        .default(false)
        .interact()
        .map_err(|e| CliError::Io(std::io::Error::other(e)))
}

/// Status line on stderr unless `--quiet`.
pub fn note(message: &str, quiet: bool) {
    if !quiet {
        eprintln!("{message}");
    }
}
