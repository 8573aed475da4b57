//! Control command handler.

use airctl_core::{AirconClient, ControlCommand, FanSpeed};

use crate::cli::{ControlArgs, GlobalOpts};
use crate::error::CliError;

use super::util;

pub fn handle(
    client: &AirconClient,
    args: &ControlArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let fan_speed = FanSpeed::try_from(args.fan).map_err(|e| CliError::Validation {
        field: "fan".into(),
        reason: e.to_string(),
    })?;
    let command = ControlCommand {
        power_on: args.power.is_on(),
        mode: args.mode,
        temperature: args.temp,
        fan_speed,
    };

    client.control(&command)?;

    let summary = if command.power_on {
        format!(
            "Sent: on, {} {}℃, fan {}",
            command.mode, command.temperature, command.fan_speed
        )
    } else {
        "Sent: off".to_owned()
    };
    util::note(&summary, global.quiet);
    Ok(())
}
