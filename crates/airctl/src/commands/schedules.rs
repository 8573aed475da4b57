//! Schedule command handlers.

use airctl_core::model::schedule::hhmm;
use airctl_core::{AirconClient, ScheduleItem};
use tabled::Tabled;

use crate::cli::{
    GlobalOpts, OutputFormat, ScheduleChanges, ScheduleFields, SchedulesArgs, SchedulesCommand,
    repeat_rule,
};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct ScheduleRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Time")]
    time: String,
    #[tabled(rename = "Power")]
    power: String,
    #[tabled(rename = "Mode")]
    mode: String,
    #[tabled(rename = "Temp")]
    temperature: String,
    #[tabled(rename = "Fan")]
    fan: String,
    #[tabled(rename = "Repeat")]
    repeat: String,
    #[tabled(rename = "Enabled")]
    enabled: String,
}

impl ScheduleRow {
    fn new(item: &ScheduleItem, color: bool) -> Self {
        Self {
            id: item.id.clone().unwrap_or_else(|| "-".into()),
            time: item.time.format(hhmm::FORMAT).to_string(),
            power: if item.power_on { "on" } else { "off" }.into(),
            mode: item.mode.to_string(),
            temperature: format!("{}℃", item.temperature),
            fan: item.fan_speed.to_string(),
            repeat: item.repeat.to_string(),
            enabled: output::status(if item.enabled { "yes" } else { "no" }, item.enabled, color),
        }
    }
}

fn schedule_id(item: &ScheduleItem) -> String {
    item.id.clone().unwrap_or_default()
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    client: &AirconClient,
    args: SchedulesArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let service = client.schedules();

    match args.command {
        SchedulesCommand::List => {
            let items = service.list().await?;
            let color = output::should_color(&global.color);
            let rendered = output::render_list(
                &global.output,
                items.as_slice(),
                |item| ScheduleRow::new(item, color),
                schedule_id,
            )?;
            output::print_output(&rendered, global.quiet);
            if matches!(global.output, OutputFormat::Table) && !global.quiet {
                let summary = service.summary();
                eprintln!("{} schedules, {} enabled", summary.total, summary.enabled);
            }
            Ok(())
        }

        SchedulesCommand::Add(fields) => {
            let item = new_item(&fields)?;
            service.save(&item).await?;
            util::note(&format!("Schedule created: {}", item.label()), global.quiet);
            Ok(())
        }

        SchedulesCommand::Edit { id, changes } => {
            if changes.is_empty() {
                return Err(CliError::Validation {
                    field: "edit".into(),
                    reason: "nothing to change; pass at least one field flag".into(),
                });
            }
            let mut item = util::find_schedule(service, &id).await?;
            apply_changes(&mut item, &changes)?;
            service.save(&item).await?;
            util::note(&format!("Schedule {id} updated: {}", item.label()), global.quiet);
            Ok(())
        }

        SchedulesCommand::Enable { id } => set_enabled(client, &id, true, global).await,
        SchedulesCommand::Disable { id } => set_enabled(client, &id, false, global).await,

        SchedulesCommand::Delete { id } => {
            let prompt = format!("Delete schedule '{id}'?");
            if !util::confirm(&prompt, "schedules delete", global.yes)? {
                return Ok(());
            }
            service.delete(&id).await?;
            util::note(&format!("Schedule {id} deleted"), global.quiet);
            Ok(())
        }
    }
}

async fn set_enabled(
    client: &AirconClient,
    id: &str,
    enabled: bool,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let service = client.schedules();
    let item = util::find_schedule(service, id).await?;
    service.toggle(&item, enabled).await?;
    let verb = if enabled { "enabled" } else { "disabled" };
    util::note(&format!("Schedule {id} {verb}"), global.quiet);
    Ok(())
}

// ── Field mapping ───────────────────────────────────────────────────

fn new_item(fields: &ScheduleFields) -> Result<ScheduleItem, CliError> {
    let repeat = repeat_rule(fields.repeat, &fields.days).map_err(repeat_error)?;
    Ok(ScheduleItem::new(fields.time, fields.power.is_on(), fields.mode, fields.temp)
        .with_repeat(repeat.unwrap_or_default())
        .with_enabled(!fields.disabled))
}

fn apply_changes(item: &mut ScheduleItem, changes: &ScheduleChanges) -> Result<(), CliError> {
    if let Some(time) = changes.time {
        item.time = time;
    }
    if let Some(power) = changes.power {
        item.power_on = power.is_on();
    }
    if let Some(mode) = changes.mode {
        item.mode = mode;
    }
    if let Some(temp) = changes.temp {
        item.temperature = temp;
    }
    if let Some(repeat) = repeat_rule(changes.repeat, &changes.days).map_err(repeat_error)? {
        item.repeat = repeat;
    }
    Ok(())
}

fn repeat_error(reason: String) -> CliError {
    CliError::Validation {
        field: "repeat".into(),
        reason,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use airctl_core::{DayOfWeek, Mode, RepeatRule, Temperature};
    use chrono::NaiveTime;
    use clap::Parser;

    use super::*;
    use crate::cli::{Cli, Command};

    fn parse(args: &[&str]) -> SchedulesCommand {
        let mut argv = vec!["airctl", "schedules"];
        argv.extend_from_slice(args);
        match Cli::try_parse_from(argv).unwrap().command {
            Command::Schedules(args) => args.command,
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn add_defaults_to_daily_enabled_cooling() {
        let SchedulesCommand::Add(fields) = parse(&["add", "--time", "07:00"]) else {
            panic!("expected add");
        };
        let item = new_item(&fields).unwrap();

        assert_eq!(item.id, None);
        assert_eq!(item.time, NaiveTime::from_hms_opt(7, 0, 0).unwrap());
        assert!(item.power_on);
        assert_eq!(item.mode, Mode::Cool);
        assert_eq!(item.repeat, RepeatRule::Daily);
        assert!(item.enabled);
    }

    #[test]
    fn add_with_days_builds_a_custom_rule() {
        let SchedulesCommand::Add(fields) =
            parse(&["add", "--time", "22:30", "--power", "off", "--days", "sat,6", "--disabled"])
        else {
            panic!("expected add");
        };
        let item = new_item(&fields).unwrap();

        assert!(!item.power_on);
        assert!(!item.enabled);
        assert_eq!(
            item.repeat,
            RepeatRule::custom([DayOfWeek::try_from(5).unwrap(), DayOfWeek::SUNDAY])
        );
    }

    #[test]
    fn edit_changes_only_the_given_fields() {
        let SchedulesCommand::Edit { id, changes } =
            parse(&["edit", "s1", "--temp", "25", "-r", "weekends"])
        else {
            panic!("expected edit");
        };
        assert_eq!(id, "s1");

        let mut item = ScheduleItem::new(
            NaiveTime::from_hms_opt(7, 0, 0).unwrap(),
            true,
            Mode::Heat,
            Temperature::C23,
        )
        .with_id("s1")
            .with_enabled(false);
        apply_changes(&mut item, &changes).unwrap();

        assert_eq!(item.temperature, Temperature::C25);
        assert_eq!(item.repeat, RepeatRule::Weekends);
        assert_eq!(item.mode, Mode::Heat);
        assert!(!item.enabled);
        assert_eq!(item.id.as_deref(), Some("s1"));
    }

    #[test]
    fn days_with_a_fixed_repeat_are_rejected() {
        let SchedulesCommand::Add(fields) =
            parse(&["add", "--time", "07:00", "-r", "daily", "--days", "mon"])
        else {
            panic!("expected add");
        };
        assert!(matches!(new_item(&fields), Err(CliError::Validation { .. })));
    }

    #[test]
    fn rows_render_gateway_values() {
        let item = ScheduleItem::new(
            NaiveTime::from_hms_opt(6, 5, 0).unwrap(),
            true,
            Mode::Cool,
            Temperature::C25,
        )
        .with_id("s7")
            .with_repeat(RepeatRule::Weekdays);
        let row = ScheduleRow::new(&item, false);

        assert_eq!(row.id, "s7");
        assert_eq!(row.time, "06:05");
        assert_eq!(row.temperature, "25℃");
        assert_eq!(row.fan, "3");
        assert_eq!(row.repeat, "weekdays");
        assert_eq!(row.enabled, "yes");
    }
}
