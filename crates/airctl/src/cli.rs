//! Clap derive structures for the `airctl` CLI.
//!
//! Defines the command tree, global flags, and the value parsers shared by
//! the control and schedule commands.

use airctl_core::model::schedule::hhmm;
use airctl_core::{DayOfWeek, Mode, RepeatRule, Temperature};
use chrono::{NaiveTime, Weekday};
use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// airctl -- remote control for MQTT-connected air conditioners
#[derive(Debug, Parser)]
#[command(
    name = "airctl",
    version,
    about = "Control an air conditioner and its schedules over MQTT",
    long_about = "Sends control commands and manages schedules on an appliance gateway\n\
        reachable through an MQTT broker (TCP, TLS or WebSocket).",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Broker profile to use
    #[arg(long, short = 'p', env = "AIRCTL_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Broker URL (overrides profile)
    #[arg(long, short = 'b', env = "AIRCTL_BROKER", global = true)]
    pub broker: Option<String>,

    /// Broker username (overrides profile)
    #[arg(long, short = 'u', global = true)]
    pub username: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "AIRCTL_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Skip confirmation prompts
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,

    /// Seconds to wait for each gateway reply (overrides profile)
    #[arg(long, env = "AIRCTL_TIMEOUT", global = true)]
    pub timeout: Option<u64>,

    /// Seconds to wait for the broker session before giving up
    #[arg(long, default_value = "10", global = true)]
    pub connect_timeout: u64,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Send a one-shot control command to the appliance
    #[command(alias = "ctl")]
    Control(ControlArgs),

    /// Manage appliance schedules
    #[command(alias = "sched", alias = "s")]
    Schedules(SchedulesArgs),

    /// Stream schedule triggers and connection state
    Watch,

    /// Print JSON payloads received on a channel
    Monitor(MonitorArgs),

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Control ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Power {
    On,
    Off,
}

impl Power {
    pub fn is_on(self) -> bool {
        matches!(self, Self::On)
    }
}

#[derive(Debug, Args)]
pub struct ControlArgs {
    /// Power state
    #[arg(long)]
    pub power: Power,

    /// Operating mode (cool, heat)
    #[arg(long, short = 'm', default_value = "cool")]
    pub mode: Mode,

    /// Set-point in Celsius (23, 25)
    #[arg(long, short = 't', default_value = "23")]
    pub temp: Temperature,

    /// Fan speed level
    #[arg(long, default_value = "3")]
    pub fan: u8,
}

// ── Schedules ────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct SchedulesArgs {
    #[command(subcommand)]
    pub command: SchedulesCommand,
}

#[derive(Debug, Subcommand)]
pub enum SchedulesCommand {
    /// List schedules stored on the gateway
    #[command(alias = "ls")]
    List,

    /// Create a schedule
    Add(ScheduleFields),

    /// Change fields of an existing schedule
    Edit {
        /// Schedule ID
        id: String,

        #[command(flatten)]
        changes: ScheduleChanges,
    },

    /// Enable a schedule
    Enable {
        /// Schedule ID
        id: String,
    },

    /// Disable a schedule
    Disable {
        /// Schedule ID
        id: String,
    },

    /// Delete a schedule
    #[command(alias = "rm")]
    Delete {
        /// Schedule ID
        id: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RepeatKind {
    Daily,
    Weekdays,
    Weekends,
    Custom,
}

#[derive(Debug, Args)]
pub struct ScheduleFields {
    /// Time of day (HH:MM, 24-hour)
    #[arg(long, value_parser = parse_time)]
    pub time: NaiveTime,

    /// Power state to apply
    #[arg(long, default_value = "on")]
    pub power: Power,

    /// Operating mode (cool, heat)
    #[arg(long, short = 'm', default_value = "cool")]
    pub mode: Mode,

    /// Set-point in Celsius (23, 25)
    #[arg(long, short = 't', default_value = "23")]
    pub temp: Temperature,

    /// Recurrence
    #[arg(long, short = 'r')]
    pub repeat: Option<RepeatKind>,

    /// Days for a custom recurrence (mon,tue,... or 0-6 from Monday)
    #[arg(long, value_delimiter = ',', value_parser = parse_day)]
    pub days: Vec<DayOfWeek>,

    /// Create the schedule disabled
    #[arg(long)]
    pub disabled: bool,
}

#[derive(Debug, Args)]
pub struct ScheduleChanges {
    /// New time of day (HH:MM, 24-hour)
    #[arg(long, value_parser = parse_time)]
    pub time: Option<NaiveTime>,

    /// New power state
    #[arg(long)]
    pub power: Option<Power>,

    /// New operating mode
    #[arg(long, short = 'm')]
    pub mode: Option<Mode>,

    /// New set-point in Celsius
    #[arg(long, short = 't')]
    pub temp: Option<Temperature>,

    /// New recurrence
    #[arg(long, short = 'r')]
    pub repeat: Option<RepeatKind>,

    /// New days for a custom recurrence
    #[arg(long, value_delimiter = ',', value_parser = parse_day)]
    pub days: Vec<DayOfWeek>,
}

impl ScheduleChanges {
    pub fn is_empty(&self) -> bool {
        self.time.is_none()
            && self.power.is_none()
            && self.mode.is_none()
            && self.temp.is_none()
            && self.repeat.is_none()
            && self.days.is_empty()
    }
}

/// Combine `--repeat` and `--days` into a rule.
///
/// `--days` alone implies a custom rule. Days given with any other kind
/// are an error.
pub fn repeat_rule(
    kind: Option<RepeatKind>,
    days: &[DayOfWeek],
) -> Result<Option<RepeatRule>, String> {
    match (kind, days.is_empty()) {
        (None, true) => Ok(None),
        (None | Some(RepeatKind::Custom), _) => Ok(Some(RepeatRule::custom(days.iter().copied()))),
        (Some(_), false) => Err("--days only applies to a custom repeat".into()),
        (Some(RepeatKind::Daily), true) => Ok(Some(RepeatRule::Daily)),
        (Some(RepeatKind::Weekdays), true) => Ok(Some(RepeatRule::Weekdays)),
        (Some(RepeatKind::Weekends), true) => Ok(Some(RepeatRule::Weekends)),
    }
}

// ── Monitor ──────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct MonitorArgs {
    /// MQTT topic to observe
    pub channel: String,

    /// Exit after this many messages
    #[arg(long, short = 'n')]
    pub count: Option<usize>,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Interactive wizard that writes a broker profile
    Init,

    /// Print the config file location
    Path,

    /// Show the effective configuration (passwords redacted)
    Show,

    /// Store the active profile's password in the system keyring
    SetPassword,
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Target shell
    pub shell: clap_complete::Shell,
}

// ── Value parsers ────────────────────────────────────────────────────

fn parse_time(raw: &str) -> Result<NaiveTime, String> {
    hhmm::parse(raw).map_err(|_| format!("expected HH:MM, got '{raw}'"))
}

fn parse_day(raw: &str) -> Result<DayOfWeek, String> {
    let raw = raw.trim();
    if let Ok(index) = raw.parse::<u8>() {
        return DayOfWeek::try_from(index).map_err(|e| e.to_string());
    }
    raw.parse::<Weekday>()
        .map(DayOfWeek::from)
        .map_err(|_| format!("unknown day '{raw}'"))
}
