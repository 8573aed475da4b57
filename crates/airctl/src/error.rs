//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text and stable exit codes.

use miette::Diagnostic;
use thiserror::Error;

use airctl_config::ConfigError;
use airctl_core::{CoreError, ScheduleAction};

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const PROTOCOL: i32 = 5;
    pub const REJECTED: i32 = 6;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not reach broker at {broker} within {seconds}s")]
    #[diagnostic(
        code(airctl::connection_failed),
        help(
            "Check the broker URL, credentials and network.\n\
             Broker: {broker}\n\
             Try: airctl -vv watch"
        )
    )]
    ConnectionFailed { broker: String, seconds: u64 },

    #[error("Transport error: {message}")]
    #[diagnostic(code(airctl::transport))]
    Transport { message: String },

    // ── Authentication ───────────────────────────────────────────────
    #[error("No credentials configured for profile '{profile}'")]
    #[diagnostic(
        code(airctl::no_credentials),
        help(
            "Configure credentials with: airctl config init\n\
             Or set AIRCTL_USERNAME and AIRCTL_PASSWORD."
        )
    )]
    NoCredentials { profile: String },

    // ── Gateway replies ──────────────────────────────────────────────
    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(airctl::not_found),
        help("Run: airctl {list_command} to see available {resource_type}s")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    #[error("Gateway rejected {action}: {message}")]
    #[diagnostic(code(airctl::rejected))]
    Rejected {
        action: ScheduleAction,
        message: String,
    },

    #[error("Gateway sent an unreadable {action} reply: {message}")]
    #[diagnostic(
        code(airctl::protocol),
        help("The gateway firmware may be newer than this client.")
    )]
    Protocol {
        action: ScheduleAction,
        message: String,
    },

    #[error("{action} got no reply within {millis}ms")]
    #[diagnostic(
        code(airctl::timeout),
        help(
            "The gateway may be offline. The request was not retried.\n\
             Increase the wait with --timeout or check the gateway."
        )
    )]
    Timeout { action: ScheduleAction, millis: u64 },

    #[error("{action} abandoned during shutdown")]
    #[diagnostic(code(airctl::shutdown))]
    Shutdown { action: ScheduleAction },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(airctl::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(airctl::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: airctl config init"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No broker configured")]
    #[diagnostic(
        code(airctl::no_config),
        help(
            "Create a profile with: airctl config init\n\
             Or pass --broker. Expected config at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error("{message}")]
    #[diagnostic(code(airctl::config))]
    Config { message: String },

    #[error("Keyring error: {message}")]
    #[diagnostic(
        code(airctl::keyring),
        help("Set AIRCTL_PASSWORD or a profile `password_env` instead.")
    )]
    Keyring { message: String },

    // ── Interactive ──────────────────────────────────────────────────
    #[error("Destructive operation '{action}' requires confirmation")]
    #[diagnostic(
        code(airctl::confirmation_required),
        help("Use --yes (-y) to skip confirmation in non-interactive contexts.")
    )]
    NonInteractiveRequiresYes { action: String },

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Serialization failed: {0}")]
    #[diagnostic(code(airctl::json))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::Transport { .. } => exit_code::CONNECTION,
            Self::NoCredentials { .. } | Self::Keyring { .. } => exit_code::AUTH,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Rejected { .. } => exit_code::REJECTED,
            Self::Protocol { .. } => exit_code::PROTOCOL,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. } | Self::NonInteractiveRequiresYes { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Timeout { action, timeout_ms } => Self::Timeout {
                action,
                millis: timeout_ms,
            },
            CoreError::Rejected { action, message } => Self::Rejected { action, message },
            CoreError::Protocol { action, message } => Self::Protocol { action, message },
            CoreError::Shutdown { action } => Self::Shutdown { action },
            CoreError::ValidationFailed { message } => Self::Validation {
                field: "input".into(),
                reason: message,
            },
            CoreError::Config { message } => Self::Config { message },
            CoreError::Transport { message } => Self::Transport { message },
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            ConfigError::NoCredentials { profile } => Self::NoCredentials { profile },
            ConfigError::UnknownProfile { name } => Self::ProfileNotFound {
                name,
                available: "(none)".into(),
            },
            ConfigError::Keyring(message) => Self::Keyring { message },
            ConfigError::Io(e) => Self::Io(e),
            other @ (ConfigError::Serialization(_) | ConfigError::Figment(_)) => Self::Config {
                message: other.to_string(),
            },
        }
    }
}
