// ── Core error types ──
//
// Only request-scoped failures reach callers. Connection loss is absorbed by
// the transport and shows up as connection state, never as an error here.
// The `From<airctl_api::Error>` impl covers session setup.

use thiserror::Error;

use crate::channels::ScheduleAction;

#[derive(Debug, Error)]
pub enum CoreError {
    // ── Request errors ───────────────────────────────────────────────
    #[error("{action} timed out after {timeout_ms}ms with no response")]
    Timeout {
        action: ScheduleAction,
        timeout_ms: u64,
    },

    #[error("{action} rejected: {message}")]
    Rejected {
        action: ScheduleAction,
        message: String,
    },

    #[error("{action} returned an unreadable response: {message}")]
    Protocol {
        action: ScheduleAction,
        message: String,
    },

    #[error("{action} abandoned: client is shutting down")]
    Shutdown { action: ScheduleAction },

    // ── Input errors ─────────────────────────────────────────────────
    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },

    // ── Setup errors ─────────────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Transport error: {message}")]
    Transport { message: String },
}

impl CoreError {
    /// The action a request-scoped error belongs to.
    pub fn action(&self) -> Option<ScheduleAction> {
        match self {
            Self::Timeout { action, .. }
            | Self::Rejected { action, .. }
            | Self::Protocol { action, .. }
            | Self::Shutdown { action } => Some(*action),
            Self::ValidationFailed { .. } | Self::Config { .. } | Self::Transport { .. } => None,
        }
    }

    /// Whether issuing the same call again (with a new correlation id) may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<airctl_api::Error> for CoreError {
    fn from(err: airctl_api::Error) -> Self {
        match err {
            airctl_api::Error::InvalidUrl(_)
            | airctl_api::Error::UnsupportedScheme(_)
            | airctl_api::Error::MissingHost(_)
            | airctl_api::Error::Tls(_) => Self::Config {
                message: err.to_string(),
            },
            airctl_api::Error::Link(message) => Self::Transport { message },
        }
    }
}
