use thiserror::Error;

/// Top-level error type for the `airctl-api` crate.
///
/// Only session setup surfaces these to callers. Once a
/// [`TransportConnection`](crate::TransportConnection) is running, transport
/// failures are logged and absorbed into connection state changes.
#[derive(Debug, Error)]
pub enum Error {
    // ── Configuration ───────────────────────────────────────────────
    /// Broker URL could not be parsed.
    #[error("Invalid broker URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Broker URL uses a scheme we can't speak.
    #[error("Unsupported broker scheme '{0}' (expected mqtt, mqtts or wss)")]
    UnsupportedScheme(String),

    /// Broker URL has no host component.
    #[error("Broker URL has no host: {0}")]
    MissingHost(String),

    /// TLS setup failed (unreadable CA file, etc.)
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Link ────────────────────────────────────────────────────────
    /// The underlying client refused a request (request channel full or closed).
    #[error("Transport request failed: {0}")]
    Link(String),
}

impl From<rumqttc::ClientError> for Error {
    fn from(err: rumqttc::ClientError) -> Self {
        Self::Link(err.to_string())
    }
}

impl Error {
    /// Returns `true` if retrying the same request later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Link(_))
    }
}
