// ── Runtime client configuration ──
//
// Everything the client needs at runtime. Never touches disk; the config
// crate or the caller builds one and hands it in.

use std::time::Duration;

use airctl_api::TransportConfig;

/// How long a correlated request waits for its response.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(8000);

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub transport: TransportConfig,
    pub request_timeout: Duration,
}

impl ClientConfig {
    pub fn new(transport: TransportConfig) -> Self {
        Self {
            transport,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}
