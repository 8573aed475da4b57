// Session configuration and translation into rumqttc options.
//
// Everything about *how* to reach the broker lives here: URL scheme,
// credentials, TLS roots, keep-alive, reconnect pacing and queue bounds.

use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Duration;

use rumqttc::{MqttOptions, TlsConfiguration, Transport};
use secrecy::{ExposeSecret, SecretString};
use url::Url;
use uuid::Uuid;

use crate::error::Error;
use crate::queue::DEFAULT_QUEUE_LIMIT;

/// Fixed delay between a lost connection and the next attempt.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Default MQTT keep-alive interval.
pub const DEFAULT_KEEP_ALIVE: Duration = Duration::from_secs(30);

/// Request slots in the client's channel on top of the offline queue size,
/// so a full flush never overruns the channel.
const REQUEST_HEADROOM: usize = 64;

/// TLS trust roots for `mqtts://` and `wss://` brokers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsMode {
    /// Platform root store.
    #[default]
    System,
    /// Custom CA certificate from the given PEM file.
    CustomCa(PathBuf),
}

/// Everything needed to open (and keep re-opening) a broker session.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// `mqtt://host:1883`, `mqtts://host:8883` or `wss://host/mqtt`.
    pub broker: Url,
    pub username: String,
    pub password: SecretString,
    /// Client ids are `<prefix>-<8 hex chars>`, fresh per session.
    pub client_id_prefix: String,
    pub keep_alive: Duration,
    pub reconnect_delay: Duration,
    pub tls: TlsMode,
    /// Offline queue capacity. `None` = unbounded.
    pub queue_limit: Option<NonZeroUsize>,
}

impl TransportConfig {
    /// Config with default tuning for the given broker and credentials.
    pub fn new(broker: Url, username: impl Into<String>, password: SecretString) -> Self {
        Self {
            broker,
            username: username.into(),
            password,
            client_id_prefix: "airctl".into(),
            keep_alive: DEFAULT_KEEP_ALIVE,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            tls: TlsMode::System,
            queue_limit: NonZeroUsize::new(DEFAULT_QUEUE_LIMIT),
        }
    }

    /// Generate a fresh client identity for this session.
    pub fn client_id(&self) -> String {
        generate_client_id(&self.client_id_prefix)
    }

    /// Capacity for the rumqttc request channel.
    pub fn request_capacity(&self) -> usize {
        self.queue_limit
            .map_or(DEFAULT_QUEUE_LIMIT, NonZeroUsize::get)
            .saturating_add(REQUEST_HEADROOM)
    }

    /// Build rumqttc options: credentials, clean session, keep-alive, transport.
    pub fn mqtt_options(&self, client_id: &str) -> Result<MqttOptions, Error> {
        let host = self
            .broker
            .host_str()
            .ok_or_else(|| Error::MissingHost(self.broker.to_string()))?;

        let (transport, default_port) = match self.broker.scheme() {
            "mqtt" | "tcp" => (Transport::Tcp, 1883),
            "mqtts" | "ssl" => (Transport::tls_with_config(self.tls_configuration()?), 8883),
            "wss" => (Transport::wss_with_config(self.tls_configuration()?), 443),
            other => return Err(Error::UnsupportedScheme(other.to_owned())),
        };
        let port = self.broker.port().unwrap_or(default_port);

        // Websocket transports take the full URL (path included) as the host.
        let address = if matches!(transport, Transport::Wss(_)) {
            self.broker.to_string()
        } else {
            host.to_owned()
        };

        let mut options = MqttOptions::new(client_id, address, port);
        options
            .set_credentials(self.username.clone(), self.password.expose_secret().to_owned())
            .set_keep_alive(self.keep_alive)
            .set_clean_session(true)
            .set_transport(transport);

        Ok(options)
    }

    fn tls_configuration(&self) -> Result<TlsConfiguration, Error> {
        match &self.tls {
            TlsMode::System => Ok(TlsConfiguration::default()),
            TlsMode::CustomCa(path) => {
                let ca = std::fs::read(path).map_err(|e| {
                    Error::Tls(format!("failed to read CA cert {}: {e}", path.display()))
                })?;
                Ok(TlsConfiguration::Simple {
                    ca,
                    alpn: None,
                    client_auth: None,
                })
            }
        }
    }
}

/// `<prefix>-<8 lowercase hex chars>`.
pub fn generate_client_id(prefix: &str) -> String {
    let token = Uuid::new_v4().simple().to_string();
    format!("{prefix}-{}", &token[..8])
}
