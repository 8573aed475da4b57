// ── AirconClient ──
//
// Owns the full stack for one gateway: transport session, correlator and
// schedule service. This is the handle the CLI (or any embedding app)
// constructs and passes around.

use std::sync::Arc;
use std::time::Duration;

use airctl_api::{ConnectionState, TransportConnection};
use serde::de::DeserializeOwned;
use tokio::sync::{broadcast, watch};

use crate::channels::CONTROL;
use crate::config::ClientConfig;
use crate::correlator::RequestCorrelator;
use crate::error::CoreError;
use crate::model::{ControlCommand, TriggerEvent};
use crate::service::ScheduleService;
use crate::topic_watch::{TopicFeed, TopicWatch};

/// Cheaply cloneable handle to a running client.
#[derive(Clone)]
pub struct AirconClient {
    inner: Arc<Inner>,
}

struct Inner {
    connection: TransportConnection,
    correlator: RequestCorrelator,
    schedules: ScheduleService,
}

impl AirconClient {
    /// Open the broker session and start correlation. Must run inside a tokio runtime.
    ///
    /// Returns immediately; the session connects in the background and
    /// anything published before it is up gets queued.
    pub fn start(config: &ClientConfig) -> Result<Self, CoreError> {
        let connection = TransportConnection::start(&config.transport)?;
        Ok(Self::from_connection(connection, config.request_timeout))
    }

    /// Build the client on an existing connection.
    pub fn from_connection(connection: TransportConnection, request_timeout: Duration) -> Self {
        let correlator = RequestCorrelator::new(connection.clone(), request_timeout);
        correlator.start();
        let schedules = ScheduleService::new(correlator.clone());
        schedules.start();

        Self {
            inner: Arc::new(Inner {
                connection,
                correlator,
                schedules,
            }),
        }
    }

    /// Publish a control command. Fire-and-forget; queued while offline.
    pub fn control(&self, command: &ControlCommand) -> Result<(), CoreError> {
        let payload = serde_json::to_vec(command).map_err(|e| CoreError::ValidationFailed {
            message: e.to_string(),
        })?;
        tracing::info!(
            power_on = command.power_on,
            mode = %command.mode,
            temperature = command.temperature.celsius(),
            "Sending control command"
        );
        self.inner.connection.publish(CONTROL, payload);
        Ok(())
    }

    pub fn schedules(&self) -> &ScheduleService {
        &self.inner.schedules
    }

    pub fn correlator(&self) -> &RequestCorrelator {
        &self.inner.correlator
    }

    pub fn connection(&self) -> &TransportConnection {
        &self.inner.connection
    }

    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.connection.state()
    }

    pub fn triggers(&self) -> broadcast::Receiver<TriggerEvent> {
        self.inner.correlator.triggers()
    }

    /// Observe an arbitrary JSON channel.
    pub fn watch_topic<T>(&self, channel: &str) -> TopicWatch<T>
    where
        T: DeserializeOwned + Clone + Send + Sync + 'static,
    {
        TopicWatch::new(&self.inner.connection, channel)
    }

    /// Every JSON message on an arbitrary channel, in arrival order.
    pub fn feed_topic<T>(&self, channel: &str) -> TopicFeed<T>
    where
        T: DeserializeOwned + Send + 'static,
    {
        TopicFeed::new(&self.inner.connection, channel)
    }

    pub async fn wait_connected(&self, timeout: Duration) -> bool {
        self.inner.connection.wait_connected(timeout).await
    }

    /// Stop the trigger listener, fail pending requests and close the session.
    pub async fn shutdown(&self) {
        self.inner.schedules.stop().await;
        self.inner.correlator.stop();
        self.inner.connection.shutdown().await;
        tracing::debug!("Client shut down");
    }
}
