//! Broker session with auto-reconnect.
//!
//! [`TransportConnection`] owns the MQTT session lifecycle. It publishes
//! immediately while online and buffers into a [`PublishQueue`] while
//! offline. It fans inbound messages out through a [`TopicRegistry`]. On
//! every `ConnAck` it re-subscribes each channel that still has handlers and
//! drains the queue, in order, before admitting any new publish.
//!
//! Transport failures never reach callers. They show up only as
//! [`ConnectionState`] transitions on the watch channel, and the driver
//! task keeps retrying every `reconnect_delay` until shut down.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use airctl_api::{TransportConfig, TransportConnection};
//!
//! let conn = TransportConnection::start(config)?;
//! conn.subscribe("aircon/schedule/response", Arc::new(|_: &str, payload: &[u8]| {
//!     println!("{}", String::from_utf8_lossy(payload));
//!     Ok(())
//! }));
//! conn.publish("aircon/control", br#"{"power_on":true}"#.to_vec());
//! conn.shutdown().await;
//! ```

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use rumqttc::{AsyncClient, Event, Outgoing, Packet};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::Error;
use crate::link::{EventSource, Link, lock};
use crate::queue::PublishQueue;
use crate::registry::{self, HandlerId, MessageHandler, Removal, TopicRegistry};
use crate::transport::TransportConfig;

/// How long [`TransportConnection::shutdown`] waits for the broker to
/// acknowledge a graceful disconnect before cancelling the driver task.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

// ── ConnectionState ──────────────────────────────────────────────────

/// Session state observable by consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
        })
    }
}

// ── TransportConnection ──────────────────────────────────────────────

/// Handle to a broker session.
///
/// Cheaply cloneable via `Arc<Inner>`. Create with [`start`](Self::start)
/// for a real broker, or [`with_link`](Self::with_link) to drive the
/// lifecycle by hand.
#[derive(Clone)]
pub struct TransportConnection {
    inner: Arc<Inner>,
}

struct Inner {
    link: Arc<dyn Link>,
    state: watch::Sender<ConnectionState>,
    subscriptions: Mutex<Subscriptions>,
    outbound: Mutex<Outbound>,
    cancel: CancellationToken,
    closing: AtomicBool,
    driver: Mutex<Option<JoinHandle<()>>>,
}

/// Registry plus whether transport-level subscribes can be issued right now.
struct Subscriptions {
    online: bool,
    registry: TopicRegistry,
}

/// Offline queue plus the flags that gate direct sends.
///
/// `online` flips to `true` only after the queue has fully drained, and both
/// happen under this lock. A publish racing with a flush therefore either
/// lands behind the queued messages or waits for the flush to finish.
struct Outbound {
    online: bool,
    flush_pending: bool,
    queue: PublishQueue,
}

impl TransportConnection {
    /// Open a broker session and spawn the reconnecting driver task.
    ///
    /// Returns as soon as the task is spawned; the first connection attempt
    /// happens in the background. Must be called inside a tokio runtime.
    pub fn start(config: &TransportConfig) -> Result<Self, Error> {
        let client_id = config.client_id();
        let options = config.mqtt_options(&client_id)?;
        let (client, eventloop) = AsyncClient::new(options, config.request_capacity());

        tracing::info!(broker = %config.broker, %client_id, "Starting MQTT session");

        Ok(Self::with_source(
            Arc::new(client),
            eventloop,
            config.reconnect_delay,
            config.queue_limit,
        ))
    }

    /// Build a connection over `link` and spawn the driver task on `source`.
    ///
    /// Must be called inside a tokio runtime.
    pub fn with_source<S: EventSource>(
        link: Arc<dyn Link>,
        source: S,
        reconnect_delay: Duration,
        queue_limit: Option<NonZeroUsize>,
    ) -> Self {
        let connection = Self::with_link(link, queue_limit);
        let handle = tokio::spawn(run_event_loop(connection.clone(), source, reconnect_delay));
        *lock(&connection.inner.driver) = Some(handle);
        connection
    }

    /// Build a connection over an arbitrary [`Link`] without a driver task.
    ///
    /// The caller is responsible for invoking [`handle_connected`](Self::handle_connected),
    /// [`handle_incoming`](Self::handle_incoming) and
    /// [`handle_disconnected`](Self::handle_disconnected).
    pub fn with_link(link: Arc<dyn Link>, queue_limit: Option<NonZeroUsize>) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);

        Self {
            inner: Arc::new(Inner {
                link,
                state,
                subscriptions: Mutex::new(Subscriptions {
                    online: false,
                    registry: TopicRegistry::new(),
                }),
                outbound: Mutex::new(Outbound {
                    online: false,
                    flush_pending: false,
                    queue: PublishQueue::new(queue_limit),
                }),
                cancel: CancellationToken::new(),
                closing: AtomicBool::new(false),
                driver: Mutex::new(None),
            }),
        }
    }

    // ── Outbound ─────────────────────────────────────────────────────

    /// Send now if online, otherwise queue for the next reconnect.
    ///
    /// Never fails from the caller's point of view. A send that the
    /// transport refuses while online is logged and dropped.
    pub fn publish(&self, channel: &str, payload: impl Into<Bytes>) {
        let payload = payload.into();
        let mut outbound = lock(&self.inner.outbound);

        if outbound.online {
            if let Err(e) = self.inner.link.publish(channel, &payload) {
                tracing::warn!(channel, error = %e, "Publish failed, message dropped");
            }
            return;
        }

        if let Some(evicted) = outbound.queue.push(channel, payload) {
            tracing::warn!(
                channel = %evicted.channel,
                seq = evicted.seq,
                "Offline queue full, dropped oldest message"
            );
        }
        tracing::debug!(channel, queued = outbound.queue.len(), "Not connected, publish queued");
    }

    /// Number of messages waiting for the connection.
    pub fn queued(&self) -> usize {
        lock(&self.inner.outbound).queue.len()
    }

    // ── Subscriptions ────────────────────────────────────────────────

    /// Register a handler. The first handler on a channel triggers a
    /// transport-level subscribe (immediately if online, else on connect).
    pub fn subscribe(&self, channel: &str, handler: Arc<dyn MessageHandler>) -> HandlerId {
        let mut subs = lock(&self.inner.subscriptions);
        let registered = subs.registry.subscribe(channel, handler);

        if registered.first_for_channel && subs.online {
            if let Err(e) = self.inner.link.subscribe(channel) {
                tracing::warn!(channel, error = %e, "Subscribe failed");
            }
        }

        registered.id
    }

    /// Remove a handler. Removing the last one on a channel triggers a
    /// transport-level unsubscribe. Returns `false` if it wasn't registered.
    pub fn unsubscribe(&self, channel: &str, id: HandlerId) -> bool {
        let mut subs = lock(&self.inner.subscriptions);

        match subs.registry.unsubscribe(channel, id) {
            Removal::NotFound => false,
            Removal::Removed => true,
            Removal::LastRemoved => {
                if subs.online {
                    if let Err(e) = self.inner.link.unsubscribe(channel) {
                        tracing::warn!(channel, error = %e, "Unsubscribe failed");
                    }
                }
                true
            }
        }
    }

    /// Number of handlers currently registered on `channel`.
    pub fn handler_count(&self, channel: &str) -> usize {
        lock(&self.inner.subscriptions).registry.handler_count(channel)
    }

    // ── Session events ───────────────────────────────────────────────

    /// The session is up: re-subscribe every live channel, then drain the queue.
    pub fn handle_connected(&self) {
        self.inner.state.send_replace(ConnectionState::Connected);

        {
            let mut subs = lock(&self.inner.subscriptions);
            subs.online = true;
            for channel in subs.registry.channels() {
                if let Err(e) = self.inner.link.subscribe(&channel) {
                    tracing::warn!(%channel, error = %e, "Re-subscribe failed");
                }
            }
        }

        {
            let mut outbound = lock(&self.inner.outbound);
            outbound.flush_pending = true;
            self.flush(&mut outbound);
        }
    }

    /// Retry a flush that stopped partway. Cheap no-op otherwise.
    pub fn resume_flush(&self) {
        let mut outbound = lock(&self.inner.outbound);
        if outbound.flush_pending {
            self.flush(&mut outbound);
        }
    }

    /// The session dropped: stop sending directly and start queueing.
    pub fn handle_disconnected(&self) {
        lock(&self.inner.subscriptions).online = false;
        {
            let mut outbound = lock(&self.inner.outbound);
            outbound.online = false;
            outbound.flush_pending = false;
        }
        self.inner.state.send_replace(ConnectionState::Disconnected);
    }

    /// Route one inbound message to the channel's handlers.
    ///
    /// The handler list is snapshotted before dispatch, so handlers may
    /// (un)subscribe from inside their own invocation.
    pub fn handle_incoming(&self, channel: &str, payload: &[u8]) {
        let handlers = lock(&self.inner.subscriptions).registry.snapshot(channel);
        if handlers.is_empty() {
            tracing::trace!(channel, "No handlers for inbound message");
            return;
        }
        registry::dispatch(&handlers, channel, payload);
    }

    fn set_state(&self, state: ConnectionState) {
        self.inner.state.send_replace(state);
    }

    /// Drain the queue in FIFO order. Caller holds the outbound lock.
    fn flush(&self, outbound: &mut Outbound) {
        let mut sent = 0usize;

        while let Some(message) = outbound.queue.pop() {
            if let Err(e) = self.inner.link.publish(&message.channel, &message.payload) {
                tracing::warn!(
                    error = %e,
                    sent,
                    remaining = outbound.queue.len() + 1,
                    "Flush interrupted, will retry"
                );
                outbound.queue.requeue_front(message);
                return;
            }
            sent += 1;
        }

        if sent > 0 {
            tracing::info!(sent, "Flushed offline queue");
        }
        outbound.flush_pending = false;
        outbound.online = true;
    }

    // ── State observation ────────────────────────────────────────────

    /// Subscribe to connection state changes.
    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    pub fn current_state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    /// Wait until the session reaches `Connected`. Returns `false` on timeout.
    pub async fn wait_connected(&self, timeout: Duration) -> bool {
        let mut rx = self.state();
        matches!(
            tokio::time::timeout(timeout, rx.wait_for(|s| *s == ConnectionState::Connected)).await,
            Ok(Ok(_))
        )
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Close the session and stop reconnecting.
    ///
    /// Requests a graceful MQTT disconnect so anything already handed to the
    /// transport gets written, then joins the driver task.
    pub async fn shutdown(&self) {
        self.inner.closing.store(true, Ordering::SeqCst);

        if let Err(e) = self.inner.link.disconnect() {
            tracing::debug!(error = %e, "Disconnect request failed");
        }

        let handle = lock(&self.inner.driver).take();
        if let Some(mut handle) = handle {
            if tokio::time::timeout(SHUTDOWN_GRACE, &mut handle).await.is_err() {
                tracing::debug!("Graceful disconnect timed out, cancelling driver");
                self.inner.cancel.cancel();
                let _ = handle.await;
            }
        }

        self.inner.cancel.cancel();
        self.handle_disconnected();
    }

    fn is_closing(&self) -> bool {
        self.inner.closing.load(Ordering::SeqCst)
    }
}

// ── Driver task ──────────────────────────────────────────────────────

/// Poll the event source forever: connect -> read -> on error, wait -> reconnect.
async fn run_event_loop<S: EventSource>(
    connection: TransportConnection,
    mut source: S,
    reconnect_delay: Duration,
) {
    let cancel = connection.inner.cancel.clone();
    let mut attempt: u32 = 0;
    connection.set_state(ConnectionState::Connecting);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            event = source.next_event() => {
                match event {
                    Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                        tracing::info!(
                            attempt,
                            session_present = ack.session_present,
                            "MQTT connected"
                        );
                        attempt = 0;
                        connection.handle_connected();
                    }
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        connection.handle_incoming(&publish.topic, &publish.payload);
                        connection.resume_flush();
                    }
                    Ok(Event::Outgoing(Outgoing::Disconnect)) if connection.is_closing() => {
                        tracing::info!("MQTT disconnect sent");
                        break;
                    }
                    Ok(event) => {
                        tracing::trace!(?event, "MQTT event");
                        connection.resume_flush();
                    }
                    Err(e) => {
                        connection.handle_disconnected();
                        if connection.is_closing() {
                            break;
                        }

                        attempt = attempt.saturating_add(1);
                        tracing::warn!(error = %e, attempt, "MQTT connection lost");
                        let delay_ms =
                            u64::try_from(reconnect_delay.as_millis()).unwrap_or(u64::MAX);
                        tracing::info!(
                            delay_ms,
                            attempt,
                            "Waiting before reconnect"
                        );

                        tokio::select! {
                            biased;
                            () = cancel.cancelled() => break,
                            () = tokio::time::sleep(reconnect_delay) => {}
                        }
                        connection.set_state(ConnectionState::Connecting);
                    }
                }
            }
        }
    }

    tracing::debug!("MQTT event loop exiting");
}
