// ── Request/response correlation ──
//
// The transport only offers fire-and-forget publish. `RequestCorrelator`
// layers a call/response contract on top: each command carries a fresh
// `request_id`, a pending entry waits for the echo on the shared response
// channel, and a deadline rejects it if no echo arrives.
//
// Completion always starts by *removing* the entry from the pending map.
// Whoever removes it (the response router, the deadline, or shutdown) is
// the only one that may resolve it, so a request resolves at most once.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use airctl_api::{HandlerError, HandlerId, MessageHandler, TransportConnection};
use chrono::Utc;
use serde_json::{Map, Value};
use tokio::sync::{broadcast, oneshot};
use tokio::time::Instant;
use uuid::Uuid;

use crate::channels::{SCHEDULE_RESPONSE, ScheduleAction};
use crate::config::DEFAULT_REQUEST_TIMEOUT;
use crate::error::CoreError;
use crate::model::{SchedulerResponse, TriggerEvent};

const TRIGGER_CHANNEL_SIZE: usize = 64;

type Completion = oneshot::Sender<Result<SchedulerResponse, CoreError>>;
type PendingMap = Arc<Mutex<HashMap<String, PendingRequest>>>;

struct PendingRequest {
    action: ScheduleAction,
    created_at: Instant,
    completion: Completion,
}

/// Correlates outbound schedule commands with their responses.
///
/// Cheaply cloneable. Call [`start`](Self::start) once to attach the
/// response router to the connection and [`stop`](Self::stop) to detach it
/// and fail whatever is still pending.
#[derive(Clone)]
pub struct RequestCorrelator {
    inner: Arc<Inner>,
}

struct Inner {
    connection: TransportConnection,
    pending: PendingMap,
    triggers: broadcast::Sender<TriggerEvent>,
    timeout: Duration,
    router: Mutex<Option<HandlerId>>,
}

impl RequestCorrelator {
    pub fn new(connection: TransportConnection, timeout: Duration) -> Self {
        let (triggers, _) = broadcast::channel(TRIGGER_CHANNEL_SIZE);
        Self {
            inner: Arc::new(Inner {
                connection,
                pending: Arc::new(Mutex::new(HashMap::new())),
                triggers,
                timeout,
                router: Mutex::new(None),
            }),
        }
    }

    pub fn with_default_timeout(connection: TransportConnection) -> Self {
        Self::new(connection, DEFAULT_REQUEST_TIMEOUT)
    }

    /// Register the response router on the shared response channel. Idempotent.
    pub fn start(&self) {
        let mut router = lock(&self.inner.router);
        if router.is_some() {
            return;
        }

        let handler: Arc<dyn MessageHandler> = Arc::new(ResponseRouter {
            pending: Arc::clone(&self.inner.pending),
            triggers: self.inner.triggers.clone(),
        });
        *router = Some(self.inner.connection.subscribe(SCHEDULE_RESPONSE, handler));
        tracing::debug!(channel = SCHEDULE_RESPONSE, "Response router attached");
    }

    /// Detach the router and fail every pending request with [`CoreError::Shutdown`].
    pub fn stop(&self) {
        if let Some(id) = lock(&self.inner.router).take() {
            self.inner.connection.unsubscribe(SCHEDULE_RESPONSE, id);
        }

        let drained: Vec<(String, PendingRequest)> = lock(&self.inner.pending).drain().collect();
        if !drained.is_empty() {
            tracing::debug!(count = drained.len(), "Failing pending requests on shutdown");
        }
        for (_, entry) in drained {
            let _ = entry.completion.send(Err(CoreError::Shutdown {
                action: entry.action,
            }));
        }
    }

    /// Publish `body` plus a fresh `request_id` on the action's channel and
    /// wait for the matching response.
    ///
    /// Returns the response whatever its status; callers decide what a
    /// non-success status means (see [`SchedulerResponse::into_result`]).
    /// Fails with [`CoreError::Timeout`] if nothing matching arrives before
    /// the deadline. Dropping the future discards the pending entry.
    pub async fn send(
        &self,
        action: ScheduleAction,
        body: Map<String, Value>,
    ) -> Result<SchedulerResponse, CoreError> {
        let request_id = Uuid::new_v4().to_string();

        let mut envelope = body;
        envelope.insert("request_id".into(), Value::String(request_id.clone()));
        let payload =
            serde_json::to_vec(&Value::Object(envelope)).map_err(|e| CoreError::Protocol {
                action,
                message: e.to_string(),
            })?;

        let (tx, mut rx) = oneshot::channel();
        let created_at = Instant::now();
        let deadline = created_at + self.inner.timeout;

        // Registered before publishing so even an instant reply finds its entry.
        lock(&self.inner.pending).insert(
            request_id.clone(),
            PendingRequest {
                action,
                created_at,
                completion: tx,
            },
        );
        let _guard = PendingGuard {
            pending: &self.inner.pending,
            request_id: &request_id,
        };

        self.inner.connection.publish(action.channel(), payload);
        tracing::debug!(%action, %request_id, channel = action.channel(), "Request sent");

        match tokio::time::timeout_at(deadline, &mut rx).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => Err(CoreError::Shutdown { action }),
            Err(_) => {
                let expired = lock(&self.inner.pending).remove(&request_id).is_some();
                if expired {
                    tracing::warn!(
                        %action,
                        %request_id,
                        timeout_ms = millis(self.inner.timeout),
                        "Request timed out"
                    );
                    return Err(CoreError::Timeout {
                        action,
                        timeout_ms: millis(self.inner.timeout),
                    });
                }
                // The router already took the entry; its send is in flight.
                (&mut rx)
                    .await
                    .unwrap_or_else(|_| Err(CoreError::Shutdown { action }))
            }
        }
    }

    /// Unsolicited trigger notifications.
    pub fn triggers(&self) -> broadcast::Receiver<TriggerEvent> {
        self.inner.triggers.subscribe()
    }

    /// Requests currently waiting for a response.
    pub fn pending_count(&self) -> usize {
        lock(&self.inner.pending).len()
    }

    pub fn timeout(&self) -> Duration {
        self.inner.timeout
    }

    pub fn connection(&self) -> &TransportConnection {
        &self.inner.connection
    }
}

/// Removes the pending entry if the `send` future is dropped before completion.
struct PendingGuard<'a> {
    pending: &'a PendingMap,
    request_id: &'a str,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if lock(self.pending).remove(self.request_id).is_some() {
            tracing::debug!(request_id = self.request_id, "Pending request abandoned");
        }
    }
}

// ── Response routing ─────────────────────────────────────────────────

/// Handler on the shared response channel.
struct ResponseRouter {
    pending: PendingMap,
    triggers: broadcast::Sender<TriggerEvent>,
}

impl MessageHandler for ResponseRouter {
    fn handle(&self, _channel: &str, payload: &[u8]) -> Result<(), HandlerError> {
        let response: SchedulerResponse = serde_json::from_slice(payload)?;

        if let Some(request_id) = response.request_id.as_deref() {
            let entry = lock(&self.pending).remove(request_id);
            if let Some(entry) = entry {
                tracing::debug!(
                    action = %entry.action,
                    request_id,
                    status = ?response.status,
                    elapsed_ms = millis(entry.created_at.elapsed()),
                    "Response matched"
                );
                // Receiver gone means the caller stopped waiting.
                let _ = entry.completion.send(Ok(response));
                return Ok(());
            }
        }

        if response.is_trigger() {
            let event = TriggerEvent {
                schedule_id: response.trigger_schedule_id(),
                received_at: Utc::now(),
            };
            tracing::info!(schedule_id = ?event.schedule_id, "Schedule triggered");
            let _ = self.triggers.send(event);
            return Ok(());
        }

        tracing::debug!(
            action = %response.action,
            request_id = ?response.request_id,
            "Ignoring response with no pending request"
        );
        Ok(())
    }
}

// ── Helpers ──────────────────────────────────────────────────────────

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
