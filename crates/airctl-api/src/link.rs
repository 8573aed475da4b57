//! Low-level transport primitives.
//!
//! [`TransportConnection`](crate::TransportConnection) never talks to the
//! MQTT client directly -- it goes through the [`Link`] trait so the whole
//! connection lifecycle can be driven against [`MemoryLink`] in tests.
//!
//! Every method is non-blocking. The connection calls these while holding its
//! outbound lock, which is what keeps flush-then-publish ordering intact.
//!
//! The inbound half is [`EventSource`]: whatever the driver task polls for
//! session events. The reconnect loop runs unchanged over a scripted source.

use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use rumqttc::{AsyncClient, ConnectionError, Event, EventLoop, QoS};

use crate::error::Error;

/// Fire-and-forget transport operations.
pub trait Link: Send + Sync + 'static {
    /// Hand a message to the transport for delivery.
    fn publish(&self, channel: &str, payload: &[u8]) -> Result<(), Error>;

    /// Issue a transport-level subscribe.
    fn subscribe(&self, channel: &str) -> Result<(), Error>;

    /// Issue a transport-level unsubscribe.
    fn unsubscribe(&self, channel: &str) -> Result<(), Error>;

    /// Ask the transport to close the session.
    fn disconnect(&self) -> Result<(), Error>;
}

/// Stream of session events polled by the driver task.
///
/// An `Err` means the session is gone; the next call starts a fresh
/// connection attempt.
pub trait EventSource: Send + 'static {
    fn next_event(&mut self) -> impl Future<Output = Result<Event, ConnectionError>> + Send;
}

// ── rumqttc ──────────────────────────────────────────────────────────

impl EventSource for EventLoop {
    fn next_event(&mut self) -> impl Future<Output = Result<Event, ConnectionError>> + Send {
        self.poll()
    }
}

impl Link for AsyncClient {
    fn publish(&self, channel: &str, payload: &[u8]) -> Result<(), Error> {
        self.try_publish(channel, QoS::AtMostOnce, false, payload.to_vec())?;
        Ok(())
    }

    fn subscribe(&self, channel: &str) -> Result<(), Error> {
        self.try_subscribe(channel, QoS::AtMostOnce)?;
        Ok(())
    }

    fn unsubscribe(&self, channel: &str) -> Result<(), Error> {
        self.try_unsubscribe(channel)?;
        Ok(())
    }

    fn disconnect(&self) -> Result<(), Error> {
        self.try_disconnect()?;
        Ok(())
    }
}

// ── In-memory link ───────────────────────────────────────────────────

/// A single operation recorded by [`MemoryLink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkOp {
    Publish { channel: String, payload: Bytes },
    Subscribe(String),
    Unsubscribe(String),
    Disconnect,
}

/// In-memory [`Link`] that records every accepted operation.
///
/// Publishes can be made to fail after a budget is spent, which is how
/// tests exercise a flush that breaks halfway through.
#[derive(Debug, Default)]
pub struct MemoryLink {
    ops: Mutex<Vec<LinkOp>>,
    /// Remaining publishes before every further publish fails. `None` = never fail.
    publish_budget: Mutex<Option<usize>>,
}

impl MemoryLink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded operations, oldest first.
    pub fn ops(&self) -> Vec<LinkOp> {
        lock(&self.ops).clone()
    }

    /// Drain and return the recorded operations.
    pub fn take(&self) -> Vec<LinkOp> {
        std::mem::take(&mut *lock(&self.ops))
    }

    /// `(channel, payload)` for every accepted publish, oldest first.
    pub fn published(&self) -> Vec<(String, Bytes)> {
        lock(&self.ops)
            .iter()
            .filter_map(|op| match op {
                LinkOp::Publish { channel, payload } => Some((channel.clone(), payload.clone())),
                _ => None,
            })
            .collect()
    }

    /// Accept `budget` more publishes, then fail every following one.
    pub fn fail_publishes_after(&self, budget: usize) {
        *lock(&self.publish_budget) = Some(budget);
    }

    /// Stop failing publishes.
    pub fn heal(&self) {
        *lock(&self.publish_budget) = None;
    }

    fn record(&self, op: LinkOp) {
        lock(&self.ops).push(op);
    }
}

impl Link for MemoryLink {
    fn publish(&self, channel: &str, payload: &[u8]) -> Result<(), Error> {
        {
            let mut budget = lock(&self.publish_budget);
            match budget.as_mut() {
                Some(0) => return Err(Error::Link("request channel full".into())),
                Some(remaining) => *remaining -= 1,
                None => {}
            }
        }
        self.record(LinkOp::Publish {
            channel: channel.to_owned(),
            payload: Bytes::copy_from_slice(payload),
        });
        Ok(())
    }

    fn subscribe(&self, channel: &str) -> Result<(), Error> {
        self.record(LinkOp::Subscribe(channel.to_owned()));
        Ok(())
    }

    fn unsubscribe(&self, channel: &str) -> Result<(), Error> {
        self.record(LinkOp::Unsubscribe(channel.to_owned()));
        Ok(())
    }

    fn disconnect(&self) -> Result<(), Error> {
        self.record(LinkOp::Disconnect);
        Ok(())
    }
}

/// Lock a std mutex, recovering the data if a previous holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
