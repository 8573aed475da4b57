//! Per-channel handler registry.
//!
//! Maps each channel to an ordered list of handlers. The registry itself is
//! plain data: it reports when a channel gains its first handler or loses
//! its last one, and the owning connection turns that into transport-level
//! subscribe/unsubscribe calls.
//!
//! Handlers are removed by [`HandlerId`] token, never by position, and
//! [`dispatch`] runs over a cloned snapshot of the list. A handler is free to
//! unsubscribe itself (or anyone else) while it is being invoked.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use thiserror::Error;

// ── Handler contract ─────────────────────────────────────────────────

/// Failure reported by a single handler. Logged by [`dispatch`], never propagated.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("malformed payload: {0}")]
    Malformed(String),

    #[error("{0}")]
    Failed(String),
}

impl From<serde_json::Error> for HandlerError {
    fn from(err: serde_json::Error) -> Self {
        Self::Malformed(err.to_string())
    }
}

/// Consumer of raw inbound messages for one or more channels.
pub trait MessageHandler: Send + Sync {
    fn handle(&self, channel: &str, payload: &[u8]) -> Result<(), HandlerError>;
}

impl<F> MessageHandler for F
where
    F: Fn(&str, &[u8]) -> Result<(), HandlerError> + Send + Sync,
{
    fn handle(&self, channel: &str, payload: &[u8]) -> Result<(), HandlerError> {
        self(channel, payload)
    }
}

/// Opaque token identifying one registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerId(u64);

/// Result of [`TopicRegistry::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Registered {
    pub id: HandlerId,
    /// `true` if the channel had no handlers before this call.
    pub first_for_channel: bool,
}

/// Result of [`TopicRegistry::unsubscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    /// No such handler on that channel.
    NotFound,
    /// Removed; other handlers remain.
    Removed,
    /// Removed the last handler; the channel entry is gone.
    LastRemoved,
}

// ── Registry ─────────────────────────────────────────────────────────

struct Registration {
    id: HandlerId,
    handler: Arc<dyn MessageHandler>,
}

/// Channel name -> ordered handler list.
#[derive(Default)]
pub struct TopicRegistry {
    channels: HashMap<String, Vec<Registration>>,
    next_id: u64,
}

impl std::fmt::Debug for TopicRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let counts: HashMap<&str, usize> = self
            .channels
            .iter()
            .map(|(channel, list)| (channel.as_str(), list.len()))
            .collect();
        f.debug_struct("TopicRegistry").field("channels", &counts).finish()
    }
}

impl TopicRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `handler` to the channel's list.
    ///
    /// Registering the same `Arc` twice on one channel is a no-op that
    /// returns the existing token.
    pub fn subscribe(&mut self, channel: &str, handler: Arc<dyn MessageHandler>) -> Registered {
        let list = self.channels.entry(channel.to_owned()).or_default();

        if let Some(existing) = list.iter().find(|r| Arc::ptr_eq(&r.handler, &handler)) {
            return Registered {
                id: existing.id,
                first_for_channel: false,
            };
        }

        let first_for_channel = list.is_empty();
        let id = HandlerId(self.next_id);
        self.next_id += 1;
        list.push(Registration { id, handler });

        Registered {
            id,
            first_for_channel,
        }
    }

    /// Remove a handler by token. Drops the channel entry once it is empty.
    pub fn unsubscribe(&mut self, channel: &str, id: HandlerId) -> Removal {
        let Some(list) = self.channels.get_mut(channel) else {
            return Removal::NotFound;
        };
        let Some(index) = list.iter().position(|r| r.id == id) else {
            return Removal::NotFound;
        };

        list.remove(index);
        if list.is_empty() {
            self.channels.remove(channel);
            Removal::LastRemoved
        } else {
            Removal::Removed
        }
    }

    /// Clone the channel's handlers, in registration order.
    pub fn snapshot(&self, channel: &str) -> Vec<Arc<dyn MessageHandler>> {
        self.channels
            .get(channel)
            .map(|list| list.iter().map(|r| Arc::clone(&r.handler)).collect())
            .unwrap_or_default()
    }

    /// Every channel with at least one handler.
    pub fn channels(&self) -> Vec<String> {
        self.channels.keys().cloned().collect()
    }

    pub fn handler_count(&self, channel: &str) -> usize {
        self.channels.get(channel).map_or(0, Vec::len)
    }

    pub fn contains(&self, channel: &str) -> bool {
        self.channels.contains_key(channel)
    }
}

// ── Dispatch ─────────────────────────────────────────────────────────

/// Invoke each handler once, in order. Returns how many succeeded.
///
/// A handler that errors or panics is logged and skipped; the rest still run.
pub fn dispatch(handlers: &[Arc<dyn MessageHandler>], channel: &str, payload: &[u8]) -> usize {
    let mut delivered = 0;

    for (index, handler) in handlers.iter().enumerate() {
        match panic::catch_unwind(AssertUnwindSafe(|| handler.handle(channel, payload))) {
            Ok(Ok(())) => delivered += 1,
            Ok(Err(e)) => {
                tracing::warn!(channel, handler = index, error = %e, "Message handler failed");
            }
            Err(_) => {
                tracing::error!(channel, handler = index, "Message handler panicked");
            }
        }
    }

    delivered
}
