// ── Generic JSON topic observer ──
//
// `TopicWatch` keeps the latest decoded payload, the last decode error and
// a loading flag in a `watch` channel. `TopicFeed` queues every message in
// arrival order instead. Dropping either removes its handler from the
// connection.

use std::sync::Arc;

use airctl_api::{HandlerError, HandlerId, MessageHandler, TransportConnection};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::{mpsc, watch};

use crate::error::CoreError;

/// Latest state of a watched channel.
#[derive(Debug, Clone, PartialEq)]
pub struct TopicSnapshot<T> {
    /// Last successfully decoded payload. Kept across decode failures.
    pub data: Option<T>,
    /// Decode error from the most recent message, if it failed.
    pub error: Option<String>,
    /// `true` until the first message arrives.
    pub loading: bool,
}

impl<T> Default for TopicSnapshot<T> {
    fn default() -> Self {
        Self {
            data: None,
            error: None,
            loading: true,
        }
    }
}

pub struct TopicWatch<T> {
    connection: TransportConnection,
    channel: String,
    handler: HandlerId,
    rx: watch::Receiver<TopicSnapshot<T>>,
}

impl<T> TopicWatch<T>
where
    T: DeserializeOwned + Clone + Send + Sync + 'static,
{
    pub fn new(connection: &TransportConnection, channel: &str) -> Self {
        let (tx, rx) = watch::channel(TopicSnapshot::default());

        let handler: Arc<dyn MessageHandler> = Arc::new(
            move |channel: &str, payload: &[u8]| -> Result<(), HandlerError> {
                match serde_json::from_slice::<T>(payload) {
                    Ok(value) => {
                        tx.send_modify(|s| {
                            s.data = Some(value);
                            s.error = None;
                            s.loading = false;
                        });
                        Ok(())
                    }
                    Err(e) => {
                        let message = format!("invalid JSON on {channel}: {e}");
                        tx.send_modify(|s| {
                            s.error = Some(message.clone());
                            s.loading = false;
                        });
                        Err(HandlerError::Malformed(message))
                    }
                }
            },
        );
        let handler = connection.subscribe(channel, handler);

        Self {
            connection: connection.clone(),
            channel: channel.to_owned(),
            handler,
            rx,
        }
    }

    pub fn current(&self) -> TopicSnapshot<T> {
        self.rx.borrow().clone()
    }

    /// Wait for the next message (decoded or not).
    pub async fn changed(&mut self) -> TopicSnapshot<T> {
        // The sender lives in our own registered handler, so it outlives `self.rx`.
        let _ = self.rx.changed().await;
        self.rx.borrow_and_update().clone()
    }

    pub fn receiver(&self) -> watch::Receiver<TopicSnapshot<T>> {
        self.rx.clone()
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Serialize `value` as JSON and publish it on the watched channel.
    pub fn publish_json<V: Serialize>(&self, value: &V) -> Result<(), CoreError> {
        let payload = serde_json::to_vec(value).map_err(|e| CoreError::ValidationFailed {
            message: e.to_string(),
        })?;
        self.connection.publish(&self.channel, payload);
        Ok(())
    }
}

impl<T> Drop for TopicWatch<T> {
    fn drop(&mut self) {
        self.connection.unsubscribe(&self.channel, self.handler);
    }
}

// ── Lossless feed ────────────────────────────────────────────────────

/// A decoded message, or the decode error for one that wasn't valid JSON.
pub type FeedItem<T> = Result<T, String>;

/// Every message on one channel, queued until read.
pub struct TopicFeed<T> {
    connection: TransportConnection,
    channel: String,
    handler: HandlerId,
    rx: mpsc::UnboundedReceiver<FeedItem<T>>,
}

impl<T> TopicFeed<T>
where
    T: DeserializeOwned + Send + 'static,
{
    pub fn new(connection: &TransportConnection, channel: &str) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();

        let handler: Arc<dyn MessageHandler> = Arc::new(
            move |channel: &str, payload: &[u8]| -> Result<(), HandlerError> {
                match serde_json::from_slice::<T>(payload) {
                    Ok(value) => {
                        let _ = tx.send(Ok(value));
                        Ok(())
                    }
                    Err(e) => {
                        let message = format!("invalid JSON on {channel}: {e}");
                        let _ = tx.send(Err(message.clone()));
                        Err(HandlerError::Malformed(message))
                    }
                }
            },
        );
        let handler = connection.subscribe(channel, handler);

        Self {
            connection: connection.clone(),
            channel: channel.to_owned(),
            handler,
            rx,
        }
    }

    /// Oldest unread message. Waits if none is queued.
    pub async fn next(&mut self) -> Option<FeedItem<T>> {
        self.rx.recv().await
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }
}

impl<T> Drop for TopicFeed<T> {
    fn drop(&mut self) {
        self.connection.unsubscribe(&self.channel, self.handler);
    }
}
