//! Outbound buffer used while the broker is unreachable.
//!
//! Messages come out in exactly the order they went in. An optional capacity
//! bounds memory during long outages: once full, the oldest message is
//! evicted to make room for the newest.

use std::collections::VecDeque;
use std::num::NonZeroUsize;

use bytes::Bytes;

/// Default capacity for the offline queue.
pub const DEFAULT_QUEUE_LIMIT: usize = 1024;

/// A message waiting for the connection to come back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedMessage {
    pub channel: String,
    pub payload: Bytes,
    /// Enqueue sequence number, strictly increasing for the queue's lifetime.
    pub seq: u64,
}

/// FIFO buffer of outbound messages.
#[derive(Debug)]
pub struct PublishQueue {
    messages: VecDeque<QueuedMessage>,
    limit: Option<NonZeroUsize>,
    next_seq: u64,
    evicted: u64,
}

impl Default for PublishQueue {
    fn default() -> Self {
        Self::new(NonZeroUsize::new(DEFAULT_QUEUE_LIMIT))
    }
}

impl PublishQueue {
    /// Create a queue holding at most `limit` messages (`None` = unbounded).
    pub fn new(limit: Option<NonZeroUsize>) -> Self {
        Self {
            messages: VecDeque::new(),
            limit,
            next_seq: 0,
            evicted: 0,
        }
    }

    pub fn unbounded() -> Self {
        Self::new(None)
    }

    /// Append a message. Returns the evicted message if the queue was full.
    pub fn push(&mut self, channel: impl Into<String>, payload: Bytes) -> Option<QueuedMessage> {
        let evicted = match self.limit {
            Some(limit) if self.messages.len() >= limit.get() => {
                self.evicted += 1;
                self.messages.pop_front()
            }
            _ => None,
        };

        let seq = self.next_seq;
        self.next_seq += 1;
        self.messages.push_back(QueuedMessage {
            channel: channel.into(),
            payload,
            seq,
        });

        evicted
    }

    /// Remove and return the oldest message.
    pub fn pop(&mut self) -> Option<QueuedMessage> {
        self.messages.pop_front()
    }

    /// Put a message back at the head of the queue, keeping its sequence number.
    ///
    /// Used when a flush fails partway: the message that could not be sent
    /// goes back in front of everything that was queued behind it.
    pub fn requeue_front(&mut self, message: QueuedMessage) {
        self.messages.push_front(message);
    }

    /// Iterate over queued messages, oldest first, without consuming them.
    pub fn iter(&self) -> impl Iterator<Item = &QueuedMessage> {
        self.messages.iter()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn limit(&self) -> Option<NonZeroUsize> {
        self.limit
    }

    /// Total number of messages dropped to make room since creation.
    pub fn evicted(&self) -> u64 {
        self.evicted
    }
}
