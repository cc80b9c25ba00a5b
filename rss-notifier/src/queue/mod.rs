//! Named message queues between the three handlers.
//!
//! Delivery is at-least-once: a received message stays invisible for the
//! visibility timeout and reappears unless it is deleted.

pub mod memory;
pub mod postgres;

pub use memory::MemoryQueue;
pub use postgres::PgQueue;

use crate::types::{NotifierError, Result};
use async_trait::async_trait;
use uuid::Uuid;

/// Most messages accepted by a single `send_batch`.
pub const SEND_BATCH_SIZE: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    /// Messages sharing a dedup id collapse while one of them is pending.
    pub dedup_id: Option<String>,
    pub body: String,
}

impl OutgoingMessage {
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            dedup_id: None,
            body: body.into(),
        }
    }

    pub fn with_dedup_id(mut self, dedup_id: impl Into<String>) -> Self {
        self.dedup_id = Some(dedup_id.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMessage {
    pub message_id: Uuid,
    pub body: String,
    pub dedup_id: Option<String>,
}

#[async_trait]
pub trait MessageQueue: Send + Sync {
    fn name(&self) -> &str;

    async fn send(&self, message: OutgoingMessage) -> Result<()> {
        self.send_batch(vec![message]).await
    }

    /// Enqueue up to [`SEND_BATCH_SIZE`] messages. All or nothing.
    async fn send_batch(&self, messages: Vec<OutgoingMessage>) -> Result<()>;

    /// Take up to `max` visible messages and hide them for the visibility
    /// timeout.
    async fn receive(&self, max: usize) -> Result<Vec<QueueMessage>>;

    /// Acknowledge a received message.
    async fn delete(&self, message_id: Uuid) -> Result<()>;
}

pub(crate) fn check_batch_size(messages: &[OutgoingMessage]) -> Result<()> {
    if messages.len() > SEND_BATCH_SIZE {
        return Err(NotifierError::BatchTooLarge {
            count: messages.len(),
            limit: SEND_BATCH_SIZE,
        });
    }
    Ok(())
}

/// Handlers take exactly one message per invocation. None is a no-op and more
/// than one is a wiring error.
pub fn single_message(messages: &[QueueMessage]) -> Result<Option<&QueueMessage>> {
    match messages {
        [] => Ok(None),
        [message] => Ok(Some(message)),
        _ => Err(NotifierError::UnexpectedBatch { count: messages.len() }),
    }
}
