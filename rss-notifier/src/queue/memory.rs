use super::{check_batch_size, MessageQueue, OutgoingMessage, QueueMessage};
use crate::types::Result;
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use uuid::Uuid;

const DEFAULT_VISIBILITY_TIMEOUT: Duration = Duration::from_secs(30);

struct Entry {
    message: QueueMessage,
    visible_at: Instant,
}

#[derive(Default)]
struct QueueState {
    entries: Vec<Entry>,
    batch_sizes: Vec<usize>,
}

/// In-process queue. Keeps FIFO order and collapses duplicate dedup ids among
/// messages that have not been deleted yet.
pub struct MemoryQueue {
    name: String,
    visibility_timeout: Duration,
    state: Mutex<QueueState>,
}

impl MemoryQueue {
    pub fn new(name: &str) -> Self {
        Self::with_visibility_timeout(name, DEFAULT_VISIBILITY_TIMEOUT)
    }

    pub fn with_visibility_timeout(name: &str, visibility_timeout: Duration) -> Self {
        Self {
            name: name.to_owned(),
            visibility_timeout,
            state: Mutex::new(QueueState::default()),
        }
    }

    /// Every message not yet deleted, in or out of flight.
    pub async fn pending(&self) -> Vec<QueueMessage> {
        let state = self.state.lock().await;
        state.entries.iter().map(|entry| entry.message.clone()).collect()
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Size of every `send_batch` call accepted so far.
    pub async fn batch_sizes(&self) -> Vec<usize> {
        self.state.lock().await.batch_sizes.clone()
    }
}

#[async_trait]
impl MessageQueue for MemoryQueue {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send_batch(&self, messages: Vec<OutgoingMessage>) -> Result<()> {
        check_batch_size(&messages)?;

        let mut state = self.state.lock().await;
        state.batch_sizes.push(messages.len());

        let now = Instant::now();
        for message in messages {
            let duplicate = message.dedup_id.is_some()
                && state
                    .entries
                    .iter()
                    .any(|entry| entry.message.dedup_id == message.dedup_id);
            if duplicate {
                continue;
            }

            state.entries.push(Entry {
                message: QueueMessage {
                    message_id: Uuid::new_v4(),
                    body: message.body,
                    dedup_id: message.dedup_id,
                },
                visible_at: now,
            });
        }
        Ok(())
    }

    async fn receive(&self, max: usize) -> Result<Vec<QueueMessage>> {
        let mut state = self.state.lock().await;
        let now = Instant::now();
        let hidden_until = now + self.visibility_timeout;

        Ok(state
            .entries
            .iter_mut()
            .filter(|entry| entry.visible_at <= now)
            .take(max)
            .map(|entry| {
                entry.visible_at = hidden_until;
                entry.message.clone()
            })
            .collect())
    }

    async fn delete(&self, message_id: Uuid) -> Result<()> {
        let mut state = self.state.lock().await;
        state.entries.retain(|entry| entry.message.message_id != message_id);
        Ok(())
    }
}
