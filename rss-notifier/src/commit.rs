use crate::queue::{single_message, QueueMessage};
use crate::store::{InsertOutcome, NotificationStore};
use crate::traits::Mailer;
use crate::types::{NotificationJob, NotifierError, Result, SentMarker};
use std::sync::Arc;
use tracing::{debug, error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// No message was delivered to this invocation.
    Idle,
    Sent,
    /// Another delivery of the same job already committed it.
    AlreadySent,
    /// The marker was committed but the transport failed. Not retried.
    Undelivered,
}

/// Notification queue entry point. Commits the sent marker first and only
/// emails the subscriber if this invocation created it, so at most one email
/// goes out per (feed, post, subscriber).
pub struct CommitHandler {
    store: Arc<dyn NotificationStore>,
    mailer: Arc<dyn Mailer>,
}

impl CommitHandler {
    pub fn new(store: Arc<dyn NotificationStore>, mailer: Arc<dyn Mailer>) -> Self {
        Self { store, mailer }
    }

    pub async fn handle(&self, messages: &[QueueMessage]) -> Result<CommitOutcome> {
        let Some(message) = single_message(messages)? else {
            debug!("No notification message to commit");
            return Ok(CommitOutcome::Idle);
        };

        let job: NotificationJob =
            serde_json::from_str(&message.body).map_err(|source| NotifierError::MalformedJob {
                message_id: message.message_id,
                source,
            })?;
        self.commit(&job).await
    }

    pub async fn commit(&self, job: &NotificationJob) -> Result<CommitOutcome> {
        match self.store.insert_sent_marker(&SentMarker::from(job)).await? {
            InsertOutcome::AlreadyExists => {
                debug!("Post {} of {} already sent to {}", job.id, job.feed, job.email);
                Ok(CommitOutcome::AlreadySent)
            }
            InsertOutcome::Inserted => match self.mailer.send(job).await {
                Ok(()) => {
                    info!("Sent post {} of {} to {}", job.id, job.feed, job.email);
                    Ok(CommitOutcome::Sent)
                }
                Err(e) => {
                    error!(
                        "Committed post {} of {} for {} but delivery failed: {}",
                        job.id, job.feed, job.email, e
                    );
                    Ok(CommitOutcome::Undelivered)
                }
            },
        }
    }
}
