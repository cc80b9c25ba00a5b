use crate::traits::Mailer;
use crate::types::{NotificationJob, Result};
use async_trait::async_trait;
use tracing::info;

/// Mailer that writes each notification to the log instead of sending it.
#[derive(Debug, Default, Clone)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, job: &NotificationJob) -> Result<()> {
        info!(
            feed = %job.feed,
            post = %job.id,
            posted = %job.posted.to_rfc3339(),
            "Notify {}: new post {}",
            job.email,
            job.link
        );
        Ok(())
    }
}
