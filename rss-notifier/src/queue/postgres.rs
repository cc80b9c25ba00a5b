use super::{check_batch_size, MessageQueue, OutgoingMessage, QueueMessage};
use crate::types::{NotifierError, Result};
use async_trait::async_trait;
use sqlx::{PgPool, Row};
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

/// A named queue stored in a PostgreSQL table. Several queues share one
/// table and are told apart by the `queue` column.
pub struct PgQueue {
    db: PgPool,
    table: String,
    name: String,
    visibility_timeout: Duration,
}

impl PgQueue {
    /// `table` is interpolated into SQL and must already be validated.
    pub fn new(db: PgPool, table: &str, name: &str, visibility_timeout: Duration) -> Self {
        Self {
            db,
            table: table.to_owned(),
            name: name.to_owned(),
            visibility_timeout,
        }
    }

    fn error(&self, operation: &'static str) -> impl FnOnce(sqlx::Error) -> NotifierError {
        let queue = self.name.clone();
        move |source| NotifierError::Queue { queue, operation, source }
    }

    pub async fn setup_schema(&self) -> Result<()> {
        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS "{}" (
                id UUID PRIMARY KEY,
                seq BIGSERIAL,
                queue TEXT NOT NULL,
                body TEXT NOT NULL,
                dedup_id TEXT,
                visible_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
                created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
            )
            "#,
            self.table
        ))
        .execute(&self.db)
        .await
        .map_err(self.error("setup_schema"))?;

        sqlx::query(&format!(
            r#"CREATE UNIQUE INDEX IF NOT EXISTS "{0}_dedup_idx" ON "{0}" (queue, dedup_id)"#,
            self.table
        ))
        .execute(&self.db)
        .await
        .map_err(self.error("setup_schema"))?;

        sqlx::query(&format!(
            r#"CREATE INDEX IF NOT EXISTS "{0}_visible_idx" ON "{0}" (queue, visible_at)"#,
            self.table
        ))
        .execute(&self.db)
        .await
        .map_err(self.error("setup_schema"))?;

        info!("Queue table {} is ready", self.table);
        Ok(())
    }
}

#[async_trait]
impl MessageQueue for PgQueue {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send_batch(&self, messages: Vec<OutgoingMessage>) -> Result<()> {
        check_batch_size(&messages)?;
        if messages.is_empty() {
            return Ok(());
        }

        let query = format!(
            r#"
            INSERT INTO "{}" (id, queue, body, dedup_id)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (queue, dedup_id) DO NOTHING
            "#,
            self.table
        );

        let mut tx = self.db.begin().await.map_err(self.error("send_batch"))?;
        let mut accepted = 0;
        for message in &messages {
            let result = sqlx::query(&query)
                .bind(Uuid::new_v4())
                .bind(&self.name)
                .bind(&message.body)
                .bind(&message.dedup_id)
                .execute(&mut *tx)
                .await
                .map_err(self.error("send_batch"))?;
            accepted += result.rows_affected();
        }
        tx.commit().await.map_err(self.error("send_batch"))?;

        debug!("Queue {}: {} of {} messages accepted", self.name, accepted, messages.len());
        Ok(())
    }

    async fn receive(&self, max: usize) -> Result<Vec<QueueMessage>> {
        let query = format!(
            r#"
            WITH available AS (
                SELECT id
                FROM "{0}"
                WHERE queue = $1 AND visible_at <= NOW()
                ORDER BY seq
                LIMIT $2
                FOR UPDATE SKIP LOCKED
            )
            UPDATE "{0}"
            SET visible_at = NOW() + make_interval(secs => $3)
            FROM available
            WHERE "{0}".id = available.id
            RETURNING "{0}".seq, "{0}".id, "{0}".body, "{0}".dedup_id
            "#,
            self.table
        );

        let rows = sqlx::query(&query)
            .bind(&self.name)
            .bind(max as i64)
            .bind(self.visibility_timeout.as_secs_f64())
            .fetch_all(&self.db)
            .await
            .map_err(self.error("receive"))?;

        // RETURNING does not keep the CTE's order.
        let mut messages = Vec::with_capacity(rows.len());
        for row in rows {
            let seq: i64 = row.try_get("seq").map_err(self.error("receive"))?;
            messages.push((
                seq,
                QueueMessage {
                    message_id: row.try_get("id").map_err(self.error("receive"))?,
                    body: row.try_get("body").map_err(self.error("receive"))?,
                    dedup_id: row.try_get("dedup_id").map_err(self.error("receive"))?,
                },
            ));
        }
        messages.sort_by_key(|(seq, _)| *seq);
        Ok(messages.into_iter().map(|(_, message)| message).collect())
    }

    async fn delete(&self, message_id: Uuid) -> Result<()> {
        sqlx::query(&format!(r#"DELETE FROM "{}" WHERE id = $1"#, self.table))
            .bind(message_id)
            .execute(&self.db)
            .await
            .map_err(self.error("delete"))?;
        Ok(())
    }
}
