use super::{sent_marker_key, InsertOutcome, NotificationStore, RecordKind};
use crate::types::{FeedIdentity, NotifierError, PostRecord, Result, SentMarker, SubscriberRecord};
use async_trait::async_trait;
use sqlx::{PgPool, Row};
use std::collections::HashSet;
use tracing::{debug, info};

/// Record store on a single PostgreSQL table keyed by `(pk, sk)`.
pub struct PostgresStore {
    db: PgPool,
    table: String,
}

fn store_error(operation: &'static str, scope: impl Into<String>) -> impl FnOnce(sqlx::Error) -> NotifierError {
    let scope = scope.into();
    move |source| NotifierError::Store { operation, scope, source }
}

impl PostgresStore {
    /// `table` is interpolated into SQL and must already be validated.
    pub fn new(db: PgPool, table: &str) -> Self {
        Self {
            db,
            table: table.to_owned(),
        }
    }

    pub async fn setup_schema(&self) -> Result<()> {
        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS "{}" (
                pk TEXT NOT NULL,
                sk TEXT NOT NULL,
                feed TEXT,
                link TEXT,
                posted TIMESTAMP WITH TIME ZONE,
                created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
                PRIMARY KEY (pk, sk)
            )
            "#,
            self.table
        ))
        .execute(&self.db)
        .await
        .map_err(store_error("setup_schema", self.table.as_str()))?;

        info!("Record table {} is ready", self.table);
        Ok(())
    }
}

#[async_trait]
impl NotificationStore for PostgresStore {
    async fn list_feeds(&self) -> Result<HashSet<FeedIdentity>> {
        let rows = sqlx::query(&format!(r#"SELECT pk, feed FROM "{}" WHERE pk LIKE $1"#, self.table))
            .bind(format!("{}#%", RecordKind::FeedSubscription))
            .fetch_all(&self.db)
            .await
            .map_err(store_error("list_feeds", RecordKind::FeedSubscription.as_str()))?;

        let mut feeds = HashSet::with_capacity(rows.len());
        for row in rows {
            let pk: String = row
                .try_get("pk")
                .map_err(store_error("list_feeds", RecordKind::FeedSubscription.as_str()))?;

            let feed = row
                .try_get::<Option<String>, _>("feed")
                .map_err(|e| NotifierError::MalformedRecord {
                    key: pk.clone(),
                    reason: format!("feed is not a string: {}", e),
                })?;

            match feed {
                Some(feed) if !feed.is_empty() => {
                    feeds.insert(feed);
                }
                _ => {
                    return Err(NotifierError::MalformedRecord {
                        key: pk,
                        reason: "feed attribute missing from subscription".to_string(),
                    });
                }
            }
        }

        debug!("Found {} subscribed feeds", feeds.len());
        Ok(feeds)
    }

    async fn insert_subscription(&self, subscription: &SubscriberRecord) -> Result<()> {
        sqlx::query(&format!(
            r#"
            INSERT INTO "{}" (pk, sk, feed)
            VALUES ($1, $2, $3)
            ON CONFLICT (pk, sk) DO UPDATE SET feed = EXCLUDED.feed
            "#,
            self.table
        ))
        .bind(RecordKind::FeedSubscription.partition_key(&subscription.feed))
        .bind(&subscription.email)
        .bind(&subscription.feed)
        .execute(&self.db)
        .await
        .map_err(store_error("insert_subscription", subscription.feed.as_str()))?;

        info!("Subscribed {} to {}", subscription.email, subscription.feed);
        Ok(())
    }

    async fn list_subscribers(&self, feed: &str) -> Result<Vec<SubscriberRecord>> {
        let rows = sqlx::query(&format!(r#"SELECT sk FROM "{}" WHERE pk = $1"#, self.table))
            .bind(RecordKind::FeedSubscription.partition_key(feed))
            .fetch_all(&self.db)
            .await
            .map_err(store_error("list_subscribers", feed))?;

        let mut subscribers = Vec::with_capacity(rows.len());
        for row in rows {
            subscribers.push(SubscriberRecord {
                feed: feed.to_owned(),
                email: row.try_get("sk").map_err(store_error("list_subscribers", feed))?,
            });
        }

        Ok(subscribers)
    }

    async fn find_existing_posts(&self, feed: &str, ids: &[String]) -> Result<HashSet<String>> {
        let rows = sqlx::query(&format!(r#"SELECT sk FROM "{}" WHERE pk = $1 AND sk = ANY($2)"#, self.table))
            .bind(RecordKind::FeedPost.partition_key(feed))
            .bind(ids)
            .fetch_all(&self.db)
            .await
            .map_err(store_error("find_existing_posts", feed))?;

        rows.into_iter()
            .map(|row| row.try_get::<String, _>("sk").map_err(store_error("find_existing_posts", feed)))
            .collect()
    }

    async fn insert_post(&self, post: &PostRecord) -> Result<()> {
        sqlx::query(&format!(
            r#"
            INSERT INTO "{}" (pk, sk, link, posted)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (pk, sk) DO UPDATE SET link = EXCLUDED.link, posted = EXCLUDED.posted
            "#,
            self.table
        ))
        .bind(RecordKind::FeedPost.partition_key(&post.feed))
        .bind(&post.id)
        .bind(&post.link)
        .bind(post.posted)
        .execute(&self.db)
        .await
        .map_err(store_error("insert_post", format!("{}#{}", post.feed, post.id)))?;

        Ok(())
    }

    async fn insert_sent_marker(&self, marker: &SentMarker) -> Result<InsertOutcome> {
        let (pk, sk) = sent_marker_key(marker);

        let result = sqlx::query(&format!(
            r#"
            INSERT INTO "{}" (pk, sk)
            VALUES ($1, $2)
            ON CONFLICT (pk, sk) DO NOTHING
            "#,
            self.table
        ))
        .bind(&pk)
        .bind(&sk)
        .execute(&self.db)
        .await
        .map_err(store_error("insert_sent_marker", format!("{}#{}", pk, sk)))?;

        if result.rows_affected() == 0 {
            Ok(InsertOutcome::AlreadyExists)
        } else {
            Ok(InsertOutcome::Inserted)
        }
    }
}
