//! Tweet repository
//!
//! Handles all database operations related to tweets.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use trawl_core::domain::tweet::Tweet;

use super::{Repository, TweetFilter};
use crate::connector::BoundedConnector;

/// PostgreSQL implementation of the tweet repository
#[derive(Clone)]
pub struct PgTweetRepository {
    pool: PgPool,
}

impl PgTweetRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl BoundedConnector for PgTweetRepository {
    fn pool_size(&self) -> usize {
        self.pool.options().get_max_connections() as usize
    }
}

#[async_trait]
impl Repository<Tweet> for PgTweetRepository {
    type Filter = TweetFilter;

    async fn create(&self, tweet: &Tweet) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO tweets (id, user_id, text, label, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&tweet.id)
        .bind(&tweet.user_id)
        .bind(&tweet.text)
        .bind(&tweet.label)
        .bind(tweet.created_at)
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to insert tweet {}", tweet.id))?;

        Ok(())
    }

    async fn get_all_if(&self, filter: &TweetFilter) -> Result<Vec<Tweet>> {
        let query = match filter {
            TweetFilter::All => {
                sqlx::query_as::<_, TweetRow>("SELECT id, user_id, text, label, created_at FROM tweets")
            }
            TweetFilter::MissingUserId => sqlx::query_as::<_, TweetRow>(
                "SELECT id, user_id, text, label, created_at FROM tweets \
                 WHERE user_id IS NULL OR user_id = ''",
            ),
            TweetFilter::Label(label) => sqlx::query_as::<_, TweetRow>(
                "SELECT id, user_id, text, label, created_at FROM tweets WHERE label = $1",
            )
            .bind(label),
        };

        let rows = query
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("Failed to query tweets ({:?})", filter))?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    async fn update(&self, tweet: &Tweet) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE tweets
            SET user_id = $1, text = $2, label = $3, created_at = $4
            WHERE id = $5
            "#,
        )
        .bind(&tweet.user_id)
        .bind(&tweet.text)
        .bind(&tweet.label)
        .bind(tweet.created_at)
        .bind(&tweet.id)
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to update tweet {}", tweet.id))?;

        if result.rows_affected() == 0 {
            anyhow::bail!("Tweet {} does not exist", tweet.id);
        }

        Ok(())
    }

    async fn get_all_user_ids(&self) -> Result<Vec<String>> {
        let ids = sqlx::query_scalar::<_, String>(
            r#"
            SELECT DISTINCT user_id
            FROM tweets
            WHERE user_id IS NOT NULL AND user_id <> ''
            ORDER BY user_id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list tweet authors")?;

        Ok(ids)
    }
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct TweetRow {
    id: String,
    user_id: Option<String>,
    text: String,
    label: Option<String>,
    created_at: Option<DateTime<Utc>>,
}

impl From<TweetRow> for Tweet {
    fn from(row: TweetRow) -> Self {
        Tweet {
            id: row.id,
            user_id: row.user_id,
            text: row.text,
            label: row.label,
            created_at: row.created_at,
        }
    }
}
