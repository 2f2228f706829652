//! User repository
//!
//! Handles all database operations related to Twitter users.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use trawl_core::domain::user::TwitterUser;

use super::{Repository, UserFilter};
use crate::connector::BoundedConnector;

/// PostgreSQL implementation of the user repository
#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl BoundedConnector for PgUserRepository {
    fn pool_size(&self) -> usize {
        self.pool.options().get_max_connections() as usize
    }
}

#[async_trait]
impl Repository<TwitterUser> for PgUserRepository {
    type Filter = UserFilter;

    async fn create(&self, user: &TwitterUser) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO twitter_users
                (user_id, screen_name, name, description, followers_count, friends_count, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(&user.user_id)
        .bind(&user.screen_name)
        .bind(&user.name)
        .bind(&user.description)
        .bind(user.followers_count)
        .bind(user.friends_count)
        .bind(user.created_at)
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to insert user {}", user.user_id))?;

        Ok(())
    }

    async fn get_all_if(&self, filter: &UserFilter) -> Result<Vec<TwitterUser>> {
        let query = match filter {
            UserFilter::All => sqlx::query_as::<_, UserRow>(
                r#"
                SELECT user_id, screen_name, name, description,
                       followers_count, friends_count, created_at
                FROM twitter_users
                "#,
            ),
            UserFilter::ScreenName(screen_name) => sqlx::query_as::<_, UserRow>(
                r#"
                SELECT user_id, screen_name, name, description,
                       followers_count, friends_count, created_at
                FROM twitter_users
                WHERE lower(screen_name) = lower($1)
                "#,
            )
            .bind(screen_name),
        };

        let rows = query
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("Failed to query users ({:?})", filter))?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    async fn update(&self, user: &TwitterUser) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE twitter_users
            SET screen_name = $1, name = $2, description = $3,
                followers_count = $4, friends_count = $5, created_at = $6
            WHERE user_id = $7
            "#,
        )
        .bind(&user.screen_name)
        .bind(&user.name)
        .bind(&user.description)
        .bind(user.followers_count)
        .bind(user.friends_count)
        .bind(user.created_at)
        .bind(&user.user_id)
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to update user {}", user.user_id))?;

        if result.rows_affected() == 0 {
            anyhow::bail!("User {} does not exist", user.user_id);
        }

        Ok(())
    }

    async fn get_all_user_ids(&self) -> Result<Vec<String>> {
        let ids = sqlx::query_scalar::<_, String>(
            "SELECT user_id FROM twitter_users ORDER BY user_id",
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list stored users")?;

        Ok(ids)
    }
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct UserRow {
    user_id: String,
    screen_name: String,
    name: String,
    description: Option<String>,
    followers_count: i64,
    friends_count: i64,
    created_at: Option<DateTime<Utc>>,
}

impl From<UserRow> for TwitterUser {
    fn from(row: UserRow) -> Self {
        TwitterUser {
            user_id: row.user_id,
            screen_name: row.screen_name,
            name: row.name,
            description: row.description,
            followers_count: row.followers_count,
            friends_count: row.friends_count,
            created_at: row.created_at,
        }
    }
}
