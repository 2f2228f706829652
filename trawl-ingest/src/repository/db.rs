//! Database bootstrap

use sqlx::{PgPool, postgres::PgPoolOptions};
use std::time::Duration;

pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS tweets (
            id VARCHAR(32) PRIMARY KEY,
            user_id VARCHAR(32),
            text TEXT NOT NULL,
            label VARCHAR(64),
            created_at TIMESTAMPTZ
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS twitter_users (
            user_id VARCHAR(32) PRIMARY KEY,
            screen_name VARCHAR(64) NOT NULL,
            name TEXT NOT NULL,
            description TEXT,
            followers_count BIGINT NOT NULL DEFAULT 0,
            friends_count BIGINT NOT NULL DEFAULT 0,
            created_at TIMESTAMPTZ
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_tweets_user_id ON tweets(user_id)")
        .execute(pool)
        .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_twitter_users_screen_name ON twitter_users(screen_name)",
    )
    .execute(pool)
    .await?;

    tracing::info!("Database migrations completed successfully");
    Ok(())
}
