//! Upstream collaborators
//!
//! Narrow capability traits over the upstream API. The pipelines only see
//! these traits; [`TwitterClient`] implements all of them.

use async_trait::async_trait;
use trawl_client::{ClientError, TwitterClient};
use trawl_core::domain::tweet::Tweet;
use trawl_core::domain::user::TwitterUser;

/// Fetches one upstream record by id
#[async_trait]
pub trait UpstreamFetcher<R>: Send + Sync {
    async fn fetch_by_id(&self, id: &str) -> Result<R, ClientError>;
}

/// Resolves users by screen name
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn user_by_name(&self, screen_name: &str) -> Result<TwitterUser, ClientError>;
}

/// Finds the screen name of whoever posted a given text
#[async_trait]
pub trait UsernameLocator: Send + Sync {
    /// Returns `Ok(None)` when no author could be found
    async fn locate(&self, text: &str) -> Result<Option<String>, ClientError>;
}

#[async_trait]
impl UpstreamFetcher<Tweet> for TwitterClient {
    async fn fetch_by_id(&self, id: &str) -> Result<Tweet, ClientError> {
        self.get_tweet(id).await
    }
}

#[async_trait]
impl UpstreamFetcher<TwitterUser> for TwitterClient {
    async fn fetch_by_id(&self, id: &str) -> Result<TwitterUser, ClientError> {
        self.get_user(id).await
    }
}

#[async_trait]
impl UserDirectory for TwitterClient {
    async fn user_by_name(&self, screen_name: &str) -> Result<TwitterUser, ClientError> {
        self.get_user_by_name(screen_name).await
    }
}

#[async_trait]
impl UsernameLocator for TwitterClient {
    async fn locate(&self, text: &str) -> Result<Option<String>, ClientError> {
        if text.trim().is_empty() {
            return Ok(None);
        }
        self.search_first_author(text).await
    }
}
