//! Repository layer
//!
//! Repositories persist the records fetched by the pipelines. They carry no
//! business logic and advertise their connection pool size so pipelines can
//! size batches to fit.
//!
//! All repositories are trait-based to enable testing and mocking.

pub mod db;
mod memory;
mod tweets;
mod users;

use anyhow::Result;
use async_trait::async_trait;
use trawl_core::domain::tweet::Tweet;
use trawl_core::domain::user::TwitterUser;

use crate::connector::BoundedConnector;

/// Storage for one record type
#[async_trait]
pub trait Repository<T>: BoundedConnector {
    /// Selection criteria understood by [`Repository::get_all_if`]
    type Filter: Send + Sync;

    /// Inserts a new record; fails if the record already exists
    async fn create(&self, item: &T) -> Result<()>;

    /// Returns every record matching `filter`
    async fn get_all_if(&self, filter: &Self::Filter) -> Result<Vec<T>>;

    /// Overwrites an existing record
    async fn update(&self, item: &T) -> Result<()>;

    /// Returns the distinct user ids referenced by stored records
    async fn get_all_user_ids(&self) -> Result<Vec<String>>;
}

/// Selection criteria for tweets
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TweetFilter {
    All,
    /// Tweets whose author has not been resolved yet
    MissingUserId,
    Label(String),
}

/// Selection criteria for users
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserFilter {
    All,
    ScreenName(String),
}

/// Tweet storage behind a trait object
pub type TweetStore = dyn Repository<Tweet, Filter = TweetFilter>;

/// User storage behind a trait object
pub type UserStore = dyn Repository<TwitterUser, Filter = UserFilter>;

// Re-export implementations
pub use memory::{InMemoryRepository, Record};
pub use tweets::PgTweetRepository;
pub use users::PgUserRepository;
