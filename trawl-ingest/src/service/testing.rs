//! In-memory upstream doubles shared by the service tests

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use trawl_client::ClientError;
use trawl_client::error::TOO_MANY_REQUESTS;
use trawl_core::domain::tweet::Tweet;
use trawl_core::domain::user::TwitterUser;

use crate::upstream::{UpstreamFetcher, UserDirectory, UsernameLocator};

pub fn tweet(id: &str, user_id: Option<&str>, text: &str) -> Tweet {
    Tweet {
        id: id.to_string(),
        user_id: user_id.map(str::to_string),
        text: text.to_string(),
        label: None,
        created_at: None,
    }
}

pub fn user(user_id: &str, screen_name: &str) -> TwitterUser {
    TwitterUser {
        user_id: user_id.to_string(),
        screen_name: screen_name.to_string(),
        name: screen_name.to_string(),
        description: None,
        followers_count: 0,
        friends_count: 0,
        created_at: None,
    }
}

fn rate_limited() -> ClientError {
    ClientError::api_error(TOO_MANY_REQUESTS, "Rate limit exceeded")
}

/// Upstream that knows a fixed set of records
///
/// Keys listed in `throttle_once` answer 429 the first time they are asked for.
pub struct FakeUpstream<R> {
    records: HashMap<String, R>,
    throttle_once: Mutex<HashSet<String>>,
    calls: Mutex<Vec<String>>,
}

impl<R: Clone> FakeUpstream<R> {
    pub fn new(records: impl IntoIterator<Item = (String, R)>) -> Self {
        Self {
            records: records.into_iter().collect(),
            throttle_once: Mutex::new(HashSet::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn throttle_once(self, key: &str) -> Self {
        self.throttle_once.lock().unwrap().insert(key.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn lookup(&self, key: &str) -> Result<Option<R>, ClientError> {
        self.calls.lock().unwrap().push(key.to_string());

        if self.throttle_once.lock().unwrap().remove(key) {
            return Err(rate_limited());
        }

        Ok(self.records.get(key).cloned())
    }
}

#[async_trait]
impl UpstreamFetcher<Tweet> for FakeUpstream<Tweet> {
    async fn fetch_by_id(&self, id: &str) -> Result<Tweet, ClientError> {
        self.lookup(id)?
            .ok_or_else(|| ClientError::api_error(404, "No status found with that ID."))
    }
}

#[async_trait]
impl UpstreamFetcher<TwitterUser> for FakeUpstream<TwitterUser> {
    async fn fetch_by_id(&self, id: &str) -> Result<TwitterUser, ClientError> {
        self.lookup(id)?
            .ok_or_else(|| ClientError::api_error(404, "User not found."))
    }
}

#[async_trait]
impl UserDirectory for FakeUpstream<TwitterUser> {
    async fn user_by_name(&self, screen_name: &str) -> Result<TwitterUser, ClientError> {
        self.lookup(screen_name)?
            .ok_or_else(|| ClientError::NotFound(screen_name.to_string()))
    }
}

/// Locator keyed by the cleaned tweet text
#[async_trait]
impl UsernameLocator for FakeUpstream<String> {
    async fn locate(&self, text: &str) -> Result<Option<String>, ClientError> {
        self.lookup(text)
    }
}
