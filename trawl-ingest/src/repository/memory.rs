//! In-memory repository
//!
//! Keeps records in insertion order behind a mutex. Used for dry runs and
//! tests; it enforces the same uniqueness rules as the SQL repositories.

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use std::sync::{Mutex, MutexGuard};
use trawl_core::domain::tweet::Tweet;
use trawl_core::domain::user::TwitterUser;

use super::{Repository, TweetFilter, UserFilter};
use crate::connector::BoundedConnector;

/// A record the in-memory repository knows how to key and filter
pub trait Record: Clone + Send + Sync {
    type Filter: Send + Sync;

    /// Primary key
    fn key(&self) -> &str;

    /// The user this record belongs to, if known
    fn user_id(&self) -> Option<&str>;

    fn matches(&self, filter: &Self::Filter) -> bool;
}

impl Record for Tweet {
    type Filter = TweetFilter;

    fn key(&self) -> &str {
        &self.id
    }

    fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref().filter(|id| !id.is_empty())
    }

    fn matches(&self, filter: &TweetFilter) -> bool {
        match filter {
            TweetFilter::All => true,
            TweetFilter::MissingUserId => self.is_missing_user(),
            TweetFilter::Label(label) => self.label.as_deref() == Some(label.as_str()),
        }
    }
}

impl Record for TwitterUser {
    type Filter = UserFilter;

    fn key(&self) -> &str {
        &self.user_id
    }

    fn user_id(&self) -> Option<&str> {
        Some(&self.user_id)
    }

    fn matches(&self, filter: &UserFilter) -> bool {
        match filter {
            UserFilter::All => true,
            UserFilter::ScreenName(name) => self.screen_name.eq_ignore_ascii_case(name),
        }
    }
}

/// Mutex-guarded repository holding records in memory
pub struct InMemoryRepository<T> {
    records: Mutex<Vec<T>>,
    pool_size: usize,
}

impl<T: Record> InMemoryRepository<T> {
    pub fn new(pool_size: usize) -> Self {
        Self::with_records(pool_size, Vec::new())
    }

    pub fn with_records(pool_size: usize, records: Vec<T>) -> Self {
        Self {
            records: Mutex::new(records),
            pool_size,
        }
    }

    /// Copy of every stored record, in insertion order
    pub fn snapshot(&self) -> Vec<T> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Vec<T>>> {
        self.records
            .lock()
            .map_err(|_| anyhow!("in-memory repository lock poisoned"))
    }
}

impl<T: Record> BoundedConnector for InMemoryRepository<T> {
    fn pool_size(&self) -> usize {
        self.pool_size
    }
}

#[async_trait]
impl<T: Record> Repository<T> for InMemoryRepository<T> {
    type Filter = T::Filter;

    async fn create(&self, item: &T) -> Result<()> {
        let mut records = self.lock()?;
        if records.iter().any(|r| r.key() == item.key()) {
            anyhow::bail!("duplicate key value violates unique constraint: {}", item.key());
        }
        records.push(item.clone());
        Ok(())
    }

    async fn get_all_if(&self, filter: &T::Filter) -> Result<Vec<T>> {
        let records = self.lock()?;
        Ok(records.iter().filter(|r| r.matches(filter)).cloned().collect())
    }

    async fn update(&self, item: &T) -> Result<()> {
        let mut records = self.lock()?;
        match records.iter_mut().find(|r| r.key() == item.key()) {
            Some(existing) => {
                *existing = item.clone();
                Ok(())
            }
            None => anyhow::bail!("record {} does not exist", item.key()),
        }
    }

    async fn get_all_user_ids(&self) -> Result<Vec<String>> {
        let records = self.lock()?;
        let mut ids: Vec<String> = Vec::new();
        for id in records.iter().filter_map(Record::user_id) {
            if !ids.iter().any(|known| known == id) {
                ids.push(id.to_string());
            }
        }
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tweet(id: &str, user_id: Option<&str>, label: &str) -> Tweet {
        Tweet {
            id: id.to_string(),
            user_id: user_id.map(str::to_string),
            text: format!("tweet {}", id),
            label: Some(label.to_string()),
            created_at: None,
        }
    }

    #[tokio::test]
    async fn test_create_rejects_duplicates() {
        let repo = InMemoryRepository::new(10);
        repo.create(&tweet("1", None, "none")).await.unwrap();

        let err = repo.create(&tweet("1", None, "none")).await.unwrap_err();
        assert!(err.to_string().contains("duplicate key"));
        assert_eq!(repo.snapshot().len(), 1);
    }

    #[tokio::test]
    async fn test_filters() {
        let repo = InMemoryRepository::with_records(
            10,
            vec![
                tweet("1", Some("7"), "sexism"),
                tweet("2", None, "none"),
                tweet("3", Some(""), "sexism"),
            ],
        );

        let missing = repo.get_all_if(&TweetFilter::MissingUserId).await.unwrap();
        let ids: Vec<&str> = missing.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["2", "3"]);

        let sexism = repo
            .get_all_if(&TweetFilter::Label("sexism".to_string()))
            .await
            .unwrap();
        assert_eq!(sexism.len(), 2);
        assert_eq!(repo.get_all_if(&TweetFilter::All).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_update_requires_existing_record() {
        let repo = InMemoryRepository::with_records(10, vec![tweet("1", None, "none")]);

        repo.update(&tweet("1", Some("9"), "none")).await.unwrap();
        assert_eq!(repo.snapshot()[0].user_id.as_deref(), Some("9"));

        assert!(repo.update(&tweet("2", None, "none")).await.is_err());
    }

    #[tokio::test]
    async fn test_user_ids_are_distinct() {
        let repo = InMemoryRepository::with_records(
            3,
            vec![
                tweet("1", Some("7"), "none"),
                tweet("2", Some("8"), "none"),
                tweet("3", Some("7"), "none"),
                tweet("4", None, "none"),
            ],
        );

        assert_eq!(repo.get_all_user_ids().await.unwrap(), vec!["7", "8"]);
        assert_eq!(repo.pool_size(), 3);
    }
}
