//! Source enumerators
//!
//! Produce the complete, ordered work list for a pipeline run up front.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};
use trawl_core::domain::work::WorkItem;

use crate::repository::{Repository, TweetStore, UserStore};

/// Produces the full ordered work list
#[async_trait]
pub trait SourceEnumerator<T>: Send + Sync {
    async fn enumerate(&self) -> Result<Vec<T>>;
}

type RowFilter = Box<dyn Fn(&str) -> bool + Send + Sync>;
type RowParser<T> = Box<dyn Fn(&[&str]) -> Option<T> + Send + Sync>;

/// Delimited text file source
///
/// Rows are split on newlines, blank rows dropped, the row filter applied to
/// the raw row and the parser to its delimited tokens. Rows the parser
/// rejects are skipped.
pub struct DelimitedSource<T> {
    path: PathBuf,
    delimiter: char,
    filter: RowFilter,
    parse: RowParser<T>,
}

impl<T> DelimitedSource<T> {
    /// Creates a comma-delimited source
    pub fn new(
        path: impl Into<PathBuf>,
        filter: impl Fn(&str) -> bool + Send + Sync + 'static,
        parse: impl Fn(&[&str]) -> Option<T> + Send + Sync + 'static,
    ) -> Self {
        Self {
            path: path.into(),
            delimiter: ',',
            filter: Box::new(filter),
            parse: Box::new(parse),
        }
    }

    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Filters and parses already-loaded text
    pub fn parse_rows(&self, raw: &str) -> Vec<T> {
        let mut skipped = 0usize;
        let mut items = Vec::new();

        for row in raw.lines().map(|row| row.trim_end_matches('\r')) {
            if row.trim().is_empty() || !(self.filter)(row) {
                continue;
            }

            let tokens: Vec<&str> = row.split(self.delimiter).collect();
            match (self.parse)(&tokens) {
                Some(item) => items.push(item),
                None => skipped += 1,
            }
        }

        if skipped > 0 {
            debug!("Skipped {} row(s) the parser rejected", skipped);
        }

        items
    }
}

#[async_trait]
impl<T: Send + Sync> SourceEnumerator<T> for DelimitedSource<T> {
    async fn enumerate(&self) -> Result<Vec<T>> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read {}", self.path.display()))?;

        let items = self.parse_rows(&raw);
        info!("Ready to load {} record(s) from {}", items.len(), self.path.display());

        Ok(items)
    }
}

/// Source over an in-memory list
pub struct VecSource<T>(pub Vec<T>);

#[async_trait]
impl<T: Clone + Send + Sync> SourceEnumerator<T> for VecSource<T> {
    async fn enumerate(&self) -> Result<Vec<T>> {
        Ok(self.0.clone())
    }
}

/// Authors referenced by stored tweets that are not stored as users yet
pub struct MissingUsersSource {
    tweets: Arc<TweetStore>,
    users: Arc<UserStore>,
}

impl MissingUsersSource {
    pub fn new(
        tweets: Arc<TweetStore>,
        users: Arc<UserStore>,
    ) -> Self {
        Self { tweets, users }
    }
}

#[async_trait]
impl SourceEnumerator<WorkItem> for MissingUsersSource {
    async fn enumerate(&self) -> Result<Vec<WorkItem>> {
        let (referenced, existing) =
            tokio::try_join!(self.tweets.get_all_user_ids(), self.users.get_all_user_ids())?;

        let existing: HashSet<String> = existing.into_iter().collect();
        let missing: Vec<WorkItem> = referenced
            .into_iter()
            .filter(|id| !existing.contains(id))
            .map(WorkItem::new)
            .collect();

        info!(
            "{} author(s) referenced by tweets are missing from the user store",
            missing.len()
        );

        Ok(missing)
    }
}
