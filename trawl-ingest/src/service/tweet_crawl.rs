//! Tweet crawl service
//!
//! Fetches labeled tweets listed in a dataset from the upstream API, then
//! fetches the authors those tweets reference. Both crawls are paced by the
//! scheduler so the upstream rate ceiling is respected.

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use trawl_core::domain::tweet::Tweet;
use trawl_core::domain::user::TwitterUser;
use trawl_core::domain::work::WorkItem;

use crate::error::{IngestError, Result};
use crate::pipeline::IngestionPipeline;
use crate::repository::{Repository, TweetStore, UserStore};
use crate::scheduler::{IntervalTicker, ItemOperation, RunReport, Ticker};
use crate::sink::FailureSink;
use crate::source::{DelimitedSource, MissingUsersSource};
use crate::upstream::UpstreamFetcher;

/// Parses an `id,label` dataset row
///
/// An empty label is kept as no label; rows without an id are rejected.
pub fn parse_labeled_row(tokens: &[&str]) -> Option<WorkItem> {
    let id = tokens.first()?.trim();
    if id.is_empty() {
        return None;
    }

    let label = tokens.get(1).map(|l| l.trim()).filter(|l| !l.is_empty());
    Some(WorkItem {
        id: id.to_string(),
        label: label.map(str::to_string),
    })
}

/// Crawls tweets and their authors into the repositories
pub struct TweetCrawlService {
    tweets: Arc<TweetStore>,
    users: Arc<UserStore>,
    tweet_fetcher: Arc<dyn UpstreamFetcher<Tweet>>,
    user_fetcher: Arc<dyn UpstreamFetcher<TwitterUser>>,
    sink: Arc<dyn FailureSink>,
    pipeline: IngestionPipeline,
    excluded_labels: Vec<String>,
}

impl TweetCrawlService {
    /// Creates a new crawl service
    ///
    /// No dataset label is excluded until [`Self::with_excluded_labels`] says so.
    pub fn new(
        tweets: Arc<TweetStore>,
        users: Arc<UserStore>,
        tweet_fetcher: Arc<dyn UpstreamFetcher<Tweet>>,
        user_fetcher: Arc<dyn UpstreamFetcher<TwitterUser>>,
        sink: Arc<dyn FailureSink>,
        pipeline: IngestionPipeline,
    ) -> Self {
        Self {
            tweets,
            users,
            tweet_fetcher,
            user_fetcher,
            sink,
            pipeline,
            excluded_labels: Vec::new(),
        }
    }

    /// Drops dataset rows carrying any of `labels`
    pub fn with_excluded_labels(mut self, labels: Vec<String>) -> Self {
        self.excluded_labels = labels;
        self
    }

    /// Wall-clock ticker paced by this service's scheduler
    pub fn ticker(&self) -> IntervalTicker {
        self.pipeline.scheduler().ticker()
    }

    /// Builds the dataset source, honouring the excluded labels
    fn dataset_source(&self, dataset: &Path) -> DelimitedSource<WorkItem> {
        let excluded = self.excluded_labels.clone();
        let keep = move |row: &str| {
            row.split(',')
                .nth(1)
                .map(str::trim)
                .is_none_or(|label| !excluded.iter().any(|e| e == label))
        };

        DelimitedSource::new(dataset, keep, parse_labeled_row)
    }

    /// Fetches and stores every tweet listed in `dataset`
    pub async fn crawl_tweets<K>(
        &self,
        dataset: &Path,
        ticker: &mut K,
        cancel: &CancellationToken,
    ) -> Result<RunReport<WorkItem>>
    where
        K: Ticker + ?Sized,
    {
        info!("Crawling tweets listed in {}", dataset.display());

        let source = self.dataset_source(dataset);
        let op = StoreTweet {
            fetcher: self.tweet_fetcher.clone(),
            tweets: self.tweets.clone(),
        };

        let report = self
            .pipeline
            .run("tweets", &source, &op, ticker, cancel, self.sink.as_ref())
            .await?;

        info!(
            "Tweet crawl finished: {} stored, {} failed",
            report.processed_count,
            report.failed_items.len()
        );
        Ok(report)
    }

    /// Fetches and stores every author referenced by a stored tweet but
    /// missing from the user repository
    pub async fn crawl_users<K>(
        &self,
        ticker: &mut K,
        cancel: &CancellationToken,
    ) -> Result<RunReport<WorkItem>>
    where
        K: Ticker + ?Sized,
    {
        let source = MissingUsersSource::new(self.tweets.clone(), self.users.clone());
        let op = StoreUser {
            fetcher: self.user_fetcher.clone(),
            users: self.users.clone(),
        };

        let report = self
            .pipeline
            .run("users", &source, &op, ticker, cancel, self.sink.as_ref())
            .await?;

        info!(
            "User crawl finished: {} stored, {} failed",
            report.processed_count,
            report.failed_items.len()
        );
        Ok(report)
    }
}

/// Fetch a tweet, tag it with the dataset label and store it
struct StoreTweet {
    fetcher: Arc<dyn UpstreamFetcher<Tweet>>,
    tweets: Arc<TweetStore>,
}

#[async_trait]
impl ItemOperation<WorkItem> for StoreTweet {
    async fn apply(&self, item: &WorkItem) -> Result<()> {
        let tweet = self
            .fetcher
            .fetch_by_id(&item.id)
            .await?
            .with_label(item.label.clone());

        self.tweets
            .create(&tweet)
            .await
            .map_err(IngestError::storage)?;

        debug!("Stored tweet {}", tweet.id);
        Ok(())
    }
}

/// Fetch a user and store it
struct StoreUser {
    fetcher: Arc<dyn UpstreamFetcher<TwitterUser>>,
    users: Arc<UserStore>,
}

#[async_trait]
impl ItemOperation<WorkItem> for StoreUser {
    async fn apply(&self, item: &WorkItem) -> Result<()> {
        let user = self.fetcher.fetch_by_id(&item.id).await?;

        self.users
            .create(&user)
            .await
            .map_err(IngestError::storage)?;

        debug!("Stored user {} (@{})", user.user_id, user.screen_name);
        Ok(())
    }
}
