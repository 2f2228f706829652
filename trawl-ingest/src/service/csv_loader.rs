//! CSV loader service
//!
//! Bulk loads tweets from a delimited export straight into the tweet
//! repository. No upstream is involved, so batches are sized from the
//! repository's connection pool instead of the upstream rate ceiling.

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;
use trawl_core::domain::tweet::Tweet;

use crate::connector::derive_batch_size;
use crate::error::{IngestError, Result};
use crate::pipeline::IngestionPipeline;
use crate::repository::{Repository, TweetStore};
use crate::scheduler::{IntervalTicker, ItemOperation, RunReport, SchedulerConfig, Ticker};
use crate::sink::FailureSink;
use crate::source::DelimitedSource;

/// Parses an `id,user_id,label,text...` row
///
/// The text is everything after the third delimiter, so commas inside it
/// survive. Empty user ids and labels are stored as missing.
pub fn parse_tweet_row(tokens: &[&str]) -> Option<Tweet> {
    let [id, user_id, label, text @ ..] = tokens else {
        return None;
    };

    let id = id.trim();
    if id.is_empty() || text.is_empty() {
        return None;
    }

    let optional = |value: &str| {
        let value = value.trim();
        (!value.is_empty()).then(|| value.to_string())
    };

    Some(Tweet {
        id: id.to_string(),
        user_id: optional(*user_id),
        text: text.join(","),
        label: optional(*label),
        created_at: None,
    })
}

/// Loads delimited exports into the tweet repository
pub struct CsvLoaderService {
    tweets: Arc<TweetStore>,
    sink: Arc<dyn FailureSink>,
    pipeline: IngestionPipeline,
}

impl CsvLoaderService {
    /// Creates a loader whose batch size leaves headroom in the tweet
    /// repository's connection pool
    pub fn new(
        tweets: Arc<TweetStore>,
        sink: Arc<dyn FailureSink>,
        config: SchedulerConfig,
    ) -> Result<Self> {
        let batch_size = derive_batch_size(tweets.pool_size());
        let pipeline = IngestionPipeline::new(batch_size, config)?;

        Ok(Self {
            tweets,
            sink,
            pipeline,
        })
    }

    pub fn batch_size(&self) -> usize {
        self.pipeline.batch_size()
    }

    /// Wall-clock ticker paced by this service's scheduler
    pub fn ticker(&self) -> IntervalTicker {
        self.pipeline.scheduler().ticker()
    }

    /// Loads every row of `path` accepted by `filter` and `parse`
    pub async fn load_csv<F, P, K>(
        &self,
        path: &Path,
        filter: F,
        parse: P,
        ticker: &mut K,
        cancel: &CancellationToken,
    ) -> Result<RunReport<Tweet>>
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
        P: Fn(&[&str]) -> Option<Tweet> + Send + Sync + 'static,
        K: Ticker + ?Sized,
    {
        info!(
            "Loading {} in batches of {}",
            path.display(),
            self.pipeline.batch_size()
        );

        let source = DelimitedSource::new(path, filter, parse);
        let op = StoreRecord {
            tweets: self.tweets.clone(),
        };

        let report = self
            .pipeline
            .run("load-csv", &source, &op, ticker, cancel, self.sink.as_ref())
            .await?;

        info!(
            "CSV load finished: {} stored, {} failed",
            report.processed_count,
            report.failed_items.len()
        );
        Ok(report)
    }
}

struct StoreRecord {
    tweets: Arc<TweetStore>,
}

#[async_trait]
impl ItemOperation<Tweet> for StoreRecord {
    async fn apply(&self, item: &Tweet) -> Result<()> {
        self.tweets
            .create(item)
            .await
            .map_err(IngestError::storage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::InMemoryRepository;
    use crate::scheduler::{RunStatus, VirtualTicker};
    use crate::sink::MemoryFailureSink;
    use std::time::Duration;

    fn config() -> SchedulerConfig {
        SchedulerConfig::new(Duration::from_millis(100), 4)
    }

    #[test]
    fn test_parse_tweet_row_keeps_commas_in_text() {
        let row = "42,7,sexism,well, actually, no";
        let tokens: Vec<&str> = row.split(',').collect();

        let tweet = parse_tweet_row(&tokens).unwrap();
        assert_eq!(tweet.id, "42");
        assert_eq!(tweet.user_id.as_deref(), Some("7"));
        assert_eq!(tweet.label.as_deref(), Some("sexism"));
        assert_eq!(tweet.text, "well, actually, no");
    }

    #[test]
    fn test_parse_tweet_row_optional_fields() {
        let tweet = parse_tweet_row(&["42", "", " ", "text"]).unwrap();
        assert!(tweet.is_missing_user());
        assert_eq!(tweet.label, None);

        assert!(parse_tweet_row(&["42", "7", "none"]).is_none());
        assert!(parse_tweet_row(&["", "7", "none", "text"]).is_none());
    }

    #[test]
    fn test_batch_size_follows_pool() {
        let repo = Arc::new(InMemoryRepository::<Tweet>::new(10));
        let loader =
            CsvLoaderService::new(repo, Arc::new(MemoryFailureSink::new()), config()).unwrap();
        assert_eq!(loader.batch_size(), 9);

        let repo = Arc::new(InMemoryRepository::<Tweet>::new(1));
        let loader =
            CsvLoaderService::new(repo, Arc::new(MemoryFailureSink::new()), config()).unwrap();
        assert_eq!(loader.batch_size(), 1);
    }

    #[tokio::test]
    async fn test_load_csv_stores_rows() {
        let repo = Arc::new(InMemoryRepository::<Tweet>::new(10));
        let sink = Arc::new(MemoryFailureSink::new());
        let loader = CsvLoaderService::new(repo.clone(), sink.clone(), config()).unwrap();

        let mut contents = String::from("id,user_id,label,text\n");
        for i in 0..20 {
            contents.push_str(&format!("{i},u{i},none,tweet number {i}, with a comma\n"));
        }
        // Duplicate id
        contents.push_str("3,u3,none,again\n");

        let path = std::env::temp_dir().join(format!("trawl-load-{}.csv", uuid::Uuid::new_v4()));
        tokio::fs::write(&path, contents).await.unwrap();
        let mut ticker = VirtualTicker::new();

        let report = loader
            .load_csv(
                &path,
                |row| !row.starts_with("id,"),
                parse_tweet_row,
                &mut ticker,
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        tokio::fs::remove_file(&path).await.unwrap();

        assert_eq!(report.status, RunStatus::Completed);
        assert_eq!(report.batch_count, 3);
        assert_eq!(report.processed_count, 20);
        assert_eq!(report.failed_items.len(), 1);
        assert_eq!(sink.entries(), vec!["3: again"]);

        let stored = repo.snapshot();
        assert_eq!(stored.len(), 20);
        let fifth = stored.iter().find(|t| t.id == "5").unwrap();
        assert_eq!(fifth.text, "tweet number 5, with a comma");
    }

    #[tokio::test]
    async fn test_load_csv_cancelled_before_start() {
        let repo = Arc::new(InMemoryRepository::<Tweet>::new(10));
        let loader =
            CsvLoaderService::new(repo.clone(), Arc::new(MemoryFailureSink::new()), config())
                .unwrap();

        let path = std::env::temp_dir().join(format!("trawl-load-{}.csv", uuid::Uuid::new_v4()));
        tokio::fs::write(&path, "1,u1,none,text\n").await.unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut ticker = VirtualTicker::new();

        let report = loader
            .load_csv(&path, |_| true, parse_tweet_row, &mut ticker, &cancel)
            .await
            .unwrap();
        tokio::fs::remove_file(&path).await.unwrap();

        assert_eq!(report.status, RunStatus::Cancelled);
        assert_eq!(report.processed_count, 0);
        assert!(repo.snapshot().is_empty());
    }
}
