//! Author repair service
//!
//! Tweets loaded from text-only exports have no author. This service looks
//! the author up by the tweet text, resolves the screen name to a user id
//! and writes it back. Tweets whose author cannot be found are appended to
//! the failure sink.

use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, warn};
use trawl_core::domain::tweet::Tweet;
use trawl_core::domain::user::TwitterUser;
use uuid::Uuid;

use crate::error::{IngestError, Result};
use crate::pipeline::FailureEntry;
use crate::repository::{Repository, TweetFilter, TweetStore};
use crate::scheduler::{IntervalTicker, RetryPolicy, RunStatus, Ticker};
use crate::signal::{Signal, classify};
use crate::sink::FailureSink;
use crate::upstream::{UserDirectory, UsernameLocator};

/// Strips what the search endpoint chokes on: non-ASCII characters and
/// `@mention` tokens
pub fn clean_text(text: &str) -> String {
    let ascii: String = text.chars().filter(char::is_ascii).collect();

    ascii
        .split(' ')
        .filter(|token| !token.contains('@'))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Outcome of a repair run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepairReport {
    pub status: RunStatus,
    /// Tweets examined, including the one interrupted by cancellation
    pub examined: usize,
    pub fixed: usize,
    /// Tweets whose author could not be found
    pub not_found: usize,
    /// Tweets that hit an upstream or storage error
    pub failed: usize,
}

enum Repair {
    Fixed,
    NotFound,
    Failed,
    Cancelled,
}

/// Resolves and stores the author of every tweet that lacks one
pub struct AuthorRepairService {
    tweets: Arc<TweetStore>,
    locator: Arc<dyn UsernameLocator>,
    directory: Arc<dyn UserDirectory>,
    sink: Arc<dyn FailureSink>,
    retry_interval: Duration,
    retry_policy: RetryPolicy,
}

impl AuthorRepairService {
    /// Creates a repair service that waits `retry_interval` after a rate limit
    pub fn new(
        tweets: Arc<TweetStore>,
        locator: Arc<dyn UsernameLocator>,
        directory: Arc<dyn UserDirectory>,
        sink: Arc<dyn FailureSink>,
        retry_interval: Duration,
    ) -> Self {
        Self {
            tweets,
            locator,
            directory,
            sink,
            retry_interval,
            retry_policy: RetryPolicy::indefinite(),
        }
    }

    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// Wall-clock ticker spacing retries after a rate limit
    pub fn ticker(&self) -> IntervalTicker {
        IntervalTicker::new(self.retry_interval)
    }

    /// Repairs every tweet without an author, one at a time
    ///
    /// Rate limits pause for a tick and retry the same tweet. Returns an
    /// error only when the tweets cannot be listed or the retry policy gives
    /// up on a tweet.
    pub async fn fix_missing<K>(
        &self,
        ticker: &mut K,
        cancel: &CancellationToken,
    ) -> Result<RepairReport>
    where
        K: Ticker + ?Sized,
    {
        let span = info_span!("repair", run_id = %Uuid::new_v4());

        async move {
            let tweets = self
                .tweets
                .get_all_if(&TweetFilter::MissingUserId)
                .await
                .map_err(IngestError::storage)?;

            info!("Retrieved {} tweet(s) without an author", tweets.len());

            let mut report = RepairReport {
                status: RunStatus::Completed,
                examined: 0,
                fixed: 0,
                not_found: 0,
                failed: 0,
            };

            for (index, tweet) in tweets.into_iter().enumerate() {
                if cancel.is_cancelled() {
                    report.status = RunStatus::Cancelled;
                    break;
                }

                report.examined += 1;
                match self.repair(index, tweet, ticker, cancel).await? {
                    Repair::Fixed => {
                        report.fixed += 1;
                        info!("User id fixed: {}", report.fixed);
                    }
                    Repair::NotFound => report.not_found += 1,
                    Repair::Failed => report.failed += 1,
                    Repair::Cancelled => {
                        report.status = RunStatus::Cancelled;
                        break;
                    }
                }
            }

            info!(
                "Repair finished: {} fixed, {} not found, {} failed",
                report.fixed, report.not_found, report.failed
            );
            Ok(report)
        }
        .instrument(span)
        .await
    }

    async fn repair<K>(
        &self,
        index: usize,
        mut tweet: Tweet,
        ticker: &mut K,
        cancel: &CancellationToken,
    ) -> Result<Repair>
    where
        K: Ticker + ?Sized,
    {
        let query = clean_text(&tweet.text);
        let mut attempts = 0;

        loop {
            let resolved = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(Repair::Cancelled),
                resolved = self.resolve(&query) => resolved,
            };

            let err = match resolved {
                Ok(Some(user)) => {
                    tweet.user_id = Some(user.user_id.clone());
                    return match self.tweets.update(&tweet).await {
                        Ok(()) => {
                            debug!("Tweet {} written by @{}", tweet.id, user.screen_name);
                            Ok(Repair::Fixed)
                        }
                        Err(e) => {
                            warn!("Failed to update tweet {}: {:#}", tweet.id, e);
                            Ok(Repair::Failed)
                        }
                    };
                }
                Ok(None) => {
                    debug!("No author found for tweet {}", tweet.id);
                    if let Err(e) = self.sink.append(&tweet.failure_entry()).await {
                        error!("Failed to record unresolved tweet {}: {:#}", tweet.id, e);
                    }
                    return Ok(Repair::NotFound);
                }
                Err(err) => err,
            };

            if classify(&err) == Signal::Fatal {
                warn!("Failed to resolve author of tweet {}: {}", tweet.id, err);
                return Ok(Repair::Failed);
            }

            attempts += 1;
            if !self.retry_policy.allows(attempts) {
                return Err(IngestError::RetriesExhausted {
                    batch_index: index,
                    attempts,
                });
            }

            let wait = 1 + self.retry_policy.backoff.skipped_ticks(attempts);
            warn!(
                "Rate limited while resolving tweet {}, retrying after {} tick(s)",
                tweet.id, wait
            );

            for _ in 0..wait {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Ok(Repair::Cancelled),
                    _ = ticker.tick() => {}
                }
            }
        }
    }

    /// Finds the author of `query`; `Ok(None)` when there is none
    async fn resolve(&self, query: &str) -> Result<Option<TwitterUser>> {
        let screen_name = match self.locator.locate(query).await? {
            Some(name) if !name.trim().is_empty() => name,
            _ => return Ok(None),
        };

        match self.directory.user_by_name(screen_name.trim()).await {
            Ok(user) => Ok(Some(user)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
