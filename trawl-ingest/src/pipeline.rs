//! Ingestion pipeline
//!
//! Composition root for one run: enumerate the source, partition it, drive
//! the batches through the scheduler, then export whatever failed.

use std::fmt::Debug;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, error, info, info_span};
use trawl_core::domain::tweet::Tweet;
use trawl_core::domain::work::WorkItem;
use uuid::Uuid;

use crate::error::{IngestError, Result};
use crate::partition::partition;
use crate::scheduler::{BatchScheduler, ItemOperation, RunReport, SchedulerConfig, Ticker};
use crate::sink::FailureSink;
use crate::source::SourceEnumerator;

/// How a failed item is written to a failure sink
pub trait FailureEntry {
    fn failure_entry(&self) -> String;
}

impl FailureEntry for WorkItem {
    fn failure_entry(&self) -> String {
        self.to_string()
    }
}

impl FailureEntry for Tweet {
    fn failure_entry(&self) -> String {
        format!("{}: {}", self.id, self.text)
    }
}

/// Partitions a work list and runs it through a [`BatchScheduler`]
pub struct IngestionPipeline {
    batch_size: usize,
    scheduler: BatchScheduler,
}

impl IngestionPipeline {
    /// Creates a pipeline, rejecting unusable configuration up front
    pub fn new(batch_size: usize, config: SchedulerConfig) -> Result<Self> {
        if batch_size == 0 {
            return Err(IngestError::Configuration(
                "batch_size must be greater than 0".to_string(),
            ));
        }

        Ok(Self {
            batch_size,
            scheduler: BatchScheduler::new(config)?,
        })
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn scheduler(&self) -> &BatchScheduler {
        &self.scheduler
    }

    /// Runs the pipeline once
    ///
    /// Every failed item is appended to `sink` after the scheduler returns,
    /// including when the run aborts with an error. A sink that cannot be
    /// written is logged, not fatal: the items are already in the returned
    /// report.
    pub async fn run<T, S, O, K>(
        &self,
        name: &str,
        source: &S,
        op: &O,
        ticker: &mut K,
        cancel: &CancellationToken,
        sink: &dyn FailureSink,
    ) -> Result<RunReport<T>>
    where
        T: Clone + Debug + Send + Sync + FailureEntry,
        S: SourceEnumerator<T> + ?Sized,
        O: ItemOperation<T> + ?Sized,
        K: Ticker + ?Sized,
    {
        let span = info_span!("pipeline", name, run_id = %Uuid::new_v4());

        async move {
            let items = source
                .enumerate()
                .await
                .map_err(|e| IngestError::Source(format!("{:#}", e)))?;

            let batches = partition(&items, self.batch_size)?;
            info!(
                "Enumerated {} item(s) into {} batch(es) of up to {}",
                items.len(),
                batches.len(),
                self.batch_size
            );

            let (report, aborted) = self
                .scheduler
                .run_with_report(&batches, op, ticker, cancel)
                .await;

            if !report.failed_items.is_empty() {
                let entries: Vec<String> = report
                    .failed_items
                    .iter()
                    .map(FailureEntry::failure_entry)
                    .collect();

                if let Err(e) = sink.append_all(&entries).await {
                    error!("Failed to export {} failed item(s): {:#}", entries.len(), e);
                }
            }

            match aborted {
                Some(err) => Err(err),
                None => Ok(report),
            }
        }
        .instrument(span)
        .await
    }
}
