//! Batch scheduler
//!
//! Runs partitioned work one batch at a time, paced by a [`Ticker`].
//! Items inside a batch are fanned out concurrently behind a semaphore.
//! A rate-limited batch is retried in place on a later tick; it is never
//! skipped. Only the items that did not settle are launched again.

use async_trait::async_trait;
use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::BTreeSet;
use std::fmt::Debug;
use tokio::sync::Semaphore;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::state::{
    AbortReason, BatchOutcome, BatchPhase, Event, PipelineState, RetryPolicy, SchedulerState,
    Settlement, step,
};
use super::ticker::{IntervalTicker, Ticker};
use crate::error::{IngestError, Result};
use crate::signal::{Signal, classify};

/// The per-item unit of work, usually "fetch upstream, then store"
#[async_trait]
pub trait ItemOperation<T>: Send + Sync {
    async fn apply(&self, item: &T) -> Result<()>;
}

/// Scheduler configuration
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Minimum spacing between the starts of successive batches
    pub tick_interval: Duration,

    /// Maximum number of item operations in flight at once
    pub max_in_flight: usize,

    /// What to do when a batch keeps getting rate limited
    pub retry_policy: RetryPolicy,
}

impl SchedulerConfig {
    pub fn new(tick_interval: Duration, max_in_flight: usize) -> Self {
        Self {
            tick_interval,
            max_in_flight,
            retry_policy: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<()> {
        if self.tick_interval.is_zero() {
            return Err(IngestError::Configuration(
                "tick_interval must be greater than 0".to_string(),
            ));
        }

        if self.max_in_flight == 0 {
            return Err(IngestError::Configuration(
                "max_in_flight must be greater than 0".to_string(),
            ));
        }

        if self.retry_policy.max_attempts == Some(0) {
            return Err(IngestError::Configuration(
                "retry max_attempts must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Completed,
    Cancelled,
    /// Stopped by an error; the report covers the items settled before it
    Aborted,
}

/// Observable record of a finished run
#[derive(Debug, Clone)]
pub struct RunReport<T> {
    pub status: RunStatus,
    pub processed_count: usize,
    pub failed_items: Vec<T>,
    pub batch_count: usize,
    pub batches_completed: usize,
    pub ticks: u64,
    pub retries: u64,
}

impl<T> RunReport<T> {
    fn from_state(state: PipelineState<T>, status: RunStatus) -> Self {
        Self {
            status,
            processed_count: state.processed_count,
            failed_items: state.failed_items,
            batch_count: state.batch_count,
            batches_completed: state.current_batch_index,
            ticks: state.ticks,
            retries: state.retries,
        }
    }
}

enum ItemOutcome {
    Stored,
    Failed(IngestError),
    Skipped,
}

/// Drives sequential batch execution
pub struct BatchScheduler {
    config: SchedulerConfig,
    semaphore: Semaphore,
}

impl BatchScheduler {
    /// Creates a scheduler, rejecting unusable configuration up front
    pub fn new(config: SchedulerConfig) -> Result<Self> {
        config.validate()?;
        let semaphore = Semaphore::new(config.max_in_flight);
        Ok(Self { config, semaphore })
    }

    /// A wall-clock ticker with this scheduler's tick interval
    pub fn ticker(&self) -> IntervalTicker {
        IntervalTicker::new(self.config.tick_interval)
    }

    /// Runs every batch to completion
    ///
    /// Batch 0 starts immediately; each later batch starts on the first tick
    /// after its predecessor settled. Returns a report for completed and
    /// cancelled runs; aborts with an error on unrecoverable faults or when
    /// the retry policy gives up on a batch.
    pub async fn run<T, O, K>(
        &self,
        batches: &[Vec<T>],
        op: &O,
        ticker: &mut K,
        cancel: &CancellationToken,
    ) -> Result<RunReport<T>>
    where
        T: Clone + Debug + Send + Sync,
        O: ItemOperation<T> + ?Sized,
        K: Ticker + ?Sized,
    {
        match self.run_with_report(batches, op, ticker, cancel).await {
            (report, None) => Ok(report),
            (_, Some(err)) => Err(err),
        }
    }

    /// Runs every batch and always returns the report
    ///
    /// When the run aborts, the error comes back next to a report with
    /// [`RunStatus::Aborted`] holding every item settled before the abort.
    pub async fn run_with_report<T, O, K>(
        &self,
        batches: &[Vec<T>],
        op: &O,
        ticker: &mut K,
        cancel: &CancellationToken,
    ) -> (RunReport<T>, Option<IngestError>)
    where
        T: Clone + Debug + Send + Sync,
        O: ItemOperation<T> + ?Sized,
        K: Ticker + ?Sized,
    {
        let policy = self.config.retry_policy;
        let mut state = step(PipelineState::new(batches.len()), Event::Start, &policy);

        info!(
            "Starting run of {} batch(es) (tick interval: {:?}, max in flight: {})",
            batches.len(),
            self.config.tick_interval,
            self.config.max_in_flight
        );

        loop {
            match state.status.clone() {
                SchedulerState::Draining => {
                    info!(
                        "Run complete: {} item(s) processed, {} failed, {} retry attempt(s)",
                        state.processed_count,
                        state.failed_items.len(),
                        state.retries
                    );
                    return (RunReport::from_state(state, RunStatus::Completed), None);
                }
                SchedulerState::Aborted(AbortReason::Cancelled) => {
                    warn!(
                        "Run cancelled at batch {}/{} after {} item(s)",
                        state.current_batch_index, state.batch_count, state.processed_count
                    );
                    return (RunReport::from_state(state, RunStatus::Cancelled), None);
                }
                SchedulerState::Aborted(AbortReason::RetriesExhausted {
                    batch_index,
                    attempts,
                }) => {
                    let err = IngestError::RetriesExhausted {
                        batch_index,
                        attempts,
                    };
                    return Self::aborted(state, err);
                }
                SchedulerState::Aborted(AbortReason::Fault(message)) => {
                    return Self::aborted(state, IngestError::Unrecoverable(message));
                }
                SchedulerState::Running(BatchPhase::BatchStart) => {
                    if cancel.is_cancelled() {
                        state = step(state, Event::Cancel, &policy);
                        continue;
                    }

                    let index = state.current_batch_index;
                    let settled = state.settled_items.clone();
                    state = step(state, Event::Launched, &policy);

                    let execution =
                        self.execute_batch(index, &batches[index], &settled, op, cancel);
                    tokio::pin!(execution);

                    let outcome = loop {
                        tokio::select! {
                            biased;
                            outcome = &mut execution => break outcome,
                            _ = ticker.tick() => {
                                debug!("Tick while batch {} is executing, ignoring", index);
                                state = step(state, Event::Tick, &policy);
                            }
                        }
                    };

                    state = step(state, Event::Finished(outcome), &policy);

                    if state.current_batch_index > index {
                        info!(
                            "Batch {}/{} settled, processed {} item(s) so far",
                            state.current_batch_index, state.batch_count, state.processed_count
                        );
                    }
                }
                SchedulerState::Running(BatchPhase::BatchSettled) => {
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => state = step(state, Event::Cancel, &policy),
                        _ = ticker.tick() => state = step(state, Event::Tick, &policy),
                    }
                }
                status @ (SchedulerState::Idle
                | SchedulerState::Running(BatchPhase::BatchExecuting)) => {
                    let err = IngestError::Unrecoverable(format!(
                        "scheduler stalled in state {:?}",
                        status
                    ));
                    return Self::aborted(state, err);
                }
            }
        }
    }

    fn aborted<T>(
        state: PipelineState<T>,
        err: IngestError,
    ) -> (RunReport<T>, Option<IngestError>) {
        error!(
            "Run aborted at batch {}/{} after {} item(s): {}",
            state.current_batch_index, state.batch_count, state.processed_count, err
        );
        (RunReport::from_state(state, RunStatus::Aborted), Some(err))
    }

    /// Executes one attempt of a batch
    ///
    /// Positions in `settled` were credited by an earlier attempt and are
    /// not launched again.
    async fn execute_batch<T, O>(
        &self,
        index: usize,
        batch: &[T],
        settled: &BTreeSet<usize>,
        op: &O,
        cancel: &CancellationToken,
    ) -> BatchOutcome<T>
    where
        T: Clone + Debug + Send + Sync,
        O: ItemOperation<T> + ?Sized,
    {
        let mut pending: FuturesUnordered<_> = batch
            .iter()
            .enumerate()
            .filter(|(position, _)| !settled.contains(position))
            .map(|(position, item)| self.execute_item(position, item, op, cancel))
            .collect();

        debug!(
            "Executing batch {} ({} of {} item(s) outstanding)",
            index,
            pending.len(),
            batch.len()
        );

        let mut settlement = Settlement::default();
        let mut interrupted = false;

        while let Some((position, item, outcome)) = pending.next().await {
            match outcome {
                ItemOutcome::Stored => settlement.stored.push(position),
                ItemOutcome::Skipped => interrupted = true,
                ItemOutcome::Failed(err) if err.is_unrecoverable() => {
                    return BatchOutcome::Faulted(settlement, unrecoverable_message(err));
                }
                ItemOutcome::Failed(err) => match classify(&err) {
                    Signal::Retryable => {
                        warn!(
                            "Batch {} rate limited ({}), {} item(s) settled, dropping {} in flight until retry",
                            index,
                            err,
                            settlement.len(),
                            pending.len()
                        );
                        return BatchOutcome::RateLimited(settlement);
                    }
                    Signal::Fatal => {
                        warn!("Item {:?} in batch {} failed: {}", item, index, err);
                        settlement.failed.push((position, item.clone()));
                    }
                },
            }
        }

        if interrupted {
            return BatchOutcome::Interrupted(settlement);
        }

        info!(
            "Batch {} done: {} stored, {} failed",
            index,
            settlement.stored.len(),
            settlement.failed.len()
        );

        BatchOutcome::Settled(settlement)
    }

    /// Runs the operation for one item once a permit is available
    async fn execute_item<'a, T, O>(
        &self,
        position: usize,
        item: &'a T,
        op: &O,
        cancel: &CancellationToken,
    ) -> (usize, &'a T, ItemOutcome)
    where
        T: Send + Sync,
        O: ItemOperation<T> + ?Sized,
    {
        let _permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => return (position, item, ItemOutcome::Skipped),
            permit = self.semaphore.acquire() => match permit {
                Ok(permit) => permit,
                Err(_) => {
                    let err = IngestError::Unrecoverable("concurrency limiter closed".to_string());
                    return (position, item, ItemOutcome::Failed(err));
                }
            },
        };

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => ItemOutcome::Skipped,
            result = op.apply(item) => match result {
                Ok(()) => ItemOutcome::Stored,
                Err(err) => ItemOutcome::Failed(err),
            },
        };

        (position, item, outcome)
    }
}

fn unrecoverable_message(err: IngestError) -> String {
    match err {
        IngestError::Unrecoverable(message) => message,
        other => other.to_string(),
    }
}
