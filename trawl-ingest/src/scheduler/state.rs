//! Scheduler state machine
//!
//! The scheduler's progress lives in a [`PipelineState`] owned by a single run.
//! Every change goes through [`step`], a pure transition function, so the
//! retry-in-place behaviour can be exercised without timers.

use std::collections::BTreeSet;

/// Top-level scheduler state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerState {
    /// Created, not started
    Idle,
    /// Working through batches
    Running(BatchPhase),
    /// Every batch settled; the run is complete
    Draining,
    /// The run stopped before completing
    Aborted(AbortReason),
}

/// Phase of the current batch while running
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchPhase {
    /// The batch at `current_batch_index` is ready to launch
    BatchStart,
    /// The batch is in flight
    BatchExecuting,
    /// The previous attempt settled; waiting for the next tick
    BatchSettled,
}

/// Why a run stopped early
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortReason {
    Cancelled,
    RetriesExhausted { batch_index: usize, attempts: u32 },
    Fault(String),
}

/// Items of one batch attempt that reached a final result
///
/// Items are identified by their position within the batch.
#[derive(Debug)]
pub struct Settlement<T> {
    pub stored: Vec<usize>,
    /// Non-retryable failures, with the failed item
    pub failed: Vec<(usize, T)>,
}

impl<T> Default for Settlement<T> {
    fn default() -> Self {
        Self {
            stored: Vec::new(),
            failed: Vec::new(),
        }
    }
}

impl<T> Settlement<T> {
    pub fn len(&self) -> usize {
        self.stored.len() + self.failed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stored.is_empty() && self.failed.is_empty()
    }
}

/// Result of executing one batch attempt
///
/// Every variant carries the items that settled before the attempt ended.
/// Those are credited once and never launched again.
#[derive(Debug)]
pub enum BatchOutcome<T> {
    /// Every outstanding item was attempted
    Settled(Settlement<T>),
    /// The upstream throttled us; the unsettled items must run again
    RateLimited(Settlement<T>),
    /// Cancellation stopped the batch before every item was attempted
    Interrupted(Settlement<T>),
    /// An item hit an unrecoverable error
    Faulted(Settlement<T>, String),
}

/// Input to the transition function
#[derive(Debug)]
pub enum Event<T> {
    Start,
    Launched,
    Tick,
    Finished(BatchOutcome<T>),
    Cancel,
}

/// How long to hold off after a rate-limited attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backoff {
    /// Retry on the very next tick
    #[default]
    None,
    /// After the n-th consecutive rate limit, skip `2^(n-1) - 1` ticks, capped
    Exponential { max_skipped_ticks: u32 },
}

impl Backoff {
    /// Ticks to skip after `consecutive` rate-limited attempts of one batch
    pub fn skipped_ticks(&self, consecutive: u32) -> u32 {
        match self {
            Backoff::None => 0,
            Backoff::Exponential { max_skipped_ticks } => {
                let exponent = consecutive.saturating_sub(1).min(31);
                let skipped = (1u64 << exponent) - 1;
                skipped.min(u64::from(*max_skipped_ticks)) as u32
            }
        }
    }
}

/// What to do when a batch keeps getting rate limited
///
/// The default retries forever at tick cadence with no backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RetryPolicy {
    /// Total attempts allowed per batch; `None` means unlimited
    pub max_attempts: Option<u32>,
    pub backoff: Backoff,
}

impl RetryPolicy {
    /// Retry forever, once per tick
    pub fn indefinite() -> Self {
        Self::default()
    }

    /// Give up on a batch after `max_attempts` rate-limited attempts
    pub fn limited(max_attempts: u32) -> Self {
        Self {
            max_attempts: Some(max_attempts),
            backoff: Backoff::None,
        }
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Whether another attempt may follow `attempts` rate-limited ones
    pub(crate) fn allows(&self, attempts: u32) -> bool {
        self.max_attempts.is_none_or(|max| attempts < max)
    }
}

/// Progress of one pipeline run
#[derive(Debug, Clone)]
pub struct PipelineState<T> {
    pub status: SchedulerState,
    pub current_batch_index: usize,
    pub processed_count: usize,
    pub failed_items: Vec<T>,
    pub batch_count: usize,
    /// Consecutive rate-limited attempts of the current batch
    pub attempts: u32,
    /// Ticks still to skip before the current batch may retry
    pub cooldown_ticks: u32,
    /// Ticks observed, including no-op ticks
    pub ticks: u64,
    /// Rate-limited attempts over the whole run
    pub retries: u64,
    /// Positions in the current batch settled by an earlier attempt
    pub settled_items: BTreeSet<usize>,
}

impl<T> PipelineState<T> {
    pub fn new(batch_count: usize) -> Self {
        Self {
            status: SchedulerState::Idle,
            current_batch_index: 0,
            processed_count: 0,
            failed_items: Vec::new(),
            batch_count,
            attempts: 0,
            cooldown_ticks: 0,
            ticks: 0,
            retries: 0,
            settled_items: BTreeSet::new(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self.status,
            SchedulerState::Draining | SchedulerState::Aborted(_)
        )
    }

    /// Credits the items of one attempt, ignoring positions already settled
    fn record(&mut self, settlement: Settlement<T>) {
        for position in settlement.stored {
            if self.settled_items.insert(position) {
                self.processed_count += 1;
            }
        }

        for (position, item) in settlement.failed {
            if self.settled_items.insert(position) {
                self.failed_items.push(item);
            }
        }
    }
}

/// Applies one event to the state
///
/// Events that make no sense in the current state are ignored, except ticks,
/// which are always counted. Terminal states absorb every event.
pub fn step<T>(
    mut state: PipelineState<T>,
    event: Event<T>,
    policy: &RetryPolicy,
) -> PipelineState<T> {
    use BatchPhase::*;
    use SchedulerState::*;

    if state.is_terminal() {
        return state;
    }

    match (state.status.clone(), event) {
        (_, Event::Cancel) => state.status = Aborted(AbortReason::Cancelled),
        (Idle, Event::Start) => {
            state.status = if state.batch_count == 0 {
                Draining
            } else {
                Running(BatchStart)
            };
        }
        (Running(BatchStart), Event::Launched) => state.status = Running(BatchExecuting),
        (Running(BatchExecuting), Event::Finished(outcome)) => {
            return settle(state, outcome, policy);
        }
        (Running(BatchSettled), Event::Tick) => {
            state.ticks += 1;
            if state.cooldown_ticks > 0 {
                state.cooldown_ticks -= 1;
            } else {
                state.status = Running(BatchStart);
            }
        }
        (_, Event::Tick) => state.ticks += 1,
        _ => {}
    }

    state
}

fn settle<T>(
    mut state: PipelineState<T>,
    outcome: BatchOutcome<T>,
    policy: &RetryPolicy,
) -> PipelineState<T> {
    match outcome {
        BatchOutcome::Settled(settlement) => {
            state.record(settlement);
            state.current_batch_index += 1;
            state.settled_items.clear();
            state.attempts = 0;
            state.cooldown_ticks = 0;
            state.status = if state.current_batch_index >= state.batch_count {
                SchedulerState::Draining
            } else {
                SchedulerState::Running(BatchPhase::BatchSettled)
            };
        }
        BatchOutcome::RateLimited(settlement) => {
            state.record(settlement);
            state.attempts += 1;
            state.retries += 1;
            if policy.allows(state.attempts) {
                state.cooldown_ticks = policy.backoff.skipped_ticks(state.attempts);
                state.status = SchedulerState::Running(BatchPhase::BatchSettled);
            } else {
                state.status = SchedulerState::Aborted(AbortReason::RetriesExhausted {
                    batch_index: state.current_batch_index,
                    attempts: state.attempts,
                });
            }
        }
        BatchOutcome::Interrupted(settlement) => {
            state.record(settlement);
            state.status = SchedulerState::Aborted(AbortReason::Cancelled);
        }
        BatchOutcome::Faulted(settlement, message) => {
            state.record(settlement);
            state.status = SchedulerState::Aborted(AbortReason::Fault(message));
        }
    }

    state
}

#[cfg(test)]
mod tests {
    use super::*;

    fn started(batch_count: usize) -> PipelineState<&'static str> {
        step(
            PipelineState::new(batch_count),
            Event::Start,
            &RetryPolicy::default(),
        )
    }

    fn settlement(
        stored: &[usize],
        failed: &[(usize, &'static str)],
    ) -> Settlement<&'static str> {
        Settlement {
            stored: stored.to_vec(),
            failed: failed.to_vec(),
        }
    }

    fn throttled() -> BatchOutcome<&'static str> {
        BatchOutcome::RateLimited(Settlement::default())
    }

    fn run_batch(
        state: PipelineState<&'static str>,
        outcome: BatchOutcome<&'static str>,
        policy: &RetryPolicy,
    ) -> PipelineState<&'static str> {
        let state = step(state, Event::Launched, policy);
        step(state, Event::Finished(outcome), policy)
    }

    #[test]
    fn test_start_with_no_batches_drains() {
        let state = started(0);
        assert_eq!(state.status, SchedulerState::Draining);
    }

    #[test]
    fn test_start_makes_first_batch_ready() {
        let state = started(2);
        assert_eq!(state.status, SchedulerState::Running(BatchPhase::BatchStart));
        assert_eq!(state.current_batch_index, 0);
    }

    #[test]
    fn test_settled_batch_advances() {
        let policy = RetryPolicy::default();
        let state = run_batch(
            started(2),
            BatchOutcome::Settled(settlement(&[0, 1, 2], &[(3, "x")])),
            &policy,
        );

        assert_eq!(state.current_batch_index, 1);
        assert_eq!(state.processed_count, 3);
        assert_eq!(state.failed_items, vec!["x"]);
        assert_eq!(state.status, SchedulerState::Running(BatchPhase::BatchSettled));
    }

    #[test]
    fn test_all_failed_batch_still_advances() {
        let policy = RetryPolicy::default();
        let state = run_batch(
            started(1),
            BatchOutcome::Settled(settlement(&[], &[(0, "a"), (1, "b")])),
            &policy,
        );

        assert_eq!(state.current_batch_index, 1);
        assert_eq!(state.failed_items, vec!["a", "b"]);
        assert_eq!(state.status, SchedulerState::Draining);
    }

    #[test]
    fn test_rate_limited_batch_is_retried_in_place() {
        let policy = RetryPolicy::default();
        let state = run_batch(started(3), throttled(), &policy);
        assert_eq!(state.current_batch_index, 0);
        assert_eq!(state.status, SchedulerState::Running(BatchPhase::BatchSettled));

        let state = step(state, Event::Tick, &policy);
        assert_eq!(state.current_batch_index, 0);
        assert_eq!(state.status, SchedulerState::Running(BatchPhase::BatchStart));

        let state = run_batch(state, throttled(), &policy);
        let state = step(state, Event::Tick, &policy);
        assert_eq!(state.current_batch_index, 0);
        assert_eq!(state.attempts, 2);

        let all: Vec<usize> = (0..25).collect();
        let state = run_batch(state, BatchOutcome::Settled(settlement(&all, &[])), &policy);
        assert_eq!(state.current_batch_index, 1);
        assert_eq!(state.processed_count, 25);
        assert_eq!(state.attempts, 0);
        assert_eq!(state.retries, 2);
    }

    #[test]
    fn test_tick_while_executing_is_noop() {
        let policy = RetryPolicy::default();
        let state = step(started(2), Event::Launched, &policy);
        let state = step(state, Event::Tick, &policy);

        assert_eq!(
            state.status,
            SchedulerState::Running(BatchPhase::BatchExecuting)
        );
        assert_eq!(state.ticks, 1);
    }

    #[test]
    fn test_retry_budget_exhausted() {
        let policy = RetryPolicy::limited(2);
        let state = run_batch(started(1), throttled(), &policy);
        let state = step(state, Event::Tick, &policy);
        let state = run_batch(state, throttled(), &policy);

        assert_eq!(
            state.status,
            SchedulerState::Aborted(AbortReason::RetriesExhausted {
                batch_index: 0,
                attempts: 2
            })
        );
    }

    #[test]
    fn test_exponential_backoff_skips_ticks() {
        let policy = RetryPolicy::indefinite().with_backoff(Backoff::Exponential {
            max_skipped_ticks: 2,
        });

        // First rate limit: no ticks skipped
        let state = run_batch(started(1), throttled(), &policy);
        assert_eq!(state.cooldown_ticks, 0);
        let state = step(state, Event::Tick, &policy);
        assert_eq!(state.status, SchedulerState::Running(BatchPhase::BatchStart));

        // Second: one tick skipped
        let state = run_batch(state, throttled(), &policy);
        assert_eq!(state.cooldown_ticks, 1);
        let state = step(state, Event::Tick, &policy);
        assert_eq!(state.status, SchedulerState::Running(BatchPhase::BatchSettled));
        let state = step(state, Event::Tick, &policy);
        assert_eq!(state.status, SchedulerState::Running(BatchPhase::BatchStart));

        // Third would be three, capped at two
        let state = run_batch(state, throttled(), &policy);
        assert_eq!(state.cooldown_ticks, 2);
    }

    #[test]
    fn test_backoff_skipped_ticks() {
        let backoff = Backoff::Exponential {
            max_skipped_ticks: 100,
        };
        let skipped: Vec<u32> = (1..=5).map(|n| backoff.skipped_ticks(n)).collect();
        assert_eq!(skipped, vec![0, 1, 3, 7, 15]);
        assert_eq!(Backoff::None.skipped_ticks(10), 0);
    }

    #[test]
    fn test_cancel_is_terminal() {
        let policy = RetryPolicy::default();
        let state = step(started(2), Event::Cancel, &policy);
        assert_eq!(state.status, SchedulerState::Aborted(AbortReason::Cancelled));

        let state = step(state, Event::Launched, &policy);
        assert_eq!(state.status, SchedulerState::Aborted(AbortReason::Cancelled));
    }

    #[test]
    fn test_interrupted_batch_does_not_advance() {
        let policy = RetryPolicy::default();
        let state = run_batch(
            started(2),
            BatchOutcome::Interrupted(settlement(&[0], &[])),
            &policy,
        );
        assert_eq!(state.current_batch_index, 0);
        assert_eq!(state.processed_count, 1);
        assert_eq!(state.status, SchedulerState::Aborted(AbortReason::Cancelled));
    }

    #[test]
    fn test_rate_limited_attempt_credits_settled_items_once() {
        let policy = RetryPolicy::default();
        let state = run_batch(
            started(2),
            BatchOutcome::RateLimited(settlement(&[0, 1], &[(2, "c")])),
            &policy,
        );
        assert_eq!(state.current_batch_index, 0);
        assert_eq!(state.processed_count, 2);
        assert_eq!(state.failed_items, vec!["c"]);
        assert_eq!(state.settled_items, BTreeSet::from([0, 1, 2]));

        // A later attempt reporting an already settled position changes nothing
        let state = step(state, Event::Tick, &policy);
        let state = run_batch(
            state,
            BatchOutcome::Settled(settlement(&[1, 3], &[(2, "c")])),
            &policy,
        );
        assert_eq!(state.current_batch_index, 1);
        assert_eq!(state.processed_count, 3);
        assert_eq!(state.failed_items, vec!["c"]);
        assert!(state.settled_items.is_empty());
    }

    #[test]
    fn test_faulted_batch_keeps_partial_progress() {
        let policy = RetryPolicy::default();
        let state = run_batch(
            started(2),
            BatchOutcome::Faulted(settlement(&[0], &[(1, "b")]), "database gone".to_string()),
            &policy,
        );

        assert_eq!(
            state.status,
            SchedulerState::Aborted(AbortReason::Fault("database gone".to_string()))
        );
        assert_eq!(state.processed_count, 1);
        assert_eq!(state.failed_items, vec!["b"]);
    }
}
