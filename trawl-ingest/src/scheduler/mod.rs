//! Scheduler layer
//!
//! Drives timed, sequential batch execution. The state machine is kept
//! separate from the async driver so transitions can be tested on their own.

pub mod batch;
pub mod state;
pub mod ticker;

pub use batch::{BatchScheduler, ItemOperation, RunReport, RunStatus, SchedulerConfig};
pub use state::{Backoff, PipelineState, RetryPolicy, SchedulerState};
pub use ticker::{IntervalTicker, Ticker, VirtualTicker};
