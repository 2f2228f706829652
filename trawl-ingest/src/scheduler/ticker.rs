//! Tickers pace the start of successive batches

use async_trait::async_trait;
use tokio::time::{self, Duration, Instant, Interval, MissedTickBehavior};

/// A repeating timer
#[async_trait]
pub trait Ticker: Send {
    /// Waits for the next tick
    async fn tick(&mut self);
}

/// Wall-clock ticker backed by [`tokio::time::interval`]
///
/// The first tick fires one period after creation, since the first batch is
/// launched without waiting.
pub struct IntervalTicker {
    interval: Interval,
}

impl IntervalTicker {
    pub fn new(period: Duration) -> Self {
        let mut interval = time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval }
    }
}

#[async_trait]
impl Ticker for IntervalTicker {
    async fn tick(&mut self) {
        self.interval.tick().await;
    }
}

/// Ticker that fires immediately and counts how often it fired
///
/// Drives a scheduler run without wall-clock delays.
#[derive(Debug, Default)]
pub struct VirtualTicker {
    fired: u64,
}

impl VirtualTicker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fired(&self) -> u64 {
        self.fired
    }
}

#[async_trait]
impl Ticker for VirtualTicker {
    async fn tick(&mut self) {
        self.fired += 1;
    }
}
