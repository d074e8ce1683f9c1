use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{self, Instant, Interval, MissedTickBehavior};
use shared::types::ServiceName;
use super::filter::ServiceFilter;

/// Shortest period accepted for either timer
const MIN_PERIOD: Duration = Duration::from_millis(100);

/// Which timer fired
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    Query,
    Sweep,
}

/// The rescan and sweep timers. Both exist only while scanning is active.
#[derive(Debug)]
pub struct QueryScheduler {
    rescan_period: Duration,
    sweep_period: Duration,
    query_timer: Option<Interval>,
    sweep_timer: Option<Interval>,
}

impl QueryScheduler {
    pub fn new(rescan_period: Duration, sweep_period: Duration) -> Self {
        Self {
            rescan_period: rescan_period.max(MIN_PERIOD),
            sweep_period: sweep_period.max(MIN_PERIOD),
            query_timer: None,
            sweep_timer: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.query_timer.is_some()
    }

    pub fn rescan_period(&self) -> Duration {
        self.rescan_period
    }

    /// Arm both timers. The query timer fires immediately, then every rescan
    /// period. Returns false if already active.
    pub fn start(&mut self) -> bool {
        if self.is_active() {
            return false;
        }
        let now = Instant::now();
        self.query_timer = Some(make_interval(now, self.rescan_period));
        self.sweep_timer = Some(make_interval(now + self.sweep_period, self.sweep_period));
        true
    }

    /// Disarm both timers. Returns false if already stopped.
    pub fn stop(&mut self) -> bool {
        let was_active = self.is_active();
        self.query_timer = None;
        self.sweep_timer = None;
        was_active
    }

    /// Takes effect from the next query, one full period from now
    pub fn set_rescan_period(&mut self, period: Duration) {
        self.rescan_period = period.max(MIN_PERIOD);
        if let Some(timer) = self.query_timer.as_mut() {
            *timer = make_interval(Instant::now() + self.rescan_period, self.rescan_period);
        }
    }

    /// Resolves when either timer fires; never resolves while stopped
    pub async fn tick(&mut self) -> Tick {
        tokio::select! {
            _ = next(&mut self.query_timer) => Tick::Query,
            _ = next(&mut self.sweep_timer) => Tick::Sweep,
        }
    }

    /// Hand one query per configured service to the engine. Fire-and-forget:
    /// a full or closed channel drops the query.
    pub fn issue_queries(&self, services: &ServiceFilter, tx: &mpsc::Sender<ServiceName>) -> usize {
        if !self.is_active() {
            return 0;
        }
        let mut sent = 0;
        for name in services.query_names() {
            match tx.try_send(name) {
                Ok(()) => sent += 1,
                Err(e) => tracing::warn!("Failed to issue query: {}", e),
            }
        }
        sent
    }
}

fn make_interval(start: Instant, period: Duration) -> Interval {
    let mut interval = time::interval_at(start, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

async fn next(timer: &mut Option<Interval>) -> Instant {
    match timer {
        Some(interval) => interval.tick().await,
        None => std::future::pending().await,
    }
}
