//! Fixed-timestep tick scheduler.
//!
//! The world actor drains its request inbox and runs the physics step once
//! per tick. The scheduler only decides *when* that happens:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         Some(cmd) = commands.recv() => { /* connect, enqueue, ... */ }
//!         tick = scheduler.wait_for_tick() => {
//!             world.tick(tick.tick);
//!             scheduler.record_tick_end();
//!         }
//!     }
//! }
//! ```
//!
//! A tick rate of 0 puts the scheduler in event-driven mode:
//! [`TickScheduler::wait_for_tick`] never resolves and the owner is
//! expected to flush work itself after each command.

use std::time::{Duration, Instant};

use tokio::time::{self, Instant as TokioInstant};
use tracing::{debug, trace, warn};

/// Scheduler settings.
#[derive(Debug, Clone)]
pub struct TickConfig {
    /// Ticks per second. 0 = event-driven.
    pub tick_rate_hz: u32,
    /// Fraction of the tick budget (0.0–1.0) above which a tick's work
    /// is reported with a warning.
    pub budget_warn_threshold: f64,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: 50,
            budget_warn_threshold: 0.8,
        }
    }
}

impl TickConfig {
    /// Highest accepted rate; anything above is clamped.
    pub const MAX_TICK_RATE_HZ: u32 = 128;

    pub fn with_rate(tick_rate_hz: u32) -> Self {
        Self {
            tick_rate_hz,
            ..Default::default()
        }
    }

    /// Length of one tick, `None` in event-driven mode.
    pub fn tick_duration(&self) -> Option<Duration> {
        match self.tick_rate_hz {
            0 => None,
            hz => Some(Duration::from_secs_f64(1.0 / f64::from(hz))),
        }
    }

    fn validated(mut self) -> Self {
        if self.tick_rate_hz > Self::MAX_TICK_RATE_HZ {
            warn!(
                rate = self.tick_rate_hz,
                max = Self::MAX_TICK_RATE_HZ,
                "tick rate too high, clamping"
            );
            self.tick_rate_hz = Self::MAX_TICK_RATE_HZ;
        }
        self.budget_warn_threshold = self.budget_warn_threshold.clamp(0.0, 1.0);
        self
    }
}

/// Handed out by [`TickScheduler::wait_for_tick`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickInfo {
    /// 1-based, monotonically increasing.
    pub tick: u64,
    /// Fixed step length. Simulation code uses this, never wall time.
    pub dt: Duration,
    /// Ticks that were skipped because the loop fell behind.
    pub skipped: u64,
}

/// Drives one fixed-rate loop.
///
/// When the loop falls behind by more than a whole tick, the missed ticks
/// are skipped and the schedule restarts from "now" rather than firing a
/// burst of catch-up ticks.
pub struct TickScheduler {
    config: TickConfig,
    tick_duration: Option<Duration>,
    tick_count: u64,
    next_tick: Option<TokioInstant>,
    tick_started: Option<Instant>,
    skipped_total: u64,
}

impl TickScheduler {
    pub fn new(config: TickConfig) -> Self {
        let config = config.validated();
        let tick_duration = config.tick_duration();
        let next_tick = tick_duration.map(|d| TokioInstant::now() + d);

        match tick_duration {
            Some(d) => debug!(
                rate_hz = config.tick_rate_hz,
                budget_ms = d.as_secs_f64() * 1000.0,
                "tick scheduler created"
            ),
            None => debug!("tick scheduler created in event-driven mode"),
        }

        Self {
            config,
            tick_duration,
            tick_count: 0,
            next_tick,
            tick_started: None,
            skipped_total: 0,
        }
    }

    pub fn with_rate(tick_rate_hz: u32) -> Self {
        Self::new(TickConfig::with_rate(tick_rate_hz))
    }

    /// Sleeps until the next tick is due.
    ///
    /// Pends forever in event-driven mode, so it can sit in a `select!`
    /// unconditionally.
    pub async fn wait_for_tick(&mut self) -> TickInfo {
        let (due, dt) = match (self.next_tick, self.tick_duration) {
            (Some(due), Some(dt)) => (due, dt),
            _ => std::future::pending().await,
        };

        time::sleep_until(due).await;

        let now = TokioInstant::now();
        let late_by = now.saturating_duration_since(due);
        let skipped = (late_by.as_nanos() / dt.as_nanos()) as u64;
        if skipped > 0 {
            warn!(
                tick = self.tick_count + 1,
                skipped,
                late_ms = late_by.as_secs_f64() * 1000.0,
                "world loop fell behind, skipping ticks"
            );
            self.skipped_total += skipped;
            self.next_tick = Some(now + dt);
        } else {
            self.next_tick = Some(due + dt);
        }

        self.tick_count += 1;
        self.tick_started = Some(Instant::now());
        trace!(tick = self.tick_count, "tick");

        TickInfo {
            tick: self.tick_count,
            dt,
            skipped,
        }
    }

    /// Marks the end of the current tick's work and checks it against the
    /// budget. A no-op if no tick is in progress.
    pub fn record_tick_end(&mut self) {
        let (Some(started), Some(budget)) = (self.tick_started.take(), self.tick_duration) else {
            return;
        };
        let elapsed = started.elapsed();
        let utilization = elapsed.as_secs_f64() / budget.as_secs_f64();
        if utilization >= self.config.budget_warn_threshold {
            warn!(
                tick = self.tick_count,
                elapsed_ms = elapsed.as_secs_f64() * 1000.0,
                budget_ms = budget.as_secs_f64() * 1000.0,
                "tick work close to or over budget"
            );
        }
    }

    pub fn is_event_driven(&self) -> bool {
        self.tick_duration.is_none()
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Total ticks skipped since creation.
    pub fn skipped_total(&self) -> u64 {
        self.skipped_total
    }

    pub fn tick_duration(&self) -> Option<Duration> {
        self.tick_duration
    }
}
