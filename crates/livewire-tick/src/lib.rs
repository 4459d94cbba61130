//! Periodic tick scheduler for Livewire background loops.
//!
//! Drives the gossip loop: the first tick fires after an initial delay,
//! then one tick per period, each optionally shifted by random jitter so
//! that connections started together don't broadcast in lockstep.
//!
//! # Idle mode
//!
//! When `period` is zero the scheduler is idle and
//! [`TickScheduler::wait_for_tick`] pends forever.
//!
//! # Integration
//!
//! The scheduler is designed to sit inside a task's `tokio::select!` loop:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         _ = cancel.cancelled() => break,
//!         Some(msg) = presence.next() => { /* handle message */ }
//!         _ = scheduler.wait_for_tick() => {
//!             /* periodic work */
//!             scheduler.record_tick_end();
//!         }
//!     }
//! }
//! ```

use std::time::{Duration, Instant};

use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::time::{self, Instant as TokioInstant};
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// What to do when the loop falls behind by one or more whole periods.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TickPolicy {
    /// Skip the missed tick(s) and resume one period from now.
    #[default]
    Skip,
    /// Keep the original cadence: the next tick is due one period after
    /// the missed deadline, which may already have passed.
    Fixed,
}

/// Configuration for the tick scheduler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickConfig {
    /// Delay before the first tick.
    pub initial_delay: Duration,
    /// Time between ticks. Zero = idle (tick never fires).
    pub period: Duration,
    /// Upper bound of the random delay added to every deadline.
    pub jitter: Duration,
    /// Overrun handling policy.
    pub policy: TickPolicy,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(5),
            period: Duration::from_secs(5),
            jitter: Duration::ZERO,
            policy: TickPolicy::default(),
        }
    }
}

impl TickConfig {
    /// A config that ticks every `period`, starting one period from now.
    pub fn every(period: Duration) -> Self {
        Self {
            initial_delay: period,
            period,
            ..Default::default()
        }
    }

    /// Clamp any out-of-range values so the config is safe to use.
    ///
    /// Called automatically by [`TickScheduler::new`]. Jitter is capped at
    /// half the period so ticks can't reorder.
    pub fn validated(mut self) -> Self {
        let max_jitter = self.period / 2;
        if self.jitter > max_jitter {
            warn!(
                jitter_ms = self.jitter.as_millis() as u64,
                max_ms = max_jitter.as_millis() as u64,
                "tick jitter exceeds half the period, clamping"
            );
            self.jitter = max_jitter;
        }
        self
    }

    pub fn is_idle(&self) -> bool {
        self.period.is_zero()
    }
}

// ---------------------------------------------------------------------------
// Tick info (returned to caller each tick)
// ---------------------------------------------------------------------------

/// Information about a fired tick, returned by [`TickScheduler::wait_for_tick`].
#[derive(Debug, Clone)]
pub struct TickInfo {
    /// Monotonically increasing tick number (starts at 1).
    pub tick: u64,
    /// `true` if this tick fired at least one whole period late.
    pub overrun: bool,
    /// How many ticks were skipped due to overrun (0 in normal operation).
    pub ticks_skipped: u64,
}

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

/// Runtime counters for the tick scheduler.
#[derive(Debug, Clone, Default)]
pub struct TickMetrics {
    pub total_ticks: u64,
    pub total_overruns: u64,
    pub total_skipped: u64,
    /// Longest time between a tick firing and [`TickScheduler::record_tick_end`].
    pub max_tick_time: Duration,
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Periodic tick scheduler. One per background loop.
pub struct TickScheduler {
    config: TickConfig,
    tick_count: u64,
    /// When the next tick should fire (Tokio instant for `sleep_until`).
    next_tick: Option<TokioInstant>,
    /// Wall-clock instant the current tick's work started.
    /// Set by `wait_for_tick`, consumed by `record_tick_end`.
    tick_start: Option<Instant>,
    paused: bool,
    metrics: TickMetrics,
}

impl TickScheduler {
    /// Create a new scheduler. The first tick is due after
    /// `initial_delay` plus jitter.
    pub fn new(config: TickConfig) -> Self {
        let config = config.validated();

        let next_tick = (!config.is_idle())
            .then(|| TokioInstant::now() + config.initial_delay + random_jitter(config.jitter));

        if config.is_idle() {
            debug!("tick scheduler created idle (no period)");
        } else {
            debug!(
                initial_delay_ms = config.initial_delay.as_millis() as u64,
                period_ms = config.period.as_millis() as u64,
                policy = ?config.policy,
                "tick scheduler created"
            );
        }

        Self {
            config,
            tick_count: 0,
            next_tick,
            tick_start: None,
            paused: false,
            metrics: TickMetrics::default(),
        }
    }

    /// Wait until the next tick is due.
    ///
    /// Idle or paused schedulers pend forever; `tokio::select!` still
    /// processes other branches. Cancel-safe: the deadline only moves once
    /// a tick has actually fired.
    pub async fn wait_for_tick(&mut self) -> TickInfo {
        let next = match self.next_tick {
            Some(next) if !self.paused => next,
            _ => std::future::pending().await,
        };

        time::sleep_until(next).await;

        let now = TokioInstant::now();
        let period = self.config.period;
        self.tick_count += 1;
        self.tick_start = Some(Instant::now());

        let late_by = now.saturating_duration_since(next);
        let behind = (late_by.as_nanos() / period.as_nanos()) as u64;
        let overrun = behind > 0;

        let (deadline, ticks_skipped) = match self.config.policy {
            TickPolicy::Skip => {
                if overrun {
                    warn!(
                        tick = self.tick_count,
                        skipped = behind,
                        late_ms = late_by.as_millis() as u64,
                        "tick overrun, skipping ahead"
                    );
                }
                (now + period, behind)
            }
            TickPolicy::Fixed => (next + period, 0),
        };
        self.next_tick = Some(deadline + random_jitter(self.config.jitter));

        if overrun {
            self.metrics.total_overruns += 1;
        }
        self.metrics.total_skipped += ticks_skipped;
        self.metrics.total_ticks += 1;

        trace!(tick = self.tick_count, overrun, "tick fired");

        TickInfo {
            tick: self.tick_count,
            overrun,
            ticks_skipped,
        }
    }

    /// Record that the work for the current tick has finished.
    ///
    /// Warns when the work took longer than a whole period.
    pub fn record_tick_end(&mut self) {
        let Some(start) = self.tick_start.take() else {
            return;
        };
        let elapsed = start.elapsed();

        if !self.config.is_idle() && elapsed >= self.config.period {
            warn!(
                tick = self.tick_count,
                elapsed_ms = elapsed.as_millis() as u64,
                period_ms = self.config.period.as_millis() as u64,
                "tick work exceeded the period"
            );
        }
        if elapsed > self.metrics.max_tick_time {
            self.metrics.max_tick_time = elapsed;
        }
    }

    /// Pause the loop. `wait_for_tick` pends until [`resume`](Self::resume).
    ///
    /// Safe to call multiple times (idempotent).
    pub fn pause(&mut self) {
        if !self.paused {
            self.paused = true;
            debug!(tick = self.tick_count, "tick scheduler paused");
        }
    }

    /// Resume after a pause. The next tick is due one period from now, so
    /// time spent paused doesn't count as an overrun.
    pub fn resume(&mut self) {
        if self.paused {
            self.paused = false;
            if !self.config.is_idle() {
                self.next_tick = Some(TokioInstant::now() + self.config.period);
            }
            debug!(tick = self.tick_count, "tick scheduler resumed");
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn is_idle(&self) -> bool {
        self.config.is_idle()
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn metrics(&self) -> &TickMetrics {
        &self.metrics
    }

    pub fn period(&self) -> Duration {
        self.config.period
    }

    /// When the next tick is due, if one is scheduled.
    pub fn next_deadline(&self) -> Option<TokioInstant> {
        self.next_tick.filter(|_| !self.paused)
    }
}

fn random_jitter(max: Duration) -> Duration {
    let max_us = max.as_micros() as u64;
    if max_us == 0 {
        return Duration::ZERO;
    }
    Duration::from_micros(rand::rng().random_range(0..=max_us))
}
