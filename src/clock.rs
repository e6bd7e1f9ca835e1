//! # Clock: periodic tick broadcasts.
//!
//! One task that drives simulated time: it broadcasts [`Tick`] `1..=duration`
//! at a fixed period, then a single [`Terminate`] one period after the last
//! tick. Actors that stop on `Terminate` wind down together.
//!
//! ```text
//! t = 0        period       2·period          duration·period
//!   Tick{1} ──► Tick{2} ──► Tick{3} ... ──► Tick{duration} ──► (+period) Terminate
//! ```
//!
//! ## Rules
//! - The first tick is sent immediately.
//! - Missed periods are caught up (fixed-rate, not fixed-delay).
//! - Cancelling the token stops ticking; `Terminate` is still sent, without waiting.

use std::sync::Arc;
use std::time::Duration;

use tokio::{select, task::JoinHandle, time};
use tokio_util::sync::CancellationToken;

use crate::bus::MessageBus;
use crate::config::Config;
use crate::messages::Broadcast;
use crate::observers::{Observation, ObservationKind};

/// Smallest accepted tick period.
const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Broadcast of the current tick number (starting at 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    pub tick: u64,
}

impl Broadcast for Tick {}

/// Broadcast sent once when the clock stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Terminate;

impl Broadcast for Terminate {}

/// Fixed-rate tick source.
#[derive(Debug, Clone, Copy)]
pub struct Clock {
    period: Duration,
    duration: u64,
}

impl Clock {
    /// Creates a clock sending `duration` ticks, one every `period`.
    ///
    /// `period` is raised to 1 ms if smaller.
    pub fn new(period: Duration, duration: u64) -> Self {
        Self {
            period: period.max(MIN_PERIOD),
            duration,
        }
    }

    /// Clock with `Config::tick` period and `Config::duration` ticks.
    pub fn from_config(cfg: &Config) -> Self {
        Self::new(cfg.tick, cfg.duration)
    }

    #[inline]
    pub fn period(&self) -> Duration {
        self.period
    }

    #[inline]
    pub fn duration(&self) -> u64 {
        self.duration
    }

    /// Runs the clock on its own task. The task yields the number of ticks sent.
    pub fn spawn(self, bus: Arc<MessageBus>, token: CancellationToken) -> JoinHandle<u64> {
        tokio::spawn(async move { self.run(&bus, &token).await })
    }

    /// Runs the clock on the current task until `Terminate` is sent.
    ///
    /// Returns the number of ticks sent.
    pub async fn run(self, bus: &MessageBus, token: &CancellationToken) -> u64 {
        let mut interval = time::interval(self.period);
        let mut sent = 0;

        while sent < self.duration {
            select! {
                biased;
                _ = token.cancelled() => break,
                _ = interval.tick() => {
                    sent += 1;
                    let recipients = bus.send_broadcast(Tick { tick: sent });
                    bus.observe(
                        Observation::new(ObservationKind::ClockTick)
                            .with_count(sent)
                            .with_reason(format!("recipients={recipients}")),
                    );
                }
            }
        }

        if sent == self.duration {
            select! {
                biased;
                _ = token.cancelled() => {}
                _ = interval.tick() => {}
            }
        }
        bus.send_broadcast(Terminate);
        sent
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}
