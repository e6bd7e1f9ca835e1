//! # Global bus configuration.
//!
//! Provides [`Config`] centralized settings for the message bus, its observers
//! and the built-in [`Clock`](crate::Clock).
//!
//! Config is used in two ways:
//! 1. **Bus creation**: `MessageBus::new(config)` / `MessageBus::builder(config)`
//! 2. **Clock defaults**: `Clock::from_config(&config)`
//!
//! ## Sentinel values
//! - `observer_capacity = 0` → clamped to 1
//! - `duration = 0` → the clock sends no ticks, only the terminal broadcast

use std::time::Duration;

/// Global configuration for the message bus runtime.
///
/// ## Field semantics
/// - `observer_capacity`: observation channel ring buffer size (min 1)
/// - `tick`: period between two clock ticks
/// - `duration`: number of ticks the clock sends before terminating
#[derive(Clone, Debug)]
pub struct Config {
    /// Capacity of the observation broadcast channel ring buffer.
    ///
    /// Observers that lag behind by more than `observer_capacity` observations
    /// skip the oldest ones. Minimum value is 1.
    pub observer_capacity: usize,

    /// Clock period (the "speed" of a run).
    pub tick: Duration,

    /// Number of ticks in a run (the "duration" of a run).
    pub duration: u64,
}

impl Config {
    /// Returns an observer capacity clamped to a minimum of 1.
    #[inline]
    pub fn observer_capacity_clamped(&self) -> usize {
        self.observer_capacity.max(1)
    }

    /// Returns the total wall-clock length of a run: `tick * (duration + 1)`.
    ///
    /// The extra period accounts for the terminal broadcast.
    #[inline]
    pub fn run_length(&self) -> Duration {
        let periods = u32::try_from(self.duration.saturating_add(1)).unwrap_or(u32::MAX);
        self.tick.saturating_mul(periods)
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `observer_capacity = 1024`
    /// - `tick = 10ms`
    /// - `duration = 0`
    fn default() -> Self {
        Self {
            observer_capacity: 1024,
            tick: Duration::from_millis(10),
            duration: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_is_clamped() {
        let cfg = Config {
            observer_capacity: 0,
            ..Config::default()
        };
        assert_eq!(cfg.observer_capacity_clamped(), 1);
    }

    #[test]
    fn run_length_counts_terminal_period() {
        let cfg = Config {
            tick: Duration::from_millis(100),
            duration: 4,
            ..Config::default()
        };
        assert_eq!(cfg.run_length(), Duration::from_millis(500));
    }
}
