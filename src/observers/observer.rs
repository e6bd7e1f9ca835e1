//! # Observer trait.
//!
//! Provides [`Observe`] an extension point for plugging custom observation handlers into the bus.
//!
//! Each observer gets:
//! - **Dedicated worker task** (runs independently)
//! - **Per-observer bounded queue** (capacity via [`Observe::queue_capacity`])
//! - **Panic isolation** (panics are reported as `ObservationKind::ObserverPanicked`)
//!
//! ## Example
//! ```rust
//! use async_trait::async_trait;
//! use microbus::{Observation, ObservationKind, Observe};
//!
//! struct Faults;
//!
//! #[async_trait]
//! impl Observe for Faults {
//!     async fn on_observation(&self, ob: &Observation) {
//!         if matches!(ob.kind, ObservationKind::HandlerFailed | ObservationKind::HandlerPanicked) {
//!             // page someone, bump a counter, etc.
//!         }
//!     }
//!
//!     fn name(&self) -> &'static str { "faults" }
//! }
//! ```

use async_trait::async_trait;

use super::observation::Observation;

/// Observation handler.
///
/// ### Implementation requirements
/// - Use async I/O; avoid blocking the executor.
/// - Handle errors internally; do not panic.
/// - Slow processing affects only this observer's queue.
#[async_trait]
pub trait Observe: Send + Sync + 'static {
    /// Processes a single observation, in FIFO order, from a dedicated worker task.
    async fn on_observation(&self, ob: &Observation);

    /// Returns the observer name used in overflow/panic records.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Returns the preferred queue capacity for this observer (clamped to 1).
    ///
    /// Default: 1024.
    fn queue_capacity(&self) -> usize {
        1024
    }
}
