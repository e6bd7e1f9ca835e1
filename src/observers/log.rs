//! # LogWriter: observation logger
//!
//! A built-in observer that renders incoming [`Observation`]s through `tracing`.
//! Traffic is logged at `debug`, membership and lifecycle at `info`, faults at `warn`/`error`.
//!
//! ## Example output (with a `fmt` subscriber)
//! ```text
//! INFO  microbus: registered actor="selling#3"
//! DEBUG microbus: dispatched actor="selling#3" message="BookOrder" event_id=12
//! WARN  microbus: handler failed actor="selling#3" message="BookOrder" reason="out of stock"
//! INFO  microbus: service terminated actor="selling#3" reason="terminated"
//! ```

use async_trait::async_trait;

use super::{Observation, ObservationKind, Observe};

const TARGET: &str = "microbus";

/// Observation writer backed by `tracing`.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Observe for LogWriter {
    async fn on_observation(&self, e: &Observation) {
        let actor = e.actor.as_deref().unwrap_or("-");
        let message = e.message.unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("-");

        match e.kind {
            ObservationKind::ActorRegistered => {
                tracing::info!(target: TARGET, actor, "registered");
            }
            ObservationKind::ActorUnregistered => {
                tracing::info!(target: TARGET, actor, orphaned = e.count, "unregistered");
            }
            ObservationKind::EventSubscribed => {
                tracing::debug!(target: TARGET, actor, message, "subscribed to event");
            }
            ObservationKind::BroadcastSubscribed => {
                tracing::debug!(target: TARGET, actor, message, "subscribed to broadcast");
            }
            ObservationKind::EventDispatched => {
                let event_id = e.event_id;
                tracing::debug!(target: TARGET, actor, message, event_id, "dispatched");
            }
            ObservationKind::EventUndeliverable => {
                tracing::debug!(target: TARGET, message, "no subscriber for event");
            }
            ObservationKind::BroadcastSent => {
                tracing::debug!(target: TARGET, message, recipients = e.count, "broadcast");
            }
            ObservationKind::EventCompleted => {
                tracing::debug!(target: TARGET, message, event_id = e.event_id, "completed");
            }
            ObservationKind::PromiseOrphaned => {
                tracing::info!(target: TARGET, event_id = e.event_id, reason, "promise orphaned");
            }
            ObservationKind::ServiceStarting => {
                tracing::info!(target: TARGET, actor, "service starting");
            }
            ObservationKind::ServiceRunning => {
                tracing::info!(target: TARGET, actor, "service running");
            }
            ObservationKind::ServiceTerminated => {
                tracing::info!(target: TARGET, actor, reason, "service terminated");
            }
            ObservationKind::HandlerFailed => {
                tracing::warn!(target: TARGET, actor, message, reason, "handler failed");
            }
            ObservationKind::HandlerPanicked => {
                tracing::error!(target: TARGET, actor, message, reason, "handler panicked");
            }
            ObservationKind::ClockTick => {
                tracing::trace!(target: TARGET, tick = e.count, "tick");
            }
            ObservationKind::ObserverOverflow => {
                tracing::warn!(target: TARGET, observer = actor, reason, "observer overflow");
            }
            ObservationKind::ObserverPanicked => {
                tracing::error!(target: TARGET, observer = actor, reason, "observer panicked");
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
