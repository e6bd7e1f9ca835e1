//! # Observation hub.
//!
//! Every part of the crate reports what it does by publishing an [`Observation`]
//! on the bus's [`ObserverHub`]. The hub is a `tokio::sync::broadcast` channel:
//!
//! ```text
//! MessageBus, run loops, Clock, observer workers
//!          │ publish (never blocks)
//!          ▼
//!     ObserverHub ──► relay ──► ObserverSet      (builder-attached observers)
//!                 ──► any bus.hub().subscribe()   (tests, ad-hoc tooling)
//! ```
//!
//! Nothing is buffered for receivers that subscribe later, and a receiver that
//! falls more than `capacity` records behind skips the oldest ones.

use tokio::sync::broadcast;

use super::observation::Observation;

/// Publishing side of the observation channel. Clones share the channel.
#[derive(Clone, Debug)]
pub struct ObserverHub {
    tx: broadcast::Sender<Observation>,
}

impl ObserverHub {
    /// Creates a hub retaining up to `capacity` records per receiver (at least 1).
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publishes `ob`. Returns the number of receivers it reached (0 if none).
    pub fn publish(&self, ob: Observation) -> usize {
        self.tx.send(ob).unwrap_or(0)
    }

    /// Receiver of every observation published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Observation> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observers::ObservationKind;

    #[tokio::test]
    async fn receivers_only_see_later_observations() {
        let hub = ObserverHub::new(0);
        assert_eq!(hub.publish(Observation::new(ObservationKind::ClockTick)), 0);

        let mut rx = hub.subscribe();
        assert_eq!(hub.publish(Observation::new(ObservationKind::ServiceRunning)), 1);

        let got = rx.recv().await.expect("observation");
        assert_eq!(got.kind, ObservationKind::ServiceRunning);
    }
}
