//! # Per-observer queues and their workers.
//!
//! [`ObserverSet`] owns one bounded queue and one worker task per observer.
//! The relay feeds it from the hub while the bus is alive; when the bus goes
//! away the relay calls [`ObserverSet::drain`] and every worker finishes its
//! backlog before exiting.
//!
//! ```text
//! fan_out(ob) ──► queue "log"   ──► deliver ──► LogWriter::on_observation
//!             ──► queue "stats" ──► deliver ──► Stats::on_observation
//!                    │ full/closed             │ panic
//!                    ▼                         ▼
//!             ObserverOverflow          ObserverPanicked   (published on the hub)
//! ```
//!
//! ## Rules
//! - `fan_out` never waits: a full queue loses that observation for that
//!   observer only.
//! - Each observer sees observations in publish order.
//! - A panicking observer keeps its worker; the next observation is still delivered.
//! - Overflow records are never reported as overflowing themselves.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;

use super::{Observation, ObservationKind, Observe, ObserverHub};

struct ObserverQueue {
    observer: &'static str,
    tx: mpsc::Sender<Arc<Observation>>,
    worker: JoinHandle<()>,
}

/// Bounded queues feeding a fixed group of observers.
pub struct ObserverSet {
    queues: Vec<ObserverQueue>,
    hub: ObserverHub,
}

impl ObserverSet {
    /// Spawns one worker per observer. Faults are reported on `hub`.
    ///
    /// Must be called inside a tokio runtime.
    #[must_use]
    pub fn spawn(observers: Vec<Arc<dyn Observe>>, hub: &ObserverHub) -> Self {
        let queues = observers
            .into_iter()
            .map(|observer| {
                let (tx, rx) = mpsc::channel(observer.queue_capacity().max(1));
                ObserverQueue {
                    observer: observer.name(),
                    tx,
                    worker: tokio::spawn(deliver(observer, rx, hub.clone())),
                }
            })
            .collect();
        Self {
            queues,
            hub: hub.clone(),
        }
    }

    /// Number of observers.
    pub fn len(&self) -> usize {
        self.queues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queues.is_empty()
    }

    /// Queues `ob` for every observer.
    pub fn fan_out(&self, ob: Observation) {
        let reportable = ob.kind != ObservationKind::ObserverOverflow;
        let ob = Arc::new(ob);

        for queue in &self.queues {
            let why = match queue.tx.try_send(Arc::clone(&ob)) {
                Ok(()) => continue,
                Err(TrySendError::Full(_)) => "full",
                Err(TrySendError::Closed(_)) => "closed",
            };
            if reportable {
                self.hub
                    .publish(Observation::observer_overflow(queue.observer, why));
            }
        }
    }

    /// Closes every queue and waits until each worker has delivered its backlog.
    pub async fn drain(self) {
        for ObserverQueue { tx, worker, .. } in self.queues {
            drop(tx);
            let _ = worker.await;
        }
    }
}

async fn deliver(
    observer: Arc<dyn Observe>,
    mut rx: mpsc::Receiver<Arc<Observation>>,
    hub: ObserverHub,
) {
    while let Some(ob) = rx.recv().await {
        let call = AssertUnwindSafe(observer.on_observation(&ob)).catch_unwind();
        if let Err(panic) = call.await {
            hub.publish(Observation::observer_panicked(
                observer.name(),
                panic_message(&*panic),
            ));
        }
    }
}

/// Renders a panic payload.
pub(crate) fn panic_message(any: &(dyn Any + Send)) -> String {
    if let Some(msg) = any.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = any.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
