//! # Relay from the hub to the observer set.
//!
//! The bus owns an [`ObserverRelay`]. Its task forwards every hub observation
//! to the [`ObserverSet`] until the relay is stopped, then drains the set.
//!
//! ## Rules
//! - Observations already published when the stop arrives are still forwarded.
//! - Dropping the relay stops it; [`ObserverRelay::close`] also waits until
//!   every observer has seen its backlog.

use parking_lot::Mutex;
use tokio::sync::broadcast::{error::RecvError, Receiver};
use tokio::{select, task::JoinHandle};
use tokio_util::sync::CancellationToken;

use super::{Observation, ObserverHub, ObserverSet};

pub(crate) struct ObserverRelay {
    stop: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ObserverRelay {
    /// Starts forwarding `hub` to `set`. Must be called inside a tokio runtime.
    pub(crate) fn start(hub: &ObserverHub, set: ObserverSet) -> Self {
        let stop = CancellationToken::new();
        let task = tokio::spawn(forward(hub.subscribe(), set, stop.clone()));
        Self {
            stop,
            task: Mutex::new(Some(task)),
        }
    }

    /// Stops forwarding and waits for the observers to catch up.
    ///
    /// Later calls return immediately.
    pub(crate) async fn close(&self) {
        self.stop.cancel();
        let task = self.task.lock().take();
        if let Some(task) = task {
            let _ = task.await;
        }
    }
}

impl Drop for ObserverRelay {
    fn drop(&mut self) {
        self.stop.cancel();
    }
}

async fn forward(mut rx: Receiver<Observation>, set: ObserverSet, stop: CancellationToken) {
    loop {
        select! {
            biased;
            got = rx.recv() => match got {
                Ok(ob) => set.fan_out(ob),
                Err(RecvError::Lagged(skipped)) => {
                    set.fan_out(Observation::observer_overflow("relay", "lagged").with_count(skipped));
                }
                Err(RecvError::Closed) => break,
            },
            _ = stop.cancelled() => break,
        }
    }
    set.drain().await;
}
