use std::sync::Arc;

use super::message_bus::MessageBus;
use crate::config::Config;
use crate::observers::{Observe, ObserverHub, ObserverRelay, ObserverSet};

/// Builder for a shared [`MessageBus`] with observers attached.
pub struct MessageBusBuilder {
    cfg: Config,
    observers: Vec<Arc<dyn Observe>>,
}

impl MessageBusBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            observers: Vec::new(),
        }
    }

    /// Sets observers.
    ///
    /// Observers receive bus observations (membership, traffic, faults)
    /// through dedicated workers with bounded queues.
    pub fn with_observers(mut self, observers: Vec<Arc<dyn Observe>>) -> Self {
        self.observers = observers;
        self
    }

    /// Adds one observer.
    pub fn with_observer(mut self, observer: Arc<dyn Observe>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Builds the bus.
    ///
    /// With at least one observer this spawns the observer workers and the
    /// relay feeding them, so it must be called inside a tokio runtime. They
    /// stop when the bus is dropped or [`MessageBus::close_observers`] is awaited.
    pub fn build(self) -> Arc<MessageBus> {
        let hub = ObserverHub::new(self.cfg.observer_capacity_clamped());
        let relay = (!self.observers.is_empty())
            .then(|| ObserverRelay::start(&hub, ObserverSet::spawn(self.observers, &hub)));
        Arc::new(MessageBus::with_parts(self.cfg, hub, relay))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::ActorId;
    use crate::observers::{Observation, ObservationKind};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct Sink {
        seen: Mutex<Vec<ObservationKind>>,
    }

    #[async_trait]
    impl Observe for Sink {
        async fn on_observation(&self, ob: &Observation) {
            self.seen.lock().push(ob.kind);
        }

        fn name(&self) -> &'static str {
            "sink"
        }
    }

    #[tokio::test]
    async fn close_observers_delivers_everything_published() {
        let sink = Arc::new(Sink::default());
        let bus = MessageBus::builder(Config::default())
            .with_observer(sink.clone())
            .build();

        let a = ActorId::new("a");
        bus.register(&a).expect("register");
        bus.unregister(&a);
        bus.close_observers().await;

        assert_eq!(
            *sink.seen.lock(),
            vec![
                ObservationKind::ActorRegistered,
                ObservationKind::ActorUnregistered
            ]
        );
        assert_eq!(Arc::strong_count(&sink), 1);

        // Closed: later traffic no longer reaches the observer.
        bus.register(&a).expect("register again");
        bus.close_observers().await;
        assert_eq!(sink.seen.lock().len(), 2);
    }

    #[tokio::test]
    async fn dropping_the_bus_releases_its_observers() {
        let sink = Arc::new(Sink::default());
        let bus = MessageBus::builder(Config::default())
            .with_observer(sink.clone())
            .build();
        bus.register(&ActorId::new("a")).expect("register");
        drop(bus);

        for _ in 0..100 {
            if Arc::strong_count(&sink) == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(Arc::strong_count(&sink), 1);
        assert_eq!(*sink.seen.lock(), vec![ObservationKind::ActorRegistered]);
    }
}
