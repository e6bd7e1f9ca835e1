//! # MessageBus: the broker.
//!
//! Owns per-actor mailboxes, per-type subscriber collections and the table of
//! in-flight event promises.
//!
//! ## Architecture
//! ```text
//!                    ┌──────────────────────── tables (one lock) ───────────────────────┐
//! send_event(E) ───► │ events[TypeId(E)]: RoundRobin ─rotate()─► actor ──► mailbox.push │
//!        │           │ broadcasts[TypeId(B)]: {actors} ──each──► mailbox.push           │
//!        │           │ mailboxes: ActorId ──► Mailbox (FIFO)                            │
//!        │           └──────────────────────────────────────────────────────────────────┘
//!        ▼
//!   pending: EventId ──► Promise        requester ──► {EventId}
//!        ▲
//! complete(req, v) ─────┘  resolves, wakes Promise::get
//! ```
//!
//! ## Rules
//! - Every operation except [`MessageBus::await_message`] is synchronous and only
//!   takes short locks.
//! - Lock order is always `tables → pending → mailbox`.
//! - A message reaches a mailbox only between `register` and the end of `unregister`.
//! - An event with no subscriber is dropped and `send_event` returns `None`; no promise is created.
//! - `unregister` resolves to absent every promise the actor was still awaiting and
//!   every promise of an event it received (or had queued) but never completed.

use std::any::TypeId;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use super::builder::MessageBusBuilder;
use super::mailbox::Mailbox;
use super::pending::{Completion, PendingTable};
use super::ring::RoundRobin;
use crate::actor::ActorId;
use crate::config::Config;
use crate::error::BusError;
use crate::messages::{Broadcast, Event, EventId, Message, Request};
use crate::observers::{Observation, ObservationKind, ObserverHub, ObserverRelay};
use crate::promise::Promise;

#[derive(Default)]
struct Tables {
    mailboxes: HashMap<ActorId, Arc<Mailbox>>,
    events: HashMap<TypeId, RoundRobin>,
    broadcasts: HashMap<TypeId, HashSet<ActorId>>,
}

impl Tables {
    /// Creates a mailbox for `actor` if it has none. Returns `true` if one was created.
    fn ensure_mailbox(&mut self, actor: &ActorId) -> bool {
        if self.mailboxes.contains_key(actor) {
            return false;
        }
        self.mailboxes
            .insert(actor.clone(), Arc::new(Mailbox::new(actor.clone())));
        true
    }
}

/// In-process broker shared by all actors.
///
/// Usually held as `Arc<MessageBus>`.
///
/// # Example
/// ```
/// use microbus::{ActorId, Config, Event, MessageBus};
/// use tokio_util::sync::CancellationToken;
///
/// struct Ping;
/// impl Event for Ping { type Reply = &'static str; }
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), microbus::BusError> {
/// let bus = MessageBus::new(Config::default());
/// let pong = ActorId::new("pong");
/// bus.subscribe_event::<Ping>(&pong);
///
/// let promise = bus.send_event(Ping).expect("one subscriber");
/// let msg = bus.await_message(&pong, &CancellationToken::new()).await?;
/// let req = msg.into_request::<Ping>().expect("a ping");
/// bus.complete(&req, "pong")?;
///
/// assert_eq!(promise.get().await, Some("pong"));
/// # Ok(())
/// # }
/// ```
pub struct MessageBus {
    cfg: Config,
    tables: Mutex<Tables>,
    pending: Mutex<PendingTable>,
    next_event: AtomicU64,
    hub: ObserverHub,
    relay: Option<ObserverRelay>,
}

impl MessageBus {
    /// Creates a bus without observers.
    ///
    /// Observations are still published on [`MessageBus::hub`].
    pub fn new(cfg: Config) -> Self {
        let hub = ObserverHub::new(cfg.observer_capacity_clamped());
        Self::with_parts(cfg, hub, None)
    }

    /// Returns a builder for a shared bus with observers attached.
    pub fn builder(cfg: Config) -> MessageBusBuilder {
        MessageBusBuilder::new(cfg)
    }

    pub(crate) fn with_parts(
        cfg: Config,
        hub: ObserverHub,
        relay: Option<ObserverRelay>,
    ) -> Self {
        Self {
            cfg,
            tables: Mutex::new(Tables::default()),
            pending: Mutex::new(PendingTable::default()),
            next_event: AtomicU64::new(1),
            hub,
            relay,
        }
    }

    /// Bus configuration.
    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// Observation channel (subscribe for raw observations).
    pub fn hub(&self) -> &ObserverHub {
        &self.hub
    }

    /// Stops feeding the builder-attached observers and waits until each has
    /// handled everything published so far.
    ///
    /// Observations published afterwards only reach [`hub`](Self::hub)
    /// receivers. Dropping the bus stops the observers the same way, without
    /// waiting.
    pub async fn close_observers(&self) {
        if let Some(relay) = &self.relay {
            relay.close().await;
        }
    }

    // ---------------------------
    // Membership
    // ---------------------------

    /// Creates an empty mailbox for `actor`.
    ///
    /// Fails with [`BusError::AlreadyRegistered`] if it already has one.
    pub fn register(&self, actor: &ActorId) -> Result<(), BusError> {
        let created = self.tables.lock().ensure_mailbox(actor);
        if !created {
            return Err(BusError::AlreadyRegistered {
                actor: actor.to_string(),
            });
        }
        self.observe(
            Observation::new(ObservationKind::ActorRegistered).with_actor(actor.to_string()),
        );
        Ok(())
    }

    /// Adds `actor` to the round-robin ring of event type `E`, registering it first if needed.
    ///
    /// Subscribing twice is a no-op. The actor is dispatch-eligible when this returns.
    pub fn subscribe_event<E: Event>(&self, actor: &ActorId) {
        let (created, added) = {
            let mut tables = self.tables.lock();
            let created = tables.ensure_mailbox(actor);
            let added = tables
                .events
                .entry(TypeId::of::<E>())
                .or_default()
                .insert(actor.clone());
            (created, added)
        };
        self.observe_subscription(
            actor,
            created,
            added,
            ObservationKind::EventSubscribed,
            std::any::type_name::<E>(),
        );
    }

    /// Adds `actor` to the subscriber set of broadcast type `B`, registering it first if needed.
    pub fn subscribe_broadcast<B: Broadcast>(&self, actor: &ActorId) {
        let (created, added) = {
            let mut tables = self.tables.lock();
            let created = tables.ensure_mailbox(actor);
            let added = tables
                .broadcasts
                .entry(TypeId::of::<B>())
                .or_default()
                .insert(actor.clone());
            (created, added)
        };
        self.observe_subscription(
            actor,
            created,
            added,
            ObservationKind::BroadcastSubscribed,
            std::any::type_name::<B>(),
        );
    }

    /// Removes `actor` from every ring and set, then drops its mailbox.
    ///
    /// Promises the actor was awaiting, and promises of events dispatched to it
    /// and not completed, are resolved to absent. Returns `false` if the actor
    /// was not registered.
    pub fn unregister(&self, actor: &ActorId) -> bool {
        let (orphaned, undelivered) = {
            let mut tables = self.tables.lock();
            let Some(mailbox) = tables.mailboxes.remove(actor) else {
                return false;
            };
            for ring in tables.events.values_mut() {
                ring.remove(actor);
            }
            for set in tables.broadcasts.values_mut() {
                set.remove(actor);
            }
            tables.events.retain(|_, ring| !ring.is_empty());
            tables.broadcasts.retain(|_, set| !set.is_empty());

            let undelivered = mailbox.close();
            let mut pending = self.pending.lock();
            let mut orphaned: Vec<(EventId, &'static str)> = pending
                .orphan_requester(actor)
                .into_iter()
                .map(|id| (id, "requester_unregistered"))
                .collect();
            orphaned.extend(
                pending
                    .abandon_handler(actor)
                    .into_iter()
                    .map(|id| (id, "handler_unregistered")),
            );
            (orphaned, undelivered)
        };
        // Payload destructors may call back into the bus.
        drop(undelivered);

        for (id, reason) in &orphaned {
            self.observe(
                Observation::new(ObservationKind::PromiseOrphaned)
                    .with_event_id(id.get())
                    .with_reason(*reason),
            );
        }
        self.observe(
            Observation::new(ObservationKind::ActorUnregistered)
                .with_actor(actor.to_string())
                .with_count(orphaned.len() as u64),
        );
        true
    }

    // ---------------------------
    // Traffic
    // ---------------------------

    /// Sends an event on behalf of a producer that is not an actor.
    ///
    /// Returns `None` if no actor is subscribed to `E` ("undeliverable", not an error).
    pub fn send_event<E: Event>(&self, event: E) -> Option<Promise<E::Reply>> {
        self.dispatch_event(None, event)
    }

    /// Sends an event on behalf of `requester`.
    ///
    /// If `requester` is registered, the promise is indexed under it and is
    /// resolved to absent when `requester` unregisters before the answer
    /// arrives. An unregistered requester is treated like [`send_event`](Self::send_event).
    pub fn send_event_as<E: Event>(
        &self,
        requester: &ActorId,
        event: E,
    ) -> Option<Promise<E::Reply>> {
        self.dispatch_event(Some(requester.clone()), event)
    }

    fn dispatch_event<E: Event>(
        &self,
        requester: Option<ActorId>,
        event: E,
    ) -> Option<Promise<E::Reply>> {
        let type_name = std::any::type_name::<E>();
        let Some((handler, id, promise)) = self.route_event(requester, event) else {
            self.observe(
                Observation::new(ObservationKind::EventUndeliverable).with_message(type_name),
            );
            return None;
        };
        self.observe(
            Observation::new(ObservationKind::EventDispatched)
                .with_actor(handler.to_string())
                .with_message(type_name)
                .with_event_id(id.get()),
        );
        Some(promise)
    }

    fn route_event<E: Event>(
        &self,
        requester: Option<ActorId>,
        event: E,
    ) -> Option<(ActorId, EventId, Promise<E::Reply>)> {
        let mut tables = self.tables.lock();
        let handler = tables.events.get_mut(&TypeId::of::<E>())?.rotate()?;
        // Ring members always own a mailbox: both are removed under this lock.
        let mailbox = Arc::clone(tables.mailboxes.get(&handler)?);

        // Only a registered requester can later unregister and orphan the entry.
        let requester = requester.filter(|r| tables.mailboxes.contains_key(r));
        let id = EventId(self.next_event.fetch_add(1, AtomicOrdering::Relaxed));
        let promise = Promise::new();
        self.pending
            .lock()
            .insert(id, requester, handler.clone(), Box::new(promise.clone()));
        mailbox.push(Message::event(id, Arc::new(event)));
        Some((handler, id, promise))
    }

    /// Delivers `broadcast` to every actor currently subscribed to `B`.
    ///
    /// All recipients share one allocation. Returns the number of recipients.
    pub fn send_broadcast<B: Broadcast>(&self, broadcast: B) -> usize {
        let msg = Message::broadcast(Arc::new(broadcast));
        let recipients = {
            let tables = self.tables.lock();
            match tables.broadcasts.get(&TypeId::of::<B>()) {
                Some(set) => {
                    let mut n = 0;
                    for actor in set {
                        if let Some(mailbox) = tables.mailboxes.get(actor) {
                            mailbox.push(msg.clone());
                            n += 1;
                        }
                    }
                    n
                }
                None => 0,
            }
        };
        self.observe(
            Observation::new(ObservationKind::BroadcastSent)
                .with_message(msg.type_name())
                .with_count(recipients as u64),
        );
        recipients
    }

    /// Resolves the promise of `request` with `result`.
    ///
    /// Fails with [`BusError::UnknownEvent`] if the bus does not track the event
    /// (never sent through this bus, or already completed).
    pub fn complete<E: Event>(
        &self,
        request: &Request<E>,
        result: E::Reply,
    ) -> Result<(), BusError> {
        let completion = self.pending.lock().complete(request.id(), Box::new(result))?;
        let ob = Observation::new(ObservationKind::EventCompleted)
            .with_message(std::any::type_name::<E>())
            .with_event_id(request.id().get());
        let ob = match completion {
            Completion::Resolved => ob,
            Completion::Orphaned => ob.with_reason("requester_gone"),
        };
        self.observe(ob);
        Ok(())
    }

    /// Resolves `id` to absent if it is still pending.
    pub(crate) fn abandon(&self, id: EventId, reason: &'static str) -> bool {
        let abandoned = self.pending.lock().abandon(id);
        if abandoned {
            self.observe(
                Observation::new(ObservationKind::PromiseOrphaned)
                    .with_event_id(id.get())
                    .with_reason(reason),
            );
        }
        abandoned
    }

    /// Waits for the head of `actor`'s mailbox.
    ///
    /// Fails with [`BusError::NotRegistered`] if the actor has no mailbox (or loses
    /// it while waiting) and with [`BusError::Interrupted`] once `cancel` fires.
    /// An interrupted wait never consumes a message.
    pub async fn await_message(
        &self,
        actor: &ActorId,
        cancel: &CancellationToken,
    ) -> Result<Message, BusError> {
        let mailbox = self
            .tables
            .lock()
            .mailboxes
            .get(actor)
            .cloned()
            .ok_or_else(|| BusError::NotRegistered {
                actor: actor.to_string(),
            })?;
        mailbox.recv(cancel).await
    }

    // ---------------------------
    // Introspection
    // ---------------------------

    /// Returns `true` if `actor` currently owns a mailbox.
    pub fn is_registered(&self, actor: &ActorId) -> bool {
        self.tables.lock().mailboxes.contains_key(actor)
    }

    /// Subscribers of event type `E`, in rotation order (next recipient first).
    pub fn event_subscribers<E: Event>(&self) -> Vec<ActorId> {
        self.tables
            .lock()
            .events
            .get(&TypeId::of::<E>())
            .map(RoundRobin::members)
            .unwrap_or_default()
    }

    /// Subscribers of broadcast type `B` (unordered).
    pub fn broadcast_subscribers<B: Broadcast>(&self) -> Vec<ActorId> {
        self.tables
            .lock()
            .broadcasts
            .get(&TypeId::of::<B>())
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of events whose promise is still tracked.
    pub fn pending_events(&self) -> usize {
        self.pending.lock().len()
    }

    /// Number of promises `requester` is still awaiting.
    pub fn awaiting(&self, requester: &ActorId) -> usize {
        self.pending.lock().awaiting(requester)
    }

    /// Number of events dispatched to `handler` and not completed yet.
    pub fn owed_by(&self, handler: &ActorId) -> usize {
        self.pending.lock().owed_by(handler)
    }

    /// Number of queued messages, or `None` if `actor` is not registered.
    pub fn mailbox_len(&self, actor: &ActorId) -> Option<usize> {
        self.tables.lock().mailboxes.get(actor).map(|m| m.len())
    }

    // ---------------------------
    // Helpers
    // ---------------------------

    pub(crate) fn observe(&self, ob: Observation) {
        self.hub.publish(ob);
    }

    fn observe_subscription(
        &self,
        actor: &ActorId,
        created: bool,
        added: bool,
        kind: ObservationKind,
        type_name: &'static str,
    ) {
        if created {
            self.observe(
                Observation::new(ObservationKind::ActorRegistered).with_actor(actor.to_string()),
            );
        }
        if added {
            self.observe(
                Observation::new(kind)
                    .with_actor(actor.to_string())
                    .with_message(type_name),
            );
        }
    }
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    struct Order(u32);
    impl Event for Order {
        type Reply = String;
    }

    struct Restock;
    impl Event for Restock {
        type Reply = ();
    }

    struct Tick(u32);
    impl Broadcast for Tick {}

    struct Closing;
    impl Broadcast for Closing {}

    fn token() -> CancellationToken {
        CancellationToken::new()
    }

    async fn next_order(bus: &MessageBus, actor: &ActorId) -> Request<Order> {
        bus.await_message(actor, &token())
            .await
            .expect("message")
            .into_request::<Order>()
            .expect("order")
    }

    #[tokio::test]
    async fn events_rotate_over_subscribers() {
        let bus = MessageBus::default();
        let actors: Vec<ActorId> = (0..3).map(|i| ActorId::new(format!("seller{i}"))).collect();
        for a in &actors {
            bus.subscribe_event::<Order>(a);
        }

        for i in 0..6 {
            assert!(bus.send_event(Order(i)).is_some());
        }

        for (slot, a) in actors.iter().enumerate() {
            assert_eq!(bus.mailbox_len(a), Some(2));
            let first = next_order(&bus, a).await;
            let second = next_order(&bus, a).await;
            assert_eq!(first.0, slot as u32);
            assert_eq!(second.0, slot as u32 + 3);
        }
        assert_eq!(bus.event_subscribers::<Order>(), actors);
    }

    #[tokio::test]
    async fn undeliverable_event_creates_no_promise() {
        let bus = MessageBus::default();
        let other = ActorId::new("restocker");
        bus.subscribe_event::<Restock>(&other);

        assert!(bus.send_event(Order(1)).is_none());
        assert_eq!(bus.pending_events(), 0);
        assert_eq!(bus.mailbox_len(&other), Some(0));
    }

    #[tokio::test]
    async fn broadcast_reaches_only_current_subscribers() {
        let bus = MessageBus::default();
        let a = ActorId::new("a");
        let b = ActorId::new("b");
        let c = ActorId::new("c");
        bus.subscribe_broadcast::<Tick>(&a);
        bus.subscribe_broadcast::<Tick>(&b);
        bus.subscribe_broadcast::<Closing>(&c);

        assert_eq!(bus.send_broadcast(Tick(1)), 2);
        assert_eq!(bus.mailbox_len(&a), Some(1));
        assert_eq!(bus.mailbox_len(&b), Some(1));
        assert_eq!(bus.mailbox_len(&c), Some(0));

        assert_eq!(bus.send_broadcast(Tick(2)), 2);
        for n in 1..=2 {
            let tick = bus
                .await_message(&a, &token())
                .await
                .expect("message")
                .into_broadcast::<Tick>()
                .expect("tick");
            assert_eq!(tick.0, n);
        }
    }

    #[tokio::test]
    async fn broadcast_without_subscribers_is_silent() {
        let bus = MessageBus::default();
        assert_eq!(bus.send_broadcast(Closing), 0);
    }

    #[tokio::test]
    async fn complete_resolves_once_then_is_misuse() {
        let bus = MessageBus::default();
        let seller = ActorId::new("seller");
        bus.subscribe_event::<Order>(&seller);

        let promise = bus.send_event(Order(7)).expect("promise");
        assert_eq!(bus.pending_events(), 1);
        assert_eq!(bus.owed_by(&seller), 1);

        let req = next_order(&bus, &seller).await;
        bus.complete(&req, "receipt-7".to_string()).expect("complete");
        assert_eq!(promise.get().await.as_deref(), Some("receipt-7"));
        assert_eq!(bus.pending_events(), 0);
        assert_eq!(bus.owed_by(&seller), 0);

        assert_eq!(
            bus.complete(&req, "again".to_string()),
            Err(BusError::UnknownEvent { event: req.id().get() })
        );
    }

    #[tokio::test]
    async fn membership_misuse_fails_loudly() {
        let bus = MessageBus::default();
        let a = ActorId::new("a");

        let err = bus.await_message(&a, &token()).await.expect_err("unregistered");
        assert!(matches!(err, BusError::NotRegistered { .. }));

        bus.register(&a).expect("first register");
        assert!(matches!(bus.register(&a), Err(BusError::AlreadyRegistered { .. })));

        // Subscribing a registered actor does not register it again.
        bus.subscribe_event::<Order>(&a);
        assert!(bus.is_registered(&a));
    }

    #[tokio::test]
    async fn duplicate_subscription_is_idempotent() {
        let bus = MessageBus::default();
        let a = ActorId::new("a");
        bus.subscribe_event::<Order>(&a);
        bus.subscribe_event::<Order>(&a);
        bus.subscribe_broadcast::<Tick>(&a);
        bus.subscribe_broadcast::<Tick>(&a);

        assert_eq!(bus.event_subscribers::<Order>().len(), 1);
        assert_eq!(bus.send_broadcast(Tick(1)), 1);
    }

    #[tokio::test]
    async fn interrupted_wait_keeps_message() {
        let bus = MessageBus::default();
        let a = ActorId::new("a");
        bus.subscribe_broadcast::<Tick>(&a);
        bus.send_broadcast(Tick(1));

        let cancelled = token();
        cancelled.cancel();
        assert_eq!(
            bus.await_message(&a, &cancelled).await.err(),
            Some(BusError::Interrupted)
        );
        assert_eq!(bus.mailbox_len(&a), Some(1));
    }

    #[tokio::test]
    async fn blocked_wait_is_interruptible() {
        let bus = Arc::new(MessageBus::default());
        let a = ActorId::new("a");
        bus.register(&a).expect("register");

        let cancel = token();
        let waiter = {
            let bus = Arc::clone(&bus);
            let a = a.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { bus.await_message(&a, &cancel).await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        cancel.cancel();
        let res = waiter.await.expect("join");
        assert_eq!(res.err(), Some(BusError::Interrupted));
    }

    #[tokio::test]
    async fn unregister_stops_delivery_and_resolves_orphans() {
        let bus = MessageBus::default();
        let api = ActorId::new("api");
        let seller = ActorId::new("seller");
        let backup = ActorId::new("backup");
        bus.subscribe_event::<Order>(&seller);
        bus.subscribe_broadcast::<Tick>(&seller);
        bus.subscribe_event::<Restock>(&backup);
        bus.register(&api).expect("register api");

        // api awaits a restock that backup never answers.
        let restock = bus.send_event_as(&api, Restock).expect("restock");
        // An order sits undelivered in seller's mailbox.
        let order = bus.send_event(Order(1)).expect("order");
        assert_eq!(bus.awaiting(&api), 1);

        assert!(bus.unregister(&api));
        assert_eq!(restock.try_get(), Some(None));
        assert_eq!(bus.awaiting(&api), 0);

        assert!(bus.unregister(&seller));
        assert_eq!(order.try_get(), Some(None));
        assert!(!bus.unregister(&seller));

        assert!(bus.send_event(Order(2)).is_none());
        assert_eq!(bus.send_broadcast(Tick(1)), 0);
        assert!(bus.mailbox_len(&seller).is_none());
        assert!(matches!(
            bus.await_message(&seller, &token()).await,
            Err(BusError::NotRegistered { .. })
        ));

        // backup still holds the orphaned restock; answering it is accepted.
        let req = bus
            .await_message(&backup, &token())
            .await
            .expect("message")
            .into_request::<Restock>()
            .expect("restock");
        assert_eq!(bus.complete(&req, ()), Ok(()));
        assert_eq!(restock.try_get(), Some(None));
        assert_eq!(bus.pending_events(), 0);
    }

    #[tokio::test]
    async fn unregistered_requester_is_not_indexed() {
        let bus = MessageBus::default();
        let seller = ActorId::new("seller");
        let ghost = ActorId::new("ghost");
        bus.subscribe_event::<Order>(&seller);

        let promise = bus.send_event_as(&ghost, Order(3)).expect("promise");
        assert_eq!(bus.awaiting(&ghost), 0);
        assert!(!bus.unregister(&ghost));

        let req = next_order(&bus, &seller).await;
        bus.complete(&req, "receipt-3".to_string()).expect("complete");
        assert_eq!(promise.get().await.as_deref(), Some("receipt-3"));
    }

    struct Parcel {
        bus: std::sync::Weak<MessageBus>,
        owner: ActorId,
        dropped_unlocked: Arc<std::sync::atomic::AtomicBool>,
    }
    impl Broadcast for Parcel {}

    impl Drop for Parcel {
        fn drop(&mut self) {
            if let Some(bus) = self.bus.upgrade() {
                // Deadlocks if the tables lock is still held.
                let registered = bus.is_registered(&self.owner);
                self.dropped_unlocked
                    .store(!registered, std::sync::atomic::Ordering::SeqCst);
            }
        }
    }

    #[tokio::test]
    async fn undelivered_payloads_drop_after_unregister_returns_its_locks() {
        let bus = Arc::new(MessageBus::default());
        let a = ActorId::new("a");
        bus.subscribe_broadcast::<Parcel>(&a);

        let dropped = Arc::new(std::sync::atomic::AtomicBool::new(false));
        bus.send_broadcast(Parcel {
            bus: Arc::downgrade(&bus),
            owner: a.clone(),
            dropped_unlocked: Arc::clone(&dropped),
        });
        assert_eq!(bus.mailbox_len(&a), Some(1));

        assert!(bus.unregister(&a));
        assert!(dropped.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[tokio::test]
    async fn unregister_wakes_blocked_owner() {
        let bus = Arc::new(MessageBus::default());
        let a = ActorId::new("a");
        bus.register(&a).expect("register");

        let waiter = {
            let bus = Arc::clone(&bus);
            let a = a.clone();
            tokio::spawn(async move { bus.await_message(&a, &CancellationToken::new()).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(bus.unregister(&a));

        let res = waiter.await.expect("join");
        assert!(matches!(res, Err(BusError::NotRegistered { .. })));
    }

    #[tokio::test]
    async fn operations_publish_observations() {
        let bus = MessageBus::default();
        let mut rx = bus.hub().subscribe();
        let a = ActorId::new("a");

        bus.subscribe_event::<Order>(&a);
        bus.send_event(Order(1));
        bus.send_event(Restock);

        let kinds: Vec<ObservationKind> = (0..4)
            .map(|_| rx.try_recv().expect("observation").kind)
            .collect();
        assert_eq!(
            kinds,
            vec![
                ObservationKind::ActorRegistered,
                ObservationKind::EventSubscribed,
                ObservationKind::EventDispatched,
                ObservationKind::EventUndeliverable,
            ]
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_subscribe_and_send_do_not_corrupt_ring() {
        let bus = Arc::new(MessageBus::default());
        let first = ActorId::new("first");
        bus.subscribe_event::<Order>(&first);

        let subscribers: Vec<ActorId> = (0..32).map(|i| ActorId::new(format!("s{i}"))).collect();
        let sub_task = {
            let bus = Arc::clone(&bus);
            let subscribers = subscribers.clone();
            tokio::spawn(async move {
                for a in &subscribers {
                    bus.subscribe_event::<Order>(a);
                    tokio::task::yield_now().await;
                }
            })
        };
        let mut senders = Vec::new();
        for t in 0..4u32 {
            let bus = Arc::clone(&bus);
            senders.push(tokio::spawn(async move {
                for i in 0..50u32 {
                    assert!(bus.send_event(Order(t * 100 + i)).is_some());
                    tokio::task::yield_now().await;
                }
            }));
        }
        sub_task.await.expect("subscriber task");
        for s in senders {
            s.await.expect("sender task");
        }

        let ring = bus.event_subscribers::<Order>();
        assert_eq!(ring.len(), 33);
        let unique: HashSet<ActorId> = ring.iter().cloned().collect();
        assert_eq!(unique.len(), 33);

        let delivered: usize = ring.iter().filter_map(|a| bus.mailbox_len(a)).sum();
        assert_eq!(delivered, 200);
        assert_eq!(bus.pending_events(), 200);
    }
}
