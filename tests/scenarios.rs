//! End-to-end scenarios with spawned actors.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use microbus::{
    spawn, spawn_with_token, ActorId, Broadcast, Clock, Config, Context, Event, ExitReason,
    HandleBroadcast, HandleEvent, HandlerError, MessageBus, MicroService, Request, Terminate, Tick,
};

type Journal = Arc<Mutex<Vec<(u32, String)>>>;

struct Job(u32);
impl Event for Job {
    type Reply = &'static str;
}

struct Worker {
    name: &'static str,
    journal: Journal,
}

#[async_trait]
impl MicroService for Worker {
    fn name(&self) -> &str {
        self.name
    }

    async fn initialize(&mut self, ctx: &mut Context<Self>) -> Result<(), HandlerError> {
        ctx.subscribe_event::<Job>();
        Ok(())
    }
}

#[async_trait]
impl HandleEvent<Job> for Worker {
    async fn on_event(
        &mut self,
        req: Request<Job>,
        ctx: &mut Context<Self>,
    ) -> Result<(), HandlerError> {
        self.journal.lock().push((req.0, self.name.to_string()));
        ctx.complete(&req, "ok")?;
        Ok(())
    }
}

#[tokio::test]
async fn events_alternate_between_two_actors() {
    let bus = Arc::new(MessageBus::new(Config::default()));
    let journal = Journal::default();

    let a1 = spawn(
        Worker {
            name: "a1",
            journal: Arc::clone(&journal),
        },
        Arc::clone(&bus),
    );
    assert!(a1.running().await);
    let a2 = spawn(
        Worker {
            name: "a2",
            journal: Arc::clone(&journal),
        },
        Arc::clone(&bus),
    );
    assert!(a2.running().await);

    let promises: Vec<_> = (1..=4)
        .map(|i| bus.send_event(Job(i)).expect("workers subscribed"))
        .collect();
    for p in &promises {
        assert_eq!(p.get().await, Some("ok"));
    }

    let mut seen = journal.lock().clone();
    seen.sort();
    let order: Vec<&str> = seen.iter().map(|(_, who)| who.as_str()).collect();
    assert_eq!(order, vec!["a1", "a2", "a1", "a2"]);

    a1.interrupt();
    a2.interrupt();
    assert_eq!(a1.join().await, ExitReason::Interrupted);
    assert_eq!(a2.join().await, ExitReason::Interrupted);
    assert_eq!(bus.pending_events(), 0);
}

struct Notice(&'static str);
impl Broadcast for Notice {}

#[tokio::test]
async fn broadcasts_arrive_in_send_order() {
    let bus = MessageBus::default();
    let reader = ActorId::new("reader");
    bus.subscribe_broadcast::<Notice>(&reader);

    for text in ["b1", "b2", "b3"] {
        assert_eq!(bus.send_broadcast(Notice(text)), 1);
    }

    let token = CancellationToken::new();
    let mut received = Vec::new();
    for _ in 0..3 {
        let msg = bus.await_message(&reader, &token).await.expect("registered");
        received.push(msg.into_broadcast::<Notice>().expect("notice").0);
    }
    assert_eq!(received, vec!["b1", "b2", "b3"]);
}

struct StoreClerk {
    ticks: Arc<Mutex<Vec<u64>>>,
}

#[async_trait]
impl MicroService for StoreClerk {
    fn name(&self) -> &str {
        "clerk"
    }

    async fn initialize(&mut self, ctx: &mut Context<Self>) -> Result<(), HandlerError> {
        ctx.subscribe_broadcast::<Tick>();
        ctx.subscribe_broadcast::<Terminate>();
        Ok(())
    }
}

#[async_trait]
impl HandleBroadcast<Tick> for StoreClerk {
    async fn on_broadcast(
        &mut self,
        tick: Arc<Tick>,
        _ctx: &mut Context<Self>,
    ) -> Result<(), HandlerError> {
        self.ticks.lock().push(tick.tick);
        Ok(())
    }
}

#[async_trait]
impl HandleBroadcast<Terminate> for StoreClerk {
    async fn on_broadcast(
        &mut self,
        _terminate: Arc<Terminate>,
        ctx: &mut Context<Self>,
    ) -> Result<(), HandlerError> {
        ctx.terminate();
        Ok(())
    }
}

#[tokio::test(start_paused = true)]
async fn clock_drives_every_actor_to_termination() {
    let cfg = Config {
        tick: Duration::from_millis(10),
        duration: 5,
        ..Config::default()
    };
    let bus = Arc::new(MessageBus::new(cfg.clone()));

    let mut clerks = Vec::new();
    let mut logs = Vec::new();
    for _ in 0..3 {
        let ticks = Arc::new(Mutex::new(Vec::new()));
        let handle = spawn(
            StoreClerk {
                ticks: Arc::clone(&ticks),
            },
            Arc::clone(&bus),
        );
        assert!(handle.running().await);
        clerks.push(handle);
        logs.push(ticks);
    }

    let sent = Clock::from_config(&cfg)
        .spawn(Arc::clone(&bus), CancellationToken::new())
        .await
        .expect("clock task");
    assert_eq!(sent, 5);

    for clerk in clerks {
        assert_eq!(clerk.join().await, ExitReason::Terminated);
    }
    for ticks in logs {
        assert_eq!(*ticks.lock(), vec![1, 2, 3, 4, 5]);
    }
    assert!(bus.broadcast_subscribers::<Tick>().is_empty());
}

// --- actor-to-actor requests ---

struct Reserve(u32);
impl Event for Reserve {
    type Reply = bool;
}

struct Buy(u32);
impl Event for Buy {
    type Reply = String;
}

struct Inventory {
    stock: u32,
}

#[async_trait]
impl MicroService for Inventory {
    fn name(&self) -> &str {
        "inventory"
    }

    async fn initialize(&mut self, ctx: &mut Context<Self>) -> Result<(), HandlerError> {
        ctx.subscribe_event::<Reserve>();
        Ok(())
    }
}

#[async_trait]
impl HandleEvent<Reserve> for Inventory {
    async fn on_event(
        &mut self,
        req: Request<Reserve>,
        ctx: &mut Context<Self>,
    ) -> Result<(), HandlerError> {
        let ok = self.stock >= req.0;
        if ok {
            self.stock -= req.0;
        }
        ctx.complete(&req, ok)?;
        Ok(())
    }
}

struct Seller;

#[async_trait]
impl MicroService for Seller {
    fn name(&self) -> &str {
        "seller"
    }

    async fn initialize(&mut self, ctx: &mut Context<Self>) -> Result<(), HandlerError> {
        ctx.subscribe_event::<Buy>();
        Ok(())
    }
}

#[async_trait]
impl HandleEvent<Buy> for Seller {
    async fn on_event(
        &mut self,
        req: Request<Buy>,
        ctx: &mut Context<Self>,
    ) -> Result<(), HandlerError> {
        let reserved = match ctx.send_event(Reserve(req.0)) {
            Some(p) => p.get_or_cancel(ctx.token()).await?.unwrap_or(false),
            None => false,
        };
        let receipt = if reserved {
            format!("sold {}", req.0)
        } else {
            "out of stock".to_string()
        };
        ctx.complete(&req, receipt)?;
        Ok(())
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn handlers_can_wait_on_other_actors() {
    let bus = Arc::new(MessageBus::default());
    let shutdown = CancellationToken::new();

    let inventory = spawn_with_token(Inventory { stock: 5 }, Arc::clone(&bus), &shutdown);
    let seller = spawn_with_token(Seller, Arc::clone(&bus), &shutdown);
    assert!(inventory.running().await);
    assert!(seller.running().await);

    let first = bus.send_event(Buy(3)).expect("seller subscribed");
    assert_eq!(first.get().await.as_deref(), Some("sold 3"));
    let second = bus.send_event(Buy(3)).expect("seller subscribed");
    assert_eq!(second.get().await.as_deref(), Some("out of stock"));

    shutdown.cancel();
    assert_eq!(inventory.join().await, ExitReason::Interrupted);
    assert_eq!(seller.join().await, ExitReason::Interrupted);
    assert_eq!(bus.pending_events(), 0);
}

// --- orphaned promises ---

/// Accepts jobs and never answers them.
struct Hoarder {
    held: Vec<Request<Job>>,
}

#[async_trait]
impl MicroService for Hoarder {
    fn name(&self) -> &str {
        "hoarder"
    }

    async fn initialize(&mut self, ctx: &mut Context<Self>) -> Result<(), HandlerError> {
        ctx.subscribe_event::<Job>();
        Ok(())
    }
}

#[async_trait]
impl HandleEvent<Job> for Hoarder {
    async fn on_event(
        &mut self,
        req: Request<Job>,
        _ctx: &mut Context<Self>,
    ) -> Result<(), HandlerError> {
        self.held.push(req);
        Ok(())
    }
}

#[tokio::test]
async fn leaving_actor_releases_waiting_requesters() {
    let bus = Arc::new(MessageBus::default());
    let hoarder = spawn(Hoarder { held: Vec::new() }, Arc::clone(&bus));
    assert!(hoarder.running().await);

    let promise = bus.send_event(Job(1)).expect("hoarder subscribed");
    let waiter = tokio::spawn({
        let promise = promise.clone();
        async move { promise.get().await }
    });
    tokio::task::yield_now().await;
    assert!(!promise.is_done());

    hoarder.interrupt();
    assert_eq!(hoarder.join().await, ExitReason::Interrupted);

    // Delivered but never completed: released when the hoarder unregisters.
    let outcome = tokio::time::timeout(Duration::from_secs(1), waiter)
        .await
        .expect("requester released")
        .expect("waiter task");
    assert_eq!(outcome, None);
    assert_eq!(bus.pending_events(), 0);
}
