//! # Example: Bookstore
//!
//! A tiny store running on simulated time:
//! - `Clock` broadcasts ticks, then `Terminate`
//! - `ApiService` places each customer's orders at their scheduled tick
//! - two `SellingService`s take `BookOrder` events (round robin) and ask
//!   an `InventoryService` to reserve the book
//! - `Inventory` and `MoneyRegister` are shared passive objects with their own locks
//!
//! Run with: `RUST_LOG=info cargo run --example bookstore`

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing_subscriber::EnvFilter;

use microbus::{
    spawn, Broadcast, Clock, Config, Context, Event, HandleBroadcast, HandleEvent, HandlerError,
    LogWriter, MessageBus, MicroService, Request, Terminate, Tick,
};

// ---- passive objects ----

#[derive(Default)]
struct Inventory {
    books: Mutex<HashMap<&'static str, (u32, u32)>>,
}

impl Inventory {
    fn load(books: &[(&'static str, u32, u32)]) -> Arc<Self> {
        let inv = Self::default();
        {
            let mut shelf = inv.books.lock();
            for (title, amount, price) in books {
                shelf.insert(*title, (*amount, *price));
            }
        }
        Arc::new(inv)
    }

    /// Takes one copy off the shelf and returns its price.
    fn take(&self, title: &str) -> Option<u32> {
        let mut shelf = self.books.lock();
        let (amount, price) = shelf.get_mut(title)?;
        if *amount == 0 {
            return None;
        }
        *amount -= 1;
        Some(*price)
    }
}

#[derive(Debug, Clone)]
struct Receipt {
    order: u64,
    seller: String,
    customer: &'static str,
    title: &'static str,
    price: u32,
    issued_tick: u64,
}

#[derive(Default)]
struct MoneyRegister {
    receipts: Mutex<Vec<Receipt>>,
}

impl MoneyRegister {
    fn file(&self, mut receipt: Receipt) -> Receipt {
        let mut receipts = self.receipts.lock();
        receipt.order = receipts.len() as u64 + 1;
        receipts.push(receipt.clone());
        receipt
    }

    fn total(&self) -> u32 {
        self.receipts.lock().iter().map(|r| r.price).sum()
    }
}

// ---- messages ----

struct BookOrder {
    customer: &'static str,
    title: &'static str,
}

impl Event for BookOrder {
    type Reply = Option<Receipt>;
}

struct TakeBook(&'static str);

impl Event for TakeBook {
    type Reply = Option<u32>;
}

struct StoreClosed;

impl Broadcast for StoreClosed {}

// ---- services ----

struct InventoryService {
    inventory: Arc<Inventory>,
}

#[async_trait]
impl MicroService for InventoryService {
    fn name(&self) -> &str {
        "inventory"
    }

    async fn initialize(&mut self, ctx: &mut Context<Self>) -> Result<(), HandlerError> {
        ctx.subscribe_event::<TakeBook>();
        ctx.subscribe_broadcast::<Terminate>();
        Ok(())
    }
}

#[async_trait]
impl HandleEvent<TakeBook> for InventoryService {
    async fn on_event(
        &mut self,
        req: Request<TakeBook>,
        ctx: &mut Context<Self>,
    ) -> Result<(), HandlerError> {
        ctx.complete(&req, self.inventory.take(req.0))?;
        Ok(())
    }
}

#[async_trait]
impl HandleBroadcast<Terminate> for InventoryService {
    async fn on_broadcast(
        &mut self,
        _: Arc<Terminate>,
        ctx: &mut Context<Self>,
    ) -> Result<(), HandlerError> {
        ctx.terminate();
        Ok(())
    }
}

struct SellingService {
    name: String,
    register: Arc<MoneyRegister>,
    tick: u64,
}

#[async_trait]
impl MicroService for SellingService {
    fn name(&self) -> &str {
        &self.name
    }

    async fn initialize(&mut self, ctx: &mut Context<Self>) -> Result<(), HandlerError> {
        ctx.subscribe_event::<BookOrder>();
        ctx.subscribe_broadcast::<Tick>();
        ctx.subscribe_broadcast::<Terminate>();
        Ok(())
    }

    async fn on_terminate(&mut self, ctx: &mut Context<Self>) {
        ctx.send_broadcast(StoreClosed);
    }
}

#[async_trait]
impl HandleEvent<BookOrder> for SellingService {
    async fn on_event(
        &mut self,
        req: Request<BookOrder>,
        ctx: &mut Context<Self>,
    ) -> Result<(), HandlerError> {
        let price = match ctx.send_event(TakeBook(req.title)) {
            Some(p) => p.get_or_cancel(ctx.token()).await?.flatten(),
            None => None,
        };
        let receipt = price.map(|price| {
            self.register.file(Receipt {
                order: 0,
                seller: self.name.clone(),
                customer: req.customer,
                title: req.title,
                price,
                issued_tick: self.tick,
            })
        });
        ctx.complete(&req, receipt)?;
        Ok(())
    }
}

#[async_trait]
impl HandleBroadcast<Tick> for SellingService {
    async fn on_broadcast(
        &mut self,
        tick: Arc<Tick>,
        _ctx: &mut Context<Self>,
    ) -> Result<(), HandlerError> {
        self.tick = tick.tick;
        Ok(())
    }
}

#[async_trait]
impl HandleBroadcast<Terminate> for SellingService {
    async fn on_broadcast(
        &mut self,
        _: Arc<Terminate>,
        ctx: &mut Context<Self>,
    ) -> Result<(), HandlerError> {
        ctx.terminate();
        Ok(())
    }
}

/// One customer's front end: places scheduled orders and waits for receipts.
struct ApiService {
    customer: &'static str,
    schedule: Vec<(u64, &'static str)>,
    bought: Arc<Mutex<Vec<Receipt>>>,
}

#[async_trait]
impl MicroService for ApiService {
    fn name(&self) -> &str {
        self.customer
    }

    async fn initialize(&mut self, ctx: &mut Context<Self>) -> Result<(), HandlerError> {
        ctx.subscribe_broadcast::<Tick>();
        ctx.subscribe_broadcast::<Terminate>();
        ctx.subscribe_broadcast::<StoreClosed>();
        Ok(())
    }
}

#[async_trait]
impl HandleBroadcast<Tick> for ApiService {
    async fn on_broadcast(
        &mut self,
        tick: Arc<Tick>,
        ctx: &mut Context<Self>,
    ) -> Result<(), HandlerError> {
        let due: Vec<_> = self
            .schedule
            .iter()
            .filter(|&&(at, _)| at == tick.tick)
            .filter_map(|&(_, title)| {
                ctx.send_event(BookOrder {
                    customer: self.customer,
                    title,
                })
            })
            .collect();

        for promise in due {
            if let Some(Some(receipt)) = promise.get_or_cancel(ctx.token()).await? {
                self.bought.lock().push(receipt);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl HandleBroadcast<Terminate> for ApiService {
    async fn on_broadcast(
        &mut self,
        _: Arc<Terminate>,
        ctx: &mut Context<Self>,
    ) -> Result<(), HandlerError> {
        ctx.terminate();
        Ok(())
    }
}

#[async_trait]
impl HandleBroadcast<StoreClosed> for ApiService {
    async fn on_broadcast(
        &mut self,
        _: Arc<StoreClosed>,
        _ctx: &mut Context<Self>,
    ) -> Result<(), HandlerError> {
        tracing::debug!(customer = self.customer, "a seller closed its till");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cfg = Config {
        tick: Duration::from_millis(20),
        duration: 6,
        ..Config::default()
    };
    let bus = MessageBus::builder(cfg.clone())
        .with_observer(Arc::new(LogWriter::new()))
        .build();

    let inventory = Inventory::load(&[("Dune", 2, 40), ("Emma", 1, 25), ("Ulysses", 0, 60)]);
    let register = Arc::new(MoneyRegister::default());

    let mut handles = vec![spawn(
        InventoryService {
            inventory: Arc::clone(&inventory),
        },
        Arc::clone(&bus),
    )];
    for n in 1..=2 {
        handles.push(spawn(
            SellingService {
                name: format!("selling{n}"),
                register: Arc::clone(&register),
                tick: 0,
            },
            Arc::clone(&bus),
        ));
    }

    let customers = [
        ("ada", vec![(1, "Dune"), (3, "Emma")]),
        ("bob", vec![(1, "Dune"), (2, "Dune"), (4, "Ulysses")]),
    ];
    let mut baskets = Vec::new();
    for (customer, schedule) in customers {
        let bought = Arc::new(Mutex::new(Vec::new()));
        handles.push(spawn(
            ApiService {
                customer,
                schedule,
                bought: Arc::clone(&bought),
            },
            Arc::clone(&bus),
        ));
        baskets.push(bought);
    }

    for h in &handles {
        anyhow::ensure!(h.running().await, "{} failed to start", h.id());
    }

    let ticks = Clock::from_config(&cfg)
        .spawn(Arc::clone(&bus), Default::default())
        .await?;

    for h in handles {
        let id = h.id().clone();
        let reason = h.join().await;
        tracing::info!(actor = %id, reason = reason.as_label(), "joined");
    }

    for bought in baskets {
        for r in bought.lock().iter() {
            tracing::info!(
                customer = r.customer,
                order = r.order,
                seller = %r.seller,
                title = r.title,
                price = r.price,
                tick = r.issued_tick,
                "receipt"
            );
        }
    }
    tracing::info!(ticks, revenue = register.total(), "store closed");
    bus.close_observers().await;
    Ok(())
}
