//! # microbus
//!
//! **microbus** is an in-process actor message bus for tokio.
//!
//! Actors ("micro-services") talk only through a shared [`MessageBus`]:
//! - **events** are unicast: each send goes to one subscriber, chosen by round
//!   robin, and returns a [`Promise`] for its reply;
//! - **broadcasts** fan out to every current subscriber and carry no reply.
//!
//! Each actor runs on its own task, owns a FIFO mailbox and handles one message
//! at a time, so actor-local state needs no locking.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!   │ MicroService │   │ MicroService │   │    Clock     │
//!   │  (actor #1)  │   │  (actor #2)  │   │ (Tick, Term.)│
//!   └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!          │ run loop         │ run loop         │ send_broadcast
//!          ▼                  ▼                  ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │  MessageBus                                                  │
//! │  - events:     TypeId ──► RoundRobin ring of actors          │
//! │  - broadcasts: TypeId ──► set of actors                      │
//! │  - mailboxes:  ActorId ──► FIFO (await_message)              │
//! │  - pending:    EventId ──► Promise, requester ──► {EventId}  │
//! └──────────────────────────────┬───────────────────────────────┘
//!                                │ publishes Observations
//!                                ▼
//!                 ObserverHub (broadcast channel)
//!                                ▼
//!                   ObserverRelay (until bus drop)
//!                                ▼
//!                    ObserverSet (per-observer queues)
//!                      ┌─────────┼─────────┐
//!                      ▼         ▼         ▼
//!                  LogWriter   obs2      obsN
//! ```
//!
//! ### Lifecycle of one actor
//! ```text
//! spawn(service, bus) ──► Initializing: initialize(ctx) subscribes, installs handlers
//!                     ──► Running:      loop { await_message → handler(msg, ctx) }
//!                     ──► Terminated:   on_terminate, unregister (orphans resolve to absent)
//! ```
//!
//! ## Features
//! | Area              | Description                                               | Key types / traits                        |
//! |-------------------|-----------------------------------------------------------|-------------------------------------------|
//! | **Bus**           | Subscribe, send, complete, await, unregister.             | [`MessageBus`], [`MessageBusBuilder`]     |
//! | **Messages**      | Typed events with replies, broadcasts.                    | [`Event`], [`Broadcast`], [`Request`]     |
//! | **Results**       | Write-once, awaitable, cancellable result cell.           | [`Promise`]                               |
//! | **Actors**        | Run loop with typed handlers and a fault policy.          | [`MicroService`], [`HandleEvent`], [`spawn`] |
//! | **Time**          | Periodic tick broadcasts and a final terminate.           | [`Clock`], [`Tick`], [`Terminate`]        |
//! | **Observers**     | Hook into bus and actor activity (logging, metrics).      | [`Observe`], [`LogWriter`]                |
//! | **Errors**        | Protocol misuse and handler faults.                       | [`BusError`], [`HandlerError`]            |
//! | **Configuration** | Observer capacity, tick period and run length.            | [`Config`]                                |
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use microbus::{
//!     spawn, Config, Context, Event, HandleEvent, HandlerError, LogWriter, MessageBus,
//!     MicroService, Request,
//! };
//!
//! struct Greet(&'static str);
//! impl Event for Greet { type Reply = String; }
//!
//! struct Greeter;
//!
//! #[async_trait]
//! impl MicroService for Greeter {
//!     fn name(&self) -> &str { "greeter" }
//!
//!     async fn initialize(&mut self, ctx: &mut Context<Self>) -> Result<(), HandlerError> {
//!         ctx.subscribe_event::<Greet>();
//!         Ok(())
//!     }
//! }
//!
//! #[async_trait]
//! impl HandleEvent<Greet> for Greeter {
//!     async fn on_event(
//!         &mut self,
//!         req: Request<Greet>,
//!         ctx: &mut Context<Self>,
//!     ) -> Result<(), HandlerError> {
//!         ctx.complete(&req, format!("hello, {}", req.0))?;
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let bus = MessageBus::builder(Config::default())
//!         .with_observer(Arc::new(LogWriter::new()))
//!         .build();
//!
//!     let greeter = spawn(Greeter, Arc::clone(&bus));
//!     assert!(greeter.running().await);
//!
//!     let reply = bus.send_event(Greet("bus")).expect("greeter subscribed");
//!     assert_eq!(reply.get().await.as_deref(), Some("hello, bus"));
//!
//!     greeter.interrupt();
//!     greeter.join().await;
//!     bus.close_observers().await;
//! }
//! ```
mod actor;
mod bus;
mod clock;
mod config;
mod error;
mod messages;
mod observers;
mod promise;

// ---- Public re-exports ----

pub use actor::{
    spawn, spawn_with_token, ActorId, Context, ExitReason, HandleBroadcast, HandleEvent,
    MicroService, ServiceHandle, ServiceState,
};
pub use bus::{MessageBus, MessageBusBuilder};
pub use clock::{Clock, Terminate, Tick};
pub use config::Config;
pub use error::{BusError, HandlerError};
pub use messages::{Broadcast, Event, EventId, Message, MessageKind, Request};
pub use observers::{LogWriter, Observation, ObservationKind, Observe, ObserverHub, ObserverSet};
pub use promise::Promise;
