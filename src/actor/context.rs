//! # Per-actor context handed to every hook and handler.
//!
//! Holds the actor's identity, a handle to the bus, its cancellation token and
//! the handler table the run loop dispatches through.
//!
//! ## Rules
//! - A handler is installed before the bus subscription, so a message can never
//!   arrive for a type the actor has no handler for.
//! - Events sent through the context are indexed under this actor: if it
//!   unregisters first, their promises resolve to absent.
//! - [`Context::terminate`] takes effect after the current handler returns.

use std::any::{type_name, TypeId};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::id::ActorId;
use super::service::{HandleBroadcast, HandleEvent, MicroService};
use crate::bus::MessageBus;
use crate::error::{BusError, HandlerError};
use crate::messages::{Broadcast, Event, Message, MessageKind, Request};
use crate::promise::Promise;

/// Typed handler behind a type-erased message.
#[async_trait]
pub(crate) trait Dispatch<S>: Send + Sync {
    async fn dispatch(
        &self,
        service: &mut S,
        msg: Message,
        ctx: &mut Context<S>,
    ) -> Result<(), HandlerError>;
}

struct EventDispatch<E>(PhantomData<fn() -> E>);

#[async_trait]
impl<S, E> Dispatch<S> for EventDispatch<E>
where
    S: HandleEvent<E>,
    E: Event,
{
    async fn dispatch(
        &self,
        service: &mut S,
        msg: Message,
        ctx: &mut Context<S>,
    ) -> Result<(), HandlerError> {
        match msg.into_request::<E>() {
            Ok(request) => service.on_event(request, ctx).await,
            Err(msg) => Err(misrouted(&msg, type_name::<E>())),
        }
    }
}

struct BroadcastDispatch<B>(PhantomData<fn() -> B>);

#[async_trait]
impl<S, B> Dispatch<S> for BroadcastDispatch<B>
where
    S: HandleBroadcast<B>,
    B: Broadcast,
{
    async fn dispatch(
        &self,
        service: &mut S,
        msg: Message,
        ctx: &mut Context<S>,
    ) -> Result<(), HandlerError> {
        match msg.into_broadcast::<B>() {
            Ok(broadcast) => service.on_broadcast(broadcast, ctx).await,
            Err(msg) => Err(misrouted(&msg, type_name::<B>())),
        }
    }
}

fn misrouted(msg: &Message, expected: &'static str) -> HandlerError {
    HandlerError::fatal(format!(
        "{} routed to the handler of {expected}",
        msg.type_name()
    ))
}

/// Handlers are keyed by kind too: one type may be both an event and a broadcast.
type HandlerKey = (MessageKind, TypeId);

/// What a [`MicroService`] sees of the bus.
pub struct Context<S> {
    id: ActorId,
    bus: Arc<MessageBus>,
    token: CancellationToken,
    terminating: bool,
    handlers: HashMap<HandlerKey, Arc<dyn Dispatch<S>>>,
}

impl<S: MicroService> Context<S> {
    pub(crate) fn new(id: ActorId, bus: Arc<MessageBus>, token: CancellationToken) -> Self {
        Self {
            id,
            bus,
            token,
            terminating: false,
            handlers: HashMap::new(),
        }
    }

    /// This actor's id.
    pub fn id(&self) -> &ActorId {
        &self.id
    }

    /// The shared bus.
    pub fn bus(&self) -> &Arc<MessageBus> {
        &self.bus
    }

    /// Cancelled when the actor is interrupted.
    ///
    /// Pass it to [`Promise::get_or_cancel`] when waiting inside a handler.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Routes events of type `E` to `<S as HandleEvent<E>>::on_event`.
    pub fn subscribe_event<E: Event>(&mut self)
    where
        S: HandleEvent<E>,
    {
        self.handlers.insert(
            (MessageKind::Event, TypeId::of::<E>()),
            Arc::new(EventDispatch::<E>(PhantomData)),
        );
        self.bus.subscribe_event::<E>(&self.id);
    }

    /// Routes broadcasts of type `B` to `<S as HandleBroadcast<B>>::on_broadcast`.
    pub fn subscribe_broadcast<B: Broadcast>(&mut self)
    where
        S: HandleBroadcast<B>,
    {
        self.handlers.insert(
            (MessageKind::Broadcast, TypeId::of::<B>()),
            Arc::new(BroadcastDispatch::<B>(PhantomData)),
        );
        self.bus.subscribe_broadcast::<B>(&self.id);
    }

    /// Sends an event on behalf of this actor.
    ///
    /// Returns `None` if nobody handles `E`.
    pub fn send_event<E: Event>(&self, event: E) -> Option<Promise<E::Reply>> {
        self.bus.send_event_as(&self.id, event)
    }

    /// Sends a broadcast; returns the number of recipients.
    pub fn send_broadcast<B: Broadcast>(&self, broadcast: B) -> usize {
        self.bus.send_broadcast(broadcast)
    }

    /// Answers an event this actor received.
    pub fn complete<E: Event>(
        &self,
        request: &Request<E>,
        reply: E::Reply,
    ) -> Result<(), BusError> {
        self.bus.complete(request, reply)
    }

    /// Stops the run loop once the current handler returns.
    pub fn terminate(&mut self) {
        self.terminating = true;
    }

    /// Returns `true` once [`terminate`](Self::terminate) was called.
    pub fn is_terminating(&self) -> bool {
        self.terminating
    }

    pub(crate) fn handler(&self, msg: &Message) -> Option<Arc<dyn Dispatch<S>>> {
        self.handlers.get(&(msg.kind(), msg.type_id())).cloned()
    }
}
