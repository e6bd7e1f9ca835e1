//! # Service traits implemented by actor types.
//!
//! [`MicroService`] carries the lifecycle hooks; one [`HandleEvent`] or
//! [`HandleBroadcast`] impl per message type carries the handlers.
//!
//! ```text
//! initialize(ctx) ── ctx.subscribe_event::<E>()      needs  S: HandleEvent<E>
//!                 └─ ctx.subscribe_broadcast::<B>()  needs  S: HandleBroadcast<B>
//!
//! Running: message of type E ──► <S as HandleEvent<E>>::on_event(request, ctx)
//!          message of type B ──► <S as HandleBroadcast<B>>::on_broadcast(arc, ctx)
//! ```
//!
//! Handlers take `&mut self`: the run loop invokes one handler at a time, so
//! actor-local state needs no locking.

use std::sync::Arc;

use async_trait::async_trait;

use super::context::Context;
use crate::error::HandlerError;
use crate::messages::{Broadcast, Event, Request};

/// An actor: lifecycle hooks driven by [`spawn`](crate::spawn).
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use microbus::{Context, Event, HandleEvent, HandlerError, MicroService, Request};
///
/// struct Quote(u32);
/// impl Event for Quote { type Reply = u32; }
///
/// struct Pricing;
///
/// #[async_trait]
/// impl MicroService for Pricing {
///     fn name(&self) -> &str { "pricing" }
///
///     async fn initialize(&mut self, ctx: &mut Context<Self>) -> Result<(), HandlerError> {
///         ctx.subscribe_event::<Quote>();
///         Ok(())
///     }
/// }
///
/// #[async_trait]
/// impl HandleEvent<Quote> for Pricing {
///     async fn on_event(
///         &mut self,
///         req: Request<Quote>,
///         ctx: &mut Context<Self>,
///     ) -> Result<(), HandlerError> {
///         ctx.complete(&req, req.0 * 2)?;
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait MicroService: Send + Sized + 'static {
    /// Display name used for the actor id and in observations.
    fn name(&self) -> &str;

    /// Runs once before any message is processed.
    ///
    /// Subscribe here. An error (of either kind) stops the actor before it runs.
    async fn initialize(&mut self, ctx: &mut Context<Self>) -> Result<(), HandlerError>;

    /// Runs once after the loop stops, before the actor unregisters.
    ///
    /// Not called if a handler panicked.
    async fn on_terminate(&mut self, _ctx: &mut Context<Self>) {}
}

/// Handler for event type `E`.
///
/// The handler owns the request: it should `complete` it, now or from a later
/// message. A returned error resolves a still pending promise to absent.
#[async_trait]
pub trait HandleEvent<E: Event>: MicroService {
    async fn on_event(
        &mut self,
        request: Request<E>,
        ctx: &mut Context<Self>,
    ) -> Result<(), HandlerError>;
}

/// Handler for broadcast type `B`.
#[async_trait]
pub trait HandleBroadcast<B: Broadcast>: MicroService {
    async fn on_broadcast(
        &mut self,
        broadcast: Arc<B>,
        ctx: &mut Context<Self>,
    ) -> Result<(), HandlerError>;
}
