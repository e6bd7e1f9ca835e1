//! # Run loop of one actor.
//!
//! [`spawn`] moves a [`MicroService`] onto its own tokio task and drives it
//! through its lifecycle:
//!
//! ```text
//! Created ──► Initializing ──► Running ──► Terminated
//!               │                 │
//!               │ initialize()    │ loop {
//!               │ (subscribe)     │   await_message(id, token)
//!               │                 │   dispatch to the handler of its type
//!               ▼                 │   stop if ctx.terminate() was called
//!        error/panic ─────────────┤ }
//!                                 ▼
//!                   on_terminate() → unregister → Terminated
//! ```
//!
//! ## Fault policy
//! - `HandlerError::Fail`: `HandlerFailed` observation, the loop moves on.
//! - `HandlerError::Fatal`: `HandlerFailed` observation, the actor stops.
//! - panic: caught, `HandlerPanicked` observation, the actor stops
//!   (`on_terminate` is skipped).
//!
//! If the failing message was an event whose promise is still pending, the
//! promise is resolved to absent so the requester unblocks.
//!
//! ## Rules
//! - Handlers of one actor never run concurrently.
//! - The actor always unregisters as its last act, whatever the exit reason.
//! - Cancelling the token interrupts the wait for the next message, never a
//!   running handler.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::context::Context;
use super::id::ActorId;
use super::service::MicroService;
use crate::bus::MessageBus;
use crate::error::{BusError, HandlerError};
use crate::observers::{panic_message, Observation, ObservationKind};

/// Lifecycle state of a spawned actor. States only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ServiceState {
    /// Spawned; the task has not started yet.
    Created,
    /// `initialize` is running.
    Initializing,
    /// Processing messages.
    Running,
    /// Unregistered; the task is finishing.
    Terminated,
}

/// Why an actor's run loop stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitReason {
    /// The service called [`Context::terminate`].
    Terminated,
    /// The actor's token was cancelled.
    Interrupted,
    /// `initialize` failed, a handler returned a fatal error, or the bus
    /// rejected the actor's wait.
    Failed {
        /// The error that stopped the actor.
        error: HandlerError,
    },
    /// A hook or handler panicked.
    Panicked {
        /// Panic payload, rendered.
        info: String,
    },
}

impl ExitReason {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ExitReason::Terminated => "terminated",
            ExitReason::Interrupted => "interrupted",
            ExitReason::Failed { .. } => "failed",
            ExitReason::Panicked { .. } => "panicked",
        }
    }

    /// Returns `true` for [`ExitReason::Terminated`] and [`ExitReason::Interrupted`].
    pub fn is_graceful(&self) -> bool {
        matches!(self, ExitReason::Terminated | ExitReason::Interrupted)
    }

    fn describe(&self) -> String {
        match self {
            ExitReason::Failed { error } => error.as_message(),
            ExitReason::Panicked { info } => format!("panic: {info}"),
            other => other.as_label().to_string(),
        }
    }
}

/// Handle to a spawned actor.
pub struct ServiceHandle {
    id: ActorId,
    state: watch::Receiver<ServiceState>,
    token: CancellationToken,
    join: JoinHandle<ExitReason>,
}

impl ServiceHandle {
    /// The actor's id on the bus.
    pub fn id(&self) -> &ActorId {
        &self.id
    }

    /// Current lifecycle state (snapshot).
    pub fn state(&self) -> ServiceState {
        *self.state.borrow()
    }

    /// Receiver of lifecycle state changes.
    pub fn state_changes(&self) -> watch::Receiver<ServiceState> {
        self.state.clone()
    }

    /// Waits until the actor reaches `Running` (subscriptions are in place).
    ///
    /// Returns `false` if it terminated without ever running.
    pub async fn running(&self) -> bool {
        let mut rx = self.state.clone();
        let reached = match rx.wait_for(|s| *s >= ServiceState::Running).await {
            Ok(state) => *state == ServiceState::Running,
            Err(_closed) => false,
        };
        reached
    }

    /// Interrupts the actor: its wait for the next message fails and it stops.
    pub fn interrupt(&self) {
        self.token.cancel();
    }

    /// Waits for the run loop to finish.
    pub async fn join(self) -> ExitReason {
        match self.join.await {
            Ok(reason) => reason,
            Err(e) if e.is_panic() => ExitReason::Panicked {
                info: panic_message(&*e.into_panic()),
            },
            Err(_cancelled) => ExitReason::Interrupted,
        }
    }
}

/// Spawns `service` on its own task with a fresh cancellation token.
///
/// Must be called inside a tokio runtime.
pub fn spawn<S: MicroService>(service: S, bus: Arc<MessageBus>) -> ServiceHandle {
    spawn_with_token(service, bus, &CancellationToken::new())
}

/// Spawns `service` with a child of `parent`: cancelling `parent` interrupts it.
pub fn spawn_with_token<S: MicroService>(
    service: S,
    bus: Arc<MessageBus>,
    parent: &CancellationToken,
) -> ServiceHandle {
    let id = ActorId::new(service.name());
    let token = parent.child_token();
    let (state_tx, state_rx) = watch::channel(ServiceState::Created);

    let ctx = Context::new(id.clone(), bus, token.clone());
    let join = tokio::spawn(run(service, ctx, state_tx));

    ServiceHandle {
        id,
        state: state_rx,
        token,
        join,
    }
}

async fn run<S: MicroService>(
    mut service: S,
    mut ctx: Context<S>,
    state: watch::Sender<ServiceState>,
) -> ExitReason {
    let actor = ctx.id().to_string();
    state.send_replace(ServiceState::Initializing);
    ctx.bus()
        .observe(Observation::new(ObservationKind::ServiceStarting).with_actor(actor.as_str()));

    let reason = match initialize(&mut service, &mut ctx).await {
        Err(reason) => reason,
        Ok(()) => {
            state.send_replace(ServiceState::Running);
            ctx.bus().observe(
                Observation::new(ObservationKind::ServiceRunning).with_actor(actor.as_str()),
            );
            serve(&mut service, &mut ctx).await
        }
    };

    if !matches!(reason, ExitReason::Panicked { .. }) {
        let hook = AssertUnwindSafe(service.on_terminate(&mut ctx)).catch_unwind();
        if let Err(panic) = hook.await {
            ctx.bus().observe(
                Observation::new(ObservationKind::HandlerPanicked)
                    .with_actor(actor.as_str())
                    .with_reason(panic_message(&*panic)),
            );
        }
    }

    ctx.bus().unregister(ctx.id());
    state.send_replace(ServiceState::Terminated);
    ctx.bus().observe(
        Observation::new(ObservationKind::ServiceTerminated)
            .with_actor(actor)
            .with_reason(reason.describe()),
    );
    reason
}

async fn initialize<S: MicroService>(
    service: &mut S,
    ctx: &mut Context<S>,
) -> Result<(), ExitReason> {
    match AssertUnwindSafe(service.initialize(ctx)).catch_unwind().await {
        Ok(Ok(())) => {}
        Ok(Err(error)) => return Err(ExitReason::Failed { error }),
        Err(panic) => {
            return Err(ExitReason::Panicked {
                info: panic_message(&*panic),
            })
        }
    }
    // A service that subscribed to nothing still needs a mailbox to wait on.
    match ctx.bus().register(ctx.id()) {
        Ok(()) | Err(BusError::AlreadyRegistered { .. }) => Ok(()),
        Err(e) => Err(ExitReason::Failed { error: e.into() }),
    }
}

async fn serve<S: MicroService>(service: &mut S, ctx: &mut Context<S>) -> ExitReason {
    loop {
        if ctx.is_terminating() {
            return ExitReason::Terminated;
        }
        let msg = match ctx.bus().await_message(ctx.id(), ctx.token()).await {
            Ok(msg) => msg,
            Err(BusError::Interrupted) => return ExitReason::Interrupted,
            Err(e) => return ExitReason::Failed { error: e.into() },
        };

        let type_name = msg.type_name();
        let event_id = msg.event_id();
        let Some(handler) = ctx.handler(&msg) else {
            // Subscribed through the bus directly, without a handler.
            ctx.bus().observe(
                Observation::new(ObservationKind::HandlerFailed)
                    .with_actor(ctx.id().to_string())
                    .with_message(type_name)
                    .with_reason("no handler installed"),
            );
            if let Some(id) = event_id {
                ctx.bus().abandon(id, "no_handler");
            }
            continue;
        };

        let outcome = AssertUnwindSafe(handler.dispatch(service, msg, ctx))
            .catch_unwind()
            .await;
        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(error)) => {
                if let Some(id) = event_id {
                    ctx.bus().abandon(id, error.as_label());
                }
                ctx.bus().observe(
                    Observation::new(ObservationKind::HandlerFailed)
                        .with_actor(ctx.id().to_string())
                        .with_message(type_name)
                        .with_reason(error.as_message()),
                );
                if error.is_fatal() {
                    return ExitReason::Failed { error };
                }
            }
            Err(panic) => {
                let info = panic_message(&*panic);
                if let Some(id) = event_id {
                    ctx.bus().abandon(id, "handler_panicked");
                }
                ctx.bus().observe(
                    Observation::new(ObservationKind::HandlerPanicked)
                        .with_actor(ctx.id().to_string())
                        .with_message(type_name)
                        .with_reason(info.as_str()),
                );
                return ExitReason::Panicked { info };
            }
        }
    }
}
