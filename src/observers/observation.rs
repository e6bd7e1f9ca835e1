//! # Observations emitted by the bus, actors and the clock.
//!
//! The [`ObservationKind`] enum classifies records across four categories:
//! - **Membership**: actors joining/leaving the bus and subscribing to types
//! - **Traffic**: events dispatched/completed, broadcasts sent, orphaned promises
//! - **Service lifecycle**: run-loop state changes and handler faults
//! - **Observer health**: overflowing or panicking observers
//!
//! The [`Observation`] struct carries optional metadata such as the actor,
//! message type name, event id and a free-form reason.
//!
//! ## Ordering guarantees
//! Each observation has a globally unique sequence number (`seq`) that increases monotonically.
//!
//! ## Example
//! ```rust
//! use microbus::{Observation, ObservationKind};
//!
//! let ob = Observation::new(ObservationKind::HandlerFailed)
//!     .with_actor("selling#3")
//!     .with_message("BookOrder")
//!     .with_reason("out of stock");
//!
//! assert_eq!(ob.kind, ObservationKind::HandlerFailed);
//! assert_eq!(ob.actor.as_deref(), Some("selling#3"));
//! ```

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::SystemTime;

/// Global sequence counter for observation ordering.
static OBSERVATION_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of observations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObservationKind {
    // === Membership ===
    /// Mailbox created.
    ///
    /// Sets: `actor`
    ActorRegistered,

    /// Actor removed from every subscriber collection and its mailbox dropped.
    ///
    /// Sets:
    /// - `actor`
    /// - `count`: promises resolved to absent because of the removal
    ActorUnregistered,

    /// Actor joined the round-robin ring of an event type.
    ///
    /// Sets: `actor`, `message`
    EventSubscribed,

    /// Actor joined the subscriber set of a broadcast type.
    ///
    /// Sets: `actor`, `message`
    BroadcastSubscribed,

    // === Traffic ===
    /// Event enqueued into the mailbox chosen by round robin.
    ///
    /// Sets: `actor` (handler), `message`, `event_id`
    EventDispatched,

    /// Event sent with no subscriber for its type.
    ///
    /// Sets: `message`
    EventUndeliverable,

    /// Broadcast enqueued into every current subscriber's mailbox.
    ///
    /// Sets:
    /// - `message`
    /// - `count`: number of recipients
    BroadcastSent,

    /// Event promise resolved by its handler.
    ///
    /// Sets: `message`, `event_id`
    EventCompleted,

    /// Event promise resolved to absent because nobody will answer it.
    ///
    /// Sets: `event_id`, `reason`
    PromiseOrphaned,

    // === Service lifecycle ===
    /// Run loop entered `Initializing`.
    ///
    /// Sets: `actor`
    ServiceStarting,

    /// Run loop entered `Running`.
    ///
    /// Sets: `actor`
    ServiceRunning,

    /// Run loop exited and the actor unregistered.
    ///
    /// Sets: `actor`, `reason` (exit reason)
    ServiceTerminated,

    /// A handler returned an error.
    ///
    /// Sets: `actor`, `message`, `reason`
    HandlerFailed,

    /// A handler panicked.
    ///
    /// Sets: `actor`, `message`, `reason` (panic info)
    HandlerPanicked,

    /// Clock sent a tick broadcast.
    ///
    /// Sets: `count` (tick number)
    ClockTick,

    // === Observer health ===
    /// Observer dropped an observation (queue full or worker closed).
    ///
    /// Sets: `actor` (observer name), `reason`
    ObserverOverflow,

    /// Observer panicked while processing an observation.
    ///
    /// Sets: `actor` (observer name), `reason`
    ObserverPanicked,
}

/// Observation record with optional metadata.
#[derive(Clone, Debug)]
pub struct Observation {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Classification.
    pub kind: ObservationKind,

    /// Actor (or observer) the record is about.
    pub actor: Option<Arc<str>>,
    /// Message type name.
    pub message: Option<&'static str>,
    /// Event id.
    pub event_id: Option<u64>,
    /// Kind-specific counter (recipients, orphaned promises, tick number).
    pub count: Option<u64>,
    /// Human-readable reason.
    pub reason: Option<Arc<str>>,
}

impl Observation {
    /// Creates an observation of the given kind with current timestamp and next sequence number.
    pub fn new(kind: ObservationKind) -> Self {
        Self {
            seq: OBSERVATION_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            actor: None,
            message: None,
            event_id: None,
            count: None,
            reason: None,
        }
    }

    /// Attaches an actor (display form).
    #[inline]
    pub fn with_actor(mut self, actor: impl Into<Arc<str>>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    /// Attaches a message type name.
    #[inline]
    pub fn with_message(mut self, type_name: &'static str) -> Self {
        self.message = Some(type_name);
        self
    }

    /// Attaches an event id.
    #[inline]
    pub fn with_event_id(mut self, id: u64) -> Self {
        self.event_id = Some(id);
        self
    }

    /// Attaches a counter.
    #[inline]
    pub fn with_count(mut self, count: u64) -> Self {
        self.count = Some(count);
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Creates an observer overflow record.
    #[inline]
    pub fn observer_overflow(observer: &'static str, reason: &'static str) -> Self {
        Observation::new(ObservationKind::ObserverOverflow)
            .with_actor(observer)
            .with_reason(format!("observer={observer} reason={reason}"))
    }

    /// Creates an observer panic record.
    #[inline]
    pub fn observer_panicked(observer: &'static str, info: String) -> Self {
        Observation::new(ObservationKind::ObserverPanicked)
            .with_actor(observer)
            .with_reason(info)
    }
}
