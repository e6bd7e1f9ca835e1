//! # Message taxonomy.
//!
//! Two disjoint kinds travel over the bus:
//! - [`Event`]: unicast, delivered to exactly one subscriber, answered through a [`Promise`](crate::Promise);
//! - [`Broadcast`]: multicast, delivered to every subscriber, no result channel.
//!
//! Mailboxes hold type-erased [`Message`]s. Handlers get them back as a typed
//! [`Request<E>`] (events) or `Arc<B>` (broadcasts).
//!
//! ## Example
//! ```rust
//! use microbus::{Broadcast, Event};
//!
//! struct CheckAvailability { title: String }
//! impl Event for CheckAvailability {
//!     type Reply = Option<u32>; // price, if in stock
//! }
//!
//! struct Tick { tick: u64 }
//! impl Broadcast for Tick {}
//! ```

use std::any::{Any, TypeId};
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

/// A unicast message expecting exactly one result of type [`Event::Reply`].
///
/// Payload fields are immutable once sent: the bus shares the value behind an `Arc`.
pub trait Event: Send + Sync + 'static {
    /// Result type carried back to the requester.
    type Reply: Clone + Send + Sync + 'static;
}

/// A multicast, fire-and-forget message.
pub trait Broadcast: Send + Sync + 'static {}

/// Bus-assigned identity of one sent event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventId(pub(crate) u64);

impl EventId {
    /// Raw id value.
    #[inline]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Kind of a delivered [`Message`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// Unicast request.
    Event,
    /// Multicast notification.
    Broadcast,
}

/// Type-erased message as stored in a mailbox.
///
/// Cloning is cheap: the payload is shared.
#[derive(Clone)]
pub struct Message {
    kind: MessageKind,
    type_id: TypeId,
    type_name: &'static str,
    event_id: Option<EventId>,
    payload: Arc<dyn Any + Send + Sync>,
}

impl Message {
    pub(crate) fn event<E: Event>(id: EventId, event: Arc<E>) -> Self {
        Self {
            kind: MessageKind::Event,
            type_id: TypeId::of::<E>(),
            type_name: std::any::type_name::<E>(),
            event_id: Some(id),
            payload: event,
        }
    }

    pub(crate) fn broadcast<B: Broadcast>(broadcast: Arc<B>) -> Self {
        Self {
            kind: MessageKind::Broadcast,
            type_id: TypeId::of::<B>(),
            type_name: std::any::type_name::<B>(),
            event_id: None,
            payload: broadcast,
        }
    }

    /// Event or broadcast.
    #[inline]
    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    /// `TypeId` of the concrete payload type.
    #[inline]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Name of the concrete payload type.
    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Id of the event (`None` for broadcasts).
    #[inline]
    pub fn event_id(&self) -> Option<EventId> {
        self.event_id
    }

    /// Returns `true` if the payload is a `T`.
    #[inline]
    pub fn is<T: 'static>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }

    /// Recovers the typed request, or gives the message back on mismatch.
    pub fn into_request<E: Event>(self) -> Result<Request<E>, Message> {
        let id = match (self.kind, self.event_id) {
            (MessageKind::Event, Some(id)) => id,
            _ => return Err(self),
        };
        match self.payload.downcast::<E>() {
            Ok(event) => Ok(Request { id, event }),
            Err(payload) => Err(Message { payload, ..self }),
        }
    }

    /// Recovers the typed broadcast, or gives the message back on mismatch.
    pub fn into_broadcast<B: Broadcast>(self) -> Result<Arc<B>, Message> {
        if self.kind != MessageKind::Broadcast {
            return Err(self);
        }
        match self.payload.downcast::<B>() {
            Ok(broadcast) => Ok(broadcast),
            Err(payload) => Err(Message { payload, ..self }),
        }
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("kind", &self.kind)
            .field("type", &self.type_name)
            .field("event_id", &self.event_id)
            .finish()
    }
}

/// A delivered event together with its bus identity.
///
/// Dereferences to the event payload. Pass it to
/// [`MessageBus::complete`](crate::MessageBus::complete) to resolve the requester's promise.
pub struct Request<E> {
    id: EventId,
    event: Arc<E>,
}

impl<E> Request<E> {
    /// Id assigned when the event was sent.
    #[inline]
    pub fn id(&self) -> EventId {
        self.id
    }

    /// Shared payload.
    #[inline]
    pub fn payload(&self) -> &Arc<E> {
        &self.event
    }
}

impl<E> Clone for Request<E> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            event: Arc::clone(&self.event),
        }
    }
}

impl<E> Deref for Request<E> {
    type Target = E;

    fn deref(&self) -> &E {
        &self.event
    }
}

impl<E: fmt::Debug> fmt::Debug for Request<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("id", &self.id)
            .field("event", &self.event)
            .finish()
    }
}
