//! Message taxonomy: events, broadcasts and their type-erased envelope.
//!
//! ## Contents
//! - [`Event`], [`Broadcast`] marker traits implemented by payload types
//! - [`Message`] what a mailbox holds (`Arc` payload + type and event id)
//! - [`Request`] typed view of a delivered event, used to `complete` it
//! - [`EventId`] bus-assigned identity of a sent event

mod message;

pub use message::{Broadcast, Event, EventId, Message, MessageKind, Request};
