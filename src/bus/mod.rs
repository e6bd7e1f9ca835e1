//! The broker: subscription tables, mailboxes and pending promises.
//!
//! - [`MessageBus`] public surface (`register`, `subscribe_*`, `send_*`, `complete`,
//!   `await_message`, `unregister`)
//! - [`MessageBusBuilder`] attaches observers
//! - `ring` round-robin selection per event type
//! - `mailbox` per-actor FIFO with cancellable wait
//! - `pending` event → promise table indexed by requester

mod builder;
mod mailbox;
mod message_bus;
mod pending;
mod ring;

pub use builder::MessageBusBuilder;
pub use message_bus::MessageBus;
