//! Actors: identity, service traits and the run loop.
//!
//! ## Contents
//! - [`ActorId`] opaque identity of one actor on the bus
//! - [`MicroService`], [`HandleEvent`], [`HandleBroadcast`] implemented by actor types
//! - [`Context`] what hooks and handlers see of the bus
//! - [`spawn`], [`spawn_with_token`] start the run loop and return a [`ServiceHandle`]

mod context;
mod id;
mod runner;
mod service;

pub use context::Context;
pub use id::ActorId;
pub use runner::{spawn, spawn_with_token, ExitReason, ServiceHandle, ServiceState};
pub use service::{HandleBroadcast, HandleEvent, MicroService};
