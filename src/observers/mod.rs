//! Observability: observation records, their broadcast hub and observer fan-out.
//!
//! This module groups the observation **data model**, the **hub** used to
//! publish them, and the **observer** plumbing that delivers them to user code.
//!
//! ## Contents
//! - [`ObservationKind`], [`Observation`] classification and metadata
//! - [`ObserverHub`] thin wrapper over `tokio::sync::broadcast`
//! - [`Observe`] extension trait, [`ObserverSet`] per-observer queues and workers
//! - `ObserverRelay` forwards the hub to the set for as long as the bus lives
//! - [`LogWriter`] built-in observer writing through `tracing`
//!
//! ## Quick reference
//! - **Publishers**: `MessageBus` (membership, traffic), run loops (lifecycle, faults),
//!   `Clock` (ticks), `ObserverSet` workers (overflow/panic).
//! - **Consumer**: the relay started by `MessageBusBuilder::build`, which fans
//!   out to the `ObserverSet` and drains it when the bus is dropped or closed.

mod hub;
mod log;
mod observation;
mod observer;
mod relay;
mod set;

pub use hub::ObserverHub;
pub use log::LogWriter;
pub use observation::{Observation, ObservationKind};
pub use observer::Observe;
pub use set::ObserverSet;

pub(crate) use relay::ObserverRelay;

pub(crate) use set::panic_message;
