//! # Write-once result cell.
//!
//! [`Promise`] bridges a requester and the actor that eventually handles its
//! event. The bus creates one per successful `send_event`; the handler resolves
//! it through `complete`.
//!
//! ## State machine
//! ```text
//! Unresolved ──resolve(v)──► Resolved(v)   (terminal)
//!                 │
//!                 └─ second resolve: no-op, returns false, stored value unchanged
//! ```
//!
//! ## Rules
//! - The stored value may be `None` ("could not be produced"), e.g. when the
//!   responsible actor unregistered before answering.
//! - Every `get*` call after resolution returns a clone of the same value.
//! - A timed wait that expires leaves the promise untouched.
//! - [`Promise::is_done`] is advisory: it may flip to `true` right after returning `false`.

use std::any::Any;
use std::fmt;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::error::BusError;

struct Inner<T> {
    slot: OnceLock<Option<T>>,
    notify: Notify,
}

/// Single-slot, write-once, awaitable result.
///
/// Cheap to clone; clones observe the same slot.
///
/// # Example
/// ```
/// use microbus::Promise;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let p = Promise::new();
/// assert!(!p.is_done());
/// assert!(p.resolve(Some("ok")));
/// assert!(!p.resolve(Some("again")));
/// assert_eq!(p.get().await, Some("ok"));
/// # }
/// ```
pub struct Promise<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Promise<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for Promise<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Promise<T> {
    /// Creates an unresolved promise.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                slot: OnceLock::new(),
                notify: Notify::new(),
            }),
        }
    }

    /// Snapshot of the resolved flag (advisory only).
    #[inline]
    pub fn is_done(&self) -> bool {
        self.inner.slot.get().is_some()
    }

    /// Resolves the promise and wakes every waiter.
    ///
    /// Returns `false` (and keeps the first value) if it was already resolved.
    pub fn resolve(&self, value: Option<T>) -> bool {
        match self.inner.slot.set(value) {
            Ok(()) => {
                self.inner.notify.notify_waiters();
                true
            }
            Err(_rejected) => {
                tracing::warn!("promise already resolved; second value ignored");
                false
            }
        }
    }
}

impl<T: Clone> Promise<T> {
    /// Waits until resolved and returns the stored value.
    ///
    /// Dropping the returned future abandons the wait; use
    /// [`get_or_cancel`](Self::get_or_cancel) to tie it to a cancellation token.
    pub async fn get(&self) -> Option<T> {
        loop {
            // Register before checking so a concurrent resolve cannot be missed.
            let notified = self.inner.notify.notified();
            if let Some(value) = self.inner.slot.get() {
                return value.clone();
            }
            notified.await;
        }
    }

    /// Waits until resolved, failing with [`BusError::Interrupted`] if `cancel` fires first.
    ///
    /// An already resolved promise returns its value even if `cancel` is cancelled.
    pub async fn get_or_cancel(&self, cancel: &CancellationToken) -> Result<Option<T>, BusError> {
        tokio::select! {
            biased;
            value = self.get() => Ok(value),
            _ = cancel.cancelled() => Err(BusError::Interrupted),
        }
    }

    /// Waits up to `timeout`.
    ///
    /// Returns [`BusError::NotYetAvailable`] if the promise is still unresolved at expiry.
    pub async fn get_timeout(&self, timeout: Duration) -> Result<Option<T>, BusError> {
        tokio::time::timeout(timeout, self.get())
            .await
            .map_err(|_elapsed| BusError::NotYetAvailable { timeout })
    }

    /// Non-blocking read: `Some(value)` once resolved, `None` before.
    pub fn try_get(&self) -> Option<Option<T>> {
        self.inner.slot.get().cloned()
    }
}

impl<T> fmt::Debug for Promise<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Promise")
            .field("done", &self.is_done())
            .finish()
    }
}

/// Type-erased view used by the bus to resolve promises of any reply type.
pub(crate) trait ErasedPromise: Send + Sync {
    /// Resolves with a boxed value; hands the box back if its type does not match.
    fn resolve_boxed(&self, value: Box<dyn Any + Send>) -> Result<bool, Box<dyn Any + Send>>;

    /// Resolves to the absent value.
    fn resolve_absent(&self) -> bool;

    fn reply_type(&self) -> &'static str;
}

impl<T: Send + Sync + 'static> ErasedPromise for Promise<T> {
    fn resolve_boxed(&self, value: Box<dyn Any + Send>) -> Result<bool, Box<dyn Any + Send>> {
        let value = value.downcast::<T>()?;
        Ok(self.resolve(Some(*value)))
    }

    fn resolve_absent(&self) -> bool {
        self.resolve(None)
    }

    fn reply_type(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}
