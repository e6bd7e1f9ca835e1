//! Error types used by the message bus and by actor handlers.
//!
//! This module defines two main error enums:
//!
//! - [`BusError`]: errors raised by the broker itself (protocol misuse, interruption, timeouts).
//! - [`HandlerError`]: errors raised by actor message handlers.
//!
//! Both types provide helper methods (`as_label`, `as_message`) for logging/metrics.

use std::time::Duration;
use thiserror::Error;

/// # Errors produced by the message bus.
///
/// Protocol misuse (`NotRegistered`, `AlreadyRegistered`, `UnknownEvent`,
/// `ReplyTypeMismatch`) indicates a caller bug and is never retried by the bus.
/// `Interrupted` and `NotYetAvailable` are ordinary outcomes of a blocking wait.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BusError {
    /// The actor has no mailbox (never registered, or already unregistered).
    #[error("actor {actor} is not registered")]
    NotRegistered {
        /// Display form of the actor id.
        actor: String,
    },

    /// `register` was called twice for the same actor.
    #[error("actor {actor} is already registered")]
    AlreadyRegistered {
        /// Display form of the actor id.
        actor: String,
    },

    /// `complete` was called for an event the bus is not tracking.
    #[error("event #{event} has no pending promise")]
    UnknownEvent {
        /// Id of the event.
        event: u64,
    },

    /// `complete` supplied a result of a different type than the promise expects.
    #[error("event #{event} expects a reply of type {expected}")]
    ReplyTypeMismatch {
        /// Id of the event.
        event: u64,
        /// Type name of the expected reply.
        expected: &'static str,
    },

    /// A blocking wait was cancelled through its cancellation token.
    #[error("wait interrupted")]
    Interrupted,

    /// A timed wait expired before the promise was resolved.
    #[error("not yet available after {timeout:?}")]
    NotYetAvailable {
        /// The timeout that elapsed.
        timeout: Duration,
    },
}

impl BusError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use microbus::BusError;
    ///
    /// let err = BusError::UnknownEvent { event: 7 };
    /// assert_eq!(err.as_label(), "bus_unknown_event");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            BusError::NotRegistered { .. } => "bus_not_registered",
            BusError::AlreadyRegistered { .. } => "bus_already_registered",
            BusError::UnknownEvent { .. } => "bus_unknown_event",
            BusError::ReplyTypeMismatch { .. } => "bus_reply_type_mismatch",
            BusError::Interrupted => "bus_interrupted",
            BusError::NotYetAvailable { .. } => "bus_not_yet_available",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            BusError::NotRegistered { actor } => format!("not registered: {actor}"),
            BusError::AlreadyRegistered { actor } => format!("already registered: {actor}"),
            BusError::UnknownEvent { event } => format!("unknown event: #{event}"),
            BusError::ReplyTypeMismatch { event, expected } => {
                format!("reply mismatch: #{event} expects {expected}")
            }
            BusError::Interrupted => "interrupted".to_string(),
            BusError::NotYetAvailable { timeout } => format!("timeout: {timeout:?}"),
        }
    }

    /// Indicates whether the error is a caller bug rather than a wait outcome.
    ///
    /// # Example
    /// ```
    /// use microbus::BusError;
    ///
    /// assert!(BusError::NotRegistered { actor: "a#1".into() }.is_protocol_misuse());
    /// assert!(!BusError::Interrupted.is_protocol_misuse());
    /// ```
    pub fn is_protocol_misuse(&self) -> bool {
        matches!(
            self,
            BusError::NotRegistered { .. }
                | BusError::AlreadyRegistered { .. }
                | BusError::UnknownEvent { .. }
                | BusError::ReplyTypeMismatch { .. }
        )
    }
}

/// # Errors produced by message handlers.
///
/// The run loop applies one policy to every actor:
/// `Fail` is reported and the loop moves on to the next message,
/// `Fatal` is reported and the actor terminates.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandlerError {
    /// Handling this message failed; the actor keeps running.
    #[error("handler failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// Non-recoverable failure; the actor stops.
    #[error("fatal handler error: {error}")]
    Fatal {
        /// The underlying error message.
        error: String,
    },
}

impl HandlerError {
    /// Builds a recoverable [`HandlerError::Fail`].
    pub fn fail(error: impl Into<String>) -> Self {
        HandlerError::Fail {
            error: error.into(),
        }
    }

    /// Builds a [`HandlerError::Fatal`].
    pub fn fatal(error: impl Into<String>) -> Self {
        HandlerError::Fatal {
            error: error.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            HandlerError::Fail { .. } => "handler_failed",
            HandlerError::Fatal { .. } => "handler_fatal",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            HandlerError::Fail { error } => format!("error: {error}"),
            HandlerError::Fatal { error } => format!("fatal: {error}"),
        }
    }

    /// Returns `true` if the actor must stop after this error.
    ///
    /// # Example
    /// ```
    /// use microbus::HandlerError;
    ///
    /// assert!(HandlerError::fatal("corrupt ledger").is_fatal());
    /// assert!(!HandlerError::fail("out of stock").is_fatal());
    /// ```
    pub fn is_fatal(&self) -> bool {
        matches!(self, HandlerError::Fatal { .. })
    }
}

impl From<BusError> for HandlerError {
    /// Protocol misuse inside a handler is a bug: it becomes `Fatal`.
    /// Wait outcomes (`Interrupted`, `NotYetAvailable`) become `Fail`.
    fn from(err: BusError) -> Self {
        if err.is_protocol_misuse() {
            HandlerError::Fatal {
                error: err.to_string(),
            }
        } else {
            HandlerError::Fail {
                error: err.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_stable() {
        assert_eq!(BusError::Interrupted.as_label(), "bus_interrupted");
        assert_eq!(
            BusError::NotYetAvailable {
                timeout: Duration::from_millis(5)
            }
            .as_label(),
            "bus_not_yet_available"
        );
        assert_eq!(HandlerError::fail("x").as_label(), "handler_failed");
        assert_eq!(HandlerError::fatal("x").as_label(), "handler_fatal");
    }

    #[test]
    fn misuse_becomes_fatal_handler_error() {
        let err: HandlerError = BusError::UnknownEvent { event: 3 }.into();
        assert!(err.is_fatal());

        let err: HandlerError = BusError::Interrupted.into();
        assert!(!err.is_fatal());
    }

    #[test]
    fn display_includes_details() {
        let err = BusError::NotRegistered {
            actor: "seller#4".into(),
        };
        assert_eq!(err.to_string(), "actor seller#4 is not registered");
        assert_eq!(err.as_message(), "not registered: seller#4");
    }
}
