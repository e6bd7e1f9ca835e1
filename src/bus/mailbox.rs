//! # Per-actor FIFO mailbox.
//!
//! A mailbox is written by any sender (under the bus tables lock) and read by
//! its owning actor only.
//!
//! ## Rules
//! - FIFO: `recv` returns messages in push order.
//! - `recv` checks the cancellation token **before** dequeuing; a cancelled wait
//!   leaves the queue untouched.
//! - `close` drains the queue and fails every current and future `recv` with
//!   `NotRegistered`.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::actor::ActorId;
use crate::error::BusError;
use crate::messages::Message;

pub(crate) struct Mailbox {
    owner: ActorId,
    queue: Mutex<VecDeque<Message>>,
    notify: Notify,
    closed: AtomicBool,
}

impl Mailbox {
    pub(crate) fn new(owner: ActorId) -> Self {
        Self {
            owner,
            queue: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
            closed: AtomicBool::new(false),
        }
    }

    pub(crate) fn push(&self, msg: Message) {
        self.queue.lock().push_back(msg);
        self.notify.notify_one();
    }

    pub(crate) fn len(&self) -> usize {
        self.queue.lock().len()
    }

    /// Waits for the head message.
    pub(crate) async fn recv(&self, cancel: &CancellationToken) -> Result<Message, BusError> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if cancel.is_cancelled() {
                return Err(BusError::Interrupted);
            }
            if let Some(msg) = self.queue.lock().pop_front() {
                return Ok(msg);
            }
            if self.closed.load(Ordering::Acquire) {
                return Err(BusError::NotRegistered {
                    actor: self.owner.to_string(),
                });
            }

            tokio::select! {
                _ = cancel.cancelled() => return Err(BusError::Interrupted),
                _ = &mut notified => {}
            }
        }
    }

    /// Closes the mailbox and returns whatever was still queued.
    pub(crate) fn close(&self) -> Vec<Message> {
        let drained: Vec<Message> = {
            let mut queue = self.queue.lock();
            self.closed.store(true, Ordering::Release);
            queue.drain(..).collect()
        };
        self.notify.notify_waiters();
        drained
    }
}
