//! # Pending-promise table.
//!
//! Maps every in-flight event to its promise, plus two secondary indexes: who
//! is waiting for it and who is expected to answer it.
//!
//! ```text
//! entries:      EventId ──► { requester?, handler, promise, orphaned }
//! by_requester: ActorId ──► { EventId, ... }
//! by_handler:   ActorId ──► { EventId, ... }
//! ```
//!
//! ## Rules
//! - An entry is inserted exactly once, at send time, before the event is enqueued.
//! - `complete` and `abandon` remove the entry.
//! - `orphan_requester` resolves the requester's promises to absent and marks the
//!   entries orphaned; the handler may still `complete` them, which is then a no-op.
//! - `abandon_handler` drops every entry the handler still owes, queued or
//!   already delivered, so no requester waits on an actor that is gone.

use std::any::Any;
use std::collections::{HashMap, HashSet};

use crate::actor::ActorId;
use crate::error::BusError;
use crate::messages::EventId;
use crate::promise::ErasedPromise;

struct Entry {
    requester: Option<ActorId>,
    handler: ActorId,
    promise: Box<dyn ErasedPromise>,
    orphaned: bool,
}

/// Outcome of a successful `complete`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Completion {
    /// The requester's promise was resolved with the result.
    Resolved,
    /// The requester was gone; the promise had already been resolved to absent.
    Orphaned,
}

#[derive(Default)]
pub(crate) struct PendingTable {
    entries: HashMap<EventId, Entry>,
    by_requester: HashMap<ActorId, HashSet<EventId>>,
    by_handler: HashMap<ActorId, HashSet<EventId>>,
}

impl PendingTable {
    pub(crate) fn insert(
        &mut self,
        id: EventId,
        requester: Option<ActorId>,
        handler: ActorId,
        promise: Box<dyn ErasedPromise>,
    ) {
        if let Some(r) = &requester {
            self.by_requester.entry(r.clone()).or_default().insert(id);
        }
        self.by_handler.entry(handler.clone()).or_default().insert(id);
        self.entries.insert(
            id,
            Entry {
                requester,
                handler,
                promise,
                orphaned: false,
            },
        );
    }

    /// Resolves the promise of `id` with `value` and forgets the entry.
    pub(crate) fn complete(
        &mut self,
        id: EventId,
        value: Box<dyn Any + Send>,
    ) -> Result<Completion, BusError> {
        let entry = self
            .entries
            .get(&id)
            .ok_or(BusError::UnknownEvent { event: id.get() })?;

        if entry.orphaned {
            self.forget(id);
            return Ok(Completion::Orphaned);
        }
        if entry.promise.resolve_boxed(value).is_err() {
            return Err(BusError::ReplyTypeMismatch {
                event: id.get(),
                expected: entry.promise.reply_type(),
            });
        }
        self.forget(id);
        Ok(Completion::Resolved)
    }

    /// Resolves `id` to absent if it is still pending. Returns `true` if it was.
    pub(crate) fn abandon(&mut self, id: EventId) -> bool {
        match self.forget(id) {
            Some(entry) => {
                if !entry.orphaned {
                    entry.promise.resolve_absent();
                }
                true
            }
            None => false,
        }
    }

    /// Resolves every promise `requester` is still awaiting to absent.
    ///
    /// Returns the affected event ids.
    pub(crate) fn orphan_requester(&mut self, requester: &ActorId) -> Vec<EventId> {
        let ids = self.by_requester.remove(requester).unwrap_or_default();
        let mut orphaned = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(entry) = self.entries.get_mut(&id) {
                entry.promise.resolve_absent();
                entry.orphaned = true;
                entry.requester = None;
                orphaned.push(id);
            }
        }
        orphaned.sort_unstable();
        orphaned
    }

    /// Forgets every event `handler` still owes, resolving live promises to absent.
    ///
    /// Returns the ids whose promise was resolved here (entries already orphaned
    /// by their requester are dropped silently).
    pub(crate) fn abandon_handler(&mut self, handler: &ActorId) -> Vec<EventId> {
        let ids = self.by_handler.remove(handler).unwrap_or_default();
        let mut abandoned = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(entry) = self.forget(id) {
                if !entry.orphaned {
                    entry.promise.resolve_absent();
                    abandoned.push(id);
                }
            }
        }
        abandoned.sort_unstable();
        abandoned
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn awaiting(&self, requester: &ActorId) -> usize {
        self.by_requester.get(requester).map_or(0, HashSet::len)
    }

    pub(crate) fn owed_by(&self, handler: &ActorId) -> usize {
        self.by_handler.get(handler).map_or(0, HashSet::len)
    }

    fn forget(&mut self, id: EventId) -> Option<Entry> {
        let entry = self.entries.remove(&id)?;
        if let Some(r) = &entry.requester {
            unindex(&mut self.by_requester, r, id);
        }
        unindex(&mut self.by_handler, &entry.handler, id);
        Some(entry)
    }
}

fn unindex(index: &mut HashMap<ActorId, HashSet<EventId>>, actor: &ActorId, id: EventId) {
    if let Some(set) = index.get_mut(actor) {
        set.remove(&id);
        if set.is_empty() {
            index.remove(actor);
        }
    }
}
