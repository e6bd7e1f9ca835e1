//! # Actor identity.
//!
//! [`ActorId`] is an opaque, comparable handle for one running actor. Two
//! actors may share a display name; identity is the process-unique sequence
//! number assigned at construction.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;

/// Global sequence counter for actor ids.
static ACTOR_SEQ: AtomicU64 = AtomicU64::new(1);

/// Opaque handle identifying one actor.
///
/// Cheap to clone. Equality, ordering and hashing use the sequence number only.
///
/// # Example
/// ```
/// use microbus::ActorId;
///
/// let a = ActorId::new("selling");
/// let b = ActorId::new("selling");
/// assert_ne!(a, b);
/// assert_eq!(a.name(), b.name());
/// ```
#[derive(Clone)]
pub struct ActorId {
    seq: u64,
    name: Arc<str>,
}

impl ActorId {
    /// Mints a new, never-before-seen id with the given display name.
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self {
            seq: ACTOR_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            name: name.into(),
        }
    }

    /// Display name (not unique).
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Process-unique sequence number.
    #[inline]
    pub fn seq(&self) -> u64 {
        self.seq
    }
}

impl PartialEq for ActorId {
    fn eq(&self, other: &Self) -> bool {
        self.seq == other.seq
    }
}

impl Eq for ActorId {}

impl Hash for ActorId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.seq.hash(state);
    }
}

impl PartialOrd for ActorId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ActorId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.seq.cmp(&other.seq)
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.name, self.seq)
    }
}

impl fmt::Debug for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ActorId({}#{})", self.name, self.seq)
    }
}
