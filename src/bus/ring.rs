//! # Round-robin ring of event subscribers.
//!
//! One ring per event type. Dispatch pops the front actor and re-appends it to
//! the back, so repeated sends visit subscribers in rotation:
//!
//! ```text
//! [a1, a2, a3] ─rotate()─► a1   ring: [a2, a3, a1]
//!              ─rotate()─► a2   ring: [a3, a1, a2]
//! ```
//!
//! Membership changes only through `insert`/`remove`; `rotate` never does.

use std::collections::VecDeque;

use crate::actor::ActorId;

/// Ordered ring of distinct actors.
#[derive(Debug, Default, Clone)]
pub(crate) struct RoundRobin {
    ring: VecDeque<ActorId>,
}

impl RoundRobin {
    /// Appends `actor` at the back. Returns `false` if it was already a member.
    pub(crate) fn insert(&mut self, actor: ActorId) -> bool {
        if self.ring.contains(&actor) {
            return false;
        }
        self.ring.push_back(actor);
        true
    }

    /// Removes `actor` wherever it sits. Returns `false` if it was not a member.
    pub(crate) fn remove(&mut self, actor: &ActorId) -> bool {
        match self.ring.iter().position(|a| a == actor) {
            Some(pos) => {
                self.ring.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Selects the next actor and rotates it to the back.
    pub(crate) fn rotate(&mut self) -> Option<ActorId> {
        let actor = self.ring.pop_front()?;
        self.ring.push_back(actor.clone());
        Some(actor)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Members in current rotation order (front first).
    pub(crate) fn members(&self) -> Vec<ActorId> {
        self.ring.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn actors(n: usize) -> Vec<ActorId> {
        (0..n).map(|i| ActorId::new(format!("a{i}"))).collect()
    }

    #[test]
    fn rotation_visits_each_member_once_per_round() {
        let ids = actors(3);
        let mut ring = RoundRobin::default();
        for id in &ids {
            assert!(ring.insert(id.clone()));
        }

        let picked: Vec<ActorId> = (0..9).filter_map(|_| ring.rotate()).collect();
        for (i, id) in picked.iter().enumerate() {
            assert_eq!(id, &ids[i % 3], "send {i}");
        }
        assert_eq!(ring.members(), ids);
    }

    #[test]
    fn duplicate_insert_is_ignored() {
        let ids = actors(1);
        let mut ring = RoundRobin::default();
        assert!(ring.insert(ids[0].clone()));
        assert!(!ring.insert(ids[0].clone()));
        assert_eq!(ring.members(), ids);
    }

    #[test]
    fn remove_keeps_remaining_order() {
        let ids = actors(3);
        let mut ring = RoundRobin::default();
        for id in &ids {
            ring.insert(id.clone());
        }
        assert_eq!(ring.rotate().as_ref(), Some(&ids[0]));

        assert!(ring.remove(&ids[1]));
        assert!(!ring.remove(&ids[1]));
        assert_eq!(ring.members(), vec![ids[2].clone(), ids[0].clone()]);
        assert_eq!(ring.rotate().as_ref(), Some(&ids[2]));
    }

    #[test]
    fn empty_ring_selects_nobody() {
        let mut ring = RoundRobin::default();
        assert!(ring.is_empty());
        assert!(ring.rotate().is_none());
    }
}
