#![forbid(unsafe_code)]

//! Insertion-ordered, identity-unique collection of [`Reaction`]s.
//!
//! # Design
//!
//! The ordered sequence lives in a `Vec`; an auxiliary hash index of
//! [`ReactionId`]s gives O(1) membership checks so `add` can ignore
//! duplicates without a scan. Predicate removal is a single compaction pass
//! over the vector that keeps survivors in their relative order.
//!
//! # Invariants
//!
//! 1. `index` contains exactly the ids of the reactions in `reactions`.
//! 2. No id appears twice in `reactions`.
//! 3. Iteration order is insertion order.

use ahash::AHashSet;

use crate::reaction::{Reaction, ReactionId};

/// Ordered set of reactions keyed by identity.
#[derive(Debug, Default)]
pub struct ReactionSet {
    reactions: Vec<Reaction>,
    index: AHashSet<ReactionId>,
}

impl ReactionSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of reactions in the set.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.reactions.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.reactions.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, reaction: &Reaction) -> bool {
        self.index.contains(&reaction.id())
    }

    /// Append `reaction` unless a reaction with the same identity is present.
    ///
    /// Returns `true` if it was added.
    pub fn add(&mut self, reaction: &Reaction) -> bool {
        if self.index.insert(reaction.id()) {
            self.reactions.push(reaction.clone());
            true
        } else {
            false
        }
    }

    /// Remove every reaction matching `predicate`, preserving the order of
    /// the survivors. Returns how many were removed.
    pub fn remove(&mut self, mut predicate: impl FnMut(&Reaction) -> bool) -> usize {
        let before = self.reactions.len();
        let index = &mut self.index;
        self.reactions.retain(|r| {
            if predicate(r) {
                index.remove(&r.id());
                false
            } else {
                true
            }
        });
        before - self.reactions.len()
    }

    /// Remove the reaction with identity `id`, if present.
    pub fn remove_id(&mut self, id: ReactionId) -> bool {
        if !self.index.contains(&id) {
            return false;
        }
        self.remove(|r| r.id() == id) > 0
    }

    /// Drop every disposed reaction. Returns how many were pruned.
    pub fn prune_disposed(&mut self) -> usize {
        self.remove(Reaction::is_disposed)
    }

    /// Visit every reaction in insertion order.
    ///
    /// `f` cannot reach the set it is iterating; callers that need to run
    /// arbitrary code per reaction should iterate a [`snapshot`](Self::snapshot).
    pub fn for_each(&self, f: impl FnMut(&Reaction)) {
        self.reactions.iter().for_each(f);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Reaction> {
        self.reactions.iter()
    }

    /// Clone the current sequence of handles.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Reaction> {
        self.reactions.clone()
    }

    /// Empty both the sequence and the identity index.
    pub fn clear(&mut self) {
        self.index.clear();
        self.reactions.clear();
    }
}

impl<'a> IntoIterator for &'a ReactionSet {
    type Item = &'a Reaction;
    type IntoIter = std::slice::Iter<'a, Reaction>;

    fn into_iter(self) -> Self::IntoIter {
        self.reactions.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(set: &ReactionSet) -> Vec<ReactionId> {
        set.iter().map(Reaction::id).collect()
    }

    #[test]
    fn add_remove_dispose_clear() {
        let mut set = ReactionSet::new();
        assert_eq!(set.len(), 0);

        let r1 = Reaction::new(|| {});
        let r2 = Reaction::new(|| {});
        let r3 = Reaction::new(|| {});

        set.add(&r1);
        assert_eq!(set.len(), 1);
        set.add(&r2);
        assert_eq!(set.len(), 2);
        set.add(&r3);
        set.add(&r3);
        assert_eq!(set.len(), 3);

        set.remove(|r| r.id() == r1.id());
        assert_eq!(set.len(), 2);
        set.for_each(|r| assert_ne!(r.id(), r1.id()));

        r2.dispose();
        set.remove(Reaction::is_disposed);
        assert_eq!(set.len(), 1);
        set.for_each(|r| assert_eq!(r.id(), r3.id()));

        set.clear();
        assert_eq!(set.len(), 0);
        set.for_each(|_| panic!("cleared set must be empty"));
    }

    #[test]
    fn duplicate_add_reports_false() {
        let mut set = ReactionSet::new();
        let r = Reaction::new(|| {});
        assert!(set.add(&r));
        assert!(!set.add(&r.clone()));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn remove_preserves_survivor_order() {
        let mut set = ReactionSet::new();
        let rs: Vec<Reaction> = (0..6).map(|_| Reaction::new(|| {})).collect();
        for r in &rs {
            set.add(r);
        }

        let removed = set.remove(|r| r.id() == rs[1].id() || r.id() == rs[4].id());
        assert_eq!(removed, 2);
        assert_eq!(
            ids(&set),
            vec![rs[0].id(), rs[2].id(), rs[3].id(), rs[5].id()]
        );
    }

    #[test]
    fn removed_reaction_can_be_re_added_at_the_end() {
        let mut set = ReactionSet::new();
        let a = Reaction::new(|| {});
        let b = Reaction::new(|| {});
        set.add(&a);
        set.add(&b);

        assert!(set.remove_id(a.id()));
        assert!(!set.remove_id(a.id()));
        assert!(set.add(&a));
        assert_eq!(ids(&set), vec![b.id(), a.id()]);
    }

    #[test]
    fn prune_disposed_counts() {
        let mut set = ReactionSet::new();
        let a = Reaction::new(|| {});
        let b = Reaction::new(|| {});
        set.add(&a);
        set.add(&b);

        a.dispose();
        assert_eq!(set.prune_disposed(), 1);
        assert_eq!(set.prune_disposed(), 0);
        assert!(!set.contains(&a));
        assert!(set.contains(&b));
    }

    #[test]
    fn snapshot_is_detached() {
        let mut set = ReactionSet::new();
        let a = Reaction::new(|| {});
        set.add(&a);

        let snap = set.snapshot();
        set.clear();
        assert_eq!(snap.len(), 1);
        assert!(set.is_empty());
    }
}
