//! The stack of pairs assumed related while their unfolding is in progress.
//!
//! A pair pushed on the stack may be used to close a loop only once a matched
//! step or effect pair has been observed below it. [`Guard`] is how that is
//! tracked: it counts the hypotheses, from the bottom of the stack, that are
//! usable at a given point of the search.

use std::collections::HashMap;

use crate::event::Event;
use crate::ids::NodeId;
use crate::tree::Tree;

/// Key of a pair of trees: the ids of the nodes holding their shapes.
pub type PairKey = (NodeId, NodeId);

pub fn pair_key<E: Event, A, B>(a: &Tree<E, A>, b: &Tree<E, B>) -> PairKey {
    (a.resolved_id(), b.resolved_id())
}

/// Number of hypotheses usable at some point of the search.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Guard(usize);

impl Guard {
    /// No hypothesis may be used.
    pub const NONE: Guard = Guard(0);

    pub fn level(self) -> usize {
        self.0
    }
}

/// Result of looking a pair up.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Lookup {
    /// Assumed, and usable at the given guard.
    Usable,
    /// Assumed, but no matched step separates it from the lookup.
    Unguarded,
    Absent,
}

struct Entry<E: Event, A, B> {
    key: PairKey,
    left: Tree<E, A>,
    right: Tree<E, B>,
}

pub struct Hypotheses<E: Event, A, B> {
    entries: Vec<Entry<E, A, B>>,
    /// Earliest stack position of each key.
    index: HashMap<PairKey, usize>,
}

impl<E: Event, A, B> Default for Hypotheses<E, A, B> {
    fn default() -> Self {
        Hypotheses {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<E: Event, A, B> Hypotheses<E, A, B> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Guard under which every hypothesis currently on the stack is usable.
    ///
    /// Taken right after a step or effect pair has been matched.
    pub fn guarded(&self) -> Guard {
        Guard(self.entries.len())
    }

    pub fn lookup(&self, key: PairKey, guard: Guard) -> Lookup {
        match self.index.get(&key) {
            Some(&pos) if pos < guard.0 => Lookup::Usable,
            Some(_) => Lookup::Unguarded,
            None => Lookup::Absent,
        }
    }

    pub fn push(&mut self, key: PairKey, left: Tree<E, A>, right: Tree<E, B>) {
        let pos = self.entries.len();
        self.index.entry(key).or_insert(pos);
        self.entries.push(Entry { key, left, right });
    }

    pub fn pop(&mut self) {
        let Some(entry) = self.entries.pop() else {
            return;
        };
        let pos = self.entries.len();
        if self.index.get(&entry.key) == Some(&pos) {
            self.index.remove(&entry.key);
        }
    }

    /// Pop down to `len` entries.
    pub fn truncate(&mut self, len: usize) {
        while self.entries.len() > len {
            self.pop();
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
    }

    /// Hypotheses usable under `guard`, oldest first.
    pub fn usable(&self, guard: Guard) -> impl Iterator<Item = (&Tree<E, A>, &Tree<E, B>)> + '_ {
        let end = guard.0.min(self.entries.len());
        self.entries[..end]
            .iter()
            .map(|entry| (&entry.left, &entry.right))
    }
}
