use std::collections::{BinaryHeap, HashSet};
use std::hash::Hash;

/// A min-priority queue that returns at most one item per derived key.
///
/// The first extraction for a key wins; any later entry with the same key
/// is silently discarded when it reaches the top of the heap. In a
/// Dijkstra-style search this replaces the usual visited set plus
/// decrease-key: every relaxation is pushed, and each oriented node comes
/// back out exactly once, with its best distance.
///
/// Items must carry a total order with the *smallest* item comparing
/// greatest (so `BinaryHeap` pops minima first); ties should be broken by
/// key so pop order is deterministic.
pub struct FilteredPriorityQueue<T, K, F>
where
    T: Ord,
    K: Eq + Hash,
    F: Fn(&T) -> K,
{
    heap: BinaryHeap<T>,
    emitted: HashSet<K>,
    key_of: F,
}

impl<T, K, F> FilteredPriorityQueue<T, K, F>
where
    T: Ord,
    K: Eq + Hash,
    F: Fn(&T) -> K,
{
    pub fn new(key_of: F) -> Self {
        FilteredPriorityQueue {
            heap: BinaryHeap::new(),
            emitted: HashSet::new(),
            key_of,
        }
    }

    /// Insert an item. Entries whose key has already been extracted are
    /// dropped immediately.
    pub fn push(&mut self, item: T) {
        if !self.emitted.contains(&(self.key_of)(&item)) {
            self.heap.push(item);
        }
    }

    /// Extract the smallest item whose key has not been returned before.
    pub fn pop(&mut self) -> Option<T> {
        while let Some(item) = self.heap.pop() {
            if self.emitted.insert((self.key_of)(&item)) {
                return Some(item);
            }
        }
        None
    }

    /// Drop all pending items and forget which keys were extracted.
    pub fn clear(&mut self) {
        self.heap.clear();
        self.emitted.clear();
    }
}
