//! Array-backed binary min-heap with in-place key updates.
//!
//! Items are identified by a [`Keyed::key`] that stays stable while their ordering fields
//! change. A key → slot map is maintained on every swap, so repositioning an item after its
//! priority changed costs `O(log n)` instead of a linear scan.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

/// Identity of a heap item, independent of its ordering fields.
///
/// `key` is called on every swap; keys should be cheap to produce.
pub trait Keyed {
    type Key: Eq + Hash + Clone;

    fn key(&self) -> Self::Key;
}

/// Min-heap ordered by an injected comparator.
///
/// At most one item per key is stored: inserting an item whose key is already present
/// replaces the stored item.
pub struct IndexedMinHeap<T: Keyed, F> {
    items: Vec<T>,
    slots: HashMap<T::Key, usize>,
    compare: F,
}

impl<T, F> IndexedMinHeap<T, F>
where
    T: Keyed,
    F: Fn(&T, &T) -> Ordering,
{
    pub fn new(compare: F) -> Self {
        Self::with_capacity(0, compare)
    }

    pub fn with_capacity(capacity: usize, compare: F) -> Self {
        Self {
            items: Vec::with_capacity(capacity),
            slots: HashMap::with_capacity(capacity),
            compare,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, key: &T::Key) -> bool {
        self.slots.contains_key(key)
    }

    pub fn get(&self, key: &T::Key) -> Option<&T> {
        self.slots.get(key).map(|&slot| &self.items[slot])
    }

    /// The item that [`Self::extract_min`] would return next.
    pub fn peek(&self) -> Option<&T> {
        self.items.first()
    }

    /// Items in heap (not sorted) order.
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn insert(&mut self, item: T) {
        let key = item.key();
        if let Some(&slot) = self.slots.get(&key) {
            self.items[slot] = item;
            self.reposition(slot);
            return;
        }

        let slot = self.items.len();
        self.items.push(item);
        self.slots.insert(key, slot);
        self.sift_up(slot);
    }

    pub fn extract_min(&mut self) -> Option<T> {
        if self.items.is_empty() {
            return None;
        }
        self.remove_slot(0)
    }

    /// Replaces the stored item with the same key and restores heap order around it.
    ///
    /// Returns `false` (and drops `item`) when no item with that key is present.
    pub fn update(&mut self, item: T) -> bool {
        let Some(&slot) = self.slots.get(&item.key()) else {
            return false;
        };
        self.items[slot] = item;
        self.reposition(slot);
        true
    }

    pub fn remove(&mut self, key: &T::Key) -> Option<T> {
        let slot = *self.slots.get(key)?;
        self.remove_slot(slot)
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.slots.clear();
    }

    /// Drains the heap in ascending order.
    pub fn into_sorted_vec(mut self) -> Vec<T> {
        let mut sorted = Vec::with_capacity(self.items.len());
        while let Some(item) = self.extract_min() {
            sorted.push(item);
        }
        sorted
    }

    fn remove_slot(&mut self, slot: usize) -> Option<T> {
        let last = self.items.len().checked_sub(1)?;
        self.swap(slot, last);
        let removed = self.items.pop()?;
        self.slots.remove(&removed.key());
        if slot < self.items.len() {
            self.reposition(slot);
        }
        Some(removed)
    }

    fn reposition(&mut self, slot: usize) {
        let slot = self.sift_up(slot);
        self.sift_down(slot);
    }

    fn less(&self, a: usize, b: usize) -> bool {
        (self.compare)(&self.items[a], &self.items[b]) == Ordering::Less
    }

    fn sift_up(&mut self, mut slot: usize) -> usize {
        while slot > 0 {
            let parent = (slot - 1) / 2;
            if !self.less(slot, parent) {
                break;
            }
            self.swap(slot, parent);
            slot = parent;
        }
        slot
    }

    fn sift_down(&mut self, mut slot: usize) {
        let len = self.items.len();
        loop {
            let left = 2 * slot + 1;
            let right = left + 1;
            let mut smallest = slot;

            if left < len && self.less(left, smallest) {
                smallest = left;
            }
            if right < len && self.less(right, smallest) {
                smallest = right;
            }
            if smallest == slot {
                break;
            }

            self.swap(slot, smallest);
            slot = smallest;
        }
    }

    fn swap(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        self.items.swap(a, b);
        for slot in [a, b] {
            if let Some(entry) = self.slots.get_mut(&self.items[slot].key()) {
                *entry = slot;
            }
        }
    }
}

impl<T: Keyed + fmt::Debug, F> fmt::Debug for IndexedMinHeap<T, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexedMinHeap")
            .field("len", &self.items.len())
            .field("items", &self.items)
            .finish_non_exhaustive()
    }
}
