use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

/// A value ranked by a numeric key. Equal keys fall back to the value's own
/// ordering so the retained set never depends on insertion order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedItem<K, V> {
    pub order_key: K,
    pub value: V,
}

impl<K: Ord, V: Ord> PartialOrd for RankedItem<K, V> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<K: Ord, V: Ord> Ord for RankedItem<K, V> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.order_key
            .cmp(&other.order_key)
            .then_with(|| self.value.cmp(&other.value))
    }
}

/// Keeps the `capacity` largest items pushed into it.
///
/// Backed by a min-heap of at most `capacity` entries, so each push is
/// O(log K) and a full selector rejects anything not larger than its minimum.
#[derive(Debug, Clone)]
pub struct TopK<K, V> {
    capacity: usize,
    heap: BinaryHeap<Reverse<RankedItem<K, V>>>,
}

impl<K: Ord, V: Ord> TopK<K, V> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            heap: BinaryHeap::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, order_key: K, value: V) {
        if self.capacity == 0 {
            return;
        }

        let item = RankedItem { order_key, value };
        if self.heap.len() < self.capacity {
            self.heap.push(Reverse(item));
            return;
        }

        if let Some(mut smallest) = self.heap.peek_mut() {
            if item > smallest.0 {
                *smallest = Reverse(item);
            }
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Retained items, largest first.
    pub fn sorted_desc(&self) -> Vec<&RankedItem<K, V>> {
        let mut items: Vec<_> = self.heap.iter().map(|r| &r.0).collect();
        items.sort_by(|a, b| b.cmp(a));
        items
    }
}
