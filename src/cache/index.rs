//! Priority Index Module
//!
//! Ordered `(priority, key)` set used by the memory backend for both its
//! expiry order and its recency order.

use std::collections::BTreeSet;

// == Priority Index ==
/// A min-ordered set of `(priority, key)` tuples.
///
/// Unlike a binary heap, a tuple can be removed by value in logarithmic
/// time, which the memory backend needs whenever an entry is touched,
/// replaced or cleared.
#[derive(Debug, Default)]
pub struct PriorityIndex {
    tuples: BTreeSet<(u64, String)>,
}

impl PriorityIndex {
    // == Constructor ==
    /// Creates a new empty index.
    pub fn new() -> Self {
        Self {
            tuples: BTreeSet::new(),
        }
    }

    // == Insert ==
    /// Adds a tuple. Returns false if the exact tuple was already present.
    pub fn insert(&mut self, priority: u64, key: &str) -> bool {
        self.tuples.insert((priority, key.to_string()))
    }

    // == Remove ==
    /// Removes a tuple by value. Returns false if it was not present.
    pub fn remove(&mut self, priority: u64, key: &str) -> bool {
        self.tuples.remove(&(priority, key.to_string()))
    }

    // == Peek ==
    /// Returns the lowest-priority tuple without removing it.
    pub fn peek(&self) -> Option<(u64, &str)> {
        self.tuples.first().map(|(p, k)| (*p, k.as_str()))
    }

    // == Pop ==
    /// Removes and returns the lowest-priority tuple.
    pub fn pop(&mut self) -> Option<(u64, String)> {
        self.tuples.pop_first()
    }

    // == Length ==
    /// Returns the number of tuples.
    pub fn len(&self) -> usize {
        self.tuples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tuples.is_empty()
    }

    // == Clear ==
    pub fn clear(&mut self) {
        self.tuples.clear();
    }

    /// Iterates over the keys, lowest priority first.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.tuples.iter().map(|(_, k)| k.as_str())
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_new() {
        let index = PriorityIndex::new();
        assert!(index.is_empty());
        assert_eq!(index.peek(), None);
    }

    #[test]
    fn test_pop_in_priority_order() {
        let mut index = PriorityIndex::new();
        index.insert(30, "c");
        index.insert(10, "a");
        index.insert(20, "b");

        assert_eq!(index.pop(), Some((10, "a".to_string())));
        assert_eq!(index.pop(), Some((20, "b".to_string())));
        assert_eq!(index.pop(), Some((30, "c".to_string())));
        assert_eq!(index.pop(), None);
    }

    #[test]
    fn test_ties_break_on_key() {
        let mut index = PriorityIndex::new();
        index.insert(5, "b");
        index.insert(5, "a");

        assert_eq!(index.peek(), Some((5, "a")));
    }

    #[test]
    fn test_remove_by_value() {
        let mut index = PriorityIndex::new();
        index.insert(1, "a");
        index.insert(2, "b");

        assert!(index.remove(1, "a"));
        assert!(!index.remove(1, "a"));
        // Wrong priority leaves the tuple alone
        assert!(!index.remove(9, "b"));
        assert_eq!(index.len(), 1);
        assert_eq!(index.peek(), Some((2, "b")));
    }

    #[test]
    fn test_reinsert_moves_key() {
        let mut index = PriorityIndex::new();
        index.insert(1, "a");
        index.insert(2, "b");

        // Bump "a" past "b"
        index.remove(1, "a");
        index.insert(3, "a");

        assert_eq!(index.keys().collect::<Vec<_>>(), vec!["b", "a"]);
    }

    #[test]
    fn test_clear() {
        let mut index = PriorityIndex::new();
        index.insert(1, "a");
        index.clear();
        assert!(index.is_empty());
    }
}
