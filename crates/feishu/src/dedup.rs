use std::collections::{HashSet, VecDeque};

/// Maximum number of message IDs remembered for duplicate suppression.
pub const MAX_PROCESSED: usize = 5000;

/// Bounded set of recently processed message IDs.
///
/// Eviction is strictly by insertion order: once full, recording a new ID
/// drops the oldest one. Looking an ID up never refreshes its position.
#[derive(Debug, Clone)]
pub struct DedupCache {
    order: VecDeque<String>,
    index: HashSet<String>,
    capacity: usize,
}

impl DedupCache {
    pub fn new() -> Self {
        Self::with_capacity(MAX_PROCESSED)
    }

    /// Create a cache holding at most `capacity` IDs (at least one).
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            order: VecDeque::with_capacity(capacity),
            index: HashSet::with_capacity(capacity),
            capacity,
        }
    }

    pub fn seen(&self, id: &str) -> bool {
        self.index.contains(id)
    }

    /// Remember `id`. Returns `false` if it was already present, in which case
    /// nothing changes.
    pub fn record(&mut self, id: &str) -> bool {
        if self.index.contains(id) {
            return false;
        }
        self.index.insert(id.to_string());
        self.order.push_back(id.to_string());
        if self.order.len() > self.capacity
            && let Some(oldest) = self.order.pop_front()
        {
            self.index.remove(&oldest);
        }
        true
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.index.clear();
    }
}

impl Default for DedupCache {
    fn default() -> Self {
        Self::new()
    }
}
