//! Bounded per-feed memory of recently seen fingerprints.

use crate::models::Fingerprint;

/// Fixed-capacity ring of fingerprints in insertion order.
///
/// While filling, appends go to the end of `data`. Once `data` holds `capacity` values the
/// buffer is `filled` and every append overwrites the oldest slot at `write_index`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecencyCache {
    data: Vec<Fingerprint>,
    capacity: usize,
    write_index: usize,
    filled: bool,
}

impl RecencyCache {
    /// # Panics
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "cache capacity must be at least 1");
        Self {
            data: Vec::with_capacity(capacity),
            capacity,
            write_index: 0,
            filled: false,
        }
    }

    pub fn append(&mut self, fingerprint: Fingerprint) {
        if self.filled {
            self.data[self.write_index] = fingerprint;
            self.write_index = (self.write_index + 1) % self.capacity;
        } else {
            self.data.push(fingerprint);
            if self.data.len() == self.capacity {
                self.filled = true;
                self.write_index = 0;
            }
        }
    }

    pub fn contains(&self, fingerprint: &Fingerprint) -> bool {
        self.data.contains(fingerprint)
    }

    /// Oldest first.
    pub fn values(&self) -> Vec<Fingerprint> {
        if self.filled {
            let (newer, older) = self.data.split_at(self.write_index);
            older.iter().chain(newer).cloned().collect()
        } else {
            self.data.clone()
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Extend<Fingerprint> for RecencyCache {
    fn extend<I: IntoIterator<Item = Fingerprint>>(&mut self, iter: I) {
        for fingerprint in iter {
            self.append(fingerprint);
        }
    }
}
