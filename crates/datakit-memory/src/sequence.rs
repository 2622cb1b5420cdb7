//! In-memory sequence provider.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use datakit_core::{Error, Result, Sequence, StorageErrorKind};

/// A process-local [`Sequence`]. Each key is an independent counter.
#[derive(Debug, Default)]
pub struct MemorySequence {
    counters: Mutex<HashMap<String, i64>>,
}

impl MemorySequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of `key`, if it has been reserved from.
    pub fn current(&self, key: &str) -> Option<i64> {
        self.counters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .copied()
    }

    /// Forget `key` so its next reservation starts from the seed again.
    pub fn reset(&self, key: &str) -> bool {
        self.counters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
            .is_some()
    }
}

impl Sequence for MemorySequence {
    fn increment(&self, key: &str, step: i64, seed: i64) -> Result<i64> {
        let mut counters = self.counters.lock().map_err(|_| {
            Error::storage(StorageErrorKind::Other, "sequence lock poisoned")
        })?;
        let counter = counters.entry(key.to_string()).or_insert(seed);
        *counter = counter.checked_add(step).ok_or_else(|| {
            Error::storage(
                StorageErrorKind::Other,
                format!("sequence '{}' overflowed", key),
            )
        })?;
        Ok(*counter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_first_value_is_seed_plus_step() {
        let sequence = MemorySequence::new();
        assert_eq!(sequence.increment("a", 1, 100).unwrap(), 101);
        assert_eq!(sequence.increment("a", 1, 100).unwrap(), 102);
        assert_eq!(sequence.increment("b", 5, 0).unwrap(), 5);
        assert_eq!(sequence.decrement("b", 2, 0).unwrap(), 3);
        assert_eq!(sequence.current("a"), Some(102));
        assert!(sequence.reset("a"));
        assert_eq!(sequence.current("a"), None);
    }

    #[test]
    fn test_concurrent_reservations_are_unique() {
        let sequence = Arc::new(MemorySequence::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let sequence = Arc::clone(&sequence);
                thread::spawn(move || {
                    (0..100)
                        .map(|_| sequence.increment("k", 1, 0).unwrap())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut values: Vec<i64> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        values.sort_unstable();
        values.dedup();
        assert_eq!(values.len(), 800);
        assert_eq!(values.last(), Some(&800));
    }
}
