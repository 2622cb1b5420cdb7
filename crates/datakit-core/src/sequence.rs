//! Sequence providers and the locator that resolves them.

use std::sync::Arc;

use crate::error::Result;

/// An atomic counter service keyed by string.
///
/// Implementations must make [`increment`](Sequence::increment) indivisible
/// across concurrent callers for the same key.
pub trait Sequence: Send + Sync {
    /// Advance `key` by `step` and return the new value.
    ///
    /// A key seen for the first time starts from `seed`, so the first call
    /// returns `seed + step`.
    fn increment(&self, key: &str, step: i64, seed: i64) -> Result<i64>;

    /// Move `key` back by `step` and return the new value.
    fn decrement(&self, key: &str, step: i64, seed: i64) -> Result<i64> {
        self.increment(key, -step, seed)
    }
}

/// Resolves collaborators a data service needs at construction.
pub trait ServiceProvider {
    /// The sequence registered under `name`, or the default one when `name`
    /// is `None`.
    fn sequence(&self, name: Option<&str>) -> Option<Arc<dyn Sequence>>;
}

impl<P: ServiceProvider + ?Sized> ServiceProvider for Arc<P> {
    fn sequence(&self, name: Option<&str>) -> Option<Arc<dyn Sequence>> {
        (**self).sequence(name)
    }
}

impl<P: ServiceProvider + ?Sized> ServiceProvider for &P {
    fn sequence(&self, name: Option<&str>) -> Option<Arc<dyn Sequence>> {
        (**self).sequence(name)
    }
}
