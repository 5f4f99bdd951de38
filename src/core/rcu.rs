/*!
 * Read-Copy-Update (RCU) Cell
 * Lock-free snapshot reads with deferred reclamation of replaced values
 */

use arc_swap::ArcSwap;
use std::sync::Arc;

/// RCU-protected value with lock-free reads
///
/// Readers take an `Arc` snapshot; a value replaced by [`RcuCell::publish`]
/// stays alive until the last reader holding it drops its snapshot. This is
/// the grace period: a superseded schedule is never freed under a reader.
///
/// Writers must serialize among themselves (the shaper holds its
/// `current_entry_lock` while publishing).
///
/// # Performance
///
/// - **Reads**: atomic pointer load plus refcount increment
/// - **Writes**: allocate-and-swap
pub struct RcuCell<T> {
    inner: ArcSwap<T>,
}

impl<T> RcuCell<T> {
    #[inline]
    pub fn new(value: T) -> Self {
        Self {
            inner: ArcSwap::from_pointee(value),
        }
    }

    /// Consistent snapshot of the current value
    #[inline(always)]
    pub fn load(&self) -> Arc<T> {
        self.inner.load_full()
    }

    /// Replace the value; readers holding the old one keep it alive
    #[inline]
    pub fn publish(&self, value: T) {
        self.inner.store(Arc::new(value));
    }

    /// Replace the value and hand back the previous snapshot
    #[inline]
    pub fn replace(&self, value: T) -> Arc<T> {
        self.inner.swap(Arc::new(value))
    }
}

impl<T: Default> Default for RcuCell<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for RcuCell<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("RcuCell").field(&*self.load()).finish()
    }
}
