/*!
 * Lock-Free Shaper Statistics
 * Atomic counters for zero-contention stats tracking in enqueue/dequeue paths
 */

use crate::core::errors::DropReason;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic shaper statistics
///
/// # Performance
/// - Cache-line aligned to prevent false sharing
/// - All operations use relaxed ordering
/// - Read-only snapshot requires no synchronization
#[repr(C, align(64))]
pub struct AtomicShaperStats {
    enqueued: AtomicU64,
    dequeued: AtomicU64,
    dequeued_bytes: AtomicU64,
    dropped: [AtomicU64; DropReason::ALL.len()],
    segmented: AtomicU64,
    advances: AtomicU64,
    swaps: AtomicU64,
    backlog_packets: AtomicU64,
    backlog_bytes: AtomicU64,
}

impl AtomicShaperStats {
    #[inline]
    pub const fn new() -> Self {
        Self {
            enqueued: AtomicU64::new(0),
            dequeued: AtomicU64::new(0),
            dequeued_bytes: AtomicU64::new(0),
            dropped: [
                AtomicU64::new(0),
                AtomicU64::new(0),
                AtomicU64::new(0),
                AtomicU64::new(0),
                AtomicU64::new(0),
                AtomicU64::new(0),
            ],
            segmented: AtomicU64::new(0),
            advances: AtomicU64::new(0),
            swaps: AtomicU64::new(0),
            backlog_packets: AtomicU64::new(0),
            backlog_bytes: AtomicU64::new(0),
        }
    }

    /// Record an accepted packet
    ///
    /// # Performance
    /// Hot path - called on every successful enqueue
    #[inline(always)]
    pub fn record_enqueue(&self, len: usize) {
        self.enqueued.fetch_add(1, Ordering::Relaxed);
        self.backlog_packets.fetch_add(1, Ordering::Relaxed);
        self.backlog_bytes.fetch_add(len as u64, Ordering::Relaxed);
    }

    /// Record a transmitted packet
    ///
    /// # Performance
    /// Hot path - called on every successful dequeue
    #[inline(always)]
    pub fn record_dequeue(&self, len: usize) {
        self.dequeued.fetch_add(1, Ordering::Relaxed);
        self.dequeued_bytes.fetch_add(len as u64, Ordering::Relaxed);
        let _ = self
            .backlog_packets
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| Some(v.saturating_sub(1)));
        let _ = self
            .backlog_bytes
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| {
                Some(v.saturating_sub(len as u64))
            });
    }

    #[inline(always)]
    pub fn record_drop(&self, reason: DropReason) {
        self.dropped[reason.index()].fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_segmented(&self) {
        self.segmented.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_advance(&self) {
        self.advances.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_swap(&self) {
        self.swaps.fetch_add(1, Ordering::Relaxed);
    }

    /// Forget the backlog after the queues were flushed
    pub fn clear_backlog(&self) {
        self.backlog_packets.store(0, Ordering::Relaxed);
        self.backlog_bytes.store(0, Ordering::Relaxed);
    }

    pub fn dropped(&self, reason: DropReason) -> u64 {
        self.dropped[reason.index()].load(Ordering::Relaxed)
    }

    /// Get snapshot of current stats (no locks required)
    ///
    /// # Note
    /// Values may not be perfectly consistent with each other due to concurrent updates,
    /// but each individual value is accurate. This is acceptable for monitoring.
    pub fn snapshot(&self) -> ShaperStats {
        let dropped: BTreeMap<&'static str, u64> = DropReason::ALL
            .iter()
            .map(|reason| (reason.as_str(), self.dropped(*reason)))
            .collect();
        ShaperStats {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            dequeued: self.dequeued.load(Ordering::Relaxed),
            dequeued_bytes: self.dequeued_bytes.load(Ordering::Relaxed),
            dropped_total: dropped.values().sum(),
            dropped,
            segmented: self.segmented.load(Ordering::Relaxed),
            advances: self.advances.load(Ordering::Relaxed),
            swaps: self.swaps.load(Ordering::Relaxed),
            backlog_packets: self.backlog_packets.load(Ordering::Relaxed),
            backlog_bytes: self.backlog_bytes.load(Ordering::Relaxed),
        }
    }
}

impl Default for AtomicShaperStats {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for AtomicShaperStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.snapshot().fmt(f)
    }
}

/// Point-in-time statistics
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct ShaperStats {
    pub enqueued: u64,
    pub dequeued: u64,
    pub dequeued_bytes: u64,
    pub dropped_total: u64,
    pub dropped: BTreeMap<&'static str, u64>,
    pub segmented: u64,
    pub advances: u64,
    pub swaps: u64,
    pub backlog_packets: u64,
    pub backlog_bytes: u64,
}
