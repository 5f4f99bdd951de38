/*!
 * Link Rate
 * Process-wide transmission rate shared by every reader through one atomic
 */

use crate::core::limits::{FALLBACK_SPEED_MBPS, PICOS_PER_BYTE_AT_1MBPS};
use crate::core::time::PSEC_PER_NSEC;
use std::sync::atomic::{AtomicI64, Ordering};
use tracing::{debug, warn};

/// Link rate stored as picoseconds per byte
///
/// Picoseconds keep precision at 10Gbps+ where a byte takes less than a
/// nanosecond.
#[derive(Debug)]
pub struct LinkRate {
    picos_per_byte: AtomicI64,
}

impl LinkRate {
    /// Rate for a known speed, or the fallback when `None`
    pub fn new(speed_mbps: Option<u32>) -> Self {
        let rate = Self {
            picos_per_byte: AtomicI64::new(picos_for(FALLBACK_SPEED_MBPS)),
        };
        rate.set_speed(speed_mbps);
        rate
    }

    /// Apply a new link speed
    ///
    /// Unknown or zero speeds fall back to 10 Mbit/s. Returns the speed
    /// actually applied.
    pub fn set_speed(&self, speed_mbps: Option<u32>) -> u32 {
        let speed = match speed_mbps {
            Some(speed) if speed > 0 => speed,
            _ => {
                warn!(
                    fallback_mbps = FALLBACK_SPEED_MBPS,
                    "link speed unknown, using conservative fallback"
                );
                FALLBACK_SPEED_MBPS
            }
        };
        let picos = picos_for(speed);
        self.picos_per_byte.store(picos, Ordering::Release);
        debug!(speed_mbps = speed, picos_per_byte = picos, "link rate updated");
        speed
    }

    #[inline(always)]
    pub fn picos_per_byte(&self) -> i64 {
        self.picos_per_byte.load(Ordering::Acquire)
    }

    /// Nanoseconds needed to put `len` bytes on the wire
    ///
    /// # Performance
    /// Hot path - called for every packet on enqueue and dequeue
    #[inline(always)]
    pub fn length_to_duration(&self, len: usize) -> i64 {
        (len as i64).saturating_mul(self.picos_per_byte()) / PSEC_PER_NSEC
    }

    /// Bytes that fit in `duration` nanoseconds
    #[inline]
    pub fn duration_to_length(&self, duration: u64) -> u64 {
        let picos = self.picos_per_byte().max(1) as u64;
        duration.saturating_mul(PSEC_PER_NSEC as u64) / picos
    }
}

impl Default for LinkRate {
    fn default() -> Self {
        Self::new(None)
    }
}

#[inline]
fn picos_for(speed_mbps: u32) -> i64 {
    PICOS_PER_BYTE_AT_1MBPS / speed_mbps.max(1) as i64
}
