/*!
 * Time Arithmetic
 * Signed nanosecond timestamps in the configured clock domain
 */

/// Absolute time or duration in nanoseconds
///
/// Signed so that "before the base time" arithmetic stays well defined.
pub type Nanos = i64;

/// Sentinel for "never" (gate never closes, timer disarmed)
pub const KTIME_MAX: Nanos = i64::MAX;

/// Nanoseconds per second
pub const NSEC_PER_SEC: i64 = 1_000_000_000;

/// Picoseconds per nanosecond
pub const PSEC_PER_NSEC: i64 = 1_000;

/// Add a non-negative offset, saturating at [`KTIME_MAX`]
#[inline(always)]
pub fn add_ns(time: Nanos, delta: i64) -> Nanos {
    time.saturating_add(delta)
}

/// Remainder of `(time - base) / cycle` with truncating semantics
///
/// A time before `base` yields a negative remainder, which keeps the
/// interval walk anchored to the same cycle boundary the division picked.
#[inline]
pub fn cycle_elapsed(time: Nanos, base: Nanos, cycle: i64) -> i64 {
    if cycle <= 0 {
        return 0;
    }
    ((time as i128 - base as i128) % cycle as i128) as i64
}
