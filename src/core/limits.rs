/*!
 * Shaper Limits and Constants
 *
 * Centralized location for limits, defaults, and magic numbers.
 * Organized by domain for maintainability and discoverability.
 *
 * - Performance-critical constants are marked with [PERF]
 * - Values shared with the 802.1Q traffic-control model are marked with [QBV]
 */

// =============================================================================
// TRAFFIC CLASSES AND QUEUES
// =============================================================================

/// Maximum number of traffic classes (and transmit queues)
/// [QBV] Gate masks are 32-bit but only the low 16 classes are usable
pub const TC_MAX_QUEUE: usize = 16;

/// Number of skb-style priorities mapped onto traffic classes
pub const TC_BITMASK: usize = 15;

/// Gate mask meaning "every class open" (schedule not started yet)
pub const ALL_GATES_OPEN: u32 = u32::MAX;

/// Default per-queue packet limit for the built-in FIFOs
pub const DEFAULT_QUEUE_LIMIT: usize = 1000;

// =============================================================================
// FRAME SIZES
// =============================================================================

/// Minimum Ethernet frame without FCS (60 bytes)
/// [QBV] Every interval must be able to carry one such frame
pub const ETH_ZLEN: usize = 60;

/// Ethernet header length used as default hard header length
pub const ETH_HLEN: u32 = 14;

/// Default device MTU
pub const DEFAULT_MTU: u32 = 1500;

/// Default device max MTU (jumbo frames)
pub const DEFAULT_MAX_MTU: u32 = 9000;

// =============================================================================
// LINK RATE
// =============================================================================

/// Fallback link speed when the rate is unknown (10 Mbit/s)
/// Conservative: overestimates transmission time rather than underestimating
pub const FALLBACK_SPEED_MBPS: u32 = 10;

/// Picoseconds per byte at 1 Mbit/s (8 bits * 1e6 ps)
pub const PICOS_PER_BYTE_AT_1MBPS: i64 = 8_000_000;

// =============================================================================
// SCHEDULE LIMITS
// =============================================================================

/// Largest accepted cycle time (i32::MAX ns, ~2.1s)
pub const MAX_CYCLE_TIME: i64 = i32::MAX as i64;

/// Budget sentinel for classes whose gate never closes
pub const INFINITE_BUDGET: i32 = i32::MAX;

/// Upper bound on pacing iterations per packet
/// [PERF] Guards against a corrupted schedule spinning the enqueue path
pub const MAX_PACING_ITERATIONS: usize = 64;

/// Upper bound on catch-up firings handled in one actor wakeup
pub const MAX_CATCHUP_FIRINGS: usize = 4096;
