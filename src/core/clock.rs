/*!
 * Clock Adapter
 * Maps a monotonic read onto the configured time domain
 */

use super::time::{Nanos, NSEC_PER_SEC};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::sync::atomic::{AtomicI64, AtomicU8, Ordering};
use std::sync::OnceLock;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// TAI is ahead of UTC by this many seconds (since 2017-01-01)
pub const TAI_UTC_OFFSET_SECS: i64 = 37;

/// Time domain a schedule's base_time is expressed in
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClockDomain {
    Realtime = 1,
    Monotonic = 2,
    Boottime = 3,
    Tai = 4,
}

impl ClockDomain {
    /// Parse from string representation
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "realtime" | "clock_realtime" => Ok(Self::Realtime),
            "monotonic" | "clock_monotonic" => Ok(Self::Monotonic),
            "boottime" | "clock_boottime" => Ok(Self::Boottime),
            "tai" | "clock_tai" => Ok(Self::Tai),
            _ => Err(format!(
                "Invalid clock '{}'. Valid: realtime, monotonic, boottime, tai",
                s
            )),
        }
    }

    #[inline(always)]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Realtime => "realtime",
            Self::Monotonic => "monotonic",
            Self::Boottime => "boottime",
            Self::Tai => "tai",
        }
    }

    const fn from_u8(raw: u8) -> Option<Self> {
        match raw {
            1 => Some(Self::Realtime),
            2 => Some(Self::Monotonic),
            3 => Some(Self::Boottime),
            4 => Some(Self::Tai),
            _ => None,
        }
    }
}

impl Serialize for ClockDomain {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ClockDomain {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_str(&s).map_err(serde::de::Error::custom)
    }
}

/// Source of monotonic time plus per-domain offsets
pub trait Clock: Send + Sync {
    /// Monotonic nanoseconds
    fn monotonic_ns(&self) -> Nanos;

    /// Offset to add to a monotonic reading to land in `domain`
    fn domain_offset(&self, domain: ClockDomain) -> Nanos;
}

fn process_anchor() -> &'static (Instant, Nanos) {
    static ANCHOR: OnceLock<(Instant, Nanos)> = OnceLock::new();
    ANCHOR.get_or_init(|| {
        let wall = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as Nanos)
            .unwrap_or(0);
        (Instant::now(), wall)
    })
}

/// Host clock backed by `Instant` and `SystemTime`
///
/// Boottime is reported equal to monotonic; suspend time is not tracked.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn monotonic_ns(&self) -> Nanos {
        process_anchor().0.elapsed().as_nanos() as Nanos
    }

    fn domain_offset(&self, domain: ClockDomain) -> Nanos {
        let wall_at_anchor = process_anchor().1;
        match domain {
            ClockDomain::Monotonic | ClockDomain::Boottime => 0,
            ClockDomain::Realtime => wall_at_anchor,
            ClockDomain::Tai => wall_at_anchor + TAI_UTC_OFFSET_SECS * NSEC_PER_SEC,
        }
    }
}

/// Hand-driven clock for tests and simulations
///
/// Every domain shares the same offset so schedules can be written in
/// plain nanoseconds regardless of the configured domain.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
    offset: AtomicI64,
}

impl ManualClock {
    pub fn new(start: Nanos) -> Self {
        Self {
            now: AtomicI64::new(start),
            offset: AtomicI64::new(0),
        }
    }

    pub fn set(&self, now: Nanos) {
        self.now.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, delta: Nanos) -> Nanos {
        self.now.fetch_add(delta, Ordering::SeqCst) + delta
    }

    /// Shift every non-monotonic domain by `offset`
    pub fn set_domain_offset(&self, offset: Nanos) {
        self.offset.store(offset, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn monotonic_ns(&self) -> Nanos {
        self.now.load(Ordering::SeqCst)
    }

    fn domain_offset(&self, domain: ClockDomain) -> Nanos {
        match domain {
            ClockDomain::Monotonic => 0,
            _ => self.offset.load(Ordering::SeqCst),
        }
    }
}

/// Clock plus the domain chosen by configuration
///
/// The domain is written once by the first accepted configuration and read
/// lock-free on every enqueue/dequeue.
pub struct ClockAdapter {
    clock: std::sync::Arc<dyn Clock>,
    domain: AtomicU8,
}

impl ClockAdapter {
    pub fn new(clock: std::sync::Arc<dyn Clock>) -> Self {
        Self {
            clock,
            domain: AtomicU8::new(0),
        }
    }

    /// Configured domain, if any
    #[inline]
    pub fn domain(&self) -> Option<ClockDomain> {
        ClockDomain::from_u8(self.domain.load(Ordering::Acquire))
    }

    pub(crate) fn set_domain(&self, domain: ClockDomain) {
        self.domain.store(domain as u8, Ordering::Release);
    }

    /// Convert a monotonic timestamp into the configured domain
    ///
    /// Without a configured domain the reading stays monotonic.
    #[inline]
    pub fn mono_to_domain(&self, mono: Nanos) -> Nanos {
        match self.domain() {
            None => mono,
            Some(domain) => self.shift(mono, domain),
        }
    }

    /// Current time in `domain`, whatever domain is configured
    pub(crate) fn now_in(&self, domain: ClockDomain) -> Nanos {
        self.shift(self.clock.monotonic_ns(), domain)
    }

    fn shift(&self, mono: Nanos, domain: ClockDomain) -> Nanos {
        match domain {
            ClockDomain::Monotonic => mono,
            _ => mono.saturating_add(self.clock.domain_offset(domain)),
        }
    }

    /// Current time in the configured domain
    ///
    /// # Performance
    /// Hot path - read on every enqueue and dequeue
    #[inline]
    pub fn now(&self) -> Nanos {
        self.mono_to_domain(self.clock.monotonic_ns())
    }
}

impl std::fmt::Debug for ClockAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClockAdapter")
            .field("domain", &self.domain())
            .finish()
    }
}
