/*!
 * Core Module
 * Time, clocks, errors, limits and the RCU cell shared by every component
 */

pub mod clock;
pub mod errors;
pub mod limits;
pub mod rcu;
pub mod time;

// Re-export for convenience
pub use clock::{Clock, ClockAdapter, ClockDomain, ManualClock, SystemClock};
pub use errors::*;
pub use rcu::RcuCell;
pub use time::{Nanos, KTIME_MAX};
