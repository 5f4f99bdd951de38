/*!
 * Time-Aware Shaper Library
 * Gate-scheduled packet transmission over per-class queues
 */

pub mod core;
pub mod device;
pub mod monitoring;
pub mod packet;
pub mod queue;
pub mod schedule;
pub mod shaper;

// Re-exports
pub use crate::core::errors::{ConfigError, DropReason, ShaperError};
pub use crate::core::{Clock, ClockAdapter, ClockDomain, ManualClock, Nanos, SystemClock, KTIME_MAX};
pub use device::DeviceProfile;
pub use monitoring::{init_tracing, ShaperStats};
pub use packet::{GsoInfo, Packet};
pub use queue::{FifoQueue, QueueLayout, TcRange, TxQueue};
pub use schedule::{
    EntryConfig, GateCommand, ScheduleEntry, ScheduleGateList, ShaperConfig, ShaperFlags, ShaperMode,
};
pub use shaper::{
    DequeuePolicy, EnqueueOutcome, LinkRate, LocateMode, Shaper, ShaperBuilder, ShaperDump, ShaperTask,
};
