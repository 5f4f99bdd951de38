/*!
 * Schedule Module
 * Gate control lists: configuration, parsed entries and derived timing
 */

pub mod config;
pub mod durations;
pub mod entry;
pub mod gate_list;

pub use config::{EntryConfig, GateCommand, ShaperConfig, ShaperFlags, ShaperMode};
pub use durations::{gate_durations, GateDurations};
pub use entry::{EntrySnapshot, ScheduleEntry};
pub use gate_list::{GateListSnapshot, ScheduleGateList};
