/*!
 * Error Types
 * Centralized error handling with thiserror, miette, and serde support
 */

use super::clock::ClockDomain;
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration rejections, raised before any state is touched
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum ConfigError {
    #[error("There should be at least one entry in the schedule")]
    #[diagnostic(
        code(config::empty_schedule),
        help("Add at least one entry with a gate_mask and an interval.")
    )]
    EmptySchedule,

    #[error("Invalid interval for schedule entry {index}: {interval}ns is shorter than {minimum}ns")]
    #[diagnostic(
        code(config::interval_too_short),
        help("Every interval must fit at least one minimum-size frame at the current link rate.")
    )]
    IntervalTooShort {
        index: u32,
        interval: u32,
        minimum: i64,
    },

    #[error("'cycle_time' can never be 0")]
    #[diagnostic(
        code(config::zero_cycle_time),
        help("Give a positive cycle_time or non-zero entry intervals.")
    )]
    ZeroCycleTime,

    #[error("'cycle_time' {0} is out of range")]
    #[diagnostic(
        code(config::cycle_time_range),
        help("cycle_time must be between 1ns and 2147483647ns.")
    )]
    CycleTimeOutOfRange(i64),

    #[error("'cycle_time_extension' {0} is negative")]
    #[diagnostic(code(config::negative_extension))]
    NegativeExtension(i64),

    #[error("Schedule entry index {0} is used more than once")]
    #[diagnostic(
        code(config::index_collision),
        help("Entry indices must be unique within a schedule.")
    )]
    IndexCollision(u32),

    #[error("Specified 'flags' are not valid: {0}")]
    #[diagnostic(
        code(config::invalid_flags),
        help("txtime_assist and full_offload are mutually exclusive.")
    )]
    InvalidFlags(String),

    #[error("Changing 'flags' of a running schedule is not supported")]
    #[diagnostic(code(config::flags_changed))]
    FlagsChanged,

    #[error("txtime-delay can only be set when txtime-assist mode is enabled")]
    #[diagnostic(code(config::txtime_delay_without_assist))]
    TxtimeDelayWithoutAssist,

    #[error("Specifying a 'clock' is mandatory")]
    #[diagnostic(code(config::missing_clock))]
    MissingClock,

    #[error("Changing the 'clock' of a running schedule is not supported ({from:?} -> {to:?})")]
    #[diagnostic(code(config::clock_changed))]
    ClockChanged { from: ClockDomain, to: ClockDomain },

    #[error("Full offload is not supported by this device")]
    #[diagnostic(
        code(config::offload_unsupported),
        help("Run the schedule in software or with txtime_assist.")
    )]
    OffloadUnsupported,

    #[error("Invalid queue layout: {0}")]
    #[diagnostic(code(config::invalid_layout))]
    InvalidLayout(String),

    #[error("Could not read configuration: {0}")]
    #[diagnostic(
        code(config::unreadable),
        help("Check that the file exists and contains valid JSON.")
    )]
    Unreadable(String),
}

/// Why a packet was refused at enqueue
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// No open interval can carry the packet
    NoInterval,
    /// Pre-assigned launch time falls outside an open interval
    InvalidLaunchTime,
    /// Larger than the class's max frame length and not segmentable
    Oversized,
    /// Segmentation produced no usable segments
    SegmentationFailed,
    /// Child queue refused the packet
    QueueFull,
    /// Queue mapping points at no transmit queue
    NoQueue,
}

impl DropReason {
    pub const ALL: [DropReason; 6] = [
        DropReason::NoInterval,
        DropReason::InvalidLaunchTime,
        DropReason::Oversized,
        DropReason::SegmentationFailed,
        DropReason::QueueFull,
        DropReason::NoQueue,
    ];

    /// Stable index for per-reason counters
    pub const fn index(self) -> usize {
        match self {
            DropReason::NoInterval => 0,
            DropReason::InvalidLaunchTime => 1,
            DropReason::Oversized => 2,
            DropReason::SegmentationFailed => 3,
            DropReason::QueueFull => 4,
            DropReason::NoQueue => 5,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            DropReason::NoInterval => "no_interval",
            DropReason::InvalidLaunchTime => "invalid_launch_time",
            DropReason::Oversized => "oversized",
            DropReason::SegmentationFailed => "segmentation_failed",
            DropReason::QueueFull => "queue_full",
            DropReason::NoQueue => "no_queue",
        }
    }
}

impl std::fmt::Display for DropReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unified shaper error with miette diagnostics
#[derive(Error, Debug, Diagnostic)]
pub enum ShaperError {
    #[error("Configuration error: {0}")]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error("Not supported: {0}")]
    #[diagnostic(
        code(shaper::not_supported),
        help("This shaper only operates as the root scheduler.")
    )]
    Unsupported(String),

    #[error("Advance task is no longer running")]
    #[diagnostic(
        code(shaper::task_stopped),
        help("The task was shut down or aborted. Spawn a new ShaperTask.")
    )]
    TaskStopped,
}

/// Result type for shaper operations
pub type Result<T> = std::result::Result<T, ShaperError>;
