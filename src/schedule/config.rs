/*!
 * Shaper Configuration
 * Serde-loadable description of one schedule install
 */

use crate::core::clock::ClockDomain;
use crate::core::errors::ConfigError;
use crate::core::limits::TC_MAX_QUEUE;
use crate::core::time::Nanos;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Gate operation recorded on an entry
///
/// Only `SetGates` changes software behaviour; hold/release are kept for
/// dumps and for hardware that implements frame preemption.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateCommand {
    #[default]
    SetGates,
    SetAndHold,
    SetAndRelease,
}

/// One `(gate_mask, interval)` step of a schedule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryConfig {
    /// Explicit ordinal; defaults to the position in the list
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<u32>,
    #[serde(default)]
    pub command: GateCommand,
    /// Bit `n` set means class `n` may transmit
    pub gate_mask: u32,
    /// Duration in nanoseconds
    pub interval: u32,
}

impl EntryConfig {
    pub fn new(gate_mask: u32, interval: u32) -> Self {
        Self {
            index: None,
            command: GateCommand::SetGates,
            gate_mask,
            interval,
        }
    }
}

/// Mode flags; txtime-assist and full offload exclude each other
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShaperFlags {
    #[serde(default)]
    pub txtime_assist: bool,
    #[serde(default)]
    pub full_offload: bool,
}

impl ShaperFlags {
    pub const fn software() -> Self {
        Self {
            txtime_assist: false,
            full_offload: false,
        }
    }

    pub const fn txtime_assist() -> Self {
        Self {
            txtime_assist: true,
            full_offload: false,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.txtime_assist && self.full_offload {
            return Err(ConfigError::InvalidFlags(
                "txtime_assist and full_offload are mutually exclusive".into(),
            ));
        }
        Ok(())
    }

    pub fn mode(&self) -> ShaperMode {
        if self.full_offload {
            ShaperMode::FullOffload
        } else if self.txtime_assist {
            ShaperMode::TxtimeAssist
        } else {
            ShaperMode::Software
        }
    }

    pub fn mode_str(&self) -> &'static str {
        self.mode().as_str()
    }
}

/// How the shaper enforces the schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShaperMode {
    /// Advance timer gates the dequeue path
    Software,
    /// Departure times are stamped at enqueue
    TxtimeAssist,
    /// The device runs the schedule itself
    FullOffload,
}

impl ShaperMode {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Software => "software",
            Self::TxtimeAssist => "txtime_assist",
            Self::FullOffload => "full_offload",
        }
    }
}

/// A schedule install request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShaperConfig {
    pub entries: Vec<EntryConfig>,
    #[serde(default)]
    pub base_time: Nanos,
    /// Derived from the entry intervals when omitted or zero
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cycle_time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cycle_time_extension: Option<i64>,
    /// Per-class max SDU in bytes; 0 means unlimited
    #[serde(default)]
    pub max_sdu: Vec<u32>,
    #[serde(default)]
    pub flags: ShaperFlags,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clock: Option<ClockDomain>,
    /// Extra delay added to "now" when pacing (txtime-assist only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub txtime_delay: Option<u32>,
}

impl ShaperConfig {
    /// Software-gated schedule in the TAI domain
    pub fn new(entries: Vec<EntryConfig>, base_time: Nanos) -> Self {
        Self {
            entries,
            base_time,
            cycle_time: None,
            cycle_time_extension: None,
            max_sdu: Vec::new(),
            flags: ShaperFlags::software(),
            clock: Some(ClockDomain::Tai),
            txtime_delay: None,
        }
    }

    pub fn with_cycle_time(mut self, cycle_time: i64) -> Self {
        self.cycle_time = Some(cycle_time);
        self
    }

    pub fn with_extension(mut self, extension: i64) -> Self {
        self.cycle_time_extension = Some(extension);
        self
    }

    pub fn with_flags(mut self, flags: ShaperFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_clock(mut self, clock: ClockDomain) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn with_txtime_delay(mut self, delay: u32) -> Self {
        self.txtime_delay = Some(delay);
        self
    }

    pub fn with_max_sdu(mut self, max_sdu: Vec<u32>) -> Self {
        self.max_sdu = max_sdu;
        self
    }

    /// User max SDU per class (unlimited past the configured list)
    pub fn max_sdu_table(&self) -> [u32; TC_MAX_QUEUE] {
        let mut table = [0u32; TC_MAX_QUEUE];
        for (slot, value) in table.iter_mut().zip(self.max_sdu.iter()) {
            *slot = *value;
        }
        table
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|e| ConfigError::Unreadable(e.to_string()))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Unreadable(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&raw)
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}
