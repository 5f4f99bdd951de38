/*!
 * Schedule Gate List
 * Cyclic entry arena with the cycle bookkeeping and per-class frame limits
 */

use super::config::ShaperConfig;
use super::durations::gate_durations;
use super::entry::{EntrySnapshot, ScheduleEntry};
use crate::core::errors::ConfigError;
use crate::core::limits::{ETH_ZLEN, MAX_CYCLE_TIME, TC_MAX_QUEUE};
use crate::core::time::{add_ns, Nanos, KTIME_MAX};
use crate::device::DeviceProfile;
use crate::shaper::budget;
use crate::shaper::rate::LinkRate;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};

/// One parsed schedule
///
/// Entries live in a vector and wrap around by index. Everything except the
/// atomics is fixed at parse time; a list is shared through `Arc` and never
/// mutated structurally after publication.
#[derive(Debug)]
pub struct ScheduleGateList {
    entries: Vec<ScheduleEntry>,
    num_tc: usize,
    base_time: Nanos,
    cycle_time: i64,
    cycle_time_extension: i64,
    cycle_end_time: AtomicI64,
    max_open_gate_duration: [u64; TC_MAX_QUEUE],
    /// Largest frame (L2 header included) a class may send, `u32::MAX` if unbounded
    max_frm_len: [AtomicU32; TC_MAX_QUEUE],
    /// Effective max SDU for dumps, 0 if unbounded
    max_sdu: [AtomicU32; TC_MAX_QUEUE],
}

impl ScheduleGateList {
    /// Validate a configuration and build its gate list
    ///
    /// The minimum interval is the time one `ETH_ZLEN` frame takes at the
    /// current rate. Nothing outside the returned list is touched.
    pub fn parse(config: &ShaperConfig, num_tc: usize, rate: &LinkRate) -> Result<Self, ConfigError> {
        if config.entries.is_empty() {
            return Err(ConfigError::EmptySchedule);
        }

        let min_duration = rate.length_to_duration(ETH_ZLEN);
        let mut seen = HashSet::with_capacity(config.entries.len());
        let mut entries = Vec::with_capacity(config.entries.len());

        for (pos, raw) in config.entries.iter().enumerate() {
            let index = raw.index.unwrap_or(pos as u32);
            if !seen.insert(index) {
                return Err(ConfigError::IndexCollision(index));
            }
            if (raw.interval as i64) < min_duration {
                return Err(ConfigError::IntervalTooShort {
                    index,
                    interval: raw.interval,
                    minimum: min_duration,
                });
            }
            entries.push(ScheduleEntry::new(index, raw.command, raw.gate_mask, raw.interval));
        }

        let cycle_time = match config.cycle_time {
            Some(cycle) if !(0..=MAX_CYCLE_TIME).contains(&cycle) => {
                return Err(ConfigError::CycleTimeOutOfRange(cycle));
            }
            Some(cycle) if cycle > 0 => cycle,
            _ => {
                let sum: i64 = entries.iter().map(|e| e.interval as i64).sum();
                if sum > MAX_CYCLE_TIME {
                    return Err(ConfigError::CycleTimeOutOfRange(sum));
                }
                sum
            }
        };
        if cycle_time == 0 {
            return Err(ConfigError::ZeroCycleTime);
        }
        if cycle_time < entries.len() as i64 * min_duration {
            return Err(ConfigError::CycleTimeOutOfRange(cycle_time));
        }

        let cycle_time_extension = config.cycle_time_extension.unwrap_or(0);
        if cycle_time_extension < 0 {
            return Err(ConfigError::NegativeExtension(cycle_time_extension));
        }

        let num_tc = num_tc.min(TC_MAX_QUEUE);
        let steps: Vec<(u32, u32)> = entries.iter().map(|e| (e.gate_mask, e.interval)).collect();
        let durations = gate_durations(&steps, num_tc);
        for (entry, per_class) in entries.iter_mut().zip(durations.per_entry) {
            entry.gate_duration = per_class;
        }

        Ok(Self {
            entries,
            num_tc,
            base_time: config.base_time,
            cycle_time,
            cycle_time_extension,
            cycle_end_time: AtomicI64::new(0),
            max_open_gate_duration: durations.max_open,
            max_frm_len: std::array::from_fn(|_| AtomicU32::new(u32::MAX)),
            max_sdu: std::array::from_fn(|_| AtomicU32::new(0)),
        })
    }

    #[inline(always)]
    pub fn base_time(&self) -> Nanos {
        self.base_time
    }

    #[inline(always)]
    pub fn cycle_time(&self) -> i64 {
        self.cycle_time
    }

    #[inline(always)]
    pub fn cycle_time_extension(&self) -> i64 {
        self.cycle_time_extension
    }

    #[inline]
    pub fn cycle_end_time(&self) -> Nanos {
        self.cycle_end_time.load(Ordering::Acquire)
    }

    pub(crate) fn set_cycle_end_time(&self, time: Nanos) {
        self.cycle_end_time.store(time, Ordering::Release);
    }

    #[inline(always)]
    pub fn num_tc(&self) -> usize {
        self.num_tc
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[ScheduleEntry] {
        &self.entries
    }

    /// Entry at `pos`, wrapping past the end
    #[inline]
    pub fn entry(&self, pos: usize) -> &ScheduleEntry {
        &self.entries[pos % self.entries.len()]
    }

    #[inline]
    pub fn first(&self) -> &ScheduleEntry {
        &self.entries[0]
    }

    #[inline]
    pub fn is_last(&self, pos: usize) -> bool {
        pos + 1 >= self.entries.len()
    }

    #[inline]
    pub fn next_pos(&self, pos: usize) -> usize {
        (pos + 1) % self.entries.len()
    }

    #[inline]
    pub fn max_open_gate_duration(&self, tc: usize) -> u64 {
        self.max_open_gate_duration[tc]
    }

    /// Largest frame class `tc` may carry
    ///
    /// # Performance
    /// Hot path - checked for every enqueued packet
    #[inline]
    pub fn max_frm_len(&self, tc: usize) -> u32 {
        self.max_frm_len[tc].load(Ordering::Relaxed)
    }

    #[inline]
    pub fn max_sdu(&self, tc: usize) -> u32 {
        self.max_sdu[tc].load(Ordering::Relaxed)
    }

    /// Recompute per-class frame limits
    ///
    /// The dynamic limit is what fits in the class's longest open window at
    /// the current rate, less framing overhead. A class open for the whole
    /// cycle, or whose window exceeds the device's max MTU, is bounded only
    /// by the user value (0 meaning unlimited).
    pub fn update_max_sdu(&self, user_max_sdu: &[u32; TC_MAX_QUEUE], rate: &LinkRate, device: &DeviceProfile) {
        for tc in 0..self.num_tc {
            let user = match user_max_sdu[tc] {
                0 => u32::MAX,
                value => value,
            };

            let dynamic = if self.max_open_gate_duration[tc] as i64 == self.cycle_time {
                u32::MAX
            } else {
                let frame = rate
                    .duration_to_length(self.max_open_gate_duration[tc])
                    .min(u32::MAX as u64) as i64;
                let frame = match device.frame_overhead {
                    Some(overhead) => {
                        (frame - overhead as i64).max(device.hard_header_len as i64 + 1)
                    }
                    None => frame,
                };
                match u32::try_from(frame - device.hard_header_len as i64) {
                    Ok(sdu) if sdu <= device.max_mtu => sdu,
                    _ => u32::MAX,
                }
            };

            let sdu = dynamic.min(user);
            if sdu == u32::MAX {
                self.max_frm_len[tc].store(u32::MAX, Ordering::Relaxed);
                self.max_sdu[tc].store(0, Ordering::Relaxed);
            } else {
                self.max_frm_len[tc].store(sdu.saturating_add(device.hard_header_len), Ordering::Relaxed);
                self.max_sdu[tc].store(sdu, Ordering::Relaxed);
            }
        }
    }

    /// When this schedule should start given the current time
    ///
    /// A future base time is used as is; a past one moves to the first whole
    /// cycle boundary after `now`.
    pub fn start_time(&self, now: Nanos) -> Nanos {
        if self.base_time > now || self.cycle_time <= 0 {
            return self.base_time;
        }
        let base = self.base_time as i128;
        let cycle = self.cycle_time as i128;
        let start = base + ((now as i128 - base) / cycle + 1) * cycle;
        start.min(KTIME_MAX as i128) as Nanos
    }

    /// Prime the first entry so the advance timer can start from it
    pub(crate) fn setup_first_end_time(&self, start: Nanos, rate: &LinkRate) {
        self.set_cycle_end_time(add_ns(start, self.cycle_time));

        let first = self.first();
        first.set_end_time(add_ns(start, first.interval as i64));
        budget::set_budgets(self, first, rate);
        first.arm_close_times(start, self.cycle_time, self.num_tc);
    }

    /// Seed each entry's pacing cursor with its offset from `start`
    pub(crate) fn setup_txtime(&self, start: Nanos) {
        let mut offset = 0i64;
        for entry in &self.entries {
            entry.set_next_txtime(add_ns(start, offset));
            offset += entry.interval as i64;
        }
    }

    pub fn snapshot(&self) -> GateListSnapshot {
        let classes = 0..self.num_tc;
        GateListSnapshot {
            base_time: self.base_time,
            cycle_time: self.cycle_time,
            cycle_time_extension: self.cycle_time_extension,
            cycle_end_time: self.cycle_end_time(),
            max_open_gate_duration: self.max_open_gate_duration[..self.num_tc].to_vec(),
            max_sdu: classes.clone().map(|tc| self.max_sdu(tc)).collect(),
            max_frm_len: classes
                .map(|tc| match self.max_frm_len(tc) {
                    u32::MAX => None,
                    len => Some(len),
                })
                .collect(),
            entries: self.entries.iter().map(|e| e.snapshot(self.num_tc)).collect(),
        }
    }
}

/// Serializable view of a gate list
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct GateListSnapshot {
    pub base_time: Nanos,
    pub cycle_time: i64,
    pub cycle_time_extension: i64,
    pub cycle_end_time: Nanos,
    pub max_open_gate_duration: Vec<u64>,
    /// 0 marks an unbounded class
    pub max_sdu: Vec<u32>,
    pub max_frm_len: Vec<Option<u32>>,
    pub entries: Vec<EntrySnapshot>,
}
