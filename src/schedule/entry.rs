/*!
 * Schedule Entry
 * One step of a gate control list with its derived per-class state
 */

use super::config::GateCommand;
use crate::core::limits::{INFINITE_BUDGET, TC_MAX_QUEUE};
use crate::core::time::{Nanos, KTIME_MAX};
use serde::Serialize;
use std::sync::atomic::{AtomicI32, AtomicI64, Ordering};

/// Gate control list entry
///
/// `gate_duration` is fixed once the schedule is parsed. The atomics are
/// rewritten each time the entry becomes current (close times, budgets,
/// end time) or when a packet is paced through it (`next_txtime`); they are
/// read concurrently by enqueue and dequeue paths.
#[derive(Debug)]
pub struct ScheduleEntry {
    pub(crate) index: u32,
    pub(crate) command: GateCommand,
    pub(crate) gate_mask: u32,
    pub(crate) interval: u32,
    /// Nanoseconds from the start of this entry until each class's gate closes
    pub(crate) gate_duration: [u64; TC_MAX_QUEUE],
    gate_close_time: [AtomicI64; TC_MAX_QUEUE],
    budget: [AtomicI32; TC_MAX_QUEUE],
    end_time: AtomicI64,
    next_txtime: AtomicI64,
}

impl ScheduleEntry {
    pub(crate) fn new(index: u32, command: GateCommand, gate_mask: u32, interval: u32) -> Self {
        Self {
            index,
            command,
            gate_mask,
            interval,
            gate_duration: [0; TC_MAX_QUEUE],
            gate_close_time: std::array::from_fn(|_| AtomicI64::new(0)),
            budget: std::array::from_fn(|_| AtomicI32::new(0)),
            end_time: AtomicI64::new(0),
            next_txtime: AtomicI64::new(0),
        }
    }

    #[inline(always)]
    pub fn index(&self) -> u32 {
        self.index
    }

    #[inline(always)]
    pub fn command(&self) -> GateCommand {
        self.command
    }

    #[inline(always)]
    pub fn gate_mask(&self) -> u32 {
        self.gate_mask
    }

    #[inline(always)]
    pub fn interval(&self) -> u32 {
        self.interval
    }

    #[inline(always)]
    pub fn is_open(&self, tc: usize) -> bool {
        tc < 32 && self.gate_mask & (1u32 << tc) != 0
    }

    #[inline]
    pub fn gate_duration(&self, tc: usize) -> u64 {
        self.gate_duration[tc]
    }

    #[inline]
    pub fn gate_close_time(&self, tc: usize) -> Nanos {
        self.gate_close_time[tc].load(Ordering::Acquire)
    }

    pub(crate) fn set_gate_close_time(&self, tc: usize, time: Nanos) {
        self.gate_close_time[tc].store(time, Ordering::Release);
    }

    /// True when a transmission ending at `end` finishes before `tc`'s gate closes
    #[inline]
    pub fn allows_tx(&self, end: Nanos, tc: usize) -> bool {
        end < self.gate_close_time(tc)
    }

    #[inline]
    pub fn end_time(&self) -> Nanos {
        self.end_time.load(Ordering::Acquire)
    }

    pub(crate) fn set_end_time(&self, time: Nanos) {
        self.end_time.store(time, Ordering::Release);
    }

    #[inline]
    pub fn next_txtime(&self) -> Nanos {
        self.next_txtime.load(Ordering::Acquire)
    }

    pub(crate) fn set_next_txtime(&self, time: Nanos) {
        self.next_txtime.store(time, Ordering::Release);
    }

    #[inline]
    pub fn budget(&self, tc: usize) -> i32 {
        self.budget[tc].load(Ordering::Acquire)
    }

    pub(crate) fn budget_cell(&self, tc: usize) -> &AtomicI32 {
        &self.budget[tc]
    }

    /// Close times relative to `start` for the first `num_tc` classes
    pub(crate) fn arm_close_times(&self, start: Nanos, cycle_time: i64, num_tc: usize) {
        for tc in 0..num_tc {
            let close = if self.gate_duration[tc] as i64 == cycle_time {
                KTIME_MAX
            } else {
                start.saturating_add(self.gate_duration[tc] as i64)
            };
            self.set_gate_close_time(tc, close);
        }
    }

    pub(crate) fn snapshot(&self, num_tc: usize) -> EntrySnapshot {
        EntrySnapshot {
            index: self.index,
            command: self.command,
            gate_mask: self.gate_mask,
            interval: self.interval,
            gate_duration: self.gate_duration[..num_tc].to_vec(),
            budget: (0..num_tc)
                .map(|tc| {
                    let budget = self.budget(tc);
                    (budget != INFINITE_BUDGET).then_some(budget)
                })
                .collect(),
            end_time: self.end_time(),
        }
    }
}

/// Serializable view of an entry for dumps
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct EntrySnapshot {
    pub index: u32,
    pub command: GateCommand,
    pub gate_mask: u32,
    pub interval: u32,
    pub gate_duration: Vec<u64>,
    /// `None` marks a class whose gate never closes
    pub budget: Vec<Option<i32>>,
    pub end_time: Nanos,
}
