/*!
 * Interval Locator
 * Maps (time, class) onto the schedule entry whose interval governs it
 */

use crate::core::time::{add_ns, cycle_elapsed, Nanos, KTIME_MAX};
use crate::schedule::{ScheduleEntry, ScheduleGateList};
use serde::{Deserialize, Serialize};

/// What the caller wants from a lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocateMode {
    /// Find where a packet can depart, possibly in a later interval
    Pace,
    /// Only accept an interval that contains the given time
    Validate,
}

/// An entry together with the absolute bounds of one of its intervals
#[derive(Debug, Clone, Copy)]
pub struct Located<'a> {
    pub entry: &'a ScheduleEntry,
    pub start: Nanos,
    pub end: Nanos,
}

/// End of the interval `entry` opens at `intv_start`
///
/// The interval is cut short by the cycle end. An admin schedule whose base
/// time lies strictly inside the extension window past the cycle end cuts it
/// at that base time instead.
pub fn interval_end_time(
    sched: &ScheduleGateList,
    admin: Option<&ScheduleGateList>,
    entry: &ScheduleEntry,
    intv_start: Nanos,
) -> Nanos {
    let elapsed = cycle_elapsed(intv_start, sched.base_time(), sched.cycle_time());
    let cycle_end = add_ns(intv_start, sched.cycle_time() - elapsed);
    let intv_end = add_ns(intv_start, entry.interval() as i64);
    let cycle_ext_end = add_ns(cycle_end, sched.cycle_time_extension());

    if intv_end < cycle_end {
        return intv_end;
    }
    match admin {
        Some(admin)
            if !std::ptr::eq(admin, sched)
                && admin.base_time() > cycle_end
                && admin.base_time() < cycle_ext_end =>
        {
            admin.base_time()
        }
        _ => cycle_end,
    }
}

/// Find the entry that governs `time` for class `tc`
///
/// Walks the entries once from the start of the cycle containing `time`,
/// skipping entries closed to `tc` or too short for `transmit_time`.
///
/// In [`LocateMode::Validate`] only an interval that started before `time`
/// and still has room for `transmit_time` matches.
///
/// In [`LocateMode::Pace`] the first due entry whose interval contains or
/// follows `time` wins. An interval already passed is remembered, shifted
/// one cycle ahead, as a fallback; failing that the entry whose pacing cursor
/// is earliest is used, projected forward by whole cycles.
///
/// # Performance
/// Hot path - one bounded traversal of the entry list per call
pub fn find_entry_to_transmit<'a>(
    sched: &'a ScheduleGateList,
    admin: Option<&ScheduleGateList>,
    time: Nanos,
    tc: usize,
    transmit_time: i64,
    mode: LocateMode,
) -> Option<Located<'a>> {
    let validate = mode == LocateMode::Validate;
    let cycle = sched.cycle_time();
    let elapsed = cycle_elapsed(time, sched.base_time(), cycle);
    let mut intv_end = time - elapsed;
    let cycle_end = add_ns(intv_end, cycle);

    let mut found: Option<Located<'a>> = None;
    let mut fallback_taken = false;
    let mut earliest_txtime = KTIME_MAX;

    for entry in sched.entries() {
        let intv_start = intv_end;
        intv_end = interval_end_time(sched, admin, entry, intv_start);

        if intv_start > cycle_end {
            break;
        }
        if !entry.is_open(tc) || transmit_time > entry.interval() as i64 {
            continue;
        }

        let txtime = entry.next_txtime();
        if txtime < time || validate {
            let transmit_end = add_ns(time, transmit_time);
            let inside = intv_start < time && transmit_end < intv_end;
            if inside || (intv_start > time && !validate) {
                return Some(Located {
                    entry,
                    start: intv_start,
                    end: intv_end,
                });
            } else if !fallback_taken && !validate {
                fallback_taken = true;
                found = Some(Located {
                    entry,
                    start: add_ns(intv_start, cycle),
                    end: add_ns(intv_end, cycle),
                });
            }
        } else if txtime < earliest_txtime && !fallback_taken {
            earliest_txtime = txtime;
            let cycles = (txtime - intv_start) / cycle;
            found = Some(Located {
                entry,
                start: add_ns(intv_start, cycles * cycle),
                end: add_ns(intv_end, cycles * cycle),
            });
        }
    }

    found
}

/// True when a transmission at `time` lasting `transmit_time` fits an open interval
#[inline]
pub fn is_valid_interval(
    sched: &ScheduleGateList,
    admin: Option<&ScheduleGateList>,
    time: Nanos,
    tc: usize,
    transmit_time: i64,
) -> bool {
    find_entry_to_transmit(sched, admin, time, tc, transmit_time, LocateMode::Validate).is_some()
}
