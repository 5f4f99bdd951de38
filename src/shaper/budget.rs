/*!
 * Budget Tracker
 * Per-entry, per-class byte allowance within the open part of a cycle
 */

use crate::core::limits::INFINITE_BUDGET;
use crate::core::time::PSEC_PER_NSEC;
use crate::schedule::{ScheduleEntry, ScheduleGateList};
use crate::shaper::rate::LinkRate;
use std::sync::atomic::Ordering;

/// Reset `entry`'s budgets for its classes at the current rate
///
/// A class whose gate never closes gets [`INFINITE_BUDGET`].
pub(crate) fn set_budgets(sched: &ScheduleGateList, entry: &ScheduleEntry, rate: &LinkRate) {
    let picos = rate.picos_per_byte().max(1) as u64;
    for tc in 0..sched.num_tc() {
        let duration = entry.gate_duration(tc);
        let budget = if duration as i64 == sched.cycle_time() {
            INFINITE_BUDGET
        } else {
            let bytes = duration.saturating_mul(PSEC_PER_NSEC as u64) / picos;
            bytes.min((INFINITE_BUDGET - 1) as u64) as i32
        };
        entry.budget_cell(tc).store(budget, Ordering::Release);
    }
}

/// Charge a transmitted packet of `len` bytes on class `tc`
///
/// Every class open in `gate_mask` shares the link, so each loses `len`
/// bytes. The sending class is charged only if it stays non-negative;
/// returns false (and charges nothing) otherwise. Other classes saturate
/// at zero.
///
/// # Performance
/// Hot path - called for every dequeued packet; one atomic per open class
pub(crate) fn consume(entry: &ScheduleEntry, tc: usize, len: usize, gate_mask: u32, num_tc: usize) -> bool {
    let len = len.min(i32::MAX as usize) as i32;

    let charged = entry
        .budget_cell(tc)
        .fetch_update(Ordering::AcqRel, Ordering::Acquire, |budget| {
            if budget == INFINITE_BUDGET {
                Some(budget)
            } else {
                budget.checked_sub(len).filter(|left| *left >= 0)
            }
        })
        .is_ok();
    if !charged {
        return false;
    }

    for other in (0..num_tc).filter(|&c| c != tc && gate_mask & (1u32 << c) != 0) {
        let _ = entry
            .budget_cell(other)
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |budget| {
                (budget != INFINITE_BUDGET).then(|| budget.saturating_sub(len).max(0))
            });
    }
    true
}
