/*!
 * Gate Duration Calculator
 * Per-entry, per-class contiguous open time, walking the cycle once per entry
 */

use crate::core::limits::TC_MAX_QUEUE;

/// Result of [`gate_durations`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateDurations {
    /// `per_entry[e][tc]`: ns from the start of entry `e` until `tc` closes
    pub per_entry: Vec<[u64; TC_MAX_QUEUE]>,
    /// Longest contiguous open duration per class, 0 if never open
    pub max_open: [u64; TC_MAX_QUEUE],
}

/// Compute open-gate durations for `(gate_mask, interval)` steps
///
/// For each entry, walk forward cyclically, accumulating intervals for every
/// class still open and dropping a class as soon as an entry closes it; the
/// walk stops when every class has closed or it wraps back to the start.
/// A class open in every entry therefore accumulates the whole cycle.
pub fn gate_durations(steps: &[(u32, u32)], num_tc: usize) -> GateDurations {
    let num_tc = num_tc.min(TC_MAX_QUEUE);
    let n = steps.len();
    let mut per_entry = vec![[0u64; TC_MAX_QUEUE]; n];
    let mut max_open = [0u64; TC_MAX_QUEUE];

    for start in 0..n {
        let mut still_open = steps[start].0;
        let durations = &mut per_entry[start];

        for offset in 0..n {
            if still_open == 0 {
                break;
            }
            let (mask, interval) = steps[(start + offset) % n];
            for (tc, duration) in durations.iter_mut().enumerate().take(num_tc) {
                let bit = 1u32 << tc;
                if still_open & bit == 0 {
                    continue;
                }
                if mask & bit != 0 {
                    *duration += interval as u64;
                } else {
                    still_open &= !bit;
                }
            }
        }

        for tc in 0..num_tc {
            max_open[tc] = max_open[tc].max(durations[tc]);
        }
    }

    GateDurations {
        per_entry,
        max_open,
    }
}
