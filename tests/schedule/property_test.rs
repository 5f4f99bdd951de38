/*!
 * Schedule Property Tests
 * Cycle derivation, gate durations and interval validation over random schedules
 */

use proptest::prelude::*;
use time_aware_shaper::schedule::gate_durations;
use time_aware_shaper::shaper::is_valid_interval;
use time_aware_shaper::{EntryConfig, LinkRate, ScheduleGateList, ShaperConfig};

fn steps() -> impl Strategy<Value = Vec<(u32, u32)>> {
    prop::collection::vec((0u32..16, 1_000u32..100_000), 1..8)
}

fn config_from(steps: &[(u32, u32)]) -> ShaperConfig {
    ShaperConfig::new(
        steps
            .iter()
            .map(|&(mask, interval)| EntryConfig::new(mask, interval))
            .collect(),
        0,
    )
}

proptest! {
    #[test]
    fn derived_cycle_is_interval_sum(steps in steps()) {
        let rate = LinkRate::new(Some(1_000));
        let sched = ScheduleGateList::parse(&config_from(&steps), 4, &rate).unwrap();
        let sum: i64 = steps.iter().map(|&(_, interval)| interval as i64).sum();
        prop_assert_eq!(sched.cycle_time(), sum);
    }

    #[test]
    fn gate_durations_are_stable(steps in steps()) {
        let first = gate_durations(&steps, 4);
        let second = gate_durations(&steps, 4);
        prop_assert_eq!(first, second);
    }

    #[test]
    fn never_open_class_has_zero_duration(steps in steps()) {
        let durations = gate_durations(&steps, 4);
        for tc in 0..4 {
            let ever_open = steps.iter().any(|&(mask, _)| mask & (1 << tc) != 0);
            prop_assert_eq!(durations.max_open[tc] == 0, !ever_open);
            for (entry, &(mask, _)) in durations.per_entry.iter().zip(steps.iter()) {
                prop_assert_eq!(entry[tc] == 0, mask & (1 << tc) == 0);
            }
        }
    }

    #[test]
    fn validate_matches_open_window(
        open in 1_000u32..500_000,
        closed in 1_000u32..500_000,
        time in 0i64..10_000_000,
        transmit_time in 0i64..2_000,
    ) {
        let rate = LinkRate::new(Some(1_000));
        let config = ShaperConfig::new(
            vec![EntryConfig::new(0b01, open), EntryConfig::new(0b10, closed)],
            0,
        );
        let sched = ScheduleGateList::parse(&config, 2, &rate).unwrap();

        let elapsed = time % (open as i64 + closed as i64);
        let expected = elapsed > 0 && elapsed + transmit_time < open as i64;
        prop_assert_eq!(is_valid_interval(&sched, None, time, 0, transmit_time), expected);
    }
}
