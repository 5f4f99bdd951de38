/*!
 * Shaper Property Tests
 * Invariants that must hold for any traffic pattern and clock progression
 */

use proptest::prelude::*;
use std::sync::Arc;
use time_aware_shaper::{EntryConfig, ManualClock, Packet, QueueLayout, Shaper, ShaperConfig};

const FIRING_LIMIT: usize = 100_000;

fn started(clock: &Arc<ManualClock>, speed: u32) -> Shaper {
    let shaper = Shaper::builder()
        .with_clock(clock.clone())
        .with_layout(QueueLayout::one_queue_per_class(2))
        .with_link_speed(speed)
        .build()
        .unwrap();
    shaper
        .change(ShaperConfig::new(
            vec![
                EntryConfig::new(0b01, 300_000),
                EntryConfig::new(0b11, 200_000),
                EntryConfig::new(0b10, 500_000),
            ],
            0,
        ))
        .unwrap();
    clock.set(0);
    shaper.fire_due(FIRING_LIMIT);
    shaper
}

proptest! {
    #[test]
    fn budgets_never_go_negative(
        traffic in prop::collection::vec((0u32..2, 60usize..1_500, 0i64..50_000), 1..200)
    ) {
        let clock = Arc::new(ManualClock::new(-1_000));
        let shaper = started(&clock, 100);

        for (priority, len, step) in traffic {
            shaper.enqueue(Packet::with_len(priority, len).on_queue(priority as usize));
            clock.advance(step);
            shaper.fire_due(FIRING_LIMIT);
            while shaper.dequeue().is_some() {}

            let oper = shaper.dump_state().oper.unwrap();
            for entry in &oper.entries {
                for budget in entry.budget.iter().flatten() {
                    prop_assert!(*budget >= 0, "entry {} budget {}", entry.index, budget);
                }
            }
        }
    }

    #[test]
    fn current_cycle_contains_now(steps in prop::collection::vec(0i64..3_000_000, 1..20)) {
        let clock = Arc::new(ManualClock::new(-1_000));
        let shaper = started(&clock, 1_000);

        for step in steps {
            let now = clock.advance(step);
            shaper.fire_due(FIRING_LIMIT);

            let oper = shaper.dump_state().oper.unwrap();
            prop_assert!(oper.base_time <= now);
            prop_assert!(oper.cycle_end_time - oper.cycle_time <= now);
            prop_assert!(now < oper.cycle_end_time);
            prop_assert!(shaper.next_expiry().map_or(false, |expiry| expiry > now));
        }
    }
}
