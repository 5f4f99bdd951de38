/*!
 * Concurrency Tests
 * Transmit and receive paths racing schedule advances and replacements
 */

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use time_aware_shaper::{EntryConfig, ManualClock, Packet, QueueLayout, Shaper, ShaperConfig};

const ROUNDS: usize = 2_000;
const FIRING_LIMIT: usize = 64;

fn indexed(index: u32, gate_mask: u32, interval: u32) -> EntryConfig {
    EntryConfig {
        index: Some(index),
        ..EntryConfig::new(gate_mask, interval)
    }
}

/// Two entries numbered 0 and 1
fn short_schedule(base_time: i64) -> ShaperConfig {
    ShaperConfig::new(
        vec![indexed(0, 0b01, 300_000), indexed(1, 0b10, 700_000)],
        base_time,
    )
}

/// Three entries numbered 10 to 12
fn long_schedule(base_time: i64) -> ShaperConfig {
    ShaperConfig::new(
        vec![
            indexed(10, 0b01, 200_000),
            indexed(11, 0b11, 300_000),
            indexed(12, 0b10, 500_000),
        ],
        base_time,
    )
}

fn check_consistent(shaper: &Shaper) {
    let dump = shaper.dump_state();
    // across a swap the outgoing schedule's last entry stays current until
    // the new base time, so membership is checked against both schedules
    let known = |index: u32| matches!(index, 0 | 1 | 10..=12);
    if let Some(current) = dump.current_entry {
        assert!(dump.oper.is_some(), "entry {} without a schedule", current);
        assert!(known(current), "unknown entry {}", current);
    }
    for sched in dump.oper.iter().chain(dump.admin.iter()) {
        for entry in &sched.entries {
            for budget in entry.budget.iter().flatten() {
                assert!(*budget >= 0, "entry {} budget {}", entry.index, budget);
            }
        }
    }
    if let Some(index) = shaper.current_entry_index() {
        assert!(known(index), "unknown entry {}", index);
    }
}

#[test]
fn test_traffic_during_advances_and_replacements() {
    let clock = Arc::new(ManualClock::new(-1_000));
    let shaper = Arc::new(
        Shaper::builder()
            .with_clock(clock.clone())
            .with_layout(QueueLayout::one_queue_per_class(2))
            .with_link_speed(100)
            .build()
            .unwrap(),
    );
    shaper.change(short_schedule(0)).unwrap();

    let running = Arc::new(AtomicBool::new(true));
    let workers: Vec<_> = (0..3u32)
        .map(|worker| {
            let shaper = shaper.clone();
            let running = running.clone();
            thread::spawn(move || {
                let mut round = 0usize;
                while running.load(Ordering::Relaxed) {
                    let priority = (round as u32 + worker) % 2;
                    let len = 64 + (round * 97) % 1_400;
                    shaper.enqueue(Packet::with_len(priority, len).on_queue(priority as usize));
                    shaper.dequeue();
                    check_consistent(&shaper);
                    round += 1;
                }
            })
        })
        .collect();

    for round in 0..ROUNDS {
        let now = clock.advance(37_000 + (round as i64 * 7_919) % 250_000);
        shaper.fire_due(FIRING_LIMIT);

        if round % 50 == 0 {
            // alternate sizes, sometimes in the past so the start is rounded up
            let base_time = if round % 100 == 0 { now + 1_500_000 } else { 0 };
            let config = if round % 100 == 0 {
                long_schedule(base_time)
            } else {
                short_schedule(base_time)
            };
            shaper.change(config).unwrap();
        }
        check_consistent(&shaper);
    }

    running.store(false, Ordering::Relaxed);
    for worker in workers {
        worker.join().unwrap();
    }

    let now = clock.advance(0);
    shaper.fire_due(usize::MAX);
    check_consistent(&shaper);
    assert!(shaper.next_expiry().map_or(false, |expiry| expiry > now));
    while shaper.dequeue().is_some() {}
    check_consistent(&shaper);
}
