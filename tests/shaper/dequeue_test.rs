/*!
 * Dequeue Tests
 * Gate masks, budgets and queue rotation seen from the transmit side
 */

use pretty_assertions::assert_eq;
use std::sync::Arc;
use time_aware_shaper::{
    EntryConfig, ManualClock, Packet, QueueLayout, Shaper, ShaperConfig, TcRange,
};

/// Two classes with two queues each; priority 1 is class 1, the rest class 0
fn shared_layout() -> QueueLayout {
    let mut prio_tc_map = [0u8; 16];
    prio_tc_map[1] = 1;
    QueueLayout {
        num_txq: 4,
        tc_to_txq: vec![TcRange { offset: 0, count: 2 }, TcRange { offset: 2, count: 2 }],
        prio_tc_map,
    }
}

fn started(clock: Arc<ManualClock>, speed: u32) -> Shaper {
    let shaper = Shaper::builder()
        .with_clock(clock.clone())
        .with_layout(QueueLayout::one_queue_per_class(2))
        .with_link_speed(speed)
        .build()
        .unwrap();
    shaper
        .change(ShaperConfig::new(
            vec![EntryConfig::new(0b01, 300_000), EntryConfig::new(0b10, 700_000)],
            0,
        ))
        .unwrap();
    clock.set(0);
    shaper.fire_due(16);
    shaper
}

#[test]
fn test_class_queues_rotate() {
    let clock = Arc::new(ManualClock::new(0));
    let shaper = Shaper::builder()
        .with_clock(clock)
        .with_layout(shared_layout())
        .build()
        .unwrap();

    for txq in [2, 2, 3, 3, 0] {
        let priority = if txq >= 2 { 1 } else { 0 };
        assert!(shaper.enqueue(Packet::with_len(priority, 64).on_queue(txq)).is_accepted());
    }

    let order: Vec<usize> = std::iter::from_fn(|| shaper.dequeue())
        .map(|p| p.queue_mapping)
        .collect();
    assert_eq!(order, vec![2, 3, 2, 3, 0]);
}

#[test]
fn test_gate_follows_current_entry() {
    let clock = Arc::new(ManualClock::new(-1_000));
    let shaper = started(clock.clone(), 1_000);

    assert!(shaper.enqueue(Packet::with_len(0, 100)).is_accepted());
    assert!(shaper.enqueue(Packet::with_len(1, 100).on_queue(1)).is_accepted());

    assert_eq!(shaper.dequeue().map(|p| p.priority), Some(0));
    assert!(shaper.dequeue().is_none());

    clock.set(300_000);
    assert_eq!(shaper.fire_due(16), 1);
    assert_eq!(shaper.current_entry_index(), Some(1));
    assert_eq!(shaper.dequeue().map(|p| p.priority), Some(1));
}

#[test]
fn test_budget_limits_class_per_window() {
    // 300us at 100Mbit/s is 3750 bytes
    let clock = Arc::new(ManualClock::new(-1_000));
    let shaper = started(clock.clone(), 100);

    for _ in 0..4 {
        assert!(shaper.enqueue(Packet::with_len(0, 1_000)).is_accepted());
    }
    assert!(shaper.dequeue().is_some());
    assert!(shaper.dequeue().is_some());
    assert!(shaper.dequeue().is_some());
    // 750 bytes left, not enough for the fourth frame
    assert!(shaper.dequeue().is_none());
    assert_eq!(shaper.backlog(), 1);
    assert_eq!(shaper.dump_state().oper.unwrap().entries[0].budget[0], Some(750));

    // budgets are refilled when the entry comes round again
    clock.set(1_000_000);
    assert_eq!(shaper.fire_due(16), 2);
    assert_eq!(shaper.current_entry_index(), Some(0));
    assert!(shaper.dequeue().is_some());
}

#[test]
fn test_reset_flushes_and_stops() {
    let clock = Arc::new(ManualClock::new(-1_000));
    let shaper = started(clock, 1_000);
    assert!(shaper.enqueue(Packet::with_len(1, 100).on_queue(1)).is_accepted());
    assert_eq!(shaper.backlog(), 1);

    shaper.reset();
    assert_eq!(shaper.backlog(), 0);
    assert_eq!(shaper.next_expiry(), None);
    assert_eq!(shaper.stats().snapshot().backlog_packets, 0);
}

#[test]
fn test_peek_is_unsupported() {
    let clock = Arc::new(ManualClock::new(0));
    let shaper = started(clock, 1_000);
    assert!(shaper.peek().is_err());
}
