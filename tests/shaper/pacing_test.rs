/*!
 * Txtime-Assist Pacing Tests
 * Departure times stamped at enqueue and admin promotion on the enqueue path
 */

use pretty_assertions::assert_eq;
use std::sync::Arc;
use time_aware_shaper::{
    DropReason, EntryConfig, ManualClock, Packet, QueueLayout, Shaper, ShaperConfig, ShaperFlags,
};

fn assist_shaper(clock: Arc<ManualClock>) -> Shaper {
    Shaper::builder()
        .with_clock(clock)
        .with_layout(QueueLayout::one_queue_per_class(2))
        .with_link_speed(1_000)
        .build()
        .unwrap()
}

fn assist_config(base_time: i64) -> ShaperConfig {
    ShaperConfig::new(
        vec![EntryConfig::new(0b01, 300_000), EntryConfig::new(0b10, 700_000)],
        base_time,
    )
    .with_flags(ShaperFlags::txtime_assist())
}

fn txtime_of(shaper: &Shaper) -> Option<i64> {
    shaper.dequeue().and_then(|packet| packet.txtime)
}

#[test]
fn test_before_schedule_start_departs_at_minimum() {
    let clock = Arc::new(ManualClock::new(0));
    let shaper = assist_shaper(clock);
    shaper
        .change(assist_config(1_000_000).with_txtime_delay(5_000))
        .unwrap();

    assert!(shaper.enqueue(Packet::with_len(0, 100)).is_accepted());
    assert_eq!(txtime_of(&shaper), Some(5_000));
    // no advance timer in this mode
    assert_eq!(shaper.next_expiry(), None);
}

#[test]
fn test_back_to_back_departures_in_next_cycle() {
    // installed mid-cycle: the schedule starts at the next cycle boundary
    let clock = Arc::new(ManualClock::new(100_000));
    let shaper = assist_shaper(clock);
    shaper.change(assist_config(0)).unwrap();

    // 100 bytes take 800ns at 1Gbit/s
    assert!(shaper.enqueue(Packet::with_len(0, 100)).is_accepted());
    assert!(shaper.enqueue(Packet::with_len(0, 100)).is_accepted());
    assert_eq!(txtime_of(&shaper), Some(1_000_000));
    assert_eq!(txtime_of(&shaper), Some(1_000_800));

    // class 1 opens 300us into the cycle
    assert!(shaper.enqueue(Packet::with_len(1, 100).on_queue(1)).is_accepted());
    assert_eq!(txtime_of(&shaper), Some(1_300_000));
}

#[test]
fn test_stale_cursor_departs_now() {
    let clock = Arc::new(ManualClock::new(100_000));
    let shaper = assist_shaper(clock.clone());
    shaper.change(assist_config(0)).unwrap();

    clock.set(1_100_000);
    assert!(shaper.enqueue(Packet::with_len(0, 100)).is_accepted());
    assert_eq!(txtime_of(&shaper), Some(1_100_000));
}

#[test]
fn test_frame_limit_applies_from_install() {
    let clock = Arc::new(ManualClock::new(100_000));
    let shaper = Shaper::builder()
        .with_clock(clock)
        .with_layout(QueueLayout::one_queue_per_class(2))
        .with_link_speed(10)
        .build()
        .unwrap();
    shaper.change(assist_config(0)).unwrap();

    // a 300us window holds 375 bytes at 10Mbit/s
    assert!(shaper.enqueue(Packet::with_len(0, 375)).is_accepted());
    assert_eq!(txtime_of(&shaper), Some(1_000_000));
    assert_eq!(
        shaper.enqueue(Packet::with_len(0, 376)).drop_reason(),
        Some(DropReason::Oversized)
    );
}

#[test]
fn test_staged_schedule_promoted_at_enqueue() {
    let clock = Arc::new(ManualClock::new(100_000));
    let shaper = assist_shaper(clock.clone());
    shaper.change(assist_config(0)).unwrap();

    clock.set(1_100_000);
    shaper
        .change(
            ShaperConfig::new(vec![EntryConfig::new(0b11, 500_000)], 2_000_000)
                .with_flags(ShaperFlags::txtime_assist()),
        )
        .unwrap();
    let staged = shaper.dump_state();
    assert_eq!(staged.oper.as_ref().map(|s| s.base_time), Some(0));
    assert_eq!(staged.admin.as_ref().map(|s| s.base_time), Some(2_000_000));

    // still governed by the first schedule
    assert!(shaper.enqueue(Packet::with_len(1, 100).on_queue(1)).is_accepted());
    assert_eq!(txtime_of(&shaper), Some(1_300_000));

    clock.set(2_100_000);
    assert!(shaper.enqueue(Packet::with_len(1, 100).on_queue(1)).is_accepted());
    assert_eq!(txtime_of(&shaper), Some(2_100_000));

    let promoted = shaper.dump_state();
    assert_eq!(promoted.oper.as_ref().map(|s| s.base_time), Some(2_000_000));
    assert!(promoted.admin.is_none());
    assert_eq!(promoted.stats.swaps, 1);
}

#[test]
fn test_launch_time_bypasses_pacing() {
    let clock = Arc::new(ManualClock::new(100_000));
    let shaper = assist_shaper(clock);
    shaper.change(assist_config(0)).unwrap();

    let packet = Packet::with_len(0, 100).with_launch_time(1_050_000);
    assert!(shaper.enqueue(packet).is_accepted());
    let sent = shaper.dequeue().unwrap();
    assert_eq!(sent.launch_time, Some(1_050_000));
    assert_eq!(sent.txtime, None);

    let late = Packet::with_len(0, 100).with_launch_time(1_500_000);
    assert_eq!(
        shaper.enqueue(late).drop_reason(),
        Some(DropReason::InvalidLaunchTime)
    );
}

#[test]
fn test_class_never_opened_has_no_interval() {
    let clock = Arc::new(ManualClock::new(100_000));
    let shaper = assist_shaper(clock);
    shaper
        .change(
            ShaperConfig::new(vec![EntryConfig::new(0b01, 1_000_000)], 0)
                .with_flags(ShaperFlags::txtime_assist()),
        )
        .unwrap();

    assert_eq!(
        shaper.enqueue(Packet::with_len(1, 100).on_queue(1)).drop_reason(),
        Some(DropReason::NoInterval)
    );
    assert_eq!(shaper.stats().dropped(DropReason::NoInterval), 1);
    assert_eq!(shaper.backlog(), 0);
}

#[test]
fn test_unparseable_network_offset_is_paced() {
    let clock = Arc::new(ManualClock::new(100_000));
    let shaper = assist_shaper(clock);
    shaper.change(assist_config(0)).unwrap();

    let packet = Packet::with_len(0, 100)
        .with_network_offset(usize::MAX)
        .with_sender_tstamp(5_000_000);
    assert!(shaper.enqueue(packet).is_accepted());
    assert_eq!(txtime_of(&shaper), Some(1_000_000));
}
