/*!
 * Schedule Configuration Tests
 * Loading from JSON and the rejections applied before anything is installed
 */

use pretty_assertions::assert_eq;
use std::io::Write;
use std::sync::Arc;
use tempfile::NamedTempFile;
use time_aware_shaper::{
    ClockDomain, ConfigError, DropReason, EntryConfig, LinkRate, ManualClock, Packet, QueueLayout,
    ScheduleGateList, Shaper, ShaperConfig, ShaperFlags, ShaperMode,
};

fn two_class_shaper(clock: Arc<ManualClock>) -> Shaper {
    Shaper::builder()
        .with_clock(clock)
        .with_layout(QueueLayout::one_queue_per_class(2))
        .with_link_speed(1_000)
        .build()
        .unwrap()
}

fn alternating() -> Vec<EntryConfig> {
    vec![EntryConfig::new(0b01, 300_000), EntryConfig::new(0b10, 700_000)]
}

#[test]
fn test_config_from_json_file() {
    let mut file = NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{
            "entries": [
                {{"gate_mask": 1, "interval": 300000}},
                {{"gate_mask": 2, "interval": 700000}}
            ],
            "base_time": 2000000,
            "cycle_time_extension": 50000,
            "max_sdu": [200],
            "clock": "tai"
        }}"#
    )
    .unwrap();

    let config = ShaperConfig::from_file(file.path()).unwrap();
    assert_eq!(config.entries, alternating());
    assert_eq!(config.base_time, 2_000_000);
    assert_eq!(config.cycle_time_extension, Some(50_000));
    assert_eq!(config.clock, Some(ClockDomain::Tai));

    let shaper = two_class_shaper(Arc::new(ManualClock::new(0)));
    shaper.change(config).unwrap();

    let dump = shaper.dump_state();
    let admin = dump.admin.unwrap();
    assert_eq!(admin.cycle_time, 1_000_000);
    assert_eq!(admin.cycle_time_extension, 50_000);
    assert_eq!(admin.max_sdu[0], 200);
    assert_eq!(admin.max_frm_len[0], Some(214));
}

#[test]
fn test_missing_file_is_unreadable() {
    let dir = tempfile::tempdir().unwrap();
    let err = ShaperConfig::from_file(dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(err, ConfigError::Unreadable(_)));
}

#[test]
fn test_malformed_json_is_unreadable() {
    let err = ShaperConfig::from_json_str(r#"{"entries": "nope"}"#).unwrap_err();
    assert!(matches!(err, ConfigError::Unreadable(_)));
}

#[test]
fn test_config_survives_json_round_trip() {
    let config = ShaperConfig::new(alternating(), 1_000)
        .with_extension(10_000)
        .with_flags(ShaperFlags::txtime_assist())
        .with_txtime_delay(5_000);
    let parsed = ShaperConfig::from_json_str(&config.to_json()).unwrap();
    assert_eq!(parsed, config);
}

#[test]
fn test_parse_rejections() {
    let rate = LinkRate::new(Some(1_000));
    let parse = |config: ShaperConfig| ScheduleGateList::parse(&config, 2, &rate).map(|_| ());

    assert_eq!(parse(ShaperConfig::new(vec![], 0)), Err(ConfigError::EmptySchedule));

    // one 60-byte frame takes 480ns at 1Gbit/s
    assert_eq!(
        parse(ShaperConfig::new(
            vec![EntryConfig::new(0b01, 1_000), EntryConfig::new(0b10, 100)],
            0
        )),
        Err(ConfigError::IntervalTooShort {
            index: 1,
            interval: 100,
            minimum: 480
        })
    );

    let mut duplicate = alternating();
    duplicate[1].index = Some(0);
    assert_eq!(
        parse(ShaperConfig::new(duplicate, 0)),
        Err(ConfigError::IndexCollision(0))
    );

    assert_eq!(
        parse(ShaperConfig::new(alternating(), 0).with_cycle_time(-5)),
        Err(ConfigError::CycleTimeOutOfRange(-5))
    );
    assert_eq!(
        parse(ShaperConfig::new(
            vec![EntryConfig::new(0b01, 1_000), EntryConfig::new(0b10, 1_000)],
            0
        )
        .with_cycle_time(900)),
        Err(ConfigError::CycleTimeOutOfRange(900))
    );
    assert_eq!(
        parse(ShaperConfig::new(alternating(), 0).with_extension(-1)),
        Err(ConfigError::NegativeExtension(-1))
    );
}

#[test]
fn test_explicit_cycle_time_overrides_sum() {
    let rate = LinkRate::new(Some(1_000));
    let config = ShaperConfig::new(alternating(), 0).with_cycle_time(800_000);
    let sched = ScheduleGateList::parse(&config, 2, &rate).unwrap();
    assert_eq!(sched.cycle_time(), 800_000);

    let derived = ScheduleGateList::parse(&ShaperConfig::new(alternating(), 0), 2, &rate).unwrap();
    assert_eq!(derived.cycle_time(), 1_000_000);
}

#[test]
fn test_flag_and_clock_rejections() {
    let shaper = two_class_shaper(Arc::new(ManualClock::new(0)));

    let both = ShaperFlags {
        txtime_assist: true,
        full_offload: true,
    };
    assert!(matches!(
        shaper.change(ShaperConfig::new(alternating(), 0).with_flags(both)),
        Err(ConfigError::InvalidFlags(_))
    ));

    let offload = ShaperFlags {
        txtime_assist: false,
        full_offload: true,
    };
    assert_eq!(
        shaper.change(ShaperConfig::new(alternating(), 0).with_flags(offload)),
        Err(ConfigError::OffloadUnsupported)
    );

    assert_eq!(
        shaper.change(ShaperConfig::new(alternating(), 0).with_txtime_delay(1_000)),
        Err(ConfigError::TxtimeDelayWithoutAssist)
    );

    let mut no_clock = ShaperConfig::new(alternating(), 0);
    no_clock.clock = None;
    assert_eq!(shaper.change(no_clock), Err(ConfigError::MissingClock));

    // nothing above reached the engine
    assert_eq!(shaper.mode(), None);
    assert_eq!(shaper.clock_domain(), None);
    assert!(shaper.dump_state().admin.is_none());
}

#[test]
fn test_running_schedule_keeps_flags_and_clock() {
    let shaper = two_class_shaper(Arc::new(ManualClock::new(0)));
    shaper.change(ShaperConfig::new(alternating(), 0)).unwrap();
    assert_eq!(shaper.mode(), Some(ShaperMode::Software));

    assert_eq!(
        shaper.change(ShaperConfig::new(alternating(), 0).with_flags(ShaperFlags::txtime_assist())),
        Err(ConfigError::FlagsChanged)
    );
    assert_eq!(
        shaper.change(ShaperConfig::new(alternating(), 0).with_clock(ClockDomain::Realtime)),
        Err(ConfigError::ClockChanged {
            from: ClockDomain::Tai,
            to: ClockDomain::Realtime
        })
    );

    // a later change may leave the clock out and inherit it
    let mut inherit = ShaperConfig::new(alternating(), 5_000_000);
    inherit.clock = None;
    shaper.change(inherit).unwrap();
    assert_eq!(shaper.clock_domain(), Some(ClockDomain::Tai));
    assert_eq!(shaper.dump_state().admin.unwrap().base_time, 5_000_000);
}

#[test]
fn test_user_max_sdu_bounds_frames() {
    let clock = Arc::new(ManualClock::new(-1_000));
    let shaper = two_class_shaper(clock.clone());
    shaper
        .change(ShaperConfig::new(alternating(), 0).with_max_sdu(vec![200]))
        .unwrap();
    clock.set(0);
    assert_eq!(shaper.fire_due(16), 1);

    assert!(shaper.enqueue(Packet::with_len(0, 214)).is_accepted());
    assert_eq!(
        shaper.enqueue(Packet::with_len(0, 215)).drop_reason(),
        Some(DropReason::Oversized)
    );
    // class 1 has no user limit and a window far beyond the max MTU
    assert!(shaper.enqueue(Packet::with_len(1, 5_000).on_queue(1)).is_accepted());
}

#[test]
fn test_distant_base_time_starts_next_cycle() {
    // i64::MIN + 1 lands 224_193ns into the cycle that ends after 1ms
    let clock = Arc::new(ManualClock::new(1_000_000));
    let shaper = two_class_shaper(clock.clone());
    shaper
        .change(ShaperConfig::new(alternating(), i64::MIN + 1))
        .unwrap();
    assert_eq!(shaper.next_expiry(), Some(1_224_193));

    clock.set(1_224_193);
    assert_eq!(shaper.fire_due(16), 1);
    assert_eq!(shaper.current_entry_index(), Some(0));
    assert_eq!(shaper.next_expiry(), Some(1_524_193));

    let assisted = two_class_shaper(Arc::new(ManualClock::new(1_000_000)));
    assisted
        .change(
            ShaperConfig::new(alternating(), i64::MIN + 1).with_flags(ShaperFlags::txtime_assist()),
        )
        .unwrap();
    assert!(assisted.enqueue(Packet::with_len(0, 100)).is_accepted());
    assert_eq!(
        assisted.dequeue().and_then(|packet| packet.txtime),
        Some(1_224_193)
    );
}

#[test]
fn test_unsplittable_oversized_frame_dropped() {
    let clock = Arc::new(ManualClock::new(-1_000));
    let shaper = two_class_shaper(clock.clone());
    shaper
        .change(ShaperConfig::new(alternating(), 0).with_max_sdu(vec![200]))
        .unwrap();
    clock.set(0);
    assert_eq!(shaper.fire_due(16), 1);

    // the header covers the whole frame, leaving nothing to split
    let whole_header = Packet::with_len(0, 300).with_gso(300, 100);
    assert_eq!(
        shaper.enqueue(whole_header).drop_reason(),
        Some(DropReason::SegmentationFailed)
    );
    let zero_segments = Packet::with_len(0, 300).with_gso(40, 0);
    assert_eq!(
        shaper.enqueue(zero_segments).drop_reason(),
        Some(DropReason::SegmentationFailed)
    );
    assert_eq!(shaper.stats().dropped(DropReason::SegmentationFailed), 2);
    assert_eq!(shaper.backlog(), 0);
}
