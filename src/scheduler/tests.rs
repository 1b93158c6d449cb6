use super::*;
use proptest::prelude::*;

#[test]
fn test_cadence_waits_for_full_interval() {
    let mut cadence = Cadence::new(10.0);
    assert!(!cadence.advance(0.06));
    assert!(cadence.advance(0.06));
    assert!(!cadence.advance(0.02));
}

#[test]
fn test_cadence_drops_whole_intervals_on_slow_tick() {
    let mut cadence = Cadence::new(10.0);
    // One long tick covers several intervals but yields one request.
    assert!(cadence.advance(0.55));
    assert!(cadence.accumulator() < 0.1);
    assert!(!cadence.advance(0.01));
}

#[test]
fn test_cadence_survives_huge_tick() {
    // A tick this long exceeds f32 precision relative to the interval.
    let mut cadence = Cadence::new(1000.0);
    assert!(cadence.advance(1.0e6));
    assert!(cadence.accumulator() >= 0.0);
    assert!(cadence.accumulator() < 1.0 / 1000.0);
    assert!(!cadence.advance(0.0));

    let mut fast = Cadence::new(1.0e6);
    assert!(fast.advance(64.0));
    assert!(fast.accumulator() < 1.0 / 1.0e6);
}

#[test]
fn test_cadence_frame_rate_ten_with_slow_ticks() {
    let mut cadence = Cadence::new(10.0);
    let requests = (0..3).filter(|_| cadence.advance(0.34)).count();
    assert!((1..=4).contains(&requests));
}

#[test]
fn test_negative_frame_rate_fires_every_tick() {
    let mut cadence = Cadence::new(-1.0);
    assert!((0..10).all(|_| cadence.advance(0.0)));
}

#[test]
fn test_zero_frame_rate_never_fires() {
    let mut cadence = Cadence::new(0.0);
    assert!(!(0..10).any(|_| cadence.advance(1.0)));
}

#[test]
fn test_every_frame_schedule_issues_in_id_order() {
    let mut scheduler = CaptureScheduler::new();
    let schedule = CaptureSchedule {
        frame_rate: -1.0,
        ..Default::default()
    };
    scheduler.schedule(WindowId(9), schedule);
    scheduler.schedule(WindowId(2), schedule);

    let ids: Vec<WindowId> = scheduler.advance(0.016).into_iter().map(|d| d.id).collect();
    assert_eq!(ids, vec![WindowId(2), WindowId(9)]);
}

#[test]
fn test_only_when_visible_waits_for_signal() {
    let mut scheduler = CaptureScheduler::new();
    scheduler.schedule(
        WindowId(1),
        CaptureSchedule {
            frame_rate: 10.0,
            timing: CaptureTiming::OnlyWhenVisible,
            ..Default::default()
        },
    );

    assert!(scheduler.mark_visible(WindowId(1)).is_none());
    assert!(scheduler.advance(0.2).is_empty());

    let due = scheduler.mark_visible(WindowId(1)).expect("cadence fired");
    assert_eq!(due.id, WindowId(1));
    assert!(scheduler.mark_visible(WindowId(1)).is_none());
}

#[test]
fn test_manual_schedule_never_fires() {
    let mut scheduler = CaptureScheduler::new();
    scheduler.schedule(
        WindowId(1),
        CaptureSchedule {
            frame_rate: -1.0,
            timing: CaptureTiming::Manual,
            ..Default::default()
        },
    );
    assert!(scheduler.advance(1.0).is_empty());
    assert!(scheduler.mark_visible(WindowId(1)).is_none());
}

#[test]
fn test_unschedule() {
    let mut scheduler = CaptureScheduler::new();
    scheduler.schedule(WindowId(1), CaptureSchedule::default());
    assert!(scheduler.is_scheduled(WindowId(1)));
    assert!(scheduler.unschedule(WindowId(1)));
    assert!(!scheduler.unschedule(WindowId(1)));
    assert!(scheduler.is_empty());
}

#[test]
fn test_resolve_priority_policy() {
    use CapturePriority::*;
    assert_eq!(resolve_priority(Auto, true, 40, 5), High);
    assert_eq!(resolve_priority(Auto, false, 2, 5), Middle);
    assert_eq!(resolve_priority(Auto, false, 5, 5), Low);
    assert_eq!(resolve_priority(Low, true, 0, 5), Low);
    assert_eq!(resolve_priority(Middle, false, 99, 5), Middle);
}

proptest! {
    #[test]
    fn prop_cadence_bounded_by_elapsed_time(
        frame_rate in 0.5f32..120.0,
        ticks in prop::collection::vec(0.0f32..0.5, 1..200),
    ) {
        let mut cadence = Cadence::new(frame_rate);
        let mut elapsed = 0.0f32;
        let mut requests = 0u32;
        for dt in ticks {
            elapsed += dt;
            if cadence.advance(dt) {
                requests += 1;
            }
        }

        prop_assert!(requests as f32 <= elapsed * frame_rate + 1.0);
        if elapsed * frame_rate >= 1.01 {
            prop_assert!(requests >= 1);
        }
    }
}
