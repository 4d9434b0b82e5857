use super::*;

#[test]
fn manual_clock_starts_at_epoch_given() {
    let clock = ManualClock::new(1_000);
    assert_eq!(clock.now_ms(), 1_000);
}

#[test]
fn manual_clock_advances_both_views() {
    let clock = ManualClock::new(0);
    let start = clock.now();
    clock.advance_ms(75);
    assert_eq!(clock.now().duration_since(start), Duration::from_millis(75));
    assert_eq!(clock.now_ms(), 75);
}

#[test]
fn manual_clock_does_not_move_on_its_own() {
    let clock = ManualClock::default();
    let a = clock.now();
    std::thread::sleep(Duration::from_millis(2));
    assert_eq!(clock.now(), a);
}

#[test]
fn system_clock_is_after_2020() {
    assert!(SystemClock.now_ms() > 1_577_836_800_000);
}
