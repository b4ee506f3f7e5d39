// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn system_clock_does_not_go_backwards() {
    let clock = SystemClock;
    let t1 = clock.epoch_ms();
    std::thread::sleep(Duration::from_millis(2));
    let t2 = clock.epoch_ms();
    assert!(t2 >= t1);
}

#[test]
fn fake_clock_starts_at_fixed_epoch() {
    assert_eq!(FakeClock::new().epoch_ms(), 1_700_000_000_000);
}

#[test]
fn fake_clock_advance_steps_time() {
    let clock = FakeClock::new();
    let before = clock.epoch_ms();
    clock.advance(Duration::from_secs(90));
    assert_eq!(clock.epoch_ms(), before + 90_000);
}

#[test]
fn fake_clock_is_shared_across_clones() {
    let clock1 = FakeClock::new();
    let clock2 = clock1.clone();
    clock2.advance(Duration::from_secs(30));
    assert_eq!(clock1.epoch_ms(), clock2.epoch_ms());
}

#[test]
fn fake_clock_set_epoch_ms() {
    let clock = FakeClock::default();
    clock.set_epoch_ms(42);
    assert_eq!(clock.epoch_ms(), 42);
}

#[test]
fn timestamp_renders_the_log_form() {
    let clock = FakeClock::new();
    clock.set_epoch_ms(1_700_000_000_000);
    let ts = clock.timestamp();
    assert!(ts.ends_with('Z'), "UTC suffix expected: {ts}");
    assert_eq!(ts, crate::event::format_timestamp(1_700_000_000_000));
}
