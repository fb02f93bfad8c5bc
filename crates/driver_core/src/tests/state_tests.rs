use super::*;

use transport::LocalCell;

#[test]
fn latch_follows_led_edges() {
    let mut state = DeviceState::default();
    assert_eq!(state.led(), LedState::Off);
    assert!(!state.capslock_latched());

    state.set_led(LedState::On);
    assert!(state.capslock_latched());
    state.set_led(LedState::On);
    assert!(state.capslock_latched());
    state.set_led(LedState::Off);
    assert!(!state.capslock_latched());
}

#[test]
fn starting_with_led_on_starts_latched() {
    assert!(DeviceState::new(LedState::On).capslock_latched());
}

#[test]
fn capslock_only_uppercases_ascii_lowercase() {
    let mut state = DeviceState::default();
    assert_eq!(state.apply_capslock(b'a'), b'a');

    state.set_led(LedState::On);
    assert_eq!(state.apply_capslock(b'a'), b'A');
    assert_eq!(state.apply_capslock(b'Q'), b'Q');
    assert_eq!(state.apply_capslock(b'7'), b'7');
}

#[test]
fn mirror_publishes_into_the_cell() {
    let cell = Arc::new(LocalCell::new(0));
    let mirror = LedMirror::new(cell.clone());

    mirror.publish(LedState::On);
    assert_eq!(cell.load(), 1);
    assert_eq!(mirror.current(), LedState::On);

    mirror.publish(LedState::Off);
    assert_eq!(mirror.current(), LedState::Off);
}
