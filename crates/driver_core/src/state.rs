use std::sync::{Arc, Mutex, PoisonError};

use shared::domain::LedState;
use transport::ByteCell;

/// Driver-local keyboard state. Owned by the interrupt worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceState {
    led: LedState,
    capslock_latched: bool,
}

impl DeviceState {
    pub fn new(led: LedState) -> Self {
        Self {
            led,
            capslock_latched: led == LedState::On,
        }
    }

    pub fn led(&self) -> LedState {
        self.led
    }

    pub fn capslock_latched(&self) -> bool {
        self.capslock_latched
    }

    /// Latch follows LED edges: set on Off->On, cleared on On->Off.
    pub fn set_led(&mut self, led: LedState) {
        self.led = led;
        match led {
            LedState::On if !self.capslock_latched => self.capslock_latched = true,
            LedState::Off if self.capslock_latched => self.capslock_latched = false,
            _ => {}
        }
    }

    /// Display transform for a literal character.
    pub fn apply_capslock(&self, byte: u8) -> u8 {
        if self.capslock_latched && byte.is_ascii_lowercase() {
            byte.to_ascii_uppercase()
        } else {
            byte
        }
    }
}

impl Default for DeviceState {
    fn default() -> Self {
        Self::new(LedState::Off)
    }
}

/// The shared LED cell plus the lock serialising writers to it.
pub struct LedMirror {
    lock: Mutex<()>,
    cell: Arc<dyn ByteCell>,
}

impl LedMirror {
    pub fn new(cell: Arc<dyn ByteCell>) -> Self {
        Self {
            lock: Mutex::new(()),
            cell,
        }
    }

    pub fn publish(&self, led: LedState) {
        let guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.cell.store(led.as_byte());
        drop(guard);
    }

    /// Unlocked; a single byte is never torn.
    pub fn current(&self) -> LedState {
        LedState::from_byte(self.cell.load())
    }
}

#[cfg(test)]
#[path = "tests/state_tests.rs"]
mod tests;
