use std::sync::Arc;

use shared::{domain::LedState, output::OutputSink, protocol::Token};
use tracing::debug;

use crate::{
    led::ControlTransfer,
    state::{DeviceState, LedMirror},
    stats::DriverStats,
    urb::{submit_urb, Urb},
};

/// Reacts to decoded tokens on behalf of the interrupt worker.
pub struct Dispatcher {
    state: DeviceState,
    leds: Arc<LedMirror>,
    control: Option<Arc<Urb<ControlTransfer>>>,
    output: Box<dyn OutputSink>,
    stats: Arc<DriverStats>,
}

impl Dispatcher {
    pub fn new(
        state: DeviceState,
        leds: Arc<LedMirror>,
        control: Option<Arc<Urb<ControlTransfer>>>,
        output: Box<dyn OutputSink>,
        stats: Arc<DriverStats>,
    ) -> Self {
        Self {
            state,
            leds,
            control,
            output,
            stats,
        }
    }

    pub fn state(&self) -> DeviceState {
        self.state
    }

    pub fn into_state(self) -> DeviceState {
        self.state
    }

    /// Only capslock codes have an effect. A value equal to the current LED
    /// (a key-up) is acknowledged without a handshake. Otherwise the LED is
    /// published and the control request is submitted; this returns once the
    /// keyboard has acknowledged, so at most one handshake is outstanding.
    pub async fn report_key(&mut self, code: Token, value: LedState) {
        if !code.is_capslock() {
            return;
        }
        if value == self.state.led() {
            debug!(?code, led = ?value, "capslock key acknowledged without LED change");
            return;
        }

        self.state.set_led(value);
        self.leds.publish(value);

        let (transfer, done) = ControlTransfer::new(value);
        let submission = submit_urb(self.control.as_deref(), transfer);
        if !submission.is_started() {
            debug!(?submission, led = ?value, "LED change not submitted");
            return;
        }

        match done.await {
            Ok(Ok(())) => debug!(led = ?value, "LED change acknowledged"),
            Ok(Err(error)) => debug!(%error, "LED handshake failed"),
            Err(_) => debug!("control worker dropped the LED change"),
        }
    }

    /// Forwards a literal character to the display with capslock applied.
    pub fn display(&mut self, byte: u8) {
        let shown = self.state.apply_capslock(byte);
        self.output.emit(&[shown]);
        self.stats.record_character();
    }
}

#[cfg(test)]
#[path = "tests/dispatch_tests.rs"]
mod tests;
