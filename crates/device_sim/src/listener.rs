//! Keyboard end of the control endpoint.

use std::sync::Arc;

use shared::{
    domain::LedState,
    output::OutputSink,
    protocol::{ControlCommand, LED_ACK},
};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;
use transport::ByteCell;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListenerReport {
    pub commands: u64,
    pub acks: u64,
    pub transitions: Vec<LedState>,
}

/// Answers LED commands until the driver closes the command stream.
///
/// Each `'C'` reads the LED cell, prints a notice when the value differs
/// from the previous one (starting from `initial`), and is acknowledged
/// either way. Other bytes are counted and ignored.
pub async fn run_listener<R, W>(
    mut commands: R,
    mut acks: W,
    leds: Arc<dyn ByteCell>,
    initial: LedState,
    mut notices: Box<dyn OutputSink>,
) -> ListenerReport
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut report = ListenerReport::default();
    let mut previous = initial;

    loop {
        let byte = match commands.read_u8().await {
            Ok(byte) => byte,
            Err(error) => {
                debug!(%error, "command stream closed");
                break;
            }
        };
        report.commands += 1;

        match ControlCommand::decode(byte) {
            ControlCommand::LedChanged => {
                let current = LedState::from_byte(leds.load());
                if current != previous {
                    notices.emit(current.notice().as_bytes());
                    report.transitions.push(current);
                }
                previous = current;

                if let Err(error) = acks.write_all(&[LED_ACK]).await {
                    debug!(%error, "acknowledgement stream closed");
                    break;
                }
                if let Err(error) = acks.flush().await {
                    debug!(%error, "acknowledgement stream closed");
                    break;
                }
                report.acks += 1;
            }
            ControlCommand::Unknown(byte) => debug!(byte, "ignoring unknown control command"),
        }
    }

    report
}

#[cfg(test)]
#[path = "tests/listener_tests.rs"]
mod tests;
