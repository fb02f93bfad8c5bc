//! Interrupt endpoint: polls the event stream one token at a time.

use std::sync::Arc;

use shared::protocol::Token;
use tokio::io::AsyncReadExt;
use tracing::{debug, info};

use crate::{
    dispatch::Dispatcher,
    state::DeviceState,
    stats::DriverStats,
    termination::Termination,
    urb::{Urb, UrbQueue},
    EventReader,
};

pub(crate) struct InterruptWorker {
    pub(crate) urb: Arc<Urb<()>>,
    pub(crate) queue: UrbQueue<()>,
    pub(crate) events: EventReader,
    pub(crate) dispatcher: Dispatcher,
    pub(crate) termination: Termination,
    pub(crate) stats: Arc<DriverStats>,
}

impl InterruptWorker {
    /// Returns the device state so shutdown can release it.
    pub(crate) async fn run(mut self) -> DeviceState {
        while self.queue.next(&self.termination).await.is_some() {
            self.urb.begin_completion();
            if self.termination.is_set() {
                break;
            }

            let byte = tokio::select! {
                _ = self.termination.cancelled() => break,
                read = self.events.read_u8() => read,
            };
            let token = match byte {
                Ok(byte) => Token::decode(byte),
                Err(error) => {
                    debug!(%error, "event stream closed");
                    self.termination.set();
                    break;
                }
            };
            self.stats.record_token();

            match token {
                Token::EndOfInput => {
                    info!("end of input received");
                    self.termination.set();
                    break;
                }
                Token::NoEvent => {}
                Token::CapsLockPress => {
                    let led = self.dispatcher.state().led().toggled();
                    self.dispatcher.report_key(token, led).await;
                }
                Token::CapsLockRelease => {
                    let led = self.dispatcher.state().led();
                    self.dispatcher.report_key(token, led).await;
                }
                Token::Char(byte) => self.dispatcher.display(byte),
            }

            if !self.urb.submit(()).is_started() {
                break;
            }
        }
        debug!("interrupt worker exited");
        self.dispatcher.into_state()
    }
}
