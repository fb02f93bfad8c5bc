//! Control endpoint: the LED command/acknowledgement handshake.

use std::sync::Arc;

use shared::{domain::LedState, protocol::LED_COMMAND};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    sync::oneshot,
};
use tracing::{debug, trace};

use crate::{
    error::HandshakeError,
    stats::DriverStats,
    termination::Termination,
    urb::{Urb, UrbQueue},
    AckReader, CommandWriter,
};

/// One LED change waiting to be confirmed by the keyboard.
#[derive(Debug)]
pub struct ControlTransfer {
    pub led: LedState,
    completion: oneshot::Sender<Result<(), HandshakeError>>,
}

impl ControlTransfer {
    pub fn new(led: LedState) -> (Self, oneshot::Receiver<Result<(), HandshakeError>>) {
        let (completion, done) = oneshot::channel();
        (Self { led, completion }, done)
    }

    pub(crate) fn complete(self, outcome: Result<(), HandshakeError>) {
        // Nobody waiting is fine: the submitter may have given up.
        let _ = self.completion.send(outcome);
    }
}

pub(crate) struct ControlWorker {
    pub(crate) urb: Arc<Urb<ControlTransfer>>,
    pub(crate) queue: UrbQueue<ControlTransfer>,
    pub(crate) commands: CommandWriter,
    pub(crate) acks: AckReader,
    pub(crate) termination: Termination,
    pub(crate) stats: Arc<DriverStats>,
}

impl ControlWorker {
    /// Serves LED changes until termination. Parked on the queue between
    /// handshakes; that parked state is the re-armed request object.
    pub(crate) async fn run(mut self) {
        while let Some(transfer) = self.queue.next(&self.termination).await {
            self.urb.begin_completion();
            if self.termination.is_set() {
                transfer.complete(Err(HandshakeError::Terminated));
                break;
            }

            let led = transfer.led;
            match self.handshake().await {
                Ok(ack) => {
                    self.stats.record_handshake();
                    trace!(?led, ack, "LED handshake complete");
                    transfer.complete(Ok(()));
                }
                Err(error) => {
                    debug!(%error, "control endpoint stopped");
                    self.termination.set();
                    transfer.complete(Err(error));
                    break;
                }
            }
        }
        debug!("control worker exited");
    }

    async fn handshake(&mut self) -> Result<u8, HandshakeError> {
        self.commands
            .write_all(&[LED_COMMAND])
            .await
            .map_err(HandshakeError::Command)?;
        self.commands
            .flush()
            .await
            .map_err(HandshakeError::Command)?;

        tokio::select! {
            _ = self.termination.cancelled() => Err(HandshakeError::Terminated),
            ack = self.acks.read_u8() => ack.map_err(HandshakeError::Ack),
        }
    }
}
