use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HandshakeError {
    #[error("handshake abandoned: termination requested")]
    Terminated,
    #[error("failed to write LED command: {0}")]
    Command(#[source] io::Error),
    #[error("failed to read LED acknowledgement: {0}")]
    Ack(#[source] io::Error),
}
