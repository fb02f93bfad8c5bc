use std::sync::Arc;

use shared::protocol::{RUNNING, TERMINATED};
use tokio_util::sync::CancellationToken;
use transport::ByteCell;

/// Shutdown signal shared by every participant.
///
/// The shared cell makes termination visible to the peer process; the
/// token wakes local tasks parked on a queue or a pipe read. Once set it is
/// never cleared.
#[derive(Clone)]
pub struct Termination {
    shared: Arc<dyn ByteCell>,
    token: CancellationToken,
}

impl Termination {
    pub fn new(shared: Arc<dyn ByteCell>) -> Self {
        Self {
            shared,
            token: CancellationToken::new(),
        }
    }

    pub fn set(&self) {
        if self.shared.load() == RUNNING {
            self.shared.store(TERMINATED);
        }
        self.token.cancel();
    }

    pub fn is_set(&self) -> bool {
        self.token.is_cancelled() || self.shared.load() != RUNNING
    }

    /// Folds a flag raised by the peer into the local token.
    pub fn observe(&self) -> bool {
        if !self.token.is_cancelled() && self.shared.load() != RUNNING {
            self.token.cancel();
        }
        self.token.is_cancelled()
    }

    pub async fn cancelled(&self) {
        self.token.cancelled().await;
    }
}

impl std::fmt::Debug for Termination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Termination")
            .field("shared", &self.shared.load())
            .field("cancelled", &self.token.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
#[path = "tests/termination_tests.rs"]
mod tests;
