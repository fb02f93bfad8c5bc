//! Request objects: one unit of asynchronous work per endpoint.
//!
//! Each endpoint has a single long-lived worker task draining a capacity-1
//! queue. `active` is raised by a successful submission and dropped when the
//! worker starts the completion, so a request object is never queued twice.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use shared::domain::EndpointKind;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::trace;

use crate::termination::Termination;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    Started,
    AlreadyActive,
    Terminated,
    /// The request object has been freed or its worker is gone.
    Released,
}

impl Submission {
    pub fn is_started(self) -> bool {
        self == Self::Started
    }
}

#[derive(Debug)]
pub struct Urb<T> {
    kind: EndpointKind,
    active: AtomicBool,
    queue: mpsc::Sender<T>,
    termination: Termination,
}

impl<T> Urb<T> {
    pub fn alloc(kind: EndpointKind, termination: Termination) -> (Arc<Self>, UrbQueue<T>) {
        let (queue, rx) = mpsc::channel(1);
        let urb = Arc::new(Self {
            kind,
            active: AtomicBool::new(false),
            queue,
            termination,
        });
        (urb, UrbQueue { rx })
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Never blocks. Rejected submissions are silent no-ops.
    pub fn submit(&self, transfer: T) -> Submission {
        if self.termination.is_set() {
            return Submission::Terminated;
        }
        if self
            .active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Submission::AlreadyActive;
        }

        match self.queue.try_send(transfer) {
            Ok(()) => {
                trace!(kind = %self.kind, "urb submitted");
                Submission::Started
            }
            Err(TrySendError::Full(_)) => {
                self.active.store(false, Ordering::Release);
                Submission::AlreadyActive
            }
            Err(TrySendError::Closed(_)) => {
                self.active.store(false, Ordering::Release);
                Submission::Released
            }
        }
    }

    pub(crate) fn begin_completion(&self) {
        self.active.store(false, Ordering::Release);
    }
}

/// Submits through a request object that may already have been freed.
pub fn submit_urb<T>(urb: Option<&Urb<T>>, transfer: T) -> Submission {
    match urb {
        Some(urb) => urb.submit(transfer),
        None => Submission::Released,
    }
}

/// Worker side of a request object.
#[derive(Debug)]
pub struct UrbQueue<T> {
    rx: mpsc::Receiver<T>,
}

impl<T> UrbQueue<T> {
    /// Next submitted transfer, or `None` once termination is set or every
    /// handle to the request object is gone.
    pub async fn next(&mut self, termination: &Termination) -> Option<T> {
        tokio::select! {
            biased;
            _ = termination.cancelled() => None,
            transfer = self.rx.recv() => transfer,
        }
    }
}

#[cfg(test)]
#[path = "tests/urb_tests.rs"]
mod tests;
