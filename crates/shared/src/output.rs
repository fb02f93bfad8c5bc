//! Where displayed characters and LED notices end up.

use std::{
    io::{self, Write},
    sync::{Arc, Mutex, PoisonError},
};

use tracing::debug;

/// Receives raw display bytes; nothing is re-encoded on the way out.
pub trait OutputSink: Send {
    fn emit(&mut self, bytes: &[u8]);
}

/// Writes straight to stdout and flushes, so each key shows up as it is
/// processed.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutSink;

impl OutputSink for StdoutSink {
    fn emit(&mut self, bytes: &[u8]) {
        write_logged(&mut io::stdout().lock(), bytes);
    }
}

/// Writes and flushes; a failure is logged and reported as `false`.
fn write_logged(out: &mut impl Write, bytes: &[u8]) -> bool {
    match out.write_all(bytes).and_then(|()| out.flush()) {
        Ok(()) => true,
        Err(error) => {
            debug!(%error, "display write failed");
            false
        }
    }
}

/// Collects output in memory; clones share the same buffer.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bytes(&self) -> Vec<u8> {
        self.buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The collected bytes as text, with invalid UTF-8 replaced.
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.bytes()).into_owned()
    }
}

impl OutputSink for MemorySink {
    fn emit(&mut self, bytes: &[u8]) {
        self.buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(bytes);
    }
}

#[cfg(test)]
#[path = "tests/output_tests.rs"]
mod tests;
