//! Channel layer: named pipes for the three byte streams and one-byte POSIX
//! shared memory cells for the LED state and the termination flag.

use std::{
    path::PathBuf,
    sync::atomic::{AtomicU8, Ordering},
};

pub mod fifo;
pub mod shm;

pub use fifo::FifoSet;
pub use shm::ShmCell;

/// A single shared byte. Writers serialise among themselves; readers never
/// lock.
pub trait ByteCell: Send + Sync {
    fn load(&self) -> u8;
    fn store(&self, value: u8);
}

/// Process-local cell, used when both roles live in one process.
#[derive(Debug, Default)]
pub struct LocalCell {
    value: AtomicU8,
}

impl LocalCell {
    pub fn new(value: u8) -> Self {
        Self {
            value: AtomicU8::new(value),
        }
    }
}

impl ByteCell for LocalCell {
    fn load(&self) -> u8 {
        self.value.load(Ordering::Acquire)
    }

    fn store(&self, value: u8) {
        self.value.store(value, Ordering::Release);
    }
}

/// Names of every resource the two processes rendezvous on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelNames {
    pub fifo_dir: PathBuf,
    pub event_pipe: String,
    pub command_pipe: String,
    pub ack_pipe: String,
    pub led_shm: String,
    pub terminate_shm: String,
}

impl Default for ChannelNames {
    fn default() -> Self {
        Self {
            fifo_dir: PathBuf::from("."),
            event_pipe: "int_pipe".into(),
            command_pipe: "ctrl_cmd_pipe".into(),
            ack_pipe: "ctrl_ack_pipe".into(),
            led_shm: "/led_shm".into(),
            terminate_shm: "/terminate_shm".into(),
        }
    }
}

impl ChannelNames {
    pub fn event_path(&self) -> PathBuf {
        self.fifo_dir.join(&self.event_pipe)
    }

    pub fn command_path(&self) -> PathBuf {
        self.fifo_dir.join(&self.command_pipe)
    }

    pub fn ack_path(&self) -> PathBuf {
        self.fifo_dir.join(&self.ack_pipe)
    }

    pub fn fifo_paths(&self) -> [PathBuf; 3] {
        [self.event_path(), self.command_path(), self.ack_path()]
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
