use std::{io, path::PathBuf};

use thiserror::Error;

/// Failures while establishing channels or shared memory. Always fatal for
/// the process that hits them.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("failed to create named pipe '{}': {source}", .path.display())]
    FifoCreate { path: PathBuf, source: io::Error },
    #[error("failed to open named pipe '{}': {source}", .path.display())]
    FifoOpen { path: PathBuf, source: io::Error },
    #[error("shm_open failed for '{name}': {source}")]
    SharedMemory { name: String, source: io::Error },
    #[error("mmap failed for '{name}': {source}")]
    Map { name: String, source: io::Error },
    #[error("invalid resource name '{name}'")]
    InvalidName { name: String },
}

impl SetupError {
    /// Name of the pipe or segment the failure refers to.
    pub fn resource(&self) -> String {
        match self {
            Self::FifoCreate { path, .. } | Self::FifoOpen { path, .. } => {
                path.display().to_string()
            }
            Self::SharedMemory { name, .. }
            | Self::Map { name, .. }
            | Self::InvalidName { name } => name.clone(),
        }
    }
}
