use std::{
    ffi::CString,
    fs::{self, OpenOptions},
    io,
    os::unix::ffi::OsStrExt,
    path::{Path, PathBuf},
};

use shared::error::SetupError;
use tokio::net::unix::pipe;
use tracing::debug;

use crate::ChannelNames;

const FIFO_MODE: libc::mode_t = 0o666;

/// Replaces whatever is at `path` with a fresh named pipe.
pub fn create_fifo(path: &Path) -> Result<(), SetupError> {
    remove_fifo(path).map_err(|source| SetupError::FifoCreate {
        path: path.to_path_buf(),
        source,
    })?;

    let c_path = CString::new(path.as_os_str().as_bytes()).map_err(|_| SetupError::InvalidName {
        name: path.display().to_string(),
    })?;
    // SAFETY: c_path is a valid NUL-terminated string for the duration of the call.
    let rc = unsafe { libc::mkfifo(c_path.as_ptr(), FIFO_MODE) };
    if rc != 0 {
        return Err(SetupError::FifoCreate {
            path: path.to_path_buf(),
            source: io::Error::last_os_error(),
        });
    }
    debug!(path = %path.display(), "named pipe created");
    Ok(())
}

/// Missing pipes are not an error.
pub fn remove_fifo(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

/// Opens the read end, blocking (off the runtime) until a writer shows up.
pub async fn open_reader(path: &Path) -> Result<pipe::Receiver, SetupError> {
    let file = open_blocking(path, false).await?;
    pipe::Receiver::from_file(file).map_err(|source| SetupError::FifoOpen {
        path: path.to_path_buf(),
        source,
    })
}

/// Opens the write end, blocking (off the runtime) until a reader shows up.
pub async fn open_writer(path: &Path) -> Result<pipe::Sender, SetupError> {
    let file = open_blocking(path, true).await?;
    pipe::Sender::from_file(file).map_err(|source| SetupError::FifoOpen {
        path: path.to_path_buf(),
        source,
    })
}

/// Non-blocking attempt at the write end. `Ok(None)` means nobody has the
/// read end open yet.
pub fn try_open_writer(path: &Path) -> Result<Option<pipe::Sender>, SetupError> {
    match pipe::OpenOptions::new().open_sender(path) {
        Ok(sender) => Ok(Some(sender)),
        Err(err) if err.raw_os_error() == Some(libc::ENXIO) => Ok(None),
        Err(source) => Err(SetupError::FifoOpen {
            path: path.to_path_buf(),
            source,
        }),
    }
}

async fn open_blocking(path: &Path, write: bool) -> Result<fs::File, SetupError> {
    let owned = path.to_path_buf();
    let joined = tokio::task::spawn_blocking(move || {
        let mut options = OpenOptions::new();
        if write {
            options.write(true);
        } else {
            options.read(true);
        }
        options.open(&owned)
    })
    .await;

    match joined {
        Ok(Ok(file)) => Ok(file),
        Ok(Err(source)) => Err(SetupError::FifoOpen {
            path: path.to_path_buf(),
            source,
        }),
        Err(join_err) => Err(SetupError::FifoOpen {
            path: path.to_path_buf(),
            source: io::Error::other(join_err),
        }),
    }
}

/// The three pipes, owned by the process that created them. Removed on
/// drop.
#[derive(Debug)]
pub struct FifoSet {
    paths: Vec<PathBuf>,
}

impl FifoSet {
    pub fn create(names: &ChannelNames) -> Result<Self, SetupError> {
        let mut set = Self { paths: Vec::new() };
        for path in names.fifo_paths() {
            create_fifo(&path)?;
            set.paths.push(path);
        }
        Ok(set)
    }

    pub fn remove(&mut self) {
        for path in self.paths.drain(..) {
            if let Err(error) = remove_fifo(&path) {
                debug!(path = %path.display(), %error, "failed to remove named pipe");
            }
        }
    }
}

impl Drop for FifoSet {
    fn drop(&mut self) {
        self.remove();
    }
}

#[cfg(test)]
#[path = "tests/fifo_tests.rs"]
mod tests;
