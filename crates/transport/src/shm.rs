use std::{
    ffi::CString,
    io,
    ptr::{self, NonNull},
    sync::atomic::{AtomicU8, Ordering},
};

use shared::error::SetupError;
use tracing::debug;

use crate::ByteCell;

const CELL_LEN: usize = 1;
const SHM_MODE: libc::mode_t = 0o666;

/// A one-byte POSIX shared memory segment mapped read/write.
///
/// Dropping the cell unmaps it; the segment name survives until
/// [`ShmCell::unlink`] is called by its creator.
#[derive(Debug)]
pub struct ShmCell {
    name: String,
    ptr: NonNull<AtomicU8>,
}

// SAFETY: the mapping is only touched through atomic byte operations and
// stays valid until drop.
unsafe impl Send for ShmCell {}
unsafe impl Sync for ShmCell {}

impl ShmCell {
    /// Creates (or reuses) the segment, sizes it and writes `initial`.
    pub fn create(name: &str, initial: u8) -> Result<Self, SetupError> {
        let cell = Self::map(name, libc::O_CREAT | libc::O_RDWR, true)?;
        cell.store(initial);
        Ok(cell)
    }

    /// Opens a segment another process created.
    pub fn open(name: &str) -> Result<Self, SetupError> {
        Self::map(name, libc::O_RDWR, false)
    }

    /// Removes the segment name. A missing segment is not an error.
    pub fn unlink(name: &str) -> io::Result<()> {
        let c_name = CString::new(name)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "nul byte in name"))?;
        // SAFETY: c_name is a valid NUL-terminated string.
        let rc = unsafe { libc::shm_unlink(c_name.as_ptr()) };
        if rc != 0 {
            let err = io::Error::last_os_error();
            if err.raw_os_error() != Some(libc::ENOENT) {
                return Err(err);
            }
        }
        Ok(())
    }

    fn map(name: &str, flags: libc::c_int, size: bool) -> Result<Self, SetupError> {
        let c_name = CString::new(name).map_err(|_| SetupError::InvalidName {
            name: name.to_string(),
        })?;

        // SAFETY: c_name is a valid NUL-terminated string.
        let fd = unsafe { libc::shm_open(c_name.as_ptr(), flags, SHM_MODE) };
        if fd == -1 {
            return Err(SetupError::SharedMemory {
                name: name.to_string(),
                source: io::Error::last_os_error(),
            });
        }

        // SAFETY: fd is a freshly opened shared memory descriptor.
        if size && unsafe { libc::ftruncate(fd, CELL_LEN as libc::off_t) } != 0 {
            let source = io::Error::last_os_error();
            // SAFETY: fd is open and owned here.
            unsafe { libc::close(fd) };
            return Err(SetupError::SharedMemory {
                name: name.to_string(),
                source,
            });
        }

        // SAFETY: mapping CELL_LEN bytes of a descriptor we own; the result
        // is checked against MAP_FAILED below.
        let addr = unsafe {
            libc::mmap(
                ptr::null_mut(),
                CELL_LEN,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                fd,
                0,
            )
        };
        let map_err = io::Error::last_os_error();
        // SAFETY: the mapping keeps the segment alive; the descriptor is no
        // longer needed.
        unsafe { libc::close(fd) };

        if addr == libc::MAP_FAILED {
            return Err(SetupError::Map {
                name: name.to_string(),
                source: map_err,
            });
        }
        let ptr = NonNull::new(addr.cast::<AtomicU8>()).ok_or_else(|| SetupError::Map {
            name: name.to_string(),
            source: io::Error::other("mmap returned null"),
        })?;

        debug!(name, "shared memory cell mapped");
        Ok(Self {
            name: name.to_string(),
            ptr,
        })
    }

    fn cell(&self) -> &AtomicU8 {
        // SAFETY: ptr points at a live, page-aligned mapping of at least one
        // byte for as long as self exists.
        unsafe { self.ptr.as_ref() }
    }
}

impl ByteCell for ShmCell {
    fn load(&self) -> u8 {
        self.cell().load(Ordering::Acquire)
    }

    fn store(&self, value: u8) {
        self.cell().store(value, Ordering::Release);
    }
}

impl Drop for ShmCell {
    fn drop(&mut self) {
        // SAFETY: unmapping exactly the region mapped in `map`.
        let rc = unsafe { libc::munmap(self.ptr.as_ptr().cast(), CELL_LEN) };
        if rc != 0 {
            debug!(name = %self.name, error = %io::Error::last_os_error(), "munmap failed");
        }
    }
}

#[cfg(test)]
#[path = "tests/shm_tests.rs"]
mod tests;
