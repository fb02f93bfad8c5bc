use std::io;

use async_trait::async_trait;
use tokio::process::Child;

/// The driver process as seen from the keyboard side.
#[async_trait]
pub trait DriverPeer: Send {
    /// `Some(code)` once the driver has exited.
    fn try_exit_code(&mut self) -> io::Result<Option<i32>>;
    async fn wait_exit_code(&mut self) -> io::Result<i32>;
    /// Asks the driver to shut down on its own.
    fn request_stop(&mut self) -> io::Result<()>;
}

#[async_trait]
impl DriverPeer for Child {
    fn try_exit_code(&mut self) -> io::Result<Option<i32>> {
        Ok(self.try_wait()?.map(|status| status.code().unwrap_or(-1)))
    }

    async fn wait_exit_code(&mut self) -> io::Result<i32> {
        let status = self.wait().await?;
        Ok(status.code().unwrap_or(-1))
    }

    fn request_stop(&mut self) -> io::Result<()> {
        let Some(pid) = self.id() else {
            return Ok(());
        };
        let pid = libc::pid_t::try_from(pid).map_err(io::Error::other)?;
        // SAFETY: plain kill(2) on a child we spawned.
        if unsafe { libc::kill(pid, libc::SIGTERM) } != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}
