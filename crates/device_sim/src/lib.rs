//! Keyboard side of the simulation: owns the named resources, feeds key
//! events to the driver and answers its LED commands.

use std::{sync::Arc, time::Duration};

use anyhow::{bail, Context, Result};
use shared::{
    domain::LedState,
    error::SetupError,
    output::OutputSink,
    protocol::{RUNNING, TERMINATED},
};
use tokio::net::unix::pipe;
use tracing::{debug, info, warn};
use transport::{fifo, ByteCell, ChannelNames, FifoSet, ShmCell};

pub mod feeder;
pub mod listener;
pub mod peer;

pub use feeder::{feed_events, FeedError};
pub use listener::{run_listener, ListenerReport};
pub use peer::DriverPeer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    /// Pause after each fed byte, modelling the device poll cadence.
    pub feed_delay: Duration,
    /// How long the driver may take to exit on its own after end of input.
    pub shutdown_grace: Duration,
    /// Retry interval while waiting for the driver to open the event pipe.
    pub connect_retry: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            feed_delay: Duration::from_millis(20),
            shutdown_grace: Duration::from_secs(2),
            connect_retry: Duration::from_millis(10),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReport {
    /// Script bytes written, including a partial feed cut short by the driver.
    pub bytes_fed: usize,
    pub feed_completed: bool,
    pub listener: ListenerReport,
    pub driver_exit: i32,
}

pub struct Keyboard {
    names: ChannelNames,
    initial_led: LedState,
    fifos: Option<FifoSet>,
    leds: Option<Arc<ShmCell>>,
    terminate: Option<Arc<ShmCell>>,
}

impl Keyboard {
    /// Creates the three pipes and both shared cells. Whatever was created
    /// before a failure is removed again.
    pub fn create(names: &ChannelNames, initial_led: LedState) -> Result<Self, SetupError> {
        let mut keyboard = Self {
            names: names.clone(),
            initial_led,
            fifos: None,
            leds: None,
            terminate: None,
        };
        if let Err(error) = keyboard.establish() {
            keyboard.cleanup();
            return Err(error);
        }
        info!(dir = %names.fifo_dir.display(), "keyboard resources created");
        Ok(keyboard)
    }

    fn establish(&mut self) -> Result<(), SetupError> {
        self.fifos = Some(FifoSet::create(&self.names)?);
        self.terminate = Some(Arc::new(ShmCell::create(
            &self.names.terminate_shm,
            RUNNING,
        )?));
        self.leds = Some(Arc::new(ShmCell::create(
            &self.names.led_shm,
            self.initial_led.as_byte(),
        )?));
        Ok(())
    }

    /// Tells the driver to stop through the shared termination flag.
    pub fn raise_termination(&self) {
        if let Some(terminate) = &self.terminate {
            terminate.store(TERMINATED);
        }
    }

    pub fn led(&self) -> Option<LedState> {
        self.leds
            .as_ref()
            .map(|cell| LedState::from_byte(cell.load()))
    }

    /// Runs one session against an already spawned driver.
    pub async fn run<P: DriverPeer>(
        &mut self,
        script: &[u8],
        peer: &mut P,
        settings: &SessionSettings,
        notices: Box<dyn OutputSink>,
    ) -> Result<SessionReport> {
        let Some(leds) = self.leds.clone() else {
            bail!("keyboard resources already released");
        };

        let mut events = match self.connect_events(peer, settings.connect_retry).await {
            Ok(events) => events,
            Err(error) => {
                self.raise_termination();
                if let Err(stop_error) = peer.request_stop() {
                    debug!(%stop_error, "failed to signal driver");
                }
                return Err(error);
            }
        };

        let listener = tokio::spawn(listen(
            self.names.clone(),
            leds,
            self.initial_led,
            notices,
        ));

        let fed = feed_events(&mut events, script, settings.feed_delay).await;
        drop(events);
        let (bytes_fed, feed_completed) = match fed {
            Ok(count) => {
                debug!(count, "script fed");
                (count, true)
            }
            Err(error) => {
                debug!(%error, "event stream closed by driver");
                self.raise_termination();
                (error.written, false)
            }
        };

        let driver_exit =
            match tokio::time::timeout(settings.shutdown_grace, peer.wait_exit_code()).await {
                Ok(code) => code.context("failed to wait for driver")?,
                Err(_) => {
                    info!("driver still running after grace period, raising termination flag");
                    self.raise_termination();
                    peer.wait_exit_code()
                        .await
                        .context("failed to wait for driver")?
                }
            };

        let listener = match tokio::time::timeout(settings.shutdown_grace, listener).await {
            Ok(Ok(Ok(report))) => report,
            Ok(Ok(Err(error))) => {
                warn!(%error, "listener could not open control pipes");
                ListenerReport::default()
            }
            Ok(Err(error)) => {
                warn!(%error, "listener task failed");
                ListenerReport::default()
            }
            Err(_) => {
                warn!("listener still blocked after driver exit");
                ListenerReport::default()
            }
        };

        Ok(SessionReport {
            bytes_fed,
            feed_completed,
            listener,
            driver_exit,
        })
    }

    async fn connect_events<P: DriverPeer>(
        &self,
        peer: &mut P,
        retry: Duration,
    ) -> Result<pipe::Sender> {
        let path = self.names.event_path();
        loop {
            if let Some(sender) = fifo::try_open_writer(&path)? {
                debug!(path = %path.display(), "event stream connected");
                return Ok(sender);
            }
            if let Some(code) = peer
                .try_exit_code()
                .context("failed to poll driver process")?
            {
                bail!("driver exited with code {code} before opening the event stream");
            }
            tokio::time::sleep(retry).await;
        }
    }

    /// Unmaps and unlinks both cells and removes the pipes. Idempotent.
    pub fn cleanup(&mut self) {
        if self.leds.take().is_some() {
            unlink(&self.names.led_shm);
        }
        if self.terminate.take().is_some() {
            unlink(&self.names.terminate_shm);
        }
        if let Some(mut fifos) = self.fifos.take() {
            fifos.remove();
        }
    }
}

impl Drop for Keyboard {
    fn drop(&mut self) {
        self.cleanup();
    }
}

fn unlink(name: &str) {
    if let Err(error) = ShmCell::unlink(name) {
        debug!(name, %error, "shm_unlink failed");
    }
}

async fn listen(
    names: ChannelNames,
    leds: Arc<ShmCell>,
    initial: LedState,
    notices: Box<dyn OutputSink>,
) -> Result<ListenerReport, SetupError> {
    let commands = fifo::open_reader(&names.command_path()).await?;
    let acks = fifo::open_writer(&names.ack_path()).await?;
    Ok(run_listener(commands, acks, leds, initial, notices).await)
}
