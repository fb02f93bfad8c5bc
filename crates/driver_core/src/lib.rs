//! Driver side of the simulated USB HID keyboard.
//!
//! Two request objects (interrupt, control) are served by two long-lived
//! worker tasks. The interrupt worker decodes key events and hands capslock
//! changes to the dispatcher, which publishes the LED state and waits for the
//! control worker to complete the command/acknowledgement handshake. Every
//! failure turns into [`Termination`], the single shutdown channel.

use std::{sync::Arc, time::Duration};

use shared::{
    domain::{EndpointKind, LedState},
    error::SetupError,
    output::OutputSink,
};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    task::JoinHandle,
    time::MissedTickBehavior,
};
use tracing::{debug, info, warn};
use transport::{fifo, ByteCell, ChannelNames, ShmCell};

pub mod dispatch;
pub mod error;
mod irq;
pub mod led;
pub mod state;
pub mod stats;
pub mod termination;
pub mod urb;

use dispatch::Dispatcher;
use irq::InterruptWorker;
use led::{ControlTransfer, ControlWorker};
use state::{DeviceState, LedMirror};
use stats::{DriverStats, StatsSnapshot};
pub use termination::Termination;
use urb::Urb;

pub type EventReader = Box<dyn AsyncRead + Send + Sync + Unpin>;
pub type CommandWriter = Box<dyn AsyncWrite + Send + Sync + Unpin>;
pub type AckReader = Box<dyn AsyncRead + Send + Sync + Unpin>;

/// Driver ends of the three byte streams.
pub struct Endpoints {
    pub events: EventReader,
    pub commands: CommandWriter,
    pub acks: AckReader,
}

/// Everything a driver needs, handed over explicitly instead of living in
/// process-wide state.
pub struct DriverContext {
    pub endpoints: Endpoints,
    pub leds: Arc<dyn ByteCell>,
    pub terminate: Arc<dyn ByteCell>,
    pub output: Box<dyn OutputSink>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownReport {
    pub final_led: Option<LedState>,
    pub stats: StatsSnapshot,
}

pub struct Driver {
    endpoints: Option<Endpoints>,
    leds: Option<Arc<dyn ByteCell>>,
    terminate: Option<Arc<dyn ByteCell>>,
    led_lock: Option<Arc<LedMirror>>,
    termination: Option<Termination>,
    int_urb: Option<Arc<Urb<()>>>,
    led_urb: Option<Arc<Urb<ControlTransfer>>>,
    interrupt_worker: Option<JoinHandle<DeviceState>>,
    control_worker: Option<JoinHandle<()>>,
    device_state: Option<DeviceState>,
    stats: Arc<DriverStats>,
}

impl Driver {
    fn unopened() -> Self {
        Self {
            endpoints: None,
            leds: None,
            terminate: None,
            led_lock: None,
            termination: None,
            int_urb: None,
            led_urb: None,
            interrupt_worker: None,
            control_worker: None,
            device_state: None,
            stats: Arc::new(DriverStats::default()),
        }
    }

    /// Connects to the resources the keyboard process created and submits
    /// the initial requests. Blocks until the keyboard opens its pipe ends.
    pub async fn open(
        names: &ChannelNames,
        output: Box<dyn OutputSink>,
    ) -> Result<Self, SetupError> {
        let mut driver = Self::unopened();
        if let Err(error) = driver.establish(names).await {
            driver.release().await;
            return Err(error);
        }
        driver.start_workers(output);
        info!("USB keyboard opened");
        Ok(driver)
    }

    /// Starts a driver over already established channels.
    pub fn start(ctx: DriverContext) -> Self {
        let mut driver = Self::unopened();
        driver.endpoints = Some(ctx.endpoints);
        driver.leds = Some(ctx.leds);
        driver.terminate = Some(ctx.terminate);
        driver.start_workers(ctx.output);
        driver
    }

    async fn establish(&mut self, names: &ChannelNames) -> Result<(), SetupError> {
        let events = fifo::open_reader(&names.event_path()).await?;
        let commands = fifo::open_writer(&names.command_path()).await?;
        let acks = fifo::open_reader(&names.ack_path()).await?;
        self.endpoints = Some(Endpoints {
            events: Box::new(events),
            commands: Box::new(commands),
            acks: Box::new(acks),
        });

        self.leds = Some(Arc::new(ShmCell::open(&names.led_shm)?));
        self.terminate = Some(Arc::new(ShmCell::open(&names.terminate_shm)?));
        Ok(())
    }

    fn start_workers(&mut self, output: Box<dyn OutputSink>) {
        let (Some(endpoints), Some(leds), Some(terminate)) = (
            self.endpoints.take(),
            self.leds.clone(),
            self.terminate.clone(),
        ) else {
            return;
        };

        let termination = Termination::new(terminate);
        let led_lock = Arc::new(LedMirror::new(leds));
        let state = DeviceState::new(led_lock.current());

        let (int_urb, int_queue) = Urb::alloc(EndpointKind::Interrupt, termination.clone());
        let (led_urb, led_queue) = Urb::alloc(EndpointKind::Control, termination.clone());

        let Endpoints {
            events,
            commands,
            acks,
        } = endpoints;

        let control = ControlWorker {
            urb: led_urb.clone(),
            queue: led_queue,
            commands,
            acks,
            termination: termination.clone(),
            stats: self.stats.clone(),
        };
        let dispatcher = Dispatcher::new(
            state,
            led_lock.clone(),
            Some(led_urb.clone()),
            output,
            self.stats.clone(),
        );
        let interrupt = InterruptWorker {
            urb: int_urb.clone(),
            queue: int_queue,
            events,
            dispatcher,
            termination: termination.clone(),
            stats: self.stats.clone(),
        };

        self.control_worker = Some(tokio::spawn(control.run()));
        self.interrupt_worker = Some(tokio::spawn(interrupt.run()));

        let submission = int_urb.submit(());
        debug!(?submission, led = ?state.led(), "interrupt request submitted");

        self.int_urb = Some(int_urb);
        self.led_urb = Some(led_urb);
        self.led_lock = Some(led_lock);
        self.termination = Some(termination);
    }

    pub fn termination(&self) -> Option<Termination> {
        self.termination.clone()
    }

    /// Returns once termination is set locally or observed in the shared
    /// flag. The shared flag is checked every `poll_interval`.
    pub async fn wait_terminated(&self, poll_interval: Duration) {
        let Some(termination) = self.termination.clone() else {
            return;
        };

        let mut ticker = tokio::time::interval(poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = termination.cancelled() => break,
                _ = ticker.tick() => {
                    if termination.observe() {
                        break;
                    }
                }
            }
        }
        debug!("termination observed");
    }

    /// Sets termination first so in-flight workers stop, then releases
    /// everything. Safe to call more than once.
    pub async fn close(&mut self) -> ShutdownReport {
        if let Some(termination) = &self.termination {
            termination.set();
        }
        let report = self.release().await;
        info!(
            tokens = report.stats.tokens,
            handshakes = report.stats.handshakes,
            "USB keyboard closed"
        );
        report
    }

    async fn release(&mut self) -> ShutdownReport {
        if let Some(worker) = self.interrupt_worker.take() {
            match worker.await {
                Ok(state) => self.device_state = Some(state),
                Err(error) => warn!(%error, "interrupt worker failed"),
            }
        }
        let final_led = self.device_state.take().map(|state| state.led());

        self.int_urb = None;
        self.led_urb = None;
        if let Some(worker) = self.control_worker.take() {
            if let Err(error) = worker.await {
                warn!(%error, "control worker failed");
            }
        }

        self.leds = None;
        self.terminate = None;
        self.endpoints = None;
        self.led_lock = None;

        ShutdownReport {
            final_led,
            stats: self.stats.snapshot(),
        }
    }
}

impl Drop for Driver {
    fn drop(&mut self) {
        if self.interrupt_worker.is_some() || self.control_worker.is_some() {
            if let Some(termination) = &self.termination {
                termination.set();
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
