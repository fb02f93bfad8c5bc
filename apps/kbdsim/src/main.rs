use std::{
    future::Future,
    io,
    path::{Path, PathBuf},
    process::ExitCode,
    time::Duration,
};

use anyhow::{Context, Result};
use clap::Parser;
use device_sim::Keyboard;
use driver_core::{Driver, ShutdownReport, Termination};
use shared::output::StdoutSink;
use tokio::{
    process::Command,
    signal::unix::{signal, SignalKind},
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod config;

use config::{load_settings, Settings};

/// Simulated USB keyboard: feeds a script of key events to a driver process
/// and mirrors its capslock LED.
#[derive(Parser, Debug)]
#[command(name = "kbdsim")]
struct Args {
    /// Script of key event bytes ('@' capslock press, '&' release, '#' idle).
    #[arg(required_unless_present = "driver")]
    script: Option<PathBuf>,
    /// Run as the driver process; spawned by the device role.
    #[arg(long, hide = true)]
    driver: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let settings = load_settings();

    match (args.driver, args.script) {
        (true, _) => run_driver(&settings).await,
        (false, Some(script)) => match run_device(&settings, &script).await {
            Ok(code) => code,
            Err(error) => {
                error!("{error:#}");
                eprintln!("kbdsim: {error:#}");
                ExitCode::FAILURE
            }
        },
        (false, None) => ExitCode::FAILURE,
    }
}

async fn run_driver(settings: &Settings) -> ExitCode {
    let names = settings.channel_names();
    let driver = match Driver::open(&names, Box::new(StdoutSink)).await {
        Ok(driver) => driver,
        Err(error) => {
            error!(%error, resource = %error.resource(), "driver setup failed");
            eprintln!("Failed to open USB keyboard: {error}");
            return ExitCode::FAILURE;
        }
    };

    let poll = settings.poll_interval();
    let report = match shutdown_signal() {
        Ok(stop) => drive_until_terminated(driver, poll, stop).await,
        Err(error) => {
            warn!(%error, "failed to install signal handlers");
            drive_until_terminated(driver, poll, std::future::pending()).await
        }
    };
    info!(final_led = ?report.final_led, characters = report.stats.characters, "driver finished");
    ExitCode::SUCCESS
}

/// Resolves on the first SIGINT or SIGTERM. Handlers are installed before
/// this returns, so a signal sent afterwards is never lost.
fn shutdown_signal() -> io::Result<impl Future<Output = ()> + Send + 'static> {
    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;
    Ok(async move {
        tokio::select! {
            _ = interrupt.recv() => {}
            _ = terminate.recv() => {}
        }
    })
}

/// Runs the driver until termination is set from any source, `stop`
/// resolving included, then closes it.
async fn drive_until_terminated<F>(mut driver: Driver, poll: Duration, stop: F) -> ShutdownReport
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Some(termination) = driver.termination() {
        tokio::spawn(forward_stop(termination, stop));
    }
    driver.wait_terminated(poll).await;
    driver.close().await
}

async fn forward_stop<F>(termination: Termination, stop: F)
where
    F: Future<Output = ()>,
{
    tokio::select! {
        _ = stop => {
            info!("signal received, shutting down");
            termination.set();
        }
        _ = termination.cancelled() => {}
    }
}

async fn run_device(settings: &Settings, script_path: &Path) -> Result<ExitCode> {
    let script = tokio::fs::read(script_path)
        .await
        .with_context(|| format!("failed to read script '{}'", script_path.display()))?;

    let names = settings.channel_names();
    let mut keyboard = Keyboard::create(&names, settings.initial_led)
        .context("failed to create keyboard resources")?;

    let exe = std::env::current_exe().context("failed to locate the kbdsim executable")?;
    let mut driver = Command::new(exe)
        .arg("--driver")
        .kill_on_drop(true)
        .spawn()
        .context("failed to spawn driver process")?;

    let outcome = keyboard
        .run(
            &script,
            &mut driver,
            &settings.session_settings(),
            Box::new(StdoutSink),
        )
        .await;
    println!();
    keyboard.cleanup();

    let report = outcome?;
    info!(
        bytes = report.bytes_fed,
        acks = report.listener.acks,
        transitions = report.listener.transitions.len(),
        driver_exit = report.driver_exit,
        "session finished"
    );
    Ok(if report.driver_exit == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
