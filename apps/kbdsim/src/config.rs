use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use device_sim::SessionSettings;
use serde::Deserialize;
use shared::domain::LedState;
use tracing::warn;
use transport::ChannelNames;

pub const CONFIG_FILE: &str = "kbdsim.toml";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub fifo_dir: PathBuf,
    pub event_pipe: String,
    pub command_pipe: String,
    pub ack_pipe: String,
    pub led_shm: String,
    pub terminate_shm: String,
    pub poll_interval_ms: u64,
    pub feed_delay_ms: u64,
    pub shutdown_grace_ms: u64,
    pub initial_led: LedState,
}

impl Default for Settings {
    fn default() -> Self {
        let names = ChannelNames::default();
        Self {
            fifo_dir: names.fifo_dir,
            event_pipe: names.event_pipe,
            command_pipe: names.command_pipe,
            ack_pipe: names.ack_pipe,
            led_shm: names.led_shm,
            terminate_shm: names.terminate_shm,
            poll_interval_ms: 100,
            feed_delay_ms: 20,
            shutdown_grace_ms: 2000,
            initial_led: LedState::Off,
        }
    }
}

impl Settings {
    pub fn channel_names(&self) -> ChannelNames {
        ChannelNames {
            fifo_dir: self.fifo_dir.clone(),
            event_pipe: self.event_pipe.clone(),
            command_pipe: self.command_pipe.clone(),
            ack_pipe: self.ack_pipe.clone(),
            led_shm: self.led_shm.clone(),
            terminate_shm: self.terminate_shm.clone(),
        }
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            feed_delay: Duration::from_millis(self.feed_delay_ms),
            shutdown_grace: Duration::from_millis(self.shutdown_grace_ms),
            ..SessionSettings::default()
        }
    }

    pub fn poll_interval(&self) -> Duration {
        // tokio's interval panics on a zero period
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

pub fn load_settings() -> Settings {
    let mut settings = read_file(Path::new(CONFIG_FILE)).unwrap_or_default();
    apply_overrides(&mut settings, |key| std::env::var(key).ok());
    settings
}

fn read_file(path: &Path) -> Option<Settings> {
    let raw = fs::read_to_string(path).ok()?;
    match toml::from_str::<Settings>(&raw) {
        Ok(settings) => Some(settings),
        Err(error) => {
            warn!(path = %path.display(), %error, "ignoring unreadable config file");
            None
        }
    }
}

/// Applies `KBDSIM_<KEY>` then `APP__<KEY>` overrides, the latter winning.
/// Values that fail to parse leave the setting untouched.
pub fn apply_overrides(settings: &mut Settings, lookup: impl Fn(&str) -> Option<String>) {
    let value = |key: &str| {
        lookup(&format!("APP__{key}")).or_else(|| lookup(&format!("KBDSIM_{key}")))
    };

    if let Some(v) = value("FIFO_DIR") {
        settings.fifo_dir = PathBuf::from(v);
    }
    if let Some(v) = value("EVENT_PIPE") {
        settings.event_pipe = v;
    }
    if let Some(v) = value("COMMAND_PIPE") {
        settings.command_pipe = v;
    }
    if let Some(v) = value("ACK_PIPE") {
        settings.ack_pipe = v;
    }
    if let Some(v) = value("LED_SHM") {
        settings.led_shm = v;
    }
    if let Some(v) = value("TERMINATE_SHM") {
        settings.terminate_shm = v;
    }

    if let Some(parsed) = value("POLL_INTERVAL_MS").and_then(|v| v.parse().ok()) {
        settings.poll_interval_ms = parsed;
    }
    if let Some(parsed) = value("FEED_DELAY_MS").and_then(|v| v.parse().ok()) {
        settings.feed_delay_ms = parsed;
    }
    if let Some(parsed) = value("SHUTDOWN_GRACE_MS").and_then(|v| v.parse().ok()) {
        settings.shutdown_grace_ms = parsed;
    }
    if let Some(led) = value("INITIAL_LED").and_then(|v| parse_led(&v)) {
        settings.initial_led = led;
    }
}

fn parse_led(raw: &str) -> Option<LedState> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "on" | "1" => Some(LedState::On),
        "off" | "0" => Some(LedState::Off),
        _ => None,
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
