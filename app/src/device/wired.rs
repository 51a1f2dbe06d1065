use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use super::{AdapterError, Board, BoardHealth, SimulatedBoard};
use crate::settings::{BoardConfig, ConnectionType};

const DEFAULT_SYSFS_ROOT: &str = "/sys/class/automation2040w";

/// Board attached to the local bus and exposed by its kernel driver as a
/// sysfs-style tree:
///
/// ```text
/// <root>/analog/<channel>     raw ADC counts
/// <root>/digital/<channel>    0 | 1
/// <root>/frequency/<channel>  Hz
/// <root>/relay/<channel>      0 | 1, writable
/// ```
///
/// When the tree is missing at connect time the driver is considered
/// unavailable and the board keeps working as a simulated one.
pub struct WiredBoard {
    id: String,
    name: String,
    i2c_address: Option<u16>,
    root: PathBuf,
    timeout: Duration,
    connected: AtomicBool,
    simulated: AtomicBool,
    degradation_logged: AtomicBool,
    fallback: SimulatedBoard,
}

impl WiredBoard {
    pub fn new(config: &BoardConfig) -> Self {
        let root = config
            .sysfs_root
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SYSFS_ROOT).join(&config.id));

        Self {
            id: config.id.clone(),
            name: config.name.clone(),
            i2c_address: config.i2c_address,
            root,
            timeout: config.timeout,
            connected: AtomicBool::new(false),
            simulated: AtomicBool::new(true),
            degradation_logged: AtomicBool::new(false),
            fallback: SimulatedBoard::new(&config.id, &config.name),
        }
    }

    pub fn is_simulated(&self) -> bool {
        self.simulated.load(Ordering::Acquire)
    }

    fn channel_path(&self, kind: &str, channel: u8) -> PathBuf {
        self.root.join(kind).join(channel.to_string())
    }

    async fn read_value(&self, kind: &str, channel: u8) -> Option<String> {
        let path = self.channel_path(kind, channel);

        match tokio::time::timeout(self.timeout, tokio::fs::read_to_string(&path)).await {
            Ok(Ok(raw)) => Some(raw.trim().to_owned()),
            Ok(Err(e)) => {
                tracing::warn!(board = %self.id, path = %path.display(), "Error reading {} {}: {}", kind, channel, e);
                None
            }
            Err(_) => {
                tracing::warn!(board = %self.id, path = %path.display(), "Timeout reading {} {}", kind, channel);
                None
            }
        }
    }

    fn degrade(&self, reason: &str) {
        self.simulated.store(true, Ordering::Release);

        if !self.degradation_logged.swap(true, Ordering::AcqRel) {
            tracing::warn!(
                board = %self.id,
                root = %self.root.display(),
                "Driver for {} unavailable, using simulation: {}",
                self.name,
                reason
            );
        }
    }
}

async fn driver_present(root: &Path, timeout: Duration) -> Result<(), String> {
    match tokio::time::timeout(timeout, tokio::fs::metadata(root)).await {
        Ok(Ok(meta)) if meta.is_dir() => Ok(()),
        Ok(Ok(_)) => Err(format!("{} is not a directory", root.display())),
        Ok(Err(e)) => Err(e.to_string()),
        Err(_) => Err(format!("timeout probing {}", root.display())),
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw {
        "1" | "true" | "on" => Some(true),
        "0" | "false" | "off" => Some(false),
        _ => None,
    }
}

impl Board for WiredBoard {
    fn id(&self) -> &str {
        &self.id
    }

    async fn connect(&self) -> Result<(), AdapterError> {
        match driver_present(&self.root, self.timeout).await {
            Ok(()) => {
                self.simulated.store(false, Ordering::Release);
                tracing::info!(board = %self.id, i2c = ?self.i2c_address, "Connected to wired board {}", self.name);
            }
            Err(reason) => self.degrade(&reason),
        }

        self.connected.store(true, Ordering::Release);
        Ok(())
    }

    async fn disconnect(&self) {
        if self.connected.swap(false, Ordering::AcqRel) {
            tracing::info!(board = %self.id, "Disconnected from wired board {}", self.name);
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    async fn read_analog(&self, channel: u8) -> Option<f64> {
        if self.is_simulated() {
            return self.fallback.read_analog(channel).await;
        }

        self.read_value("analog", channel).await?.parse().ok()
    }

    async fn read_digital(&self, channel: u8) -> Option<bool> {
        if self.is_simulated() {
            return self.fallback.read_digital(channel).await;
        }

        parse_flag(&self.read_value("digital", channel).await?)
    }

    async fn read_frequency(&self, channel: u8) -> Option<f64> {
        if self.is_simulated() {
            return self.fallback.read_frequency(channel).await;
        }

        self.read_value("frequency", channel).await?.parse().ok()
    }

    #[tracing::instrument(skip(self), fields(board = %self.id))]
    async fn set_relay(&self, channel: u8, on: bool) -> Result<(), AdapterError> {
        if self.is_simulated() {
            return self.fallback.set_relay(channel, on).await;
        }

        let path = self.channel_path("relay", channel);
        let value = if on { "1" } else { "0" };

        match tokio::time::timeout(self.timeout, tokio::fs::write(&path, value)).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(AdapterError::Transport(format!("timeout writing {}", path.display()))),
        }
    }

    async fn get_relay(&self, channel: u8) -> Option<bool> {
        if self.is_simulated() {
            return self.fallback.get_relay(channel).await;
        }

        parse_flag(&self.read_value("relay", channel).await?)
    }

    async fn health_check(&self) -> BoardHealth {
        BoardHealth {
            board_id: self.id.clone(),
            board_name: self.name.clone(),
            connection: ConnectionType::Wired,
            connected: self.is_connected(),
            simulated: self.is_simulated(),
            detail: self.i2c_address.map(|addr| serde_json::json!({ "i2c_address": addr })),
        }
    }
}
