//! Board access for the vessel's I/O modules.
//!
//! Every board exposes the same channel capabilities through [`Board`]. The
//! concrete variant (simulated, wired or networked) is picked once from
//! configuration by [`BoardAdapter::from_config`]; nothing downstream inspects
//! which one it got. Reads return `None` when the value is unknown for this
//! cycle, which callers must never treat as zero.

mod http;
mod networked;
mod simulated;
mod wired;

use std::future::Future;

use serde::Serialize;

pub use http::JsonEndpoint;
pub use networked::NetworkedBoard;
pub use simulated::{ADC_MAX, FREQUENCY_MAX_HZ, SimulatedBoard};
pub use wired::WiredBoard;

use crate::settings::{BoardConfig, ConnectionType};

#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error("board {0} is not connected")]
    NotConnected(String),
    #[error("board unavailable: {0}")]
    Unavailable(String),
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("board rejected request: {0}")]
    Rejected(String),
    #[error("local driver I/O failed")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BoardHealth {
    pub board_id: String,
    pub board_name: String,
    pub connection: ConnectionType,
    pub connected: bool,
    pub simulated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<serde_json::Value>,
}

/// Channel-level capabilities of an I/O board.
///
/// All methods take `&self`; boards are shared between the pollers and the
/// relay controller and keep their connection state internally.
pub trait Board: Send + Sync {
    fn id(&self) -> &str;

    fn connect(&self) -> impl Future<Output = Result<(), AdapterError>> + Send;

    /// Idempotent, a second call is a no-op.
    fn disconnect(&self) -> impl Future<Output = ()> + Send;

    fn is_connected(&self) -> bool;

    /// Raw ADC counts (0..4095).
    fn read_analog(&self, channel: u8) -> impl Future<Output = Option<f64>> + Send;

    fn read_digital(&self, channel: u8) -> impl Future<Output = Option<bool>> + Send;

    /// Pulse frequency in Hz, used for RPM sensing.
    fn read_frequency(&self, channel: u8) -> impl Future<Output = Option<f64>> + Send;

    fn set_relay(&self, channel: u8, on: bool) -> impl Future<Output = Result<(), AdapterError>> + Send;

    fn get_relay(&self, channel: u8) -> impl Future<Output = Option<bool>> + Send;

    fn health_check(&self) -> impl Future<Output = BoardHealth> + Send;
}

pub enum BoardAdapter {
    Simulated(SimulatedBoard),
    Wired(WiredBoard),
    Networked(NetworkedBoard),
}

impl BoardAdapter {
    pub fn from_config(config: &BoardConfig, simulation: bool) -> anyhow::Result<Self> {
        if simulation {
            return Ok(Self::Simulated(SimulatedBoard::new(&config.id, &config.name)));
        }

        let board = match config.connection {
            ConnectionType::Simulated => Self::Simulated(SimulatedBoard::new(&config.id, &config.name)),
            ConnectionType::Wired => Self::Wired(WiredBoard::new(config)),
            ConnectionType::Wireless => Self::Networked(NetworkedBoard::new(config)?),
        };

        Ok(board)
    }
}

macro_rules! delegate {
    ($self:ident, $board:ident => $call:expr) => {
        match $self {
            BoardAdapter::Simulated($board) => $call,
            BoardAdapter::Wired($board) => $call,
            BoardAdapter::Networked($board) => $call,
        }
    };
}

impl Board for BoardAdapter {
    fn id(&self) -> &str {
        delegate!(self, b => b.id())
    }

    async fn connect(&self) -> Result<(), AdapterError> {
        delegate!(self, b => b.connect().await)
    }

    async fn disconnect(&self) {
        delegate!(self, b => b.disconnect().await)
    }

    fn is_connected(&self) -> bool {
        delegate!(self, b => b.is_connected())
    }

    async fn read_analog(&self, channel: u8) -> Option<f64> {
        delegate!(self, b => b.read_analog(channel).await)
    }

    async fn read_digital(&self, channel: u8) -> Option<bool> {
        delegate!(self, b => b.read_digital(channel).await)
    }

    async fn read_frequency(&self, channel: u8) -> Option<f64> {
        delegate!(self, b => b.read_frequency(channel).await)
    }

    async fn set_relay(&self, channel: u8, on: bool) -> Result<(), AdapterError> {
        delegate!(self, b => b.set_relay(channel, on).await)
    }

    async fn get_relay(&self, channel: u8) -> Option<bool> {
        delegate!(self, b => b.get_relay(channel).await)
    }

    async fn health_check(&self) -> BoardHealth {
        delegate!(self, b => b.health_check().await)
    }
}
