use std::collections::HashMap;
use std::sync::Mutex;

use rand::Rng as _;

use super::{AdapterError, Board, BoardHealth};
use crate::settings::ConnectionType;

pub const ADC_MAX: f64 = 4095.0;
//50 Hz at one pulse per revolution is 3000 RPM
pub const FREQUENCY_MAX_HZ: f64 = 50.0;

/// Board without any I/O, producing bounded random channel values.
///
/// Always reports itself connected. Relay writes are remembered so that
/// `get_relay` reflects the last `set_relay`.
pub struct SimulatedBoard {
    id: String,
    name: String,
    relays: Mutex<HashMap<u8, bool>>,
}

impl SimulatedBoard {
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_owned(),
            name: name.to_owned(),
            relays: Mutex::new(HashMap::new()),
        }
    }

    pub fn analog_value() -> f64 {
        rand::rng().random_range(0.0..=ADC_MAX)
    }

    pub fn digital_value() -> bool {
        rand::rng().random_bool(0.5)
    }

    pub fn frequency_value() -> f64 {
        rand::rng().random_range(0.0..=FREQUENCY_MAX_HZ)
    }

    fn relays(&self) -> std::sync::MutexGuard<'_, HashMap<u8, bool>> {
        //map stays consistent even if a holder panicked
        self.relays.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Board for SimulatedBoard {
    fn id(&self) -> &str {
        &self.id
    }

    async fn connect(&self) -> Result<(), AdapterError> {
        tracing::info!(board = %self.id, "Simulated board ready");
        Ok(())
    }

    async fn disconnect(&self) {}

    fn is_connected(&self) -> bool {
        true
    }

    async fn read_analog(&self, _channel: u8) -> Option<f64> {
        Some(Self::analog_value())
    }

    async fn read_digital(&self, _channel: u8) -> Option<bool> {
        Some(Self::digital_value())
    }

    async fn read_frequency(&self, _channel: u8) -> Option<f64> {
        Some(Self::frequency_value())
    }

    async fn set_relay(&self, channel: u8, on: bool) -> Result<(), AdapterError> {
        tracing::debug!(board = %self.id, channel, on, "[SIM] Set relay");
        self.relays().insert(channel, on);
        Ok(())
    }

    async fn get_relay(&self, channel: u8) -> Option<bool> {
        Some(self.relays().get(&channel).copied().unwrap_or(false))
    }

    async fn health_check(&self) -> BoardHealth {
        BoardHealth {
            board_id: self.id.clone(),
            board_name: self.name.clone(),
            connection: ConnectionType::Simulated,
            connected: true,
            simulated: true,
            detail: None,
        }
    }
}
