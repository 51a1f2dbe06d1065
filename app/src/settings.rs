use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use infrastructure::{DatabaseConfig, MonitoringConfig};
use serde::{Deserialize, Serialize};

use crate::history::ThresholdSet;
use crate::relay::{FLASH_INTERVAL_SECS, TIMED_DURATION_SECS};
use crate::telemetry::{Calibration, SensorKind};

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub database: Option<DatabaseConfig>,
    pub monitoring: MonitoringConfig,
    #[serde(default)]
    pub hardware: HardwareSettings,
    #[serde(default)]
    pub polling: PollingSettings,
    #[serde(default = "default_sensors")]
    pub sensors: Vec<SensorChannelConfig>,
    #[serde(default)]
    pub devices: DeviceSettings,
    #[serde(default)]
    pub relays: RelaySettings,
    #[serde(default)]
    pub history: HistorySettings,
    #[serde(default)]
    pub thresholds: ThresholdSet,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let builder = Config::builder().add_source(File::with_name("config.toml")).add_source(
            Environment::with_prefix("BOATMONITOR")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let settings: Self = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("polling.sensor_interval_secs", self.polling.sensor_interval),
            ("polling.device_interval_secs", self.polling.device_interval),
            ("polling.recovery_interval_secs", self.polling.recovery_interval),
            ("history.interval_secs", self.history.interval),
            ("history.recovery_interval_secs", self.history.recovery_interval),
            ("relays.default_flash_interval_secs", self.relays.default_flash_interval),
            ("relays.default_timed_duration_secs", self.relays.default_timed_duration),
        ];
        for (key, value) in positive {
            if value.is_zero() {
                return Err(invalid(format!("{} must be positive", key)));
            }
        }

        if self.polling.recovery_interval <= self.polling.sensor_interval.max(self.polling.device_interval) {
            return Err(invalid("polling.recovery_interval_secs must be longer than the poll intervals"));
        }
        if self.history.recovery_interval <= self.history.interval {
            return Err(invalid("history.recovery_interval_secs must be longer than history.interval_secs"));
        }

        if self.relays.relays_per_board == 0 {
            return Err(invalid("relays.relays_per_board must be positive"));
        }
        if !FLASH_INTERVAL_SECS.contains(&self.relays.default_flash_interval.as_secs_f64()) {
            return Err(invalid(format!(
                "relays.default_flash_interval_secs must be within {:?}",
                FLASH_INTERVAL_SECS
            )));
        }
        if !TIMED_DURATION_SECS.contains(&self.relays.default_timed_duration.as_secs_f64()) {
            return Err(invalid(format!(
                "relays.default_timed_duration_secs must be within {:?}",
                TIMED_DURATION_SECS
            )));
        }

        self.thresholds
            .validate()
            .map_err(|e| invalid(format!("thresholds: {}", e)))?;

        let mut board_ids = HashSet::new();
        for board in &self.hardware.boards {
            if !board_ids.insert(board.id.as_str()) {
                return Err(invalid(format!("duplicate board id {}", board.id)));
            }
            if board.connection == ConnectionType::Wireless && board.url.is_none() && !self.hardware.simulation {
                return Err(invalid(format!("wireless board {} needs a url", board.id)));
            }
        }

        let mut sensor_ids = HashSet::new();
        for sensor in &self.sensors {
            if !sensor_ids.insert(sensor.id.as_str()) {
                return Err(invalid(format!("duplicate sensor id {}", sensor.id)));
            }
            if !board_ids.contains(sensor.board.as_str()) {
                return Err(invalid(format!("sensor {} references unknown board {}", sensor.id, sensor.board)));
            }
            sensor
                .calibration
                .validate()
                .map_err(|e| invalid(format!("sensor {} calibration: {}", sensor.id, e)))?;
        }

        Ok(())
    }
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::Message(message.into())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionType {
    Simulated,
    Wired,
    Wireless,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HardwareSettings {
    #[serde(default = "default_true")]
    pub simulation: bool,
    #[serde(default = "default_boards")]
    pub boards: Vec<BoardConfig>,
}

impl Default for HardwareSettings {
    fn default() -> Self {
        Self {
            simulation: true,
            boards: default_boards(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BoardConfig {
    pub id: String,
    pub name: String,
    pub connection: ConnectionType,
    #[serde(default)]
    pub i2c_address: Option<u16>,
    #[serde(default)]
    pub sysfs_root: Option<PathBuf>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(rename = "timeout_secs", default = "default_board_timeout", with = "secs")]
    pub timeout: Duration,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PollingSettings {
    #[serde(rename = "sensor_interval_secs", with = "secs")]
    pub sensor_interval: Duration,
    #[serde(rename = "device_interval_secs", with = "secs")]
    pub device_interval: Duration,
    #[serde(rename = "recovery_interval_secs", with = "secs")]
    pub recovery_interval: Duration,
}

impl Default for PollingSettings {
    fn default() -> Self {
        Self {
            sensor_interval: Duration::from_millis(500),
            device_interval: Duration::from_secs(1),
            recovery_interval: Duration::from_secs(2),
        }
    }
}

/// Maps a logical sensor onto a board channel.
#[derive(Debug, Clone, Deserialize)]
pub struct SensorChannelConfig {
    pub id: String,
    pub board: String,
    pub kind: SensorKind,
    pub channel: u8,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub calibration: Calibration,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeviceSettings {
    #[serde(default)]
    pub gateway_url: Option<String>,
    #[serde(default = "default_device_ids")]
    pub ids: Vec<String>,
    #[serde(rename = "timeout_secs", default = "default_board_timeout", with = "secs")]
    pub timeout: Duration,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            gateway_url: None,
            ids: default_device_ids(),
            timeout: default_board_timeout(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RelaySettings {
    pub relays_per_board: u8,
    #[serde(rename = "default_flash_interval_secs", with = "secs")]
    pub default_flash_interval: Duration,
    #[serde(rename = "default_timed_duration_secs", with = "secs")]
    pub default_timed_duration: Duration,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            relays_per_board: 3,
            default_flash_interval: Duration::from_secs(1),
            default_timed_duration: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HistorySettings {
    #[serde(rename = "interval_secs", with = "secs")]
    pub interval: Duration,
    #[serde(rename = "recovery_interval_secs", with = "secs")]
    pub recovery_interval: Duration,
    pub critical: Vec<String>,
    pub optional: Vec<String>,
}

impl Default for HistorySettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            recovery_interval: Duration::from_secs(70),
            critical: ["engine_rpm", "oil_pressure", "coolant_temp"].map(String::from).to_vec(),
            optional: ["fuel_tank", "water_tank", "waste_tank"].map(String::from).to_vec(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_board_timeout() -> Duration {
    Duration::from_secs(2)
}

fn default_boards() -> Vec<BoardConfig> {
    [("board_0", "Engine bay", 0x20), ("board_1", "Tank room", 0x21)]
        .into_iter()
        .map(|(id, name, address)| BoardConfig {
            id: id.to_string(),
            name: name.to_string(),
            connection: ConnectionType::Simulated,
            i2c_address: Some(address),
            sysfs_root: None,
            url: None,
            timeout: default_board_timeout(),
        })
        .collect()
}

fn default_device_ids() -> Vec<String> {
    ["smartshunt_leisure", "smartshunt_starter", "mppt_solar", "inverter"]
        .map(String::from)
        .to_vec()
}

fn default_sensors() -> Vec<SensorChannelConfig> {
    use crate::device::ADC_MAX;

    let sensor = |id: &str, board: &str, kind, channel, calibration| SensorChannelConfig {
        id: id.to_string(),
        board: board.to_string(),
        kind,
        channel,
        unit: None,
        calibration,
    };
    let tank = Calibration::Range { min: 0.0, max: ADC_MAX };
    let linear = |scale| Calibration::Linear { offset: 0.0, scale };

    vec![
        sensor("engine_rpm", "board_0", SensorKind::Frequency, 1, Calibration::PulsesPerRev { pulses_per_rev: 1.0 }),
        sensor("oil_pressure", "board_0", SensorKind::Analog, 1, linear(100.0 / ADC_MAX)),
        sensor("coolant_temp", "board_0", SensorKind::Analog, 2, linear(120.0 / ADC_MAX)),
        sensor("fuel_tank", "board_0", SensorKind::Analog, 3, tank.clone()),
        sensor("water_tank", "board_1", SensorKind::Analog, 1, tank.clone()),
        sensor("waste_tank", "board_1", SensorKind::Analog, 2, tank),
    ]
}

//fractional seconds in config, Duration in code
mod secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs)
            .map_err(|e| serde::de::Error::custom(format!("invalid seconds {}: {}", secs, e)))
    }
}
