//! Periodic persistence of telemetry and the queries derived from it.

mod logger;
mod postgres;
mod stats;
mod store;
mod thresholds;

use serde::Serialize;

use crate::core::time::DateTime;
use crate::core::timeseries::DataPoint;
use crate::telemetry::{DevicePayload, DeviceType};

pub use logger::{DeviceFeed, HistoryLogger, SensorFeed};
pub use postgres::PgHistoryStore;
pub use stats::{EngineStatistics, SensorStatistics, UsageSummary};
pub use store::{HistoryBackend, HistoryStore, InMemoryStore};
pub use thresholds::{EngineAlert, ThresholdSet, ViolationCounts, count_violations};

pub const ENGINE_RPM: &str = "engine_rpm";
pub const OIL_PRESSURE: &str = "oil_pressure";
pub const COOLANT_TEMP: &str = "coolant_temp";

pub const THRESHOLDS_SETTING: &str = "sensor_thresholds";
pub const RELAY_CONFIG_SETTING: &str = "relay_config";
pub const SENSOR_CALIBRATION_SETTING: &str = "sensor_calibration";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RecordValue {
    Reading { value: f64, unit: String },
    Device { device_type: DeviceType, data: DevicePayload },
}

/// Immutable history entry, either a sensor reading or a device payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryRecord {
    pub timestamp: DateTime,
    pub metric: String,
    pub value: RecordValue,
}

impl HistoryRecord {
    pub fn reading(timestamp: DateTime, metric: &str, value: f64, unit: &str) -> Self {
        Self {
            timestamp,
            metric: metric.to_owned(),
            value: RecordValue::Reading {
                value,
                unit: unit.to_owned(),
            },
        }
    }

    pub fn device(timestamp: DateTime, device_id: &str, data: DevicePayload) -> Self {
        Self {
            timestamp,
            metric: device_id.to_owned(),
            value: RecordValue::Device {
                device_type: DeviceType::classify(device_id),
                data,
            },
        }
    }

    pub fn numeric(&self) -> Option<DataPoint<f64>> {
        match &self.value {
            RecordValue::Reading { value, .. } => Some(DataPoint::new(*value, self.timestamp)),
            RecordValue::Device { .. } => None,
        }
    }

    pub fn unit(&self) -> Option<&str> {
        match &self.value {
            RecordValue::Reading { unit, .. } => Some(unit),
            RecordValue::Device { .. } => None,
        }
    }
}
