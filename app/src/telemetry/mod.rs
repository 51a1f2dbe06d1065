//! Periodic acquisition of engine sensors and battery/solar devices.
//!
//! One [`Poller`] runs per domain. Each cycle it asks its [`SampleSource`]
//! for fresh values and publishes a new [`Snapshot`] as a whole, so readers
//! never see a half-updated set of readings.

mod calibration;
mod devices;
mod poller;
mod sensors;

use std::collections::HashMap;
use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::core::time::DateTime;

pub use calibration::{Calibration, unit_for};
pub use devices::{DevicePayload, DeviceSource, DeviceType};
pub use poller::Poller;
pub use sensors::SensorSource;

pub type SensorPoller = Poller<SensorSource>;
pub type DevicePoller = Poller<DeviceSource>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorKind {
    Analog,
    Digital,
    Frequency,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorReading {
    pub value: f64,
    pub unit: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Snapshot<V> {
    pub values: HashMap<String, V>,
    pub updated: Option<DateTime>,
}

impl<V> Default for Snapshot<V> {
    fn default() -> Self {
        Self {
            values: HashMap::new(),
            updated: None,
        }
    }
}

impl<V: Clone> Snapshot<V> {
    /// New snapshot with `samples` applied on top of this one. Channels
    /// without a value this cycle keep what they had.
    pub fn merge(&self, samples: Vec<(String, Option<V>)>, updated: DateTime) -> Self {
        let mut values = self.values.clone();

        for (id, value) in samples {
            if let Some(value) = value {
                values.insert(id, value);
            }
        }

        Self {
            values,
            updated: Some(updated),
        }
    }
}

/// Produces one cycle worth of values for a domain.
///
/// A `None` value means "unknown this cycle". An `Err` fails the whole cycle
/// and makes the poller back off for its recovery interval.
pub trait SampleSource: Send + Sync + 'static {
    type Value: Clone + Send + Sync + 'static;

    fn domain(&self) -> &str;

    fn sample(&self) -> impl Future<Output = anyhow::Result<Vec<(String, Option<Self::Value>)>>> + Send;
}
