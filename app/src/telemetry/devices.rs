use rand::Rng;
use rand::seq::IndexedRandom as _;
use serde::Serialize;
use serde_json::{Map, Value, json};

use super::SampleSource;
use crate::device::JsonEndpoint;

pub type DevicePayload = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, derive_more::Display)]
#[serde(rename_all = "snake_case")]
pub enum DeviceType {
    #[display("battery_monitor")]
    BatteryMonitor,
    #[display("solar_charger")]
    SolarCharger,
    #[display("inverter")]
    Inverter,
    #[display("unknown")]
    Unknown,
}

impl DeviceType {
    pub fn classify(device_id: &str) -> Self {
        let id = device_id.to_ascii_lowercase();

        if id.contains("smartshunt") || id.contains("bmv") {
            DeviceType::BatteryMonitor
        } else if id.contains("mppt") || id.contains("solar") {
            DeviceType::SolarCharger
        } else if id.contains("inverter") || id.contains("multiplus") {
            DeviceType::Inverter
        } else {
            DeviceType::Unknown
        }
    }
}

enum Backend {
    Simulated,
    Gateway(JsonEndpoint),
}

/// Battery monitors, solar chargers and inverters.
pub struct DeviceSource {
    device_ids: Vec<String>,
    backend: Backend,
}

impl DeviceSource {
    pub fn simulated(device_ids: Vec<String>) -> Self {
        Self {
            device_ids,
            backend: Backend::Simulated,
        }
    }

    /// Reads all devices from a gateway answering `GET /devices` with one
    /// object keyed by device id.
    pub fn gateway(device_ids: Vec<String>, endpoint: JsonEndpoint) -> Self {
        Self {
            device_ids,
            backend: Backend::Gateway(endpoint),
        }
    }

    async fn fetch(&self, endpoint: &JsonEndpoint) -> anyhow::Result<Vec<(String, Option<DevicePayload>)>> {
        let body = endpoint.get("/devices").await?;
        let Value::Object(devices) = body else {
            anyhow::bail!("Gateway {} returned a non-object device list", endpoint.base_url());
        };

        Ok(self
            .device_ids
            .iter()
            .map(|id| {
                let payload = devices.get(id).and_then(Value::as_object).filter(|p| !p.is_empty()).cloned();
                (id.clone(), payload)
            })
            .collect())
    }
}

impl SampleSource for DeviceSource {
    type Value = DevicePayload;

    fn domain(&self) -> &str {
        "devices"
    }

    async fn sample(&self) -> anyhow::Result<Vec<(String, Option<DevicePayload>)>> {
        match &self.backend {
            Backend::Simulated => Ok(self.device_ids.iter().map(|id| (id.clone(), simulate(id))).collect()),
            Backend::Gateway(endpoint) => self.fetch(endpoint).await,
        }
    }
}

fn simulate(device_id: &str) -> Option<DevicePayload> {
    let mut rng = rand::rng();

    let payload = match device_id {
        "smartshunt_leisure" => json!({
            "voltage": rng.random_range(12.0..=14.4),
            "current": rng.random_range(-5.0..=30.0),
            "soc": rng.random_range(60.0..=100.0),
            "power": rng.random_range(-60.0..=420.0),
            "consumed_ah": rng.random_range(0.0..=40.0),
        }),
        "smartshunt_starter" => json!({
            "voltage": rng.random_range(12.5..=14.2),
            "current": rng.random_range(-2.0..=10.0),
            "soc": rng.random_range(80.0..=100.0),
            "power": rng.random_range(-24.0..=140.0),
            "consumed_ah": rng.random_range(0.0..=10.0),
        }),
        "mppt_solar" => json!({
            "battery_voltage": rng.random_range(12.0..=14.4),
            "battery_current": rng.random_range(0.0..=20.0),
            "solar_voltage": rng.random_range(0.0..=22.0),
            "solar_power": rng.random_range(0.0..=300.0),
            "yield_today": rng.random_range(0.0..=2.5),
            "state": (["Off", "Bulk", "Absorption", "Float"].choose(&mut rng).copied()),
        }),
        "inverter" => json!({
            "state": (["Off", "On", "Inverting", "Charging"].choose(&mut rng).copied()),
            "ac_voltage": rng.random_range(220.0..=240.0),
            "ac_current": rng.random_range(0.0..=5.0),
            "ac_power": rng.random_range(0.0..=1200.0),
        }),
        _ => return None,
    };

    match payload {
        Value::Object(map) => Some(map),
        _ => None,
    }
}
