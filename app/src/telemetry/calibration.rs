use serde::{Deserialize, Serialize};

/// Conversion from raw channel value to engineering unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Calibration {
    Linear { offset: f64, scale: f64 },
    //tank sender, raw window mapped onto 0..100 %
    Range { min: f64, max: f64 },
    PulsesPerRev { pulses_per_rev: f64 },
}

impl Default for Calibration {
    fn default() -> Self {
        Calibration::Linear { offset: 0.0, scale: 1.0 }
    }
}

impl Calibration {
    pub fn validate(&self) -> anyhow::Result<()> {
        match *self {
            Calibration::Linear { offset, scale } => {
                anyhow::ensure!(offset.is_finite() && scale.is_finite(), "offset and scale must be finite");
            }
            Calibration::Range { min, max } => {
                anyhow::ensure!(min.is_finite() && max.is_finite(), "range bounds must be finite");
                anyhow::ensure!(min < max, "range min {} must be below max {}", min, max);
            }
            Calibration::PulsesPerRev { pulses_per_rev } => {
                anyhow::ensure!(
                    pulses_per_rev.is_finite() && pulses_per_rev > 0.0,
                    "pulses_per_rev must be positive"
                );
            }
        }
        Ok(())
    }

    pub fn apply(&self, raw: f64) -> f64 {
        match self {
            Calibration::Linear { offset, scale } => raw * scale + offset,
            Calibration::Range { min, max } => {
                if max <= min {
                    return 0.0;
                }
                ((raw - min) / (max - min) * 100.0).clamp(0.0, 100.0)
            }
            Calibration::PulsesPerRev { pulses_per_rev } => {
                if *pulses_per_rev <= 0.0 {
                    return 0.0;
                }
                raw * 60.0 / pulses_per_rev
            }
        }
    }
}

pub fn unit_for(sensor_id: &str) -> &'static str {
    match sensor_id {
        "engine_rpm" => "RPM",
        "oil_pressure" => "PSI",
        "coolant_temp" => "°C",
        id if id.ends_with("_tank") => "%",
        _ => "",
    }
}
