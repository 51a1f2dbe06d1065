use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use futures::future::join_all;

use super::{Calibration, SampleSource, SensorKind, SensorReading, unit_for};
use crate::device::{Board, BoardAdapter};
use crate::settings::SensorChannelConfig;

/// Engine and tank sensors, read from the configured board channels and
/// converted with each channel's calibration.
pub struct SensorSource<B: Board = BoardAdapter> {
    boards: HashMap<String, Arc<B>>,
    channels: Vec<SensorChannelConfig>,
    calibrations: RwLock<BTreeMap<String, Calibration>>,
}

impl<B: Board> SensorSource<B> {
    pub fn new(boards: HashMap<String, Arc<B>>, channels: Vec<SensorChannelConfig>) -> Self {
        let calibrations = channels
            .iter()
            .map(|channel| (channel.id.clone(), channel.calibration.clone()))
            .collect();

        Self {
            boards,
            channels,
            calibrations: RwLock::new(calibrations),
        }
    }

    /// Calibration in effect for every sensor.
    pub fn calibrations(&self) -> BTreeMap<String, Calibration> {
        self.calibrations.read().unwrap_or_else(|poisoned| poisoned.into_inner()).clone()
    }

    /// Fails on the first unknown sensor or invalid calibration.
    pub fn validate_calibrations(&self, updates: &BTreeMap<String, Calibration>) -> anyhow::Result<()> {
        for (id, calibration) in updates {
            anyhow::ensure!(self.channels.iter().any(|c| &c.id == id), "unknown sensor {}", id);
            calibration.validate().map_err(|e| anyhow::anyhow!("sensor {}: {}", id, e))?;
        }
        Ok(())
    }

    /// Applies `updates` from the next sample on. Unknown sensors and invalid
    /// entries are skipped.
    pub fn apply_calibrations(&self, updates: &BTreeMap<String, Calibration>) {
        let mut calibrations = self.calibrations.write().unwrap_or_else(|poisoned| poisoned.into_inner());

        for (id, calibration) in updates {
            match calibrations.get_mut(id) {
                Some(current) if calibration.validate().is_ok() => *current = calibration.clone(),
                _ => tracing::warn!(sensor = %id, "Ignoring calibration {:?}", calibration),
            }
        }
    }

    fn calibration(&self, id: &str) -> Calibration {
        self.calibrations
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(id)
            .cloned()
            .unwrap_or_default()
    }

    async fn read(&self, channel: &SensorChannelConfig) -> Option<SensorReading> {
        let Some(board) = self.boards.get(&channel.board) else {
            tracing::warn!(sensor = %channel.id, board = %channel.board, "Sensor mapped to unknown board");
            return None;
        };

        let raw = match channel.kind {
            SensorKind::Analog => board.read_analog(channel.channel).await?,
            SensorKind::Frequency => board.read_frequency(channel.channel).await?,
            SensorKind::Digital => {
                if board.read_digital(channel.channel).await? {
                    1.0
                } else {
                    0.0
                }
            }
        };

        Some(SensorReading {
            value: self.calibration(&channel.id).apply(raw),
            unit: channel.unit.clone().unwrap_or_else(|| unit_for(&channel.id).to_string()),
        })
    }
}

impl<B: Board + 'static> SampleSource for SensorSource<B> {
    type Value = SensorReading;

    fn domain(&self) -> &str {
        "sensors"
    }

    async fn sample(&self) -> anyhow::Result<Vec<(String, Option<SensorReading>)>> {
        let readings = join_all(self.channels.iter().map(|channel| self.read(channel))).await;

        Ok(self
            .channels
            .iter()
            .zip(readings)
            .map(|(channel, reading)| (channel.id.clone(), reading))
            .collect())
    }
}
