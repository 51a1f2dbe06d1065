use serde::{Deserialize, Serialize};

use super::{COOLANT_TEMP, ENGINE_RPM, HistoryRecord, OIL_PRESSURE};
use crate::core::time::TimeWindow;

/// Operating limits of the engine. Missing fields fall back to defaults.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdSet {
    pub engine_rpm_max: f64,
    pub oil_pressure_min: f64,
    pub oil_pressure_max: f64,
    pub coolant_temp_max: f64,
}

impl Default for ThresholdSet {
    fn default() -> Self {
        Self {
            engine_rpm_max: 3000.0,
            oil_pressure_min: 20.0,
            oil_pressure_max: 80.0,
            coolant_temp_max: 95.0,
        }
    }
}

impl ThresholdSet {
    pub fn validate(&self) -> anyhow::Result<()> {
        let limits = [
            ("engine_rpm_max", self.engine_rpm_max),
            ("oil_pressure_min", self.oil_pressure_min),
            ("oil_pressure_max", self.oil_pressure_max),
            ("coolant_temp_max", self.coolant_temp_max),
        ];

        for (name, limit) in limits {
            anyhow::ensure!(limit.is_finite() && limit >= 0.0, "{} must be a non-negative number, got {}", name, limit);
        }

        anyhow::ensure!(
            self.oil_pressure_min < self.oil_pressure_max,
            "oil_pressure_min {} must be below oil_pressure_max {}",
            self.oil_pressure_min,
            self.oil_pressure_max
        );

        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ViolationCounts {
    pub rpm_exceeded: usize,
    pub oil_low: usize,
    pub oil_high: usize,
    pub temp_high: usize,
    pub total: usize,
}

/// Counts threshold breaches among `records` inside `window`.
///
/// An oil pressure of exactly zero is the engine being off, so it never
/// counts as low pressure. No other metric gets that exclusion.
pub fn count_violations<'a>(
    records: impl IntoIterator<Item = &'a HistoryRecord>,
    window: TimeWindow,
    thresholds: &ThresholdSet,
) -> ViolationCounts {
    let mut counts = ViolationCounts::default();

    for record in records {
        let Some(point) = record.numeric() else {
            continue;
        };
        if !window.contains(&point.timestamp) {
            continue;
        }

        let value = point.value;
        match record.metric.as_str() {
            ENGINE_RPM if value > thresholds.engine_rpm_max => counts.rpm_exceeded += 1,
            OIL_PRESSURE if value > 0.0 && value < thresholds.oil_pressure_min => counts.oil_low += 1,
            OIL_PRESSURE if value > thresholds.oil_pressure_max => counts.oil_high += 1,
            COOLANT_TEMP if value > thresholds.coolant_temp_max => counts.temp_high += 1,
            _ => {}
        }
    }

    counts.total = counts.rpm_exceeded + counts.oil_low + counts.oil_high + counts.temp_high;
    counts
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Warning,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    HighRpm,
    LowOilPressure,
    HighTemperature,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineAlert {
    pub severity: AlertSeverity,
    #[serde(rename = "type")]
    pub kind: AlertKind,
    pub message: String,
    pub count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_value: Option<f64>,
}

/// One alert per breached limit, skipping limits that were never breached.
pub(super) fn engine_alerts(records: &[HistoryRecord], thresholds: &ThresholdSet) -> Vec<EngineAlert> {
    let values = |metric: &str, breached: &dyn Fn(f64) -> bool| -> Vec<f64> {
        records
            .iter()
            .filter(|r| r.metric == metric)
            .filter_map(|r| r.numeric())
            .map(|dp| dp.value)
            .filter(|v| breached(*v))
            .collect()
    };

    let high_rpm = values(ENGINE_RPM, &|v| v > thresholds.engine_rpm_max);
    let low_oil = values(OIL_PRESSURE, &|v| v > 0.0 && v < thresholds.oil_pressure_min);
    let high_temp = values(COOLANT_TEMP, &|v| v > thresholds.coolant_temp_max);

    let mut alerts = vec![];

    if !high_rpm.is_empty() {
        alerts.push(EngineAlert {
            severity: AlertSeverity::Warning,
            kind: AlertKind::HighRpm,
            message: format!("Engine RPM exceeded {} on {} occasions", thresholds.engine_rpm_max, high_rpm.len()),
            count: high_rpm.len(),
            max_value: high_rpm.iter().copied().reduce(f64::max),
            min_value: None,
        });
    }

    if !low_oil.is_empty() {
        alerts.push(EngineAlert {
            severity: AlertSeverity::Critical,
            kind: AlertKind::LowOilPressure,
            message: format!("Low oil pressure detected on {} occasions", low_oil.len()),
            count: low_oil.len(),
            max_value: None,
            min_value: low_oil.iter().copied().reduce(f64::min),
        });
    }

    if !high_temp.is_empty() {
        alerts.push(EngineAlert {
            severity: AlertSeverity::Warning,
            kind: AlertKind::HighTemperature,
            message: format!(
                "Coolant temperature exceeded {}°C on {} occasions",
                thresholds.coolant_temp_max,
                high_temp.len()
            ),
            count: high_temp.len(),
            max_value: high_temp.iter().copied().reduce(f64::max),
            min_value: None,
        });
    }

    alerts
}
