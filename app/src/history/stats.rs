use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use super::HistoryRecord;
use crate::core::time::{DateTime, Duration};
use crate::core::timeseries::DataPoint;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorStatistics {
    pub metric: String,
    pub total_readings: usize,
    pub max: f64,
    pub min: f64,
    pub avg: f64,
    pub unit: String,
    pub start_time: DateTime,
    pub end_time: DateTime,
}

impl SensorStatistics {
    /// `None` when there is no numeric record to aggregate.
    pub fn from_records(metric: &str, records: &[HistoryRecord]) -> Option<Self> {
        let points: Vec<DataPoint<f64>> = records.iter().filter_map(HistoryRecord::numeric).collect();
        let (first, last) = (points.first()?, points.last()?);
        let values = points.iter().map(|dp| dp.value);

        Some(Self {
            metric: metric.to_owned(),
            total_readings: points.len(),
            max: values.clone().fold(f64::MIN, f64::max),
            min: values.clone().fold(f64::MAX, f64::min),
            avg: round_to(values.sum::<f64>() / points.len() as f64, 2),
            unit: records.iter().find_map(HistoryRecord::unit).unwrap_or_default().to_owned(),
            start_time: first.timestamp,
            end_time: last.timestamp,
        })
    }
}

/// Engine usage derived from logged RPM.
///
/// `engine_hours` assumes one record per logging interval without gaps. It
/// is an estimate, and wrong for windows in which the interval changed.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EngineStatistics {
    pub total_readings: usize,
    pub engine_running_readings: usize,
    pub engine_hours: f64,
    pub max_rpm: f64,
    pub avg_rpm: f64,
    pub min_rpm: f64,
}

impl EngineStatistics {
    pub fn from_points(rpm: &[DataPoint<f64>], log_interval: Duration) -> Self {
        let running: Vec<f64> = rpm.iter().map(|dp| dp.value).filter(|v| *v > 0.0).collect();

        if running.is_empty() {
            return Self {
                total_readings: rpm.len(),
                ..Default::default()
            };
        }

        Self {
            total_readings: rpm.len(),
            engine_running_readings: running.len(),
            engine_hours: round_to(estimated_hours(running.len(), log_interval), 2),
            max_rpm: running.iter().copied().fold(f64::MIN, f64::max),
            avg_rpm: round_to(running.iter().sum::<f64>() / running.len() as f64, 1),
            min_rpm: running.iter().copied().fold(f64::MAX, f64::min),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyUsage {
    pub date: NaiveDate,
    pub readings: usize,
    pub max_rpm: f64,
    pub avg_rpm: f64,
    pub estimated_hours: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageSummary {
    pub days: u32,
    pub start_date: DateTime,
    pub end_date: DateTime,
    pub total_readings: usize,
    pub daily_usage: Vec<DailyUsage>,
}

impl UsageSummary {
    /// Buckets RPM points by UTC calendar day. Days with only idle
    /// readings are listed with zero usage.
    pub fn from_points(
        days: u32,
        start: DateTime,
        end: DateTime,
        rpm: &[DataPoint<f64>],
        log_interval: Duration,
    ) -> Self {
        let mut buckets: BTreeMap<NaiveDate, (usize, f64, f64)> = BTreeMap::new();

        for dp in rpm {
            let (count, total, peak) = buckets.entry(dp.timestamp.utc_date()).or_insert((0, 0.0, 0.0));
            if dp.value > 0.0 {
                *count += 1;
                *total += dp.value;
                *peak = peak.max(dp.value);
            }
        }

        let daily_usage = buckets
            .into_iter()
            .map(|(date, (readings, total, max_rpm))| DailyUsage {
                date,
                readings,
                max_rpm,
                avg_rpm: if readings > 0 { round_to(total / readings as f64, 1) } else { 0.0 },
                estimated_hours: round_to(estimated_hours(readings, log_interval), 2),
            })
            .collect();

        Self {
            days,
            start_date: start,
            end_date: end,
            total_readings: rpm.len(),
            daily_usage,
        }
    }
}

fn estimated_hours(running_readings: usize, log_interval: Duration) -> f64 {
    running_readings as f64 * log_interval.as_secs_f64() / 3600.0
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
