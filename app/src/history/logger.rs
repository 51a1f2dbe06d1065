use std::sync::{Arc, Mutex};

use anyhow::Context as _;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use super::thresholds::engine_alerts;
use super::{
    COOLANT_TEMP, ENGINE_RPM, EngineAlert, EngineStatistics, HistoryBackend, HistoryRecord, HistoryStore, OIL_PRESSURE,
    SensorStatistics, THRESHOLDS_SETTING, ThresholdSet, UsageSummary, ViolationCounts, count_violations,
};
use crate::core::background::BackgroundTask;
use crate::core::time::{DateTime, Duration, TimeWindow};
use crate::core::timeseries::DataPoint;
use crate::settings::HistorySettings;
use crate::telemetry::{DevicePayload, SensorReading, Snapshot};

pub type SensorFeed = watch::Receiver<Arc<Snapshot<SensorReading>>>;
pub type DeviceFeed = watch::Receiver<Arc<Snapshot<DevicePayload>>>;

const REPORT_DAYS: std::ops::RangeInclusive<u32> = 1..=90;

/// Persists the latest telemetry on its own cadence and answers the
/// statistics queries built on top of the stored history.
pub struct HistoryLogger<St: HistoryStore = HistoryBackend> {
    inner: Arc<Inner<St>>,
    task: Mutex<Option<BackgroundTask>>,
}

struct Inner<St> {
    store: Arc<St>,
    sensors: SensorFeed,
    devices: DeviceFeed,
    settings: HistorySettings,
    default_thresholds: ThresholdSet,
}

impl<St: HistoryStore> HistoryLogger<St> {
    pub fn new(
        store: Arc<St>,
        sensors: SensorFeed,
        devices: DeviceFeed,
        settings: HistorySettings,
        default_thresholds: ThresholdSet,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                sensors,
                devices,
                settings,
                default_thresholds,
            }),
            task: Mutex::new(None),
        }
    }

    fn task(&self) -> std::sync::MutexGuard<'_, Option<BackgroundTask>> {
        self.task.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn start(&self) {
        let mut task = self.task();
        if task.is_some() {
            return;
        }

        let inner = self.inner.clone();
        *task = Some(BackgroundTask::spawn(move |cancel| run(inner, cancel)));

        tracing::info!(interval = ?self.inner.settings.interval, "History logger started");
    }

    /// Stops the loop. Once this returns no further records are written.
    pub async fn stop(&self) {
        let Some(task) = self.task().take() else {
            return;
        };

        task.stop().await;
        tracing::info!("History logger stopped");
    }

    pub fn is_running(&self) -> bool {
        self.task().as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Persists one cycle and returns the number of records written.
    pub async fn log_cycle(&self) -> anyhow::Result<usize> {
        self.inner.log_cycle().await
    }

    pub async fn statistics(&self, metric: &str, window: TimeWindow) -> anyhow::Result<Option<SensorStatistics>> {
        let records = self.inner.store.query(metric, window, None).await?;
        Ok(SensorStatistics::from_records(metric, &records))
    }

    pub async fn engine_statistics(&self, window: TimeWindow) -> anyhow::Result<EngineStatistics> {
        let rpm = self.points(ENGINE_RPM, window).await?;
        Ok(EngineStatistics::from_points(&rpm, self.inner.settings.interval.into()))
    }

    /// Violation counts inside `window`, evaluated against `thresholds` or,
    /// when not given, the active ones.
    pub async fn count_violations(
        &self,
        window: TimeWindow,
        thresholds: Option<ThresholdSet>,
    ) -> anyhow::Result<ViolationCounts> {
        let thresholds = match thresholds {
            Some(thresholds) => thresholds,
            None => self.get_thresholds().await,
        };

        let records = self.engine_records(window).await?;
        Ok(count_violations(&records, window, &thresholds))
    }

    pub async fn usage_summary(&self, days: u32) -> anyhow::Result<UsageSummary> {
        let (start, end) = report_range(days)?;
        let rpm = self.points(ENGINE_RPM, TimeWindow::new(Some(start), Some(end))).await?;

        Ok(UsageSummary::from_points(days, start, end, &rpm, self.inner.settings.interval.into()))
    }

    pub async fn engine_alerts(&self, days: u32) -> anyhow::Result<Vec<EngineAlert>> {
        let (start, end) = report_range(days)?;
        let thresholds = self.get_thresholds().await;
        let records = self.engine_records(TimeWindow::new(Some(start), Some(end))).await?;

        Ok(engine_alerts(&records, &thresholds))
    }

    /// Active thresholds. A missing or unreadable setting yields the
    /// configured defaults.
    pub async fn get_thresholds(&self) -> ThresholdSet {
        let defaults = self.inner.default_thresholds;

        match self.inner.store.get_setting(THRESHOLDS_SETTING).await {
            Ok(Some(value)) => serde_json::from_value(value).unwrap_or_else(|e| {
                tracing::warn!("Stored thresholds are unreadable, using defaults: {}", e);
                defaults
            }),
            Ok(None) => defaults,
            Err(e) => {
                tracing::warn!("Error loading thresholds, using defaults: {:?}", e);
                defaults
            }
        }
    }

    pub async fn update_thresholds(&self, thresholds: ThresholdSet) -> anyhow::Result<ThresholdSet> {
        thresholds.validate()?;

        let value = serde_json::to_value(thresholds)?;
        self.inner
            .store
            .put_setting(THRESHOLDS_SETTING, value)
            .await
            .context("Error saving thresholds")?;

        tracing::info!(?thresholds, "Thresholds updated");
        Ok(thresholds)
    }

    pub async fn reset_thresholds(&self) -> anyhow::Result<ThresholdSet> {
        self.update_thresholds(self.inner.default_thresholds).await
    }

    async fn points(&self, metric: &str, window: TimeWindow) -> anyhow::Result<Vec<DataPoint<f64>>> {
        let records = self.inner.store.query(metric, window, None).await?;
        Ok(records.iter().filter_map(HistoryRecord::numeric).collect())
    }

    async fn engine_records(&self, window: TimeWindow) -> anyhow::Result<Vec<HistoryRecord>> {
        let mut records = vec![];
        for metric in [ENGINE_RPM, OIL_PRESSURE, COOLANT_TEMP] {
            records.extend(self.inner.store.query(metric, window, None).await?);
        }
        Ok(records)
    }
}

impl<St: HistoryStore> Inner<St> {
    async fn log_cycle(&self) -> anyhow::Result<usize> {
        let records = self.collect(DateTime::now());
        if records.is_empty() {
            return Ok(0);
        }

        self.store.append(&records).await.context("Error persisting history")?;
        Ok(records.len())
    }

    //critical metrics keep zero readings, optional ones skip zero as idle
    fn collect(&self, now: DateTime) -> Vec<HistoryRecord> {
        let sensors = self.sensors.borrow().clone();
        let devices = self.devices.borrow().clone();

        let critical = self
            .settings
            .critical
            .iter()
            .filter_map(|metric| sensors.values.get(metric).map(|reading| (metric, reading)));
        let optional = self
            .settings
            .optional
            .iter()
            .filter_map(|metric| sensors.values.get(metric).map(|reading| (metric, reading)))
            .filter(|(_, reading)| reading.value > 0.0);

        let mut records: Vec<HistoryRecord> = critical
            .chain(optional)
            .map(|(metric, reading)| HistoryRecord::reading(now, metric, reading.value, &reading.unit))
            .collect();

        let mut device_ids: Vec<&String> = devices.values.keys().collect();
        device_ids.sort();

        for id in device_ids {
            if let Some(payload) = devices.values.get(id).filter(|p| !p.is_empty()) {
                records.push(HistoryRecord::device(now, id, payload.clone()));
            }
        }

        records
    }
}

async fn run<St: HistoryStore>(inner: Arc<Inner<St>>, cancel: CancellationToken) {
    let interval = inner.settings.interval;
    let recovery_interval = inner.settings.recovery_interval;
    let mut pause = interval;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(pause) => {}
        }

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            outcome = inner.log_cycle() => outcome,
        };

        pause = match outcome {
            Ok(count) => {
                tracing::debug!(records = count, "History cycle persisted");
                interval
            }
            Err(e) => {
                tracing::error!("Error in history cycle, retrying in {:?}: {:?}", recovery_interval, e);
                recovery_interval
            }
        };
    }

    tracing::debug!("History loop exited");
}

fn report_range(days: u32) -> anyhow::Result<(DateTime, DateTime)> {
    anyhow::ensure!(REPORT_DAYS.contains(&days), "days must be within {:?}, got {}", REPORT_DAYS, days);

    let end = DateTime::now();
    let start = end - Duration::days(days.into());
    Ok((start, end))
}
