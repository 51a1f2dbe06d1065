use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use anyhow::Context as _;
use infrastructure::{EventBus, EventListener};
use serde::Serialize;

use crate::core::time::TimeWindow;
use crate::device::{Board, BoardAdapter, BoardHealth, JsonEndpoint};
use crate::history::{
    DeviceFeed, EngineAlert, EngineStatistics, HistoryBackend, HistoryLogger, HistoryStore, RELAY_CONFIG_SETTING,
    SENSOR_CALIBRATION_SETTING, SensorFeed, SensorStatistics, ThresholdSet, UsageSummary, ViolationCounts,
};
use crate::relay::{RelayController, RelayError, RelayEvent, RelayPatch, RelayState};
use crate::settings::Settings;
use crate::telemetry::{
    Calibration, DevicePayload, DevicePoller, DeviceSource, Poller, SensorPoller, SensorReading, SensorSource,
};

const RELAY_EVENT_BUFFER: usize = 64;

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub sensor_poller: bool,
    pub device_poller: bool,
    pub relay_controller: bool,
    pub history_logger: bool,
    pub boards: Vec<BoardHealth>,
}

/// Owns every long-running component of the monitor and the order in which
/// they start and stop.
pub struct AppContext<St: HistoryStore = HistoryBackend> {
    boards: Vec<Arc<BoardAdapter>>,
    sensors: SensorPoller,
    devices: DevicePoller,
    relays: RelayController,
    relay_events: EventBus<RelayEvent>,
    history: HistoryLogger<St>,
    store: Arc<St>,
}

impl<St: HistoryStore> AppContext<St> {
    /// Builds all components. Boards that fail to connect are logged and kept,
    /// they report themselves unhealthy and yield no readings.
    pub async fn init(settings: &Settings, store: Arc<St>) -> anyhow::Result<Self> {
        let mut boards = Vec::with_capacity(settings.hardware.boards.len());
        for config in &settings.hardware.boards {
            let board = BoardAdapter::from_config(config, settings.hardware.simulation)
                .with_context(|| format!("Error creating board {}", config.id))?;

            if let Err(e) = board.connect().await {
                tracing::warn!(board = %config.id, "Board not connected, continuing without it: {}", e);
            }
            boards.push(Arc::new(board));
        }

        let by_id: HashMap<String, Arc<BoardAdapter>> =
            boards.iter().map(|board| (board.id().to_owned(), board.clone())).collect();
        let sensors = Poller::new(
            SensorSource::new(by_id, settings.sensors.clone()),
            settings.polling.sensor_interval,
            settings.polling.recovery_interval,
        );
        restore_calibrations(sensors.source(), store.as_ref()).await;

        let device_ids = settings.devices.ids.clone();
        let device_source = match &settings.devices.gateway_url {
            Some(url) if !settings.hardware.simulation => {
                let endpoint =
                    JsonEndpoint::new(url, settings.devices.timeout).context("Error creating device gateway client")?;
                DeviceSource::gateway(device_ids, endpoint)
            }
            _ => DeviceSource::simulated(device_ids),
        };
        let devices = Poller::new(
            device_source,
            settings.polling.device_interval,
            settings.polling.recovery_interval,
        );

        let relay_events = EventBus::new(RELAY_EVENT_BUFFER);
        let relays = RelayController::new(&boards, &settings.relays, relay_events.emitter());
        restore_relay_config(&relays, store.as_ref()).await;

        let history = HistoryLogger::new(
            store.clone(),
            sensors.subscribe(),
            devices.subscribe(),
            settings.history.clone(),
            settings.thresholds,
        );

        Ok(Self {
            boards,
            sensors,
            devices,
            relays,
            relay_events,
            history,
            store,
        })
    }

    pub fn start(&self) {
        self.sensors.start();
        self.devices.start();
        self.history.start();

        tracing::info!(boards = self.boards.len(), "Monitor started");
    }

    /// Stops the history logger, the pollers and the relay controller in that
    /// order, then disconnects the boards. All relays end up off.
    pub async fn shutdown(&self) {
        self.history.stop().await;
        self.sensors.stop().await;
        self.devices.stop().await;
        self.relays.stop().await;

        for board in &self.boards {
            board.disconnect().await;
        }

        tracing::info!("Monitor shut down");
    }

    pub async fn health(&self) -> HealthReport {
        let mut boards = Vec::with_capacity(self.boards.len());
        for board in &self.boards {
            boards.push(board.health_check().await);
        }

        HealthReport {
            sensor_poller: self.sensors.is_running(),
            device_poller: self.devices.is_running(),
            relay_controller: self.relays.is_running(),
            history_logger: self.history.is_running(),
            boards,
        }
    }
}

//operations served to the presentation layer
#[allow(dead_code)]
impl<St: HistoryStore> AppContext<St> {
    pub fn get_all_readings(&self) -> HashMap<String, SensorReading> {
        self.sensors.get_all_readings()
    }

    pub fn get_reading(&self, id: &str) -> Option<SensorReading> {
        self.sensors.get_reading(id)
    }

    pub fn get_all_devices(&self) -> HashMap<String, DevicePayload> {
        self.devices.get_all_readings()
    }

    pub fn get_device(&self, id: &str) -> Option<DevicePayload> {
        self.devices.get_reading(id)
    }

    pub fn subscribe_sensors(&self) -> SensorFeed {
        self.sensors.subscribe()
    }

    pub fn subscribe_devices(&self) -> DeviceFeed {
        self.devices.subscribe()
    }

    pub fn subscribe_relays(&self) -> EventListener<RelayEvent> {
        self.relay_events.subscribe()
    }

    pub async fn get_all_relays(&self) -> Vec<RelayState> {
        self.relays.get_all_relays().await
    }

    pub async fn get_relay(&self, id: &str) -> Option<RelayState> {
        self.relays.get_relay(id).await
    }

    pub async fn turn_on(&self, id: &str) -> Result<RelayState, RelayError> {
        self.relays.turn_on(id).await
    }

    pub async fn turn_off(&self, id: &str) -> Result<RelayState, RelayError> {
        self.relays.turn_off(id).await
    }

    pub async fn toggle(&self, id: &str) -> Result<RelayState, RelayError> {
        self.relays.toggle(id).await
    }

    /// Applies `patch` and persists the configuration of all relays. A failed
    /// save is logged, the applied change stays in effect.
    pub async fn update_relay_config(&self, id: &str, patch: &RelayPatch) -> Result<RelayState, RelayError> {
        let state = self.relays.configure(id, patch).await?;

        let saved = self.relays.saved_config().await;
        let stored = match serde_json::to_value(&saved) {
            Ok(value) => self.store.put_setting(RELAY_CONFIG_SETTING, value).await,
            Err(e) => Err(e.into()),
        };
        if let Err(e) = stored {
            tracing::error!(relay = %id, "Error saving relay configuration: {:?}", e);
        }

        Ok(state)
    }

    pub async fn sensor_statistics(
        &self,
        metric: &str,
        window: TimeWindow,
    ) -> anyhow::Result<Option<SensorStatistics>> {
        self.history.statistics(metric, window).await
    }

    pub async fn engine_statistics(&self, window: TimeWindow) -> anyhow::Result<EngineStatistics> {
        self.history.engine_statistics(window).await
    }

    pub async fn count_violations(
        &self,
        window: TimeWindow,
        thresholds: Option<ThresholdSet>,
    ) -> anyhow::Result<ViolationCounts> {
        self.history.count_violations(window, thresholds).await
    }

    pub async fn usage_summary(&self, days: u32) -> anyhow::Result<UsageSummary> {
        self.history.usage_summary(days).await
    }

    pub async fn engine_alerts(&self, days: u32) -> anyhow::Result<Vec<EngineAlert>> {
        self.history.engine_alerts(days).await
    }

    pub async fn get_thresholds(&self) -> ThresholdSet {
        self.history.get_thresholds().await
    }

    pub async fn update_thresholds(&self, thresholds: ThresholdSet) -> anyhow::Result<ThresholdSet> {
        self.history.update_thresholds(thresholds).await
    }

    pub async fn reset_thresholds(&self) -> anyhow::Result<ThresholdSet> {
        self.history.reset_thresholds().await
    }

    pub fn get_calibrations(&self) -> BTreeMap<String, Calibration> {
        self.sensors.source().calibrations()
    }

    /// Merges `updates` into the active calibrations and persists the
    /// result. Nothing changes unless every entry is valid and the save
    /// succeeded.
    pub async fn update_calibrations(
        &self,
        updates: BTreeMap<String, Calibration>,
    ) -> anyhow::Result<BTreeMap<String, Calibration>> {
        let source = self.sensors.source();
        source.validate_calibrations(&updates)?;

        let mut merged = source.calibrations();
        merged.extend(updates);

        self.store
            .put_setting(SENSOR_CALIBRATION_SETTING, serde_json::to_value(&merged)?)
            .await
            .context("Error saving sensor calibration")?;
        source.apply_calibrations(&merged);

        tracing::info!("Sensor calibration updated: {:?}", merged);
        Ok(merged)
    }
}

async fn restore_calibrations<St: HistoryStore>(sensors: &SensorSource, store: &St) {
    let saved = match store.get_setting(SENSOR_CALIBRATION_SETTING).await {
        Ok(Some(value)) => value,
        Ok(None) => return,
        Err(e) => {
            tracing::warn!("Error loading saved sensor calibration, using configured values: {:?}", e);
            return;
        }
    };

    match serde_json::from_value::<BTreeMap<String, Calibration>>(saved) {
        Ok(saved) => {
            sensors.apply_calibrations(&saved);
            tracing::info!(sensors = saved.len(), "Restored saved sensor calibration");
        }
        Err(e) => tracing::warn!("Saved sensor calibration is unreadable, using configured values: {}", e),
    }
}

async fn restore_relay_config<St: HistoryStore>(relays: &RelayController, store: &St) {
    let saved = match store.get_setting(RELAY_CONFIG_SETTING).await {
        Ok(Some(value)) => value,
        Ok(None) => return,
        Err(e) => {
            tracing::warn!("Error loading saved relay configuration, using defaults: {:?}", e);
            return;
        }
    };

    match serde_json::from_value::<BTreeMap<String, RelayPatch>>(saved) {
        Ok(saved) => {
            relays.restore(&saved).await;
            tracing::info!(relays = saved.len(), "Restored saved relay configuration");
        }
        Err(e) => tracing::warn!("Saved relay configuration is unreadable, using defaults: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use assert_json_diff::assert_json_include;
    use serde_json::json;

    use super::*;
    use crate::history::InMemoryStore;
    use crate::relay::{ChangeCause, RelayMode};
    use crate::settings;

    async fn context(store: Arc<InMemoryStore>) -> AppContext<InMemoryStore> {
        AppContext::init(&settings::test::defaults(), store).await.unwrap()
    }

    #[tokio::test]
    async fn restores_saved_relay_configuration_with_outputs_off() {
        let store = Arc::new(InMemoryStore::new());
        store
            .put_setting(
                RELAY_CONFIG_SETTING,
                json!({
                    "relay_1": { "name": "Bilge pump", "mode": "timed", "timed_duration": 30.0 },
                    "relay_99": { "name": "Gone" }
                }),
            )
            .await
            .unwrap();

        let ctx = context(store).await;
        let relay = ctx.get_relay("relay_1").await.unwrap();

        assert_eq!(relay.name, "Bilge pump");
        assert_eq!(relay.mode, RelayMode::Timed);
        assert_eq!(relay.timed_duration, Duration::from_secs(30));
        assert!(!relay.state);
        assert_eq!(ctx.get_all_relays().await.len(), 6);
    }

    #[tokio::test]
    async fn unreadable_relay_configuration_is_ignored() {
        let store = Arc::new(InMemoryStore::new());
        store.put_setting(RELAY_CONFIG_SETTING, json!([1, 2, 3])).await.unwrap();

        let ctx = context(store).await;

        assert_eq!(ctx.get_relay("relay_0").await.unwrap().name, "Relay 1");
    }

    #[tokio::test]
    async fn relay_configuration_is_persisted_on_update() {
        let store = Arc::new(InMemoryStore::new());
        let ctx = context(store.clone()).await;

        let patch = RelayPatch {
            name: Some("Anchor light".to_string()),
            mode: Some(RelayMode::Flash),
            flash_interval: Some(0.5),
            ..Default::default()
        };
        ctx.update_relay_config("relay_0", &patch).await.unwrap();

        let saved = store.get_setting(RELAY_CONFIG_SETTING).await.unwrap().unwrap();
        assert_json_include!(
            actual: saved,
            expected: json!({
                "relay_0": { "name": "Anchor light", "mode": "flash", "flash_interval": 0.5, "enabled": true },
                "relay_5": { "name": "Relay 6", "mode": "normal" }
            })
        );
    }

    #[tokio::test]
    async fn rejected_update_is_not_persisted() {
        let store = Arc::new(InMemoryStore::new());
        let ctx = context(store.clone()).await;

        let patch = RelayPatch {
            flash_interval: Some(0.0),
            ..Default::default()
        };
        let result = ctx.update_relay_config("relay_0", &patch).await;

        assert!(matches!(result, Err(RelayError::InvalidParameter(_))));
        assert!(store.get_setting(RELAY_CONFIG_SETTING).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn calibration_update_is_persisted_and_restored() {
        let store = Arc::new(InMemoryStore::new());
        let ctx = context(store.clone()).await;

        let updates = BTreeMap::from([("fuel_tank".to_string(), Calibration::Range { min: 300.0, max: 3700.0 })]);
        let merged = ctx.update_calibrations(updates).await.unwrap();
        assert_eq!(merged.len(), 6);

        let saved = store.get_setting(SENSOR_CALIBRATION_SETTING).await.unwrap().unwrap();
        assert_json_include!(
            actual: saved,
            expected: json!({
                "fuel_tank": { "type": "range", "min": 300.0, "max": 3700.0 },
                "engine_rpm": { "type": "pulses_per_rev", "pulses_per_rev": 1.0 }
            })
        );

        let restarted = context(store).await;
        assert_eq!(
            restarted.get_calibrations()["fuel_tank"],
            Calibration::Range { min: 300.0, max: 3700.0 }
        );
    }

    #[tokio::test]
    async fn invalid_calibration_update_changes_nothing() {
        let store = Arc::new(InMemoryStore::new());
        let ctx = context(store.clone()).await;
        let before = ctx.get_calibrations();

        let updates = BTreeMap::from([
            ("water_tank".to_string(), Calibration::Range { min: 0.0, max: 2000.0 }),
            ("waste_tank".to_string(), Calibration::Range { min: 2000.0, max: 0.0 }),
        ]);

        assert!(ctx.update_calibrations(updates).await.is_err());
        assert_eq!(ctx.get_calibrations(), before);
        assert!(store.get_setting(SENSOR_CALIBRATION_SETTING).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn thresholds_round_trip_through_context() {
        let ctx = context(Arc::new(InMemoryStore::new())).await;
        let defaults = ctx.get_thresholds().await;

        let mut stricter = defaults;
        stricter.coolant_temp_max = 85.0;
        ctx.update_thresholds(stricter).await.unwrap();
        assert_eq!(ctx.get_thresholds().await, stricter);

        assert_eq!(ctx.reset_thresholds().await.unwrap(), defaults);
        assert!(ctx.usage_summary(0).await.is_err());
        assert!(ctx.engine_alerts(7).await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn runs_until_shutdown_and_leaves_relays_off() {
        let ctx = context(Arc::new(InMemoryStore::new())).await;
        let mut events = ctx.subscribe_relays();

        ctx.start();
        tokio::time::sleep(Duration::from_secs(2)).await;

        assert!(ctx.get_reading("engine_rpm").is_some());
        assert_eq!(ctx.get_all_devices().len(), 4);
        let health = ctx.health().await;
        assert!(health.sensor_poller && health.device_poller && health.history_logger);
        assert_eq!(health.boards.len(), 2);

        ctx.turn_on("relay_2").await.unwrap();
        assert_eq!(events.recv().await.unwrap().cause, ChangeCause::Command);

        ctx.shutdown().await;

        let event = events.recv().await.unwrap();
        assert_eq!(event.cause, ChangeCause::Shutdown);
        assert_eq!(event.relay.id, "relay_2");
        assert!(ctx.get_all_relays().await.iter().all(|relay| !relay.state));

        let health = ctx.health().await;
        assert!(!health.sensor_poller && !health.device_poller && !health.history_logger);
        assert!(!health.relay_controller);
    }

    #[tokio::test(start_paused = true)]
    async fn logged_history_feeds_statistics() {
        let ctx = context(Arc::new(InMemoryStore::new())).await;

        ctx.start();
        //history interval defaults to 60s, two cycles
        tokio::time::sleep(Duration::from_secs(125)).await;
        ctx.shutdown().await;

        let stats = ctx.sensor_statistics("coolant_temp", TimeWindow::all()).await.unwrap().unwrap();
        assert_eq!(stats.total_readings, 2);
        assert_eq!(stats.unit, "°C");

        let engine = ctx.engine_statistics(TimeWindow::all()).await.unwrap();
        assert_eq!(engine.total_readings, 2);

        let counts = ctx.count_violations(TimeWindow::all(), None).await.unwrap();
        assert_eq!(counts.total, counts.rpm_exceeded + counts.oil_low + counts.oil_high + counts.temp_high);
    }
}
