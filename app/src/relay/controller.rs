use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use infrastructure::EventEmitter;
use tokio::sync::Mutex;

use super::activity::{self, Activity};
use super::{ChangeCause, RelayError, RelayEvent, RelayMode, RelayPatch, RelayState};
use crate::device::{Board, BoardAdapter};
use crate::settings::RelaySettings;

pub(super) struct Slot {
    pub(super) state: RelayState,
    pub(super) activity: Option<Activity>,
}

/// Everything needed to drive one relay, shared with its activity task.
pub(super) struct RelayHandle<B> {
    pub(super) id: String,
    pub(super) slot: Arc<Mutex<Slot>>,
    board: Arc<B>,
    events: EventEmitter<RelayEvent>,
}

impl<B> Clone for RelayHandle<B> {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            slot: self.slot.clone(),
            board: self.board.clone(),
            events: self.events.clone(),
        }
    }
}

impl<B: Board> RelayHandle<B> {
    /// Drives the hardware output. On failure nothing in `state` changes.
    pub(super) async fn output(&self, state: &mut RelayState, on: bool, cause: ChangeCause) -> Result<(), RelayError> {
        self.board
            .set_relay(state.channel, on)
            .await
            .map_err(|source| RelayError::Hardware {
                relay: state.id.clone(),
                source,
            })?;

        if state.state != on {
            state.state = on;
            self.events.send(RelayEvent {
                relay: state.clone(),
                cause,
            });
        }

        Ok(())
    }
}

pub struct RelayController<B: Board = BoardAdapter> {
    relays: Vec<RelayHandle<B>>,
    running: AtomicBool,
}

impl<B: Board + 'static> RelayController<B> {
    /// Creates `relays_per_board` relays on every board, numbered across
    /// boards (`relay_0`, `relay_1`, ...). All outputs start off.
    pub fn new(boards: &[Arc<B>], settings: &RelaySettings, events: EventEmitter<RelayEvent>) -> Self {
        let per_board = settings.relays_per_board as usize;
        let mut relays = Vec::with_capacity(boards.len() * per_board);

        for (board_index, board) in boards.iter().enumerate() {
            for number in 0..settings.relays_per_board {
                let index = board_index * per_board + number as usize;
                let id = format!("relay_{}", index);

                let state = RelayState {
                    id: id.clone(),
                    board: board.id().to_owned(),
                    channel: number + 1,
                    name: format!("Relay {}", index + 1),
                    enabled: true,
                    mode: RelayMode::Normal,
                    flash_interval: settings.default_flash_interval,
                    timed_duration: settings.default_timed_duration,
                    state: false,
                };

                relays.push(RelayHandle {
                    id,
                    slot: Arc::new(Mutex::new(Slot { state, activity: None })),
                    board: board.clone(),
                    events: events.clone(),
                });
            }
        }

        Self {
            relays,
            running: AtomicBool::new(true),
        }
    }

    fn relay(&self, id: &str) -> Result<&RelayHandle<B>, RelayError> {
        self.relays
            .iter()
            .find(|r| r.id == id)
            .ok_or_else(|| RelayError::NotFound(id.to_owned()))
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub async fn get_relay(&self, id: &str) -> Option<RelayState> {
        let relay = self.relay(id).ok()?;
        Some(relay.slot.lock().await.state.clone())
    }

    pub async fn get_all_relays(&self) -> Vec<RelayState> {
        let mut states = Vec::with_capacity(self.relays.len());
        for relay in &self.relays {
            states.push(relay.slot.lock().await.state.clone());
        }
        states
    }

    #[cfg(test)]
    pub async fn active_activities(&self) -> usize {
        let mut count = 0;
        for relay in &self.relays {
            if relay.slot.lock().await.activity.is_some() {
                count += 1;
            }
        }
        count
    }

    pub async fn turn_on(&self, id: &str) -> Result<RelayState, RelayError> {
        let relay = self.relay(id)?;
        let mut slot = relay.slot.lock().await;
        ensure_enabled(&slot.state)?;

        switch_on(relay, &mut slot).await?;

        tracing::info!(relay = %id, mode = %slot.state.mode, "Relay turned on");
        Ok(slot.state.clone())
    }

    pub async fn turn_off(&self, id: &str) -> Result<RelayState, RelayError> {
        let relay = self.relay(id)?;
        let mut slot = relay.slot.lock().await;
        ensure_enabled(&slot.state)?;

        switch_off(relay, &mut slot, ChangeCause::Command).await?;

        tracing::info!(relay = %id, "Relay turned off");
        Ok(slot.state.clone())
    }

    /// Off when currently on or running a flash/timer, on otherwise.
    pub async fn toggle(&self, id: &str) -> Result<RelayState, RelayError> {
        let relay = self.relay(id)?;
        let mut slot = relay.slot.lock().await;
        ensure_enabled(&slot.state)?;

        if slot.state.state || slot.activity.is_some() {
            switch_off(relay, &mut slot, ChangeCause::Command).await?;
        } else {
            switch_on(relay, &mut slot).await?;
        }

        tracing::info!(relay = %id, state = slot.state.state, "Relay toggled");
        Ok(slot.state.clone())
    }

    /// Applies a configuration patch.
    ///
    /// Disabling or changing the mode stops any running activity and
    /// switches the output off. A new interval for a flashing relay restarts
    /// the flash right away. An invalid patch or a failed switch-off leaves
    /// the configuration untouched.
    pub async fn configure(&self, id: &str, patch: &RelayPatch) -> Result<RelayState, RelayError> {
        let relay = self.relay(id)?;
        let changes = patch.validate()?;
        let mut slot = relay.slot.lock().await;

        let disabling = changes.enabled == Some(false);
        let mode_changed = changes.mode.is_some_and(|mode| mode != slot.state.mode);
        let interval_changed = changes.flash_interval.is_some_and(|i| i != slot.state.flash_interval);

        if (disabling || mode_changed) && (slot.state.state || slot.activity.is_some()) {
            switch_off(relay, &mut slot, ChangeCause::Configured).await?;
        }

        changes.apply_to(&mut slot.state);

        if slot.state.mode == RelayMode::Flash && interval_changed {
            if let Some(running) = slot.activity.take() {
                running.stop().await;
                slot.activity = Some(activity::flash(relay.clone(), slot.state.flash_interval));
                tracing::debug!(relay = %id, interval = ?slot.state.flash_interval, "Flash restarted");
            }
        }

        relay.events.send(RelayEvent {
            relay: slot.state.clone(),
            cause: ChangeCause::Configured,
        });

        tracing::info!(relay = %id, "Relay configuration updated: {:?}", patch);
        Ok(slot.state.clone())
    }

    /// Cancels every activity and forces all enabled outputs off. The
    /// controller stays usable afterwards.
    pub async fn stop(&self) {
        for relay in &self.relays {
            let mut slot = relay.slot.lock().await;

            if let Some(running) = slot.activity.take() {
                running.stop().await;
            }

            if slot.state.enabled {
                if let Err(e) = relay.output(&mut slot.state, false, ChangeCause::Shutdown).await {
                    tracing::error!(relay = %relay.id, "Could not switch off relay during stop: {:?}", e);
                }
            }
        }

        self.running.store(false, Ordering::Release);
        tracing::info!("Relay controller stopped, all relays off");
    }

    /// Configuration of all relays, in the form accepted by [`Self::restore`].
    pub async fn saved_config(&self) -> BTreeMap<String, RelayPatch> {
        let mut saved = BTreeMap::new();
        for relay in &self.relays {
            let slot = relay.slot.lock().await;
            saved.insert(relay.id.clone(), RelayPatch::from(&slot.state));
        }
        saved
    }

    /// Restores previously saved configuration. Outputs are not touched,
    /// unknown relays and invalid entries are skipped.
    pub async fn restore(&self, saved: &BTreeMap<String, RelayPatch>) {
        for (id, patch) in saved {
            let Ok(relay) = self.relay(id) else {
                tracing::warn!(relay = %id, "Ignoring saved configuration of unknown relay");
                continue;
            };

            match patch.validate() {
                Ok(changes) => changes.apply_to(&mut relay.slot.lock().await.state),
                Err(e) => tracing::warn!(relay = %id, "Ignoring invalid saved configuration: {}", e),
            }
        }
    }
}

fn ensure_enabled(state: &RelayState) -> Result<(), RelayError> {
    if state.enabled {
        Ok(())
    } else {
        Err(RelayError::Disabled(state.id.clone()))
    }
}

/// Hardware first, the running activity is replaced only once the output
/// is on. A failed write leaves the relay as it was.
async fn switch_on<B: Board + 'static>(relay: &RelayHandle<B>, slot: &mut Slot) -> Result<(), RelayError> {
    relay.output(&mut slot.state, true, ChangeCause::Command).await?;

    if let Some(running) = slot.activity.take() {
        running.stop().await;
    }

    slot.activity = match slot.state.mode {
        RelayMode::Normal => None,
        RelayMode::Flash => Some(activity::flash(relay.clone(), slot.state.flash_interval)),
        RelayMode::Timed => Some(activity::timer(relay.clone(), slot.state.timed_duration)),
    };

    Ok(())
}

async fn switch_off<B: Board>(relay: &RelayHandle<B>, slot: &mut Slot, cause: ChangeCause) -> Result<(), RelayError> {
    relay.output(&mut slot.state, false, cause).await?;

    if let Some(running) = slot.activity.take() {
        running.stop().await;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    use infrastructure::EventBus;

    use super::*;
    use crate::device::{AdapterError, BoardHealth};
    use crate::settings::ConnectionType;

    /// Records every relay write, can be switched to failing.
    #[derive(Default)]
    struct RecordingBoard {
        writes: StdMutex<Vec<(u8, bool)>>,
        failing: AtomicBool,
    }

    impl RecordingBoard {
        fn writes(&self) -> Vec<(u8, bool)> {
            self.writes.lock().unwrap().clone()
        }
    }

    impl Board for RecordingBoard {
        fn id(&self) -> &str {
            "board_0"
        }

        async fn connect(&self) -> Result<(), AdapterError> {
            Ok(())
        }

        async fn disconnect(&self) {}

        fn is_connected(&self) -> bool {
            true
        }

        async fn read_analog(&self, _channel: u8) -> Option<f64> {
            None
        }

        async fn read_digital(&self, _channel: u8) -> Option<bool> {
            None
        }

        async fn read_frequency(&self, _channel: u8) -> Option<f64> {
            None
        }

        async fn set_relay(&self, channel: u8, on: bool) -> Result<(), AdapterError> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(AdapterError::Transport("bus fault".to_string()));
            }
            self.writes.lock().unwrap().push((channel, on));
            Ok(())
        }

        async fn get_relay(&self, channel: u8) -> Option<bool> {
            self.writes.lock().unwrap().iter().rev().find(|(c, _)| *c == channel).map(|(_, on)| *on)
        }

        async fn health_check(&self) -> BoardHealth {
            BoardHealth {
                board_id: "board_0".to_string(),
                board_name: "Recording".to_string(),
                connection: ConnectionType::Wired,
                connected: true,
                simulated: false,
                detail: None,
            }
        }
    }

    struct Fixture {
        controller: RelayController<RecordingBoard>,
        board: Arc<RecordingBoard>,
        bus: EventBus<RelayEvent>,
    }

    fn fixture() -> Fixture {
        let board = Arc::new(RecordingBoard::default());
        let bus = EventBus::new(64);
        let settings = RelaySettings {
            relays_per_board: 3,
            default_flash_interval: Duration::from_secs(1),
            default_timed_duration: Duration::from_secs(10),
        };
        let controller = RelayController::new(&[board.clone()], &settings, bus.emitter());

        Fixture { controller, board, bus }
    }

    fn patch_mode(mode: RelayMode) -> RelayPatch {
        RelayPatch {
            mode: Some(mode),
            ..Default::default()
        }
    }

    async fn output(controller: &RelayController<RecordingBoard>, id: &str) -> bool {
        controller.get_relay(id).await.unwrap().state
    }

    #[tokio::test]
    async fn relays_are_numbered_with_one_based_channels() {
        let f = fixture();

        let relays = f.controller.get_all_relays().await;

        assert_eq!(relays.len(), 3);
        assert_eq!(relays[2].id, "relay_2");
        assert_eq!(relays[2].name, "Relay 3");
        assert_eq!(relays[2].channel, 3);
        assert!(relays.iter().all(|r| !r.state && r.enabled && r.mode == RelayMode::Normal));
    }

    #[tokio::test]
    async fn normal_on_off_returns_resulting_state() {
        let f = fixture();

        let on = f.controller.turn_on("relay_0").await.unwrap();
        let off = f.controller.turn_off("relay_0").await.unwrap();

        assert!(on.state);
        assert!(!off.state);
        assert_eq!(f.board.writes(), vec![(1, true), (1, false)]);
    }

    #[tokio::test]
    async fn toggle_flips_output() {
        let f = fixture();

        assert!(f.controller.toggle("relay_1").await.unwrap().state);
        assert!(!f.controller.toggle("relay_1").await.unwrap().state);
    }

    #[tokio::test]
    async fn unknown_relay_is_not_found() {
        let f = fixture();

        assert!(matches!(f.controller.turn_on("relay_9").await, Err(RelayError::NotFound(_))));
        assert!(f.controller.get_relay("relay_9").await.is_none());
    }

    #[tokio::test]
    async fn disabling_forces_off_and_rejects_writes_until_reenabled() {
        let f = fixture();
        f.controller.turn_on("relay_0").await.unwrap();

        let disabled = f
            .controller
            .configure(
                "relay_0",
                &RelayPatch {
                    enabled: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert!(!disabled.state);
        assert_eq!(f.board.writes().last(), Some(&(1, false)));
        assert!(matches!(f.controller.turn_on("relay_0").await, Err(RelayError::Disabled(_))));
        assert!(matches!(f.controller.toggle("relay_0").await, Err(RelayError::Disabled(_))));

        f.controller
            .configure(
                "relay_0",
                &RelayPatch {
                    enabled: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(f.controller.turn_on("relay_0").await.unwrap().state);
    }

    #[tokio::test]
    async fn invalid_patch_leaves_relay_untouched() {
        let f = fixture();
        let before = f.controller.get_relay("relay_0").await.unwrap();

        let result = f
            .controller
            .configure(
                "relay_0",
                &RelayPatch {
                    name: Some("Deck lights".to_string()),
                    flash_interval: Some(0.0),
                    ..Default::default()
                },
            )
            .await;

        assert!(matches!(result, Err(RelayError::InvalidParameter(_))));
        assert_eq!(f.controller.get_relay("relay_0").await.unwrap(), before);
    }

    #[tokio::test]
    async fn hardware_failure_is_reported_without_state_change() {
        let f = fixture();
        f.board.failing.store(true, Ordering::SeqCst);

        let result = f.controller.turn_on("relay_0").await;

        assert!(matches!(result, Err(RelayError::Hardware { .. })));
        assert!(!output(&f.controller, "relay_0").await);
    }

    #[tokio::test(start_paused = true)]
    async fn flash_toggles_every_interval() {
        let f = fixture();
        f.controller.configure("relay_0", &patch_mode(RelayMode::Flash)).await.unwrap();

        assert!(f.controller.turn_on("relay_0").await.unwrap().state);
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(!output(&f.controller, "relay_0").await);
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(output(&f.controller, "relay_0").await);

        f.controller.turn_off("relay_0").await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(!output(&f.controller, "relay_0").await);
        assert_eq!(f.controller.active_activities().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn switching_flash_to_normal_settles_on_explicit_command() {
        let f = fixture();
        f.controller.configure("relay_0", &patch_mode(RelayMode::Flash)).await.unwrap();
        f.controller.turn_on("relay_0").await.unwrap();
        tokio::time::sleep(Duration::from_millis(2500)).await;

        let normal = f.controller.configure("relay_0", &patch_mode(RelayMode::Normal)).await.unwrap();
        assert!(!normal.state);
        f.controller.turn_on("relay_0").await.unwrap();
        let writes_after_command = f.board.writes().len();

        tokio::time::sleep(Duration::from_secs(5)).await;

        assert!(output(&f.controller, "relay_0").await);
        assert_eq!(f.board.writes().len(), writes_after_command);
        assert_eq!(f.controller.active_activities().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn new_flash_interval_restarts_running_flash() {
        let f = fixture();
        f.controller
            .configure(
                "relay_0",
                &RelayPatch {
                    mode: Some(RelayMode::Flash),
                    flash_interval: Some(10.0),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        f.controller.turn_on("relay_0").await.unwrap();
        tokio::time::sleep(Duration::from_secs(2)).await;

        let updated = f
            .controller
            .configure(
                "relay_0",
                &RelayPatch {
                    flash_interval: Some(1.0),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(updated.state);

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(!output(&f.controller, "relay_0").await);
        assert_eq!(f.controller.active_activities().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn timed_relay_switches_off_after_duration() {
        let f = fixture();
        f.controller.configure("relay_1", &patch_mode(RelayMode::Timed)).await.unwrap();
        let mut events = f.bus.subscribe();

        f.controller.turn_on("relay_1").await.unwrap();
        for _ in 0..9 {
            tokio::time::sleep(Duration::from_millis(1099)).await;
            assert!(output(&f.controller, "relay_1").await);
        }
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert!(!output(&f.controller, "relay_1").await);
        assert_eq!(f.controller.active_activities().await, 0);
        assert_eq!(events.recv().await.map(|e| e.cause), Some(ChangeCause::Command));
        assert_eq!(events.recv().await.map(|e| e.cause), Some(ChangeCause::TimerExpired));
    }

    #[tokio::test(start_paused = true)]
    async fn turning_off_timed_relay_cancels_timer() {
        let f = fixture();
        f.controller.configure("relay_1", &patch_mode(RelayMode::Timed)).await.unwrap();

        f.controller.turn_on("relay_1").await.unwrap();
        tokio::time::sleep(Duration::from_secs(3)).await;
        f.controller.turn_off("relay_1").await.unwrap();
        let writes = f.board.writes().len();

        tokio::time::sleep(Duration::from_secs(20)).await;

        assert_eq!(f.board.writes().len(), writes);
        assert_eq!(f.controller.active_activities().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_timer_retries_switch_off_until_hardware_recovers() {
        let f = fixture();
        f.controller.configure("relay_1", &patch_mode(RelayMode::Timed)).await.unwrap();
        f.controller.turn_on("relay_1").await.unwrap();

        f.board.failing.store(true, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(10500)).await;
        assert!(output(&f.controller, "relay_1").await);
        assert_eq!(f.controller.active_activities().await, 1);

        f.board.failing.store(false, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(60)).await;

        assert!(!output(&f.controller, "relay_1").await);
        assert_eq!(f.controller.active_activities().await, 0);
        assert_eq!(f.board.writes(), vec![(2, true), (2, false)]);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_turn_off_keeps_flash_running() {
        let f = fixture();
        f.controller.configure("relay_0", &patch_mode(RelayMode::Flash)).await.unwrap();
        f.controller.turn_on("relay_0").await.unwrap();

        f.board.failing.store(true, Ordering::SeqCst);
        assert!(matches!(f.controller.turn_off("relay_0").await, Err(RelayError::Hardware { .. })));
        assert!(matches!(f.controller.toggle("relay_0").await, Err(RelayError::Hardware { .. })));

        let relay = f.controller.get_relay("relay_0").await.unwrap();
        assert_eq!(relay.mode, RelayMode::Flash);
        assert!(relay.state);
        assert_eq!(f.controller.active_activities().await, 1);

        f.board.failing.store(false, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(!output(&f.controller, "relay_0").await);

        f.controller.turn_off("relay_0").await.unwrap();
        assert_eq!(f.controller.active_activities().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_turn_off_keeps_timer_running() {
        let f = fixture();
        f.controller.configure("relay_1", &patch_mode(RelayMode::Timed)).await.unwrap();
        f.controller.turn_on("relay_1").await.unwrap();

        f.board.failing.store(true, Ordering::SeqCst);
        assert!(matches!(f.controller.turn_off("relay_1").await, Err(RelayError::Hardware { .. })));
        assert!(output(&f.controller, "relay_1").await);
        assert_eq!(f.controller.active_activities().await, 1);

        f.board.failing.store(false, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(11)).await;

        assert!(!output(&f.controller, "relay_1").await);
        assert_eq!(f.controller.active_activities().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_mode_change_keeps_configuration_and_activity() {
        let f = fixture();
        f.controller.configure("relay_0", &patch_mode(RelayMode::Flash)).await.unwrap();
        f.controller.turn_on("relay_0").await.unwrap();

        f.board.failing.store(true, Ordering::SeqCst);
        let result = f.controller.configure("relay_0", &patch_mode(RelayMode::Normal)).await;

        assert!(matches!(result, Err(RelayError::Hardware { .. })));
        assert_eq!(f.controller.get_relay("relay_0").await.unwrap().mode, RelayMode::Flash);
        assert_eq!(f.controller.active_activities().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_cancels_everything_and_forces_all_off() {
        let f = fixture();
        f.controller.configure("relay_0", &patch_mode(RelayMode::Flash)).await.unwrap();
        f.controller.configure("relay_1", &patch_mode(RelayMode::Timed)).await.unwrap();
        f.controller.turn_on("relay_0").await.unwrap();
        f.controller.turn_on("relay_1").await.unwrap();
        f.controller.turn_on("relay_2").await.unwrap();
        tokio::time::sleep(Duration::from_millis(1500)).await;

        f.controller.stop().await;
        let writes = f.board.writes().len();
        tokio::time::sleep(Duration::from_secs(60)).await;

        assert!(!f.controller.is_running());
        assert_eq!(f.controller.active_activities().await, 0);
        assert_eq!(f.board.writes().len(), writes);
        for relay in f.controller.get_all_relays().await {
            assert!(!relay.state, "{} still on", relay.id);
        }
    }

    #[tokio::test]
    async fn saved_config_restores_into_fresh_controller() {
        let f = fixture();
        f.controller
            .configure(
                "relay_2",
                &RelayPatch {
                    name: Some("Bilge pump".to_string()),
                    mode: Some(RelayMode::Timed),
                    timed_duration: Some(3600.0),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        f.controller.turn_on("relay_2").await.unwrap();

        let saved = f.controller.saved_config().await;
        let fresh = fixture();
        fresh.controller.restore(&saved).await;

        let restored = fresh.controller.get_relay("relay_2").await.unwrap();
        assert_json_diff::assert_json_include!(
            actual: serde_json::to_value(&restored).unwrap(),
            expected: serde_json::json!({
                "name": "Bilge pump",
                "mode": "timed",
                "timed_duration": 3600.0,
                "state": false
            })
        );
        f.controller.stop().await;
    }

    #[tokio::test]
    async fn configuration_changes_are_published() {
        let f = fixture();
        let mut events = f.bus.subscribe();

        f.controller
            .configure(
                "relay_0",
                &RelayPatch {
                    name: Some("Anchor light".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let event = events.recv().await.unwrap();
        assert_eq!(event.cause, ChangeCause::Configured);
        assert_eq!(event.relay.name, "Anchor light");
    }
}
