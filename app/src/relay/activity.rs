use std::time::Duration;

use super::ChangeCause;
use super::controller::RelayHandle;
use crate::core::background::BackgroundTask;
use crate::device::Board;

//switch-off retries of an expired timer
const RETRY_MIN: Duration = Duration::from_secs(1);
const RETRY_MAX: Duration = Duration::from_secs(30);

/// Background behavior attached to one relay. Only stopped while the relay
/// slot is locked, so a stopped activity cannot act afterwards.
pub(super) type Activity = BackgroundTask;

pub(super) fn flash<B: Board + 'static>(relay: RelayHandle<B>, interval: Duration) -> Activity {
    BackgroundTask::spawn(move |token| async move {
        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => return,
                _ = tokio::time::sleep(interval) => {}
            }

            let mut slot = tokio::select! {
                biased;
                _ = token.cancelled() => return,
                slot = relay.slot.lock() => slot,
            };
            if token.is_cancelled() {
                return;
            }

            let next = !slot.state.state;
            if let Err(e) = relay.output(&mut slot.state, next, ChangeCause::Flash).await {
                tracing::warn!(relay = %relay.id, "Flash toggle failed: {:?}", e);
            }
        }
    })
}

pub(super) fn timer<B: Board + 'static>(relay: RelayHandle<B>, duration: Duration) -> Activity {
    BackgroundTask::spawn(move |token| async move {
        let mut pause = duration;
        let mut retry = RETRY_MIN;

        //stays attached to the slot until the switch-off reached the hardware
        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => return,
                _ = tokio::time::sleep(pause) => {}
            }

            let mut slot = tokio::select! {
                biased;
                _ = token.cancelled() => return,
                slot = relay.slot.lock() => slot,
            };
            if token.is_cancelled() {
                return;
            }

            match relay.output(&mut slot.state, false, ChangeCause::TimerExpired).await {
                Ok(()) => {
                    tracing::info!(relay = %relay.id, "Timed relay switched off after {:?}", duration);
                    slot.activity = None;
                    return;
                }
                Err(e) => {
                    pause = retry;
                    retry = (retry * 2).min(RETRY_MAX);
                    tracing::error!(relay = %relay.id, "Timed switch-off failed, retrying in {:?}: {:?}", pause, e);
                }
            }
        }
    })
}
