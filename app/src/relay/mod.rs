//! Relay bank with normal, flashing and timed outputs.
//!
//! Each relay owns a single slot holding its state and at most one running
//! activity (flash loop or off-timer). Every output change goes through
//! [`controller::RelayHandle::output`], which is the only caller of the
//! board's `set_relay`.

mod activity;
mod controller;

use std::ops::RangeInclusive;
use std::time::Duration;

use serde::{Deserialize, Serialize, Serializer};

use crate::device::AdapterError;

pub use controller::RelayController;

pub const FLASH_INTERVAL_SECS: RangeInclusive<f64> = 0.1..=60.0;
pub const TIMED_DURATION_SECS: RangeInclusive<f64> = 1.0..=86_400.0;

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("relay {0} not found")]
    NotFound(String),
    #[error("relay {0} is disabled")]
    Disabled(String),
    #[error("invalid relay parameter: {0}")]
    InvalidParameter(String),
    #[error("setting output of relay {relay} failed")]
    Hardware {
        relay: String,
        #[source]
        source: AdapterError,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, derive_more::Display)]
#[serde(rename_all = "lowercase")]
pub enum RelayMode {
    #[display("normal")]
    Normal,
    #[display("flash")]
    Flash,
    #[display("timed")]
    Timed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelayState {
    pub id: String,
    pub board: String,
    pub channel: u8,
    pub name: String,
    pub enabled: bool,
    pub mode: RelayMode,
    #[serde(serialize_with = "as_secs")]
    pub flash_interval: Duration,
    #[serde(serialize_with = "as_secs")]
    pub timed_duration: Duration,
    pub state: bool,
}

fn as_secs<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(value.as_secs_f64())
}

/// Partial relay configuration. Also the persisted form of a relay's
/// configuration, with every field set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RelayPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<RelayMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flash_interval: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timed_duration: Option<f64>,
}

impl RelayPatch {
    fn validate(&self) -> Result<ValidPatch, RelayError> {
        if let Some(name) = &self.name {
            if name.trim().is_empty() {
                return Err(RelayError::InvalidParameter("name must not be empty".to_string()));
            }
        }

        Ok(ValidPatch {
            name: self.name.clone(),
            enabled: self.enabled,
            mode: self.mode,
            flash_interval: self
                .flash_interval
                .map(|s| seconds_in("flash_interval", s, &FLASH_INTERVAL_SECS))
                .transpose()?,
            timed_duration: self
                .timed_duration
                .map(|s| seconds_in("timed_duration", s, &TIMED_DURATION_SECS))
                .transpose()?,
        })
    }
}

impl From<&RelayState> for RelayPatch {
    fn from(state: &RelayState) -> Self {
        Self {
            name: Some(state.name.clone()),
            enabled: Some(state.enabled),
            mode: Some(state.mode),
            flash_interval: Some(state.flash_interval.as_secs_f64()),
            timed_duration: Some(state.timed_duration.as_secs_f64()),
        }
    }
}

fn seconds_in(field: &str, secs: f64, range: &RangeInclusive<f64>) -> Result<Duration, RelayError> {
    if !secs.is_finite() || !range.contains(&secs) {
        return Err(RelayError::InvalidParameter(format!(
            "{} must be between {} and {} seconds, got {}",
            field,
            range.start(),
            range.end(),
            secs
        )));
    }

    Ok(Duration::from_secs_f64(secs))
}

#[derive(Debug, Clone)]
struct ValidPatch {
    name: Option<String>,
    enabled: Option<bool>,
    mode: Option<RelayMode>,
    flash_interval: Option<Duration>,
    timed_duration: Option<Duration>,
}

impl ValidPatch {
    //configuration fields only, the output is never touched here
    fn apply_to(self, state: &mut RelayState) {
        if let Some(name) = self.name {
            state.name = name;
        }
        if let Some(enabled) = self.enabled {
            state.enabled = enabled;
        }
        if let Some(mode) = self.mode {
            state.mode = mode;
        }
        if let Some(interval) = self.flash_interval {
            state.flash_interval = interval;
        }
        if let Some(duration) = self.timed_duration {
            state.timed_duration = duration;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeCause {
    Command,
    Flash,
    TimerExpired,
    Configured,
    Shutdown,
}

/// Published on every output or configuration change.
#[derive(Debug, Clone, Serialize)]
pub struct RelayEvent {
    pub relay: RelayState,
    pub cause: ChangeCause,
}
