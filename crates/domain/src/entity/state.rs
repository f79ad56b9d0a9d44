//! Entity state — the last reported state of an entity.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::hvac::HvacMode;

/// Discrete reported state of an entity.
///
/// Window sensors report `on`/`off` or `open`/`closed`; climate actuators
/// report their HVAC mode, where `off` means inactive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum EntityState {
    On,
    Off,
    Open,
    Closed,
    Hvac(HvacMode),
    #[default]
    Unknown,
    Unavailable,
}

/// What a window sensor's state means for window control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WindowReading {
    Open,
    Closed,
}

/// Whether an actuator is currently running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Activity {
    Active,
    Inactive,
}

impl EntityState {
    /// Whether the state carries information (anything but unknown/unavailable).
    #[must_use]
    pub fn is_known(self) -> bool {
        !matches!(self, Self::Unknown | Self::Unavailable)
    }

    /// Interpret the state as a window sensor reading.
    ///
    /// Returns `None` for states that must not trigger any transition.
    #[must_use]
    pub fn window_reading(self) -> Option<WindowReading> {
        match self {
            Self::On | Self::Open => Some(WindowReading::Open),
            Self::Off | Self::Closed => Some(WindowReading::Closed),
            Self::Hvac(_) | Self::Unknown | Self::Unavailable => None,
        }
    }

    /// Interpret the state as an actuator's activity.
    #[must_use]
    pub fn activity(self) -> Option<Activity> {
        match self {
            Self::Off | Self::Hvac(HvacMode::Off) => Some(Activity::Inactive),
            Self::Unknown | Self::Unavailable => None,
            Self::On | Self::Open | Self::Closed | Self::Hvac(_) => Some(Activity::Active),
        }
    }

    /// The HVAC mode this state represents, if any.
    #[must_use]
    pub fn hvac_mode(self) -> Option<HvacMode> {
        match self {
            Self::Off => Some(HvacMode::Off),
            Self::Hvac(mode) => Some(mode),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::On => "on",
            Self::Off => "off",
            Self::Open => "open",
            Self::Closed => "closed",
            Self::Hvac(mode) => mode.as_str(),
            Self::Unknown => "unknown",
            Self::Unavailable => "unavailable",
        }
    }
}

impl From<HvacMode> for EntityState {
    fn from(mode: HvacMode) -> Self {
        match mode {
            HvacMode::Off => Self::Off,
            other => Self::Hvac(other),
        }
    }
}

impl fmt::Display for EntityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityState {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "on" => Ok(Self::On),
            "off" => Ok(Self::Off),
            "open" => Ok(Self::Open),
            "closed" => Ok(Self::Closed),
            "unknown" => Ok(Self::Unknown),
            "unavailable" => Ok(Self::Unavailable),
            other => other
                .parse::<HvacMode>()
                .map(Self::from)
                .map_err(|_| ValidationError::UnknownState(other.to_string())),
        }
    }
}

impl TryFrom<String> for EntityState {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<EntityState> for String {
    fn from(state: EntityState) -> Self {
        state.as_str().to_string()
    }
}
