//! Target state — what the group intends its actuators to hold.
//!
//! A [`StateFragment`] is a partial set of climate attributes, used both as
//! command payload and as the body of the group's [`TargetState`].

use serde::{Deserialize, Serialize};

use crate::context::CallOrigin;
use crate::hvac::HvacMode;
use crate::id::EntityId;
use crate::time::Timestamp;

/// A partial set of climate attributes. Unset attributes are left untouched.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StateFragment {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hvac_mode: Option<HvacMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_temp_low: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_temp_high: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub humidity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preset_mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fan_mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub swing_mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub swing_horizontal_mode: Option<String>,
}

impl StateFragment {
    /// The fragment that switches actuators off.
    #[must_use]
    pub fn turn_off() -> Self {
        Self::hvac(HvacMode::Off)
    }

    /// A fragment that only sets the HVAC mode.
    #[must_use]
    pub fn hvac(mode: HvacMode) -> Self {
        Self {
            hvac_mode: Some(mode),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Whether no attribute is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Overlay every attribute set in `other` onto `self`.
    pub fn merge(&mut self, other: &StateFragment) {
        fn overlay<T: Clone>(dst: &mut Option<T>, src: Option<&T>) {
            if let Some(value) = src {
                *dst = Some(value.clone());
            }
        }
        overlay(&mut self.hvac_mode, other.hvac_mode.as_ref());
        overlay(&mut self.temperature, other.temperature.as_ref());
        overlay(&mut self.target_temp_low, other.target_temp_low.as_ref());
        overlay(&mut self.target_temp_high, other.target_temp_high.as_ref());
        overlay(&mut self.humidity, other.humidity.as_ref());
        overlay(&mut self.preset_mode, other.preset_mode.as_ref());
        overlay(&mut self.fan_mode, other.fan_mode.as_ref());
        overlay(&mut self.swing_mode, other.swing_mode.as_ref());
        overlay(
            &mut self.swing_horizontal_mode,
            other.swing_horizontal_mode.as_ref(),
        );
    }
}

/// Who last changed the target state, and when.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    pub source: CallOrigin,
    pub entity_id: Option<EntityId>,
    pub timestamp: Timestamp,
}

/// The group's intended state, independent of temporary deviations such as
/// an open window.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TargetState {
    #[serde(flatten)]
    pub attributes: StateFragment,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provenance: Option<Provenance>,
}

impl TargetState {
    #[must_use]
    pub fn new(attributes: StateFragment) -> Self {
        Self {
            attributes,
            provenance: None,
        }
    }

    /// Whether the intended state is itself "off".
    #[must_use]
    pub fn is_off(&self) -> bool {
        self.attributes.hvac_mode == Some(HvacMode::Off)
    }

    /// Whether there is nothing to restore.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// The entity that last shaped this target, if recorded.
    #[must_use]
    pub fn last_entity(&self) -> Option<&EntityId> {
        self.provenance.as_ref().and_then(|p| p.entity_id.as_ref())
    }
}
