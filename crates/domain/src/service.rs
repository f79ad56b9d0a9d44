//! Service — a command addressed to one or more climate actuators.
//!
//! Examples: `climate.set_hvac_mode`, `climate.set_temperature`.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::hvac::HvacMode;
use crate::id::EntityId;
use crate::target::StateFragment;

/// The climate services a [`StateFragment`] maps onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClimateService {
    SetHvacMode,
    SetTemperature,
    SetHumidity,
    SetFanMode,
    SetPresetMode,
    SetSwingMode,
    SetSwingHorizontalMode,
}

impl ClimateService {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SetHvacMode => "set_hvac_mode",
            Self::SetTemperature => "set_temperature",
            Self::SetHumidity => "set_humidity",
            Self::SetFanMode => "set_fan_mode",
            Self::SetPresetMode => "set_preset_mode",
            Self::SetSwingMode => "set_swing_mode",
            Self::SetSwingHorizontalMode => "set_swing_horizontal_mode",
        }
    }
}

impl fmt::Display for ClimateService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "climate.{}", self.as_str())
    }
}

/// One service invocation against a set of entities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceCall {
    pub service: ClimateService,
    pub entity_ids: Vec<EntityId>,
    /// Service payload, e.g. `{"temperature": 21.0}`.
    pub data: Value,
}

impl ServiceCall {
    #[must_use]
    pub fn new(service: ClimateService, entity_ids: Vec<EntityId>, data: Value) -> Self {
        Self {
            service,
            entity_ids,
            data,
        }
    }

    /// The HVAC mode requested by a `set_hvac_mode` call.
    #[must_use]
    pub fn hvac_mode(&self) -> Option<HvacMode> {
        if self.service != ClimateService::SetHvacMode {
            return None;
        }
        self.data
            .get("hvac_mode")
            .and_then(Value::as_str)
            .and_then(|raw| raw.parse().ok())
    }

    /// Translate a fragment into the calls that apply it to `entity_ids`.
    ///
    /// Calls come out in a fixed order with the HVAC mode first. A
    /// temperature range is sent as a single `set_temperature` call, and only
    /// when both bounds are set. When the fragment switches the actuators
    /// off, every other attribute is dropped: a setpoint change would wake
    /// the device back up.
    #[must_use]
    pub fn from_fragment(fragment: &StateFragment, entity_ids: &[EntityId]) -> Vec<ServiceCall> {
        Self::from_fragment_with_min_temp(fragment, entity_ids, None)
    }

    /// Like [`ServiceCall::from_fragment`], except that switching off also
    /// sets the temperature to `min_temp` when one is given. That setpoint
    /// is the only one sent alongside an `off`.
    #[must_use]
    pub fn from_fragment_with_min_temp(
        fragment: &StateFragment,
        entity_ids: &[EntityId],
        min_temp: Option<f64>,
    ) -> Vec<ServiceCall> {
        if entity_ids.is_empty() {
            return Vec::new();
        }
        let call = |service, data| ServiceCall::new(service, entity_ids.to_vec(), data);

        let mut calls = Vec::new();
        if let Some(mode) = fragment.hvac_mode {
            calls.push(call(ClimateService::SetHvacMode, json!({"hvac_mode": mode})));
            if mode == HvacMode::Off {
                if let Some(min_temp) = min_temp {
                    calls.push(call(
                        ClimateService::SetTemperature,
                        json!({"temperature": min_temp}),
                    ));
                }
                return calls;
            }
        }
        if let Some(temperature) = fragment.temperature {
            calls.push(call(
                ClimateService::SetTemperature,
                json!({"temperature": temperature}),
            ));
        }
        if let (Some(low), Some(high)) = (fragment.target_temp_low, fragment.target_temp_high) {
            calls.push(call(
                ClimateService::SetTemperature,
                json!({"target_temp_low": low, "target_temp_high": high}),
            ));
        }
        if let Some(humidity) = fragment.humidity {
            calls.push(call(ClimateService::SetHumidity, json!({"humidity": humidity})));
        }

        let modes = [
            (ClimateService::SetFanMode, "fan_mode", &fragment.fan_mode),
            (ClimateService::SetPresetMode, "preset_mode", &fragment.preset_mode),
            (ClimateService::SetSwingMode, "swing_mode", &fragment.swing_mode),
            (
                ClimateService::SetSwingHorizontalMode,
                "swing_horizontal_mode",
                &fragment.swing_horizontal_mode,
            ),
        ];
        for (service, key, value) in modes {
            if let Some(value) = value {
                let mut data = Map::new();
                data.insert(key.to_string(), Value::String(value.clone()));
                calls.push(call(service, Value::Object(data)));
            }
        }
        calls
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(raw: &[&str]) -> Vec<EntityId> {
        raw.iter().map(|id| EntityId::new(*id).unwrap()).collect()
    }

    #[test]
    fn should_generate_single_hvac_call_for_turn_off() {
        let targets = ids(&["climate.thermo_living"]);
        let calls = ServiceCall::from_fragment(&StateFragment::turn_off(), &targets);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].service, ClimateService::SetHvacMode);
        assert_eq!(calls[0].entity_ids, targets);
        assert_eq!(calls[0].hvac_mode(), Some(HvacMode::Off));
    }

    #[test]
    fn should_skip_setpoints_when_turning_off() {
        let fragment = StateFragment::turn_off().with_temperature(21.0);
        let calls = ServiceCall::from_fragment(&fragment, &ids(&["climate.a"]));
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].service, ClimateService::SetHvacMode);
    }

    #[test]
    fn should_add_min_temp_to_turn_off_only() {
        let fragment = StateFragment::turn_off().with_temperature(21.0);
        let calls =
            ServiceCall::from_fragment_with_min_temp(&fragment, &ids(&["climate.a"]), Some(7.0));
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].hvac_mode(), Some(HvacMode::Off));
        assert_eq!(calls[1].service, ClimateService::SetTemperature);
        assert_eq!(calls[1].data, json!({"temperature": 7.0}));

        let heating = StateFragment::hvac(HvacMode::Heat).with_temperature(21.0);
        let calls =
            ServiceCall::from_fragment_with_min_temp(&heating, &ids(&["climate.a"]), Some(7.0));
        assert_eq!(calls[1].data, json!({"temperature": 21.0}));
    }

    #[test]
    fn should_put_hvac_mode_first() {
        let fragment = StateFragment {
            fan_mode: Some("low".to_string()),
            ..StateFragment::hvac(HvacMode::Heat).with_temperature(21.5)
        };
        let calls = ServiceCall::from_fragment(&fragment, &ids(&["climate.a"]));
        let services: Vec<_> = calls.iter().map(|c| c.service).collect();
        assert_eq!(
            services,
            vec![
                ClimateService::SetHvacMode,
                ClimateService::SetTemperature,
                ClimateService::SetFanMode,
            ]
        );
        assert_eq!(calls[1].data, json!({"temperature": 21.5}));
        assert_eq!(calls[2].data, json!({"fan_mode": "low"}));
    }

    #[test]
    fn should_send_temperature_range_in_one_call() {
        let fragment = StateFragment {
            target_temp_low: Some(19.0),
            target_temp_high: Some(24.0),
            ..StateFragment::default()
        };
        let calls = ServiceCall::from_fragment(&fragment, &ids(&["climate.a"]));
        assert_eq!(calls.len(), 1);
        assert_eq!(
            calls[0].data,
            json!({"target_temp_low": 19.0, "target_temp_high": 24.0})
        );
    }

    #[test]
    fn should_drop_half_temperature_range() {
        let fragment = StateFragment {
            target_temp_low: Some(19.0),
            ..StateFragment::default()
        };
        assert!(ServiceCall::from_fragment(&fragment, &ids(&["climate.a"])).is_empty());
    }

    #[test]
    fn should_generate_nothing_without_targets() {
        let calls = ServiceCall::from_fragment(&StateFragment::hvac(HvacMode::Heat), &[]);
        assert!(calls.is_empty());
    }

    #[test]
    fn should_not_report_hvac_mode_for_other_services() {
        let call = ServiceCall::new(
            ClimateService::SetTemperature,
            ids(&["climate.a"]),
            json!({"hvac_mode": "heat"}),
        );
        assert_eq!(call.hvac_mode(), None);
    }

    #[test]
    fn should_display_with_climate_domain() {
        assert_eq!(
            ClimateService::SetHvacMode.to_string(),
            "climate.set_hvac_mode"
        );
    }
}
