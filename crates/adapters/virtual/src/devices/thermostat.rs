//! Virtual thermostat — responds to the `climate.set_*` services.

use std::sync::{Mutex, MutexGuard, PoisonError};

use serde_json::Value;

use climgroup_domain::context::CallContext;
use climgroup_domain::entity::EntityState;
use climgroup_domain::error::CommandError;
use climgroup_domain::event::StateChangeEvent;
use climgroup_domain::hvac::HvacMode;
use climgroup_domain::id::EntityId;
use climgroup_domain::service::{ClimateService, ServiceCall};
use climgroup_domain::target::StateFragment;

/// Simulated misbehaviour of a thermostat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThermostatFault {
    /// Reports `unavailable` and fails every call.
    Unavailable,
    /// Stays available but fails every call.
    Rejecting,
    /// Accepts calls without changing state.
    Unresponsive,
}

struct Inner {
    mode: HvacMode,
    attributes: StateFragment,
    fault: Option<ThermostatFault>,
}

/// A simulated climate actuator.
pub struct VirtualThermostat {
    entity_id: EntityId,
    inner: Mutex<Inner>,
}

impl VirtualThermostat {
    #[must_use]
    pub fn new(entity_id: EntityId, mode: HvacMode) -> Self {
        Self {
            entity_id,
            inner: Mutex::new(Inner {
                mode,
                attributes: StateFragment::hvac(mode),
                fault: None,
            }),
        }
    }

    #[must_use]
    pub fn entity_id(&self) -> &EntityId {
        &self.entity_id
    }

    #[must_use]
    pub fn state(&self) -> EntityState {
        let inner = self.lock_inner();
        match inner.fault {
            Some(ThermostatFault::Unavailable) => EntityState::Unavailable,
            _ => EntityState::from(inner.mode),
        }
    }

    /// Attributes last applied to this thermostat.
    #[must_use]
    pub fn attributes(&self) -> StateFragment {
        self.lock_inner().attributes.clone()
    }

    pub fn set_fault(&self, fault: Option<ThermostatFault>) {
        self.lock_inner().fault = fault;
    }

    /// Change the mode by hand, as a user at the device would.
    pub fn set_mode(&self, mode: HvacMode) -> StateChangeEvent {
        let old_state = self.state();
        {
            let mut inner = self.lock_inner();
            inner.mode = mode;
            inner.attributes.hvac_mode = Some(mode);
        }
        StateChangeEvent::new(self.entity_id.clone(), old_state, self.state())
    }

    /// Apply one service call.
    ///
    /// Returns the resulting state change, tagged with `context`, when the
    /// reported state changed.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError`] when the thermostat is faulty or the call
    /// payload does not fit the service.
    pub fn handle_call(
        &self,
        call: &ServiceCall,
        context: &CallContext,
    ) -> Result<Option<StateChangeEvent>, CommandError> {
        let old_state = self.state();
        {
            let mut inner = self.lock_inner();
            match inner.fault {
                Some(ThermostatFault::Unavailable) => {
                    return Err(CommandError::Unavailable(self.entity_id.to_string()));
                }
                Some(ThermostatFault::Rejecting) => {
                    return Err(CommandError::Rejected(format!(
                        "{} refused {}",
                        self.entity_id, call.service
                    )));
                }
                Some(ThermostatFault::Unresponsive) => return Ok(None),
                None => {}
            }
            apply(&mut inner, call)?;
        }
        let new_state = self.state();
        tracing::trace!(
            entity = %self.entity_id,
            service = %call.service,
            %old_state,
            %new_state,
            "thermostat call handled"
        );
        Ok((old_state != new_state).then(|| {
            StateChangeEvent::new(self.entity_id.clone(), old_state, new_state)
                .with_context(context.clone())
        }))
    }

    fn lock_inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn apply(inner: &mut Inner, call: &ServiceCall) -> Result<(), CommandError> {
    let invalid = || CommandError::Rejected(format!("invalid payload for {}", call.service));
    let number = |key: &str| call.data.get(key).and_then(Value::as_f64);
    let text = |key: &str| call.data.get(key).and_then(Value::as_str).map(str::to_string);

    match call.service {
        ClimateService::SetHvacMode => {
            let mode = call.hvac_mode().ok_or_else(invalid)?;
            inner.mode = mode;
            inner.attributes.hvac_mode = Some(mode);
        }
        ClimateService::SetTemperature => {
            match (
                number("temperature"),
                number("target_temp_low"),
                number("target_temp_high"),
            ) {
                (Some(temperature), _, _) => inner.attributes.temperature = Some(temperature),
                (None, Some(low), Some(high)) => {
                    inner.attributes.target_temp_low = Some(low);
                    inner.attributes.target_temp_high = Some(high);
                }
                _ => return Err(invalid()),
            }
        }
        ClimateService::SetHumidity => {
            inner.attributes.humidity = Some(number("humidity").ok_or_else(invalid)?);
        }
        ClimateService::SetFanMode => {
            inner.attributes.fan_mode = Some(text("fan_mode").ok_or_else(invalid)?);
        }
        ClimateService::SetPresetMode => {
            inner.attributes.preset_mode = Some(text("preset_mode").ok_or_else(invalid)?);
        }
        ClimateService::SetSwingMode => {
            inner.attributes.swing_mode = Some(text("swing_mode").ok_or_else(invalid)?);
        }
        ClimateService::SetSwingHorizontalMode => {
            inner.attributes.swing_horizontal_mode =
                Some(text("swing_horizontal_mode").ok_or_else(invalid)?);
        }
    }
    Ok(())
}
