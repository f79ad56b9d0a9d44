//! # climgroup-adapter-virtual
//!
//! Virtual home: an in-memory area/device/entity registry with simulated
//! window contacts and thermostats, for demonstration and end-to-end tests.
//!
//! ## Provided devices
//!
//! | Device | Reports | Behaviour |
//! |--------|---------|-----------|
//! | Window | `on` / `off` | Opened and closed by hand (`set_window`) |
//! | Thermostat | HVAC mode | Responds to every `climate.set_*` service; can be made unavailable, rejecting or unresponsive |
//!
//! Every state change is published on an [`InProcessEventBus`]. Changes
//! caused by a service call carry the call's context.
//!
//! ## Dependency rule
//!
//! Depends on `climgroup-app` (port traits) and `climgroup-domain` only.

mod devices;

pub use devices::{ThermostatFault, VirtualThermostat, VirtualWindow};

use std::collections::HashMap;
use std::future::Future;

use tokio::sync::broadcast;

use climgroup_app::event_bus::InProcessEventBus;
use climgroup_app::ports::{
    AreaRegistry, CommandExecutor, EventPublisher, MemberProvider, StateReader,
};
use climgroup_domain::area::Area;
use climgroup_domain::context::CallContext;
use climgroup_domain::device::Device;
use climgroup_domain::entity::{EntityRegistration, EntityState};
use climgroup_domain::error::{ClimGroupError, NotFoundError, ValidationError};
use climgroup_domain::event::StateChangeEvent;
use climgroup_domain::hvac::HvacMode;
use climgroup_domain::id::{AreaId, DeviceId, EntityId};
use climgroup_domain::service::ServiceCall;
use climgroup_domain::target::StateFragment;

/// A simulated home behind every port of the window-control core.
pub struct VirtualHome {
    areas: Vec<Area>,
    devices: HashMap<DeviceId, Device>,
    registrations: HashMap<EntityId, EntityRegistration>,
    windows: HashMap<EntityId, VirtualWindow>,
    thermostats: HashMap<EntityId, VirtualThermostat>,
    /// Thermostat ids in registration order.
    members: Vec<EntityId>,
    bus: InProcessEventBus,
}

impl VirtualHome {
    /// Create a builder for constructing a [`VirtualHome`].
    #[must_use]
    pub fn builder() -> VirtualHomeBuilder {
        VirtualHomeBuilder::default()
    }

    /// Subscribe to every state change in the home.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<StateChangeEvent> {
        self.bus.subscribe()
    }

    #[must_use]
    pub fn areas(&self) -> &[Area] {
        &self.areas
    }

    /// Window sensor ids, sorted.
    #[must_use]
    pub fn window_ids(&self) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = self.windows.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Open or close a window by hand.
    ///
    /// # Errors
    ///
    /// Returns [`ClimGroupError::NotFound`] when `entity_id` is not a window.
    pub async fn set_window(&self, entity_id: &EntityId, open: bool) -> Result<(), ClimGroupError> {
        let event = self.window(entity_id)?.set_open(open);
        tracing::debug!(window = %entity_id, open, "window changed");
        self.bus.publish(event).await
    }

    /// Make a window report an arbitrary state, e.g. `unavailable`.
    ///
    /// # Errors
    ///
    /// Returns [`ClimGroupError::NotFound`] when `entity_id` is not a window.
    pub async fn report_window(
        &self,
        entity_id: &EntityId,
        state: EntityState,
    ) -> Result<(), ClimGroupError> {
        let event = self.window(entity_id)?.report(state);
        self.bus.publish(event).await
    }

    /// Change a thermostat's mode by hand, as a user at the device would.
    ///
    /// # Errors
    ///
    /// Returns [`ClimGroupError::NotFound`] when `entity_id` is not a thermostat.
    pub async fn set_thermostat_mode(
        &self,
        entity_id: &EntityId,
        mode: HvacMode,
    ) -> Result<(), ClimGroupError> {
        let event = self.thermostat(entity_id)?.set_mode(mode);
        if event.is_transition() {
            self.bus.publish(event).await?;
        }
        Ok(())
    }

    /// Make a thermostat misbehave, or heal it with `None`.
    ///
    /// # Errors
    ///
    /// Returns [`ClimGroupError::NotFound`] when `entity_id` is not a thermostat.
    pub fn set_thermostat_fault(
        &self,
        entity_id: &EntityId,
        fault: Option<ThermostatFault>,
    ) -> Result<(), ClimGroupError> {
        self.thermostat(entity_id)?.set_fault(fault);
        tracing::debug!(thermostat = %entity_id, ?fault, "thermostat fault set");
        Ok(())
    }

    /// Attributes last applied to a thermostat.
    #[must_use]
    pub fn thermostat_attributes(&self, entity_id: &EntityId) -> Option<StateFragment> {
        self.thermostats
            .get(entity_id)
            .map(VirtualThermostat::attributes)
    }

    fn window(&self, entity_id: &EntityId) -> Result<&VirtualWindow, ClimGroupError> {
        self.windows.get(entity_id).ok_or_else(|| {
            NotFoundError {
                entity: "Window",
                id: entity_id.to_string(),
            }
            .into()
        })
    }

    fn thermostat(&self, entity_id: &EntityId) -> Result<&VirtualThermostat, ClimGroupError> {
        self.thermostats.get(entity_id).ok_or_else(|| {
            NotFoundError {
                entity: "Thermostat",
                id: entity_id.to_string(),
            }
            .into()
        })
    }
}

impl AreaRegistry for VirtualHome {
    fn entity_entry(&self, entity_id: &EntityId) -> Option<EntityRegistration> {
        self.registrations.get(entity_id).cloned()
    }

    fn device_area(&self, device_id: &DeviceId) -> Option<AreaId> {
        self.devices
            .get(device_id)
            .and_then(|device| device.area_id.clone())
    }
}

impl StateReader for VirtualHome {
    fn state(&self, entity_id: &EntityId) -> EntityState {
        if let Some(window) = self.windows.get(entity_id) {
            return window.state();
        }
        self.thermostats
            .get(entity_id)
            .map_or(EntityState::Unknown, VirtualThermostat::state)
    }
}

impl MemberProvider for VirtualHome {
    fn member_ids(&self) -> Option<Vec<EntityId>> {
        Some(self.members.clone())
    }
}

impl CommandExecutor for VirtualHome {
    fn execute(
        &self,
        call: ServiceCall,
        context: &CallContext,
    ) -> impl Future<Output = Result<(), ClimGroupError>> + Send {
        let mut events = Vec::new();
        let mut failure = None;
        for entity_id in &call.entity_ids {
            let result = self
                .thermostat(entity_id)
                .and_then(|thermostat| {
                    thermostat
                        .handle_call(&call, context)
                        .map_err(ClimGroupError::from)
                });
            match result {
                Ok(event) => events.extend(event),
                Err(err) => {
                    tracing::warn!(entity = %entity_id, service = %call.service, %err, "call failed");
                    failure.get_or_insert(err);
                }
            }
        }

        let bus = self.bus.clone();
        async move {
            for event in events {
                bus.publish(event).await?;
            }
            failure.map_or(Ok(()), Err)
        }
    }
}

/// Step-by-step builder for [`VirtualHome`].
#[derive(Default)]
pub struct VirtualHomeBuilder {
    areas: Vec<Area>,
    devices: Vec<Device>,
    windows: Vec<EntityRegistration>,
    thermostats: Vec<(EntityRegistration, HvacMode)>,
}

impl VirtualHomeBuilder {
    #[must_use]
    pub fn area(mut self, area: Area) -> Self {
        self.areas.push(area);
        self
    }

    #[must_use]
    pub fn device(mut self, device: Device) -> Self {
        self.devices.push(device);
        self
    }

    /// Add a closed window.
    #[must_use]
    pub fn window(mut self, registration: EntityRegistration) -> Self {
        self.windows.push(registration);
        self
    }

    /// Add a member thermostat running in `mode`.
    #[must_use]
    pub fn thermostat(mut self, registration: EntityRegistration, mode: HvacMode) -> Self {
        self.thermostats.push((registration, mode));
        self
    }

    /// Consume the builder, check references, and return a [`VirtualHome`]
    /// publishing on `bus`.
    ///
    /// # Errors
    ///
    /// Returns [`ClimGroupError::Validation`] when an id is registered twice,
    /// or [`ClimGroupError::NotFound`] when a registration refers to an
    /// unknown area or device.
    pub fn build(self, bus: InProcessEventBus) -> Result<VirtualHome, ClimGroupError> {
        let mut home = VirtualHome {
            areas: Vec::new(),
            devices: HashMap::new(),
            registrations: HashMap::new(),
            windows: HashMap::new(),
            thermostats: HashMap::new(),
            members: Vec::new(),
            bus,
        };

        for area in self.areas {
            area.validate()?;
            if home.areas.iter().any(|known| known.id == area.id) {
                return Err(ValidationError::DuplicateId(area.id.to_string()).into());
            }
            home.areas.push(area);
        }
        for device in self.devices {
            home.check_area(device.area_id.as_ref())?;
            if home.devices.contains_key(&device.id) {
                return Err(ValidationError::DuplicateId(device.id.to_string()).into());
            }
            home.devices.insert(device.id.clone(), device);
        }
        for registration in self.windows {
            let window = VirtualWindow::new(registration.entity_id.clone());
            home.register(registration)?;
            home.windows.insert(window.entity_id().clone(), window);
        }
        for (registration, mode) in self.thermostats {
            let thermostat = VirtualThermostat::new(registration.entity_id.clone(), mode);
            home.register(registration)?;
            home.members.push(thermostat.entity_id().clone());
            home.thermostats
                .insert(thermostat.entity_id().clone(), thermostat);
        }

        tracing::debug!(
            areas = home.areas.len(),
            windows = home.windows.len(),
            thermostats = home.thermostats.len(),
            "virtual home built"
        );
        Ok(home)
    }
}

impl VirtualHome {
    fn check_area(&self, area_id: Option<&AreaId>) -> Result<(), ClimGroupError> {
        match area_id {
            Some(area_id) if !self.areas.iter().any(|area| &area.id == area_id) => {
                Err(NotFoundError {
                    entity: "Area",
                    id: area_id.to_string(),
                }
                .into())
            }
            _ => Ok(()),
        }
    }

    fn register(&mut self, registration: EntityRegistration) -> Result<(), ClimGroupError> {
        self.check_area(registration.area_id.as_ref())?;
        if let Some(device_id) = &registration.device_id
            && !self.devices.contains_key(device_id)
        {
            return Err(NotFoundError {
                entity: "Device",
                id: device_id.to_string(),
            }
            .into());
        }
        if self.registrations.contains_key(&registration.entity_id) {
            return Err(ValidationError::DuplicateId(registration.entity_id.to_string()).into());
        }
        self.registrations
            .insert(registration.entity_id.clone(), registration);
        Ok(())
    }
}
