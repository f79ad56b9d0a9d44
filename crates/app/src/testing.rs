//! In-memory fakes for the ports, shared by the unit tests of this crate.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use climgroup_domain::context::CallContext;
use climgroup_domain::entity::{EntityRegistration, EntityState};
use climgroup_domain::error::{ClimGroupError, CommandError};
use climgroup_domain::id::{AreaId, DeviceId, EntityId};
use climgroup_domain::service::ServiceCall;
use climgroup_domain::target::TargetState;

use crate::ports::{
    AreaRegistry, CommandExecutor, MemberProvider, StateReader, TargetStateProvider,
};

pub(crate) fn id(raw: &str) -> EntityId {
    EntityId::new(raw).unwrap()
}

pub(crate) fn area(raw: &str) -> AreaId {
    AreaId::new(raw).unwrap()
}

/// A whole home behind every port: registry, states, group and executor.
///
/// Executed `set_hvac_mode` calls are applied to the addressed entities,
/// except for entities marked as ignoring commands. With a settle delay
/// the mode only lands once that delay has passed.
#[derive(Default)]
pub(crate) struct FakeHome {
    registrations: Mutex<HashMap<EntityId, EntityRegistration>>,
    device_areas: Mutex<HashMap<DeviceId, AreaId>>,
    states: Arc<Mutex<HashMap<EntityId, EntityState>>>,
    settle_delay: Mutex<Option<Duration>>,
    members: Mutex<Option<Vec<EntityId>>>,
    target: Mutex<TargetState>,
    calls: Mutex<Vec<(ServiceCall, CallContext)>>,
    ignoring: Mutex<HashSet<EntityId>>,
    failures: Mutex<u32>,
}

impl FakeHome {
    pub(crate) fn register(&self, registration: EntityRegistration) {
        self.registrations
            .lock()
            .unwrap()
            .insert(registration.entity_id.clone(), registration);
    }

    pub(crate) fn place_device(&self, device: &str, area_id: &str) {
        self.device_areas
            .lock()
            .unwrap()
            .insert(DeviceId::new(device).unwrap(), area(area_id));
    }

    /// Register a window sensor in `area_id` (or nowhere) reading `state`.
    pub(crate) fn window(&self, entity: &str, area_id: Option<&str>, state: EntityState) {
        let mut registration = EntityRegistration::orphan(id(entity));
        if let Some(area_id) = area_id {
            registration = registration.with_area(area(area_id));
        }
        self.register(registration);
        self.set_state(entity, state);
    }

    /// Register a member thermostat in `area_id` (or nowhere) reading `state`.
    pub(crate) fn thermostat(&self, entity: &str, area_id: Option<&str>, state: EntityState) {
        self.window(entity, area_id, state);
        self.members
            .lock()
            .unwrap()
            .get_or_insert_with(Vec::new)
            .push(id(entity));
    }

    pub(crate) fn set_state(&self, entity: &str, state: EntityState) {
        self.states.lock().unwrap().insert(id(entity), state);
    }

    pub(crate) fn set_target(&self, target: TargetState) {
        *self.target.lock().unwrap() = target;
    }

    pub(crate) fn clear_members(&self) {
        *self.members.lock().unwrap() = None;
    }

    pub(crate) fn ignore_commands(&self, entity: &str) {
        self.ignoring.lock().unwrap().insert(id(entity));
    }

    pub(crate) fn settle_after(&self, delay: Duration) {
        *self.settle_delay.lock().unwrap() = Some(delay);
    }

    pub(crate) fn fail_next(&self, count: u32) {
        *self.failures.lock().unwrap() = count;
    }

    pub(crate) fn calls(&self) -> Vec<(ServiceCall, CallContext)> {
        self.calls.lock().unwrap().clone()
    }
}

impl AreaRegistry for FakeHome {
    fn entity_entry(&self, entity_id: &EntityId) -> Option<EntityRegistration> {
        self.registrations.lock().unwrap().get(entity_id).cloned()
    }

    fn device_area(&self, device_id: &DeviceId) -> Option<AreaId> {
        self.device_areas.lock().unwrap().get(device_id).cloned()
    }
}

impl StateReader for FakeHome {
    fn state(&self, entity_id: &EntityId) -> EntityState {
        self.states
            .lock()
            .unwrap()
            .get(entity_id)
            .copied()
            .unwrap_or_default()
    }
}

impl MemberProvider for FakeHome {
    fn member_ids(&self) -> Option<Vec<EntityId>> {
        self.members.lock().unwrap().clone()
    }
}

impl TargetStateProvider for FakeHome {
    fn target_state(&self) -> TargetState {
        self.target.lock().unwrap().clone()
    }
}

impl CommandExecutor for FakeHome {
    fn execute(
        &self,
        call: ServiceCall,
        context: &CallContext,
    ) -> impl Future<Output = Result<(), ClimGroupError>> + Send {
        self.calls.lock().unwrap().push((call.clone(), context.clone()));

        let result: Result<(), ClimGroupError> = {
            let mut failures = self.failures.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                Err(CommandError::Rejected(call.service.to_string()).into())
            } else {
                if let Some(mode) = call.hvac_mode() {
                    let applied: Vec<EntityId> = {
                        let ignoring = self.ignoring.lock().unwrap();
                        call.entity_ids
                            .iter()
                            .filter(|e| !ignoring.contains(*e))
                            .cloned()
                            .collect()
                    };
                    let states = Arc::clone(&self.states);
                    let apply = move || {
                        let mut states = states.lock().unwrap();
                        for entity_id in applied {
                            states.insert(entity_id, EntityState::from(mode));
                        }
                    };
                    match *self.settle_delay.lock().unwrap() {
                        Some(delay) => {
                            tokio::spawn(async move {
                                tokio::time::sleep(delay).await;
                                apply();
                            });
                        }
                        None => apply(),
                    }
                }
                Ok(())
            }
        };
        async { result }
    }
}
