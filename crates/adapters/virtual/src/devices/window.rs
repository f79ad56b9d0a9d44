//! Virtual window — a contact sensor reporting `on` (open) or `off` (closed).

use std::sync::{Mutex, MutexGuard, PoisonError};

use climgroup_domain::entity::EntityState;
use climgroup_domain::event::StateChangeEvent;
use climgroup_domain::id::EntityId;

/// A simulated window contact.
pub struct VirtualWindow {
    entity_id: EntityId,
    state: Mutex<EntityState>,
}

impl VirtualWindow {
    /// A closed window.
    #[must_use]
    pub fn new(entity_id: EntityId) -> Self {
        Self {
            entity_id,
            state: Mutex::new(EntityState::Off),
        }
    }

    #[must_use]
    pub fn entity_id(&self) -> &EntityId {
        &self.entity_id
    }

    #[must_use]
    pub fn state(&self) -> EntityState {
        *self.lock_state()
    }

    /// Report `new_state`, returning the change it causes.
    pub fn report(&self, new_state: EntityState) -> StateChangeEvent {
        let old_state = std::mem::replace(&mut *self.lock_state(), new_state);
        StateChangeEvent::new(self.entity_id.clone(), old_state, new_state)
    }

    /// Open (`true`) or close (`false`) the window.
    pub fn set_open(&self, open: bool) -> StateChangeEvent {
        self.report(if open { EntityState::On } else { EntityState::Off })
    }

    fn lock_state(&self) -> MutexGuard<'_, EntityState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
