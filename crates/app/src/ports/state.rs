//! State reader port — last reported state of any entity.

use std::sync::Arc;

use climgroup_domain::entity::EntityState;
use climgroup_domain::id::EntityId;

pub trait StateReader {
    /// Last reported state of `entity_id`.
    ///
    /// Entities that are unknown to the home report [`EntityState::Unknown`].
    fn state(&self, entity_id: &EntityId) -> EntityState;
}

impl<T: StateReader + ?Sized> StateReader for Arc<T> {
    fn state(&self, entity_id: &EntityId) -> EntityState {
        (**self).state(entity_id)
    }
}
