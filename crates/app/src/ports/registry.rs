//! Area registry port — where entities and devices are located.

use std::sync::Arc;

use climgroup_domain::entity::EntityRegistration;
use climgroup_domain::id::{AreaId, DeviceId, EntityId};

/// Read-only view of the entity and device registries.
pub trait AreaRegistry {
    /// Registry record of an entity, or `None` when it is not registered.
    fn entity_entry(&self, entity_id: &EntityId) -> Option<EntityRegistration>;

    /// Area a device is assigned to, if any.
    fn device_area(&self, device_id: &DeviceId) -> Option<AreaId>;
}

impl<T: AreaRegistry + ?Sized> AreaRegistry for Arc<T> {
    fn entity_entry(&self, entity_id: &EntityId) -> Option<EntityRegistration> {
        (**self).entity_entry(entity_id)
    }

    fn device_area(&self, device_id: &DeviceId) -> Option<AreaId> {
        (**self).device_area(device_id)
    }
}
