//! Area resolver — which area an entity belongs to.

use climgroup_domain::id::{AreaId, EntityId};

use crate::ports::AreaRegistry;

/// Maps entities to areas through the registry.
///
/// An entity's own area assignment wins; otherwise the area of its owning
/// device is used. Entities with neither resolve to `None`, which callers
/// treat as "not under area-based control".
pub struct AreaResolver<R> {
    registry: R,
}

impl<R: AreaRegistry> AreaResolver<R> {
    /// Create a new resolver backed by the given registry.
    pub fn new(registry: R) -> Self {
        Self { registry }
    }

    /// Area of `entity_id`, with device-level fallback.
    pub fn resolve(&self, entity_id: &EntityId) -> Option<AreaId> {
        let Some(entry) = self.registry.entity_entry(entity_id) else {
            tracing::trace!(entity = %entity_id, "entity not registered");
            return None;
        };
        if let Some(area_id) = entry.area_id {
            tracing::trace!(entity = %entity_id, area = %area_id, "entity area");
            return Some(area_id);
        }
        let device_id = entry.device_id?;
        let area_id = self.registry.device_area(&device_id);
        tracing::trace!(
            entity = %entity_id,
            device = %device_id,
            area = ?area_id,
            "device area fallback"
        );
        area_id
    }

    /// The `candidates` that resolve to `area_id`, in their original order.
    pub fn entities_in_area<'a>(
        &self,
        candidates: impl IntoIterator<Item = &'a EntityId>,
        area_id: &AreaId,
    ) -> Vec<EntityId> {
        candidates
            .into_iter()
            .filter(|entity_id| self.resolve(entity_id).as_ref() == Some(area_id))
            .cloned()
            .collect()
    }
}
