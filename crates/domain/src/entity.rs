//! Entity — a single observable/controllable aspect of a device.
//!
//! The core never owns entity data. It sees entities through two lenses:
//! their registry record ([`EntityRegistration`], for area lookup) and their
//! last reported [`EntityState`].

mod state;

pub use state::{Activity, EntityState, WindowReading};

use serde::{Deserialize, Serialize};

use crate::id::{AreaId, DeviceId, EntityId};

/// Registry record of an entity: its direct area and owning device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRegistration {
    pub entity_id: EntityId,
    pub device_id: Option<DeviceId>,
    pub area_id: Option<AreaId>,
}

impl EntityRegistration {
    /// A registration with neither area nor device.
    #[must_use]
    pub fn orphan(entity_id: EntityId) -> Self {
        Self {
            entity_id,
            device_id: None,
            area_id: None,
        }
    }

    #[must_use]
    pub fn with_area(mut self, area_id: AreaId) -> Self {
        self.area_id = Some(area_id);
        self
    }

    #[must_use]
    pub fn with_device(mut self, device_id: DeviceId) -> Self {
        self.device_id = Some(device_id);
        self
    }
}
