//! Device — a physical or virtual thing that exposes one or more entities.
//!
//! Devices matter here only as the fallback carrier of an area assignment:
//! an entity without its own area inherits the area of its device.

use serde::{Deserialize, Serialize};

use crate::error::{ClimGroupError, ValidationError};
use crate::id::{AreaId, DeviceId};

/// A registered device and its (optional) area assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub id: DeviceId,
    pub name: String,
    pub area_id: Option<AreaId>,
}

impl Device {
    /// Create a device with no area assignment.
    ///
    /// # Errors
    ///
    /// Returns [`ClimGroupError::Validation`] when `name` is empty.
    pub fn new(id: DeviceId, name: impl Into<String>) -> Result<Self, ClimGroupError> {
        let name = name.into();
        if name.is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        Ok(Self {
            id,
            name,
            area_id: None,
        })
    }

    /// Assign the device to an area.
    #[must_use]
    pub fn in_area(mut self, area_id: AreaId) -> Self {
        self.area_id = Some(area_id);
        self
    }
}
