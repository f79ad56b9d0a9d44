//! Area — a logical grouping (room, floor, zone) for devices and entities.

use serde::{Deserialize, Serialize};

use crate::error::{ClimGroupError, ValidationError};
use crate::id::AreaId;

/// A logical grouping such as a room, floor, or zone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Area {
    pub id: AreaId,
    pub name: String,
}

impl Area {
    /// Create a builder for constructing an [`Area`].
    #[must_use]
    pub fn builder() -> AreaBuilder {
        AreaBuilder::default()
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`ClimGroupError::Validation`] when `name` is empty.
    pub fn validate(&self) -> Result<(), ClimGroupError> {
        if self.name.is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        Ok(())
    }
}

/// Step-by-step builder for [`Area`].
#[derive(Debug, Default)]
pub struct AreaBuilder {
    id: Option<AreaId>,
    name: Option<String>,
}

impl AreaBuilder {
    #[must_use]
    pub fn id(mut self, id: AreaId) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Consume the builder, validate, and return an [`Area`].
    ///
    /// The name defaults to the identifier when not given.
    ///
    /// # Errors
    ///
    /// Returns [`ClimGroupError::Validation`] if the id is missing or the
    /// resulting name is empty.
    pub fn build(self) -> Result<Area, ClimGroupError> {
        let id = self.id.ok_or(ValidationError::EmptyId)?;
        let name = self.name.unwrap_or_else(|| id.to_string());
        let area = Area { id, name };
        area.validate()?;
        Ok(area)
    }
}
