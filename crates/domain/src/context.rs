//! Call context — provenance attached to every dispatched command.
//!
//! State changes caused by our own commands carry the [`CallContext`] they
//! were issued with, so observers can tell them apart from changes made by a
//! user or another system and avoid feedback loops.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::id::{ContextId, EntityId};
use crate::time::Timestamp;

/// Which part of the group issued a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallOrigin {
    /// Direct user commands on the group.
    Group,
    /// Member synchronisation (lock/mirror).
    SyncMode,
    /// Area-based window control.
    WindowControl,
    /// Schedule-driven target changes.
    Schedule,
}

impl CallOrigin {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Group => "group",
            Self::SyncMode => "sync_mode",
            Self::WindowControl => "window_control",
            Self::Schedule => "schedule",
        }
    }
}

impl fmt::Display for CallOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provenance tag of one dispatched command batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallContext {
    pub id: ContextId,
    pub origin: CallOrigin,
    /// `"<unix timestamp>|<entity>"`: when the batch was issued and which
    /// entity last shaped the state being applied.
    pub parent_id: String,
}

impl CallContext {
    #[must_use]
    pub fn new(origin: CallOrigin, issued_at: Timestamp, entity: Option<&EntityId>) -> Self {
        let micros = issued_at.timestamp_micros();
        let entity = entity.map(EntityId::as_str).unwrap_or_default();
        Self {
            id: ContextId::new(),
            origin,
            parent_id: format!("{}.{:06}|{entity}", micros / 1_000_000, micros % 1_000_000),
        }
    }
}
