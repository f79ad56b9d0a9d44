//! Event — an immutable record of an entity state change.
//!
//! Changes caused by our own commands carry the [`CallContext`] they were
//! issued with; externally caused changes carry none.

use serde::{Deserialize, Serialize};

use crate::context::{CallContext, CallOrigin};
use crate::entity::EntityState;
use crate::id::EntityId;
use crate::time::{Timestamp, now};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateChangeEvent {
    pub entity_id: EntityId,
    pub old_state: EntityState,
    pub new_state: EntityState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<CallContext>,
    pub timestamp: Timestamp,
}

impl StateChangeEvent {
    /// An externally caused change, stamped with the current time.
    #[must_use]
    pub fn new(entity_id: EntityId, old_state: EntityState, new_state: EntityState) -> Self {
        Self {
            entity_id,
            old_state,
            new_state,
            context: None,
            timestamp: now(),
        }
    }

    #[must_use]
    pub fn with_context(mut self, context: CallContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Whether this change was caused by a command issued under `origin`.
    #[must_use]
    pub fn is_echo_of(&self, origin: CallOrigin) -> bool {
        self.context.as_ref().is_some_and(|ctx| ctx.origin == origin)
    }

    /// Whether the state actually changed.
    #[must_use]
    pub fn is_transition(&self) -> bool {
        self.old_state != self.new_state
    }
}
