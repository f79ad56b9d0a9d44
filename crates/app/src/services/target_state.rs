//! Shared target state — the group's desired state, readable by every
//! component and writable by the callers that own it.

use std::sync::{Arc, PoisonError, RwLock};

use climgroup_domain::context::CallOrigin;
use climgroup_domain::id::EntityId;
use climgroup_domain::target::{Provenance, StateFragment, TargetState};
use climgroup_domain::time::now;

use crate::ports::TargetStateProvider;

/// Cloneable handle to the group's [`TargetState`].
#[derive(Debug, Clone, Default)]
pub struct SharedTargetState {
    inner: Arc<RwLock<TargetState>>,
}

impl SharedTargetState {
    #[must_use]
    pub fn new(initial: TargetState) -> Self {
        Self {
            inner: Arc::new(RwLock::new(initial)),
        }
    }

    /// Merge the attributes set in `fragment` and stamp provenance.
    ///
    /// Window control only suspends the target and never rewrites it, so
    /// updates from [`CallOrigin::WindowControl`] are refused. Returns
    /// whether the update was applied.
    pub fn update(
        &self,
        origin: CallOrigin,
        entity_id: Option<EntityId>,
        fragment: &StateFragment,
    ) -> bool {
        if origin == CallOrigin::WindowControl {
            tracing::debug!(%origin, "target update refused");
            return false;
        }
        let mut target = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        target.attributes.merge(fragment);
        target.provenance = Some(Provenance {
            source: origin,
            entity_id,
            timestamp: now(),
        });
        tracing::debug!(%origin, target = ?target.attributes, "target updated");
        true
    }

    #[must_use]
    pub fn snapshot(&self) -> TargetState {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl TargetStateProvider for SharedTargetState {
    fn target_state(&self) -> TargetState {
        self.snapshot()
    }
}
