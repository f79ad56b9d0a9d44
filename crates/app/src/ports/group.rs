//! Group ports — what the owning climate group exposes to window control.

use std::sync::Arc;

use climgroup_domain::id::EntityId;
use climgroup_domain::target::TargetState;

/// Lists the actuators that belong to the owning group.
pub trait MemberProvider {
    /// Current member actuator ids, or `None` when the group cannot tell.
    fn member_ids(&self) -> Option<Vec<EntityId>>;
}

/// Gives access to the group's desired state.
pub trait TargetStateProvider {
    fn target_state(&self) -> TargetState;
}

impl<T: MemberProvider + ?Sized> MemberProvider for Arc<T> {
    fn member_ids(&self) -> Option<Vec<EntityId>> {
        (**self).member_ids()
    }
}

impl<T: TargetStateProvider + ?Sized> TargetStateProvider for Arc<T> {
    fn target_state(&self) -> TargetState {
        (**self).target_state()
    }
}
