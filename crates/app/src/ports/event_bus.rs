//! Event bus port — publish/subscribe for entity state changes.

use std::future::Future;
use std::sync::Arc;

use climgroup_domain::error::ClimGroupError;
use climgroup_domain::event::StateChangeEvent;

/// Publishes state changes to interested subscribers.
pub trait EventPublisher {
    /// Publish an event to all current subscribers.
    fn publish(
        &self,
        event: StateChangeEvent,
    ) -> impl Future<Output = Result<(), ClimGroupError>> + Send;
}

impl<T: EventPublisher + Send + Sync> EventPublisher for Arc<T> {
    fn publish(
        &self,
        event: StateChangeEvent,
    ) -> impl Future<Output = Result<(), ClimGroupError>> + Send {
        (**self).publish(event)
    }
}
