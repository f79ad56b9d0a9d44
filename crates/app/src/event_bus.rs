//! In-process event bus backed by a tokio broadcast channel.

use std::future::Future;

use tokio::sync::broadcast;

use climgroup_domain::error::ClimGroupError;
use climgroup_domain::event::StateChangeEvent;

use crate::ports::EventPublisher;

/// In-process event bus using a tokio [`broadcast`] channel.
///
/// Publishing succeeds even when there are no active subscribers
/// (the event is simply dropped).
#[derive(Clone)]
pub struct InProcessEventBus {
    sender: broadcast::Sender<StateChangeEvent>,
}

impl InProcessEventBus {
    /// Create a new event bus with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to state changes on this bus.
    ///
    /// Returns a receiver that will get all events published *after*
    /// the subscription is created.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<StateChangeEvent> {
        self.sender.subscribe()
    }
}

impl EventPublisher for InProcessEventBus {
    fn publish(
        &self,
        event: StateChangeEvent,
    ) -> impl Future<Output = Result<(), ClimGroupError>> + Send {
        // send only fails with zero receivers
        let _ = self.sender.send(event);
        async { Ok(()) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use climgroup_domain::entity::EntityState;
    use climgroup_domain::id::EntityId;

    fn window_opened() -> StateChangeEvent {
        StateChangeEvent::new(
            EntityId::new("binary_sensor.window_living").unwrap(),
            EntityState::Off,
            EntityState::On,
        )
    }

    #[tokio::test]
    async fn should_deliver_event_to_subscriber() {
        let bus = InProcessEventBus::new(16);
        let mut rx = bus.subscribe();

        let event = window_opened();
        bus.publish(event.clone()).await.unwrap();

        let received = rx.recv().await.unwrap();
        assert_eq!(received, event);
    }

    #[tokio::test]
    async fn should_deliver_event_to_multiple_subscribers() {
        let bus = InProcessEventBus::new(16);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(window_opened()).await.unwrap();

        assert_eq!(rx1.recv().await.unwrap().new_state, EntityState::On);
        assert_eq!(rx2.recv().await.unwrap().new_state, EntityState::On);
    }

    #[tokio::test]
    async fn should_succeed_when_no_subscribers() {
        let bus = InProcessEventBus::new(16);
        assert!(bus.publish(window_opened()).await.is_ok());
    }

    #[tokio::test]
    async fn should_not_deliver_events_published_before_subscription() {
        let bus = InProcessEventBus::new(16);
        bus.publish(window_opened()).await.unwrap();

        let mut rx = bus.subscribe();
        let later = StateChangeEvent::new(
            EntityId::new("binary_sensor.window_living").unwrap(),
            EntityState::On,
            EntityState::Off,
        );
        bus.publish(later.clone()).await.unwrap();

        assert_eq!(rx.recv().await.unwrap(), later);
    }
}
