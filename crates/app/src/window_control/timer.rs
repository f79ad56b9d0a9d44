//! Window timers — one cancellable delayed action per window sensor.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use climgroup_domain::id::EntityId;
use climgroup_domain::time::{Timestamp, due_after, now};
use climgroup_domain::window::PendingDirection;

/// A timer that ran out. Only acts if [`WindowTimerManager::claim`]
/// accepts it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerFired {
    pub sensor_id: EntityId,
    pub direction: PendingDirection,
    generation: u64,
}

struct Slot {
    direction: PendingDirection,
    due: Timestamp,
    generation: u64,
    task: JoinHandle<()>,
}

/// Owns the pending delayed action of every window sensor.
///
/// Fired timers are delivered on the channel returned by
/// [`WindowTimerManager::new`], so they are handled on the same loop as
/// sensor events. A sensor never has more than one pending timer, and a
/// timer that was cancelled or replaced is never claimable, even if it had
/// already fired.
pub struct WindowTimerManager {
    slots: HashMap<EntityId, Slot>,
    next_generation: u64,
    fired: mpsc::UnboundedSender<TimerFired>,
}

impl WindowTimerManager {
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TimerFired>) {
        let (fired, receiver) = mpsc::unbounded_channel();
        let manager = Self {
            slots: HashMap::new(),
            next_generation: 0,
            fired,
        };
        (manager, receiver)
    }

    /// Arm a timer for `sensor_id`, replacing any pending one.
    ///
    /// The timer always fires from a spawned task, even with a zero delay.
    pub fn schedule(&mut self, sensor_id: EntityId, direction: PendingDirection, delay: Duration) {
        self.cancel(&sensor_id);

        self.next_generation += 1;
        let generation = self.next_generation;
        let message = TimerFired {
            sensor_id: sensor_id.clone(),
            direction,
            generation,
        };
        let fired = self.fired.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // the receiver only goes away on teardown
            let _ = fired.send(message);
        });

        tracing::trace!(
            sensor = %sensor_id,
            %direction,
            delay_secs = delay.as_secs_f64(),
            "timer armed"
        );
        self.slots.insert(
            sensor_id,
            Slot {
                direction,
                due: due_after(now(), delay),
                generation,
                task,
            },
        );
    }

    /// Cancel the pending timer of `sensor_id`. Returns whether one existed.
    pub fn cancel(&mut self, sensor_id: &EntityId) -> bool {
        match self.slots.remove(sensor_id) {
            Some(slot) => {
                slot.task.abort();
                tracing::trace!(sensor = %sensor_id, direction = %slot.direction, "timer cancelled");
                true
            }
            None => false,
        }
    }

    pub fn cancel_all(&mut self) {
        for (_, slot) in self.slots.drain() {
            slot.task.abort();
        }
    }

    /// Accept `fired` if it is still the sensor's pending timer, clearing
    /// the slot. Cancelled and replaced timers are rejected.
    pub fn claim(&mut self, fired: &TimerFired) -> bool {
        let current = self
            .slots
            .get(&fired.sensor_id)
            .is_some_and(|slot| slot.generation == fired.generation);
        if current {
            self.slots.remove(&fired.sensor_id);
        } else {
            tracing::trace!(sensor = %fired.sensor_id, "superseded timer ignored");
        }
        current
    }

    /// Direction and due time of the sensor's pending timer.
    #[must_use]
    pub fn pending(&self, sensor_id: &EntityId) -> Option<(PendingDirection, Timestamp)> {
        self.slots
            .get(sensor_id)
            .map(|slot| (slot.direction, slot.due))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl Drop for WindowTimerManager {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
