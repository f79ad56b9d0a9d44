//! Window-area controller — the per-sensor state machine.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};

use climgroup_domain::context::CallOrigin;
use climgroup_domain::entity::{Activity, WindowReading};
use climgroup_domain::event::StateChangeEvent;
use climgroup_domain::id::{AreaId, EntityId};
use climgroup_domain::target::StateFragment;
use climgroup_domain::window::{
    ControlAction, ControlDecision, PendingDirection, SkipReason, WindowControlMode, WindowPhase,
};

use super::timer::{TimerFired, WindowTimerManager};
use crate::dispatcher::{DispatchRequest, DispatcherHandle};
use crate::ports::{AreaRegistry, MemberProvider, StateReader, TargetStateProvider};
use crate::services::AreaResolver;

#[derive(Debug, Clone, PartialEq)]
pub struct ControllerConfig {
    pub mode: WindowControlMode,
    pub window_sensors: Vec<EntityId>,
    pub open_delay: Duration,
    pub close_delay: Duration,
}

impl ControllerConfig {
    /// Area-based control of `window_sensors` with 15s/30s delays.
    #[must_use]
    pub fn area_based(window_sensors: Vec<EntityId>) -> Self {
        Self {
            mode: WindowControlMode::AreaBased,
            window_sensors,
            open_delay: Duration::from_secs(15),
            close_delay: Duration::from_secs(30),
        }
    }

    #[must_use]
    pub fn with_delays(mut self, open_delay: Duration, close_delay: Duration) -> Self {
        self.open_delay = open_delay;
        self.close_delay = close_delay;
        self
    }

    fn delay(&self, direction: PendingDirection) -> Duration {
        match direction {
            PendingDirection::PendingOpen => self.open_delay,
            PendingDirection::PendingClose => self.close_delay,
        }
    }
}

/// Result of handling a fired timer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Evaluation {
    /// A decision was made and handed to the dispatcher.
    Dispatched(ControlDecision),
    /// The timer was valid but led to no action.
    Skipped(SkipReason),
    /// The timer had been cancelled or replaced before it was handled.
    Superseded,
}

/// Turns window sensor changes into area-scoped turn-off and restore
/// decisions.
///
/// All state lives on the loop driving [`WindowAreaController::run`]:
/// sensor events and fired timers are handled one at a time. Sensor and
/// actuator states are read fresh from the [`StateReader`] whenever a timer
/// fires.
pub struct WindowAreaController<R, S, M, T> {
    config: ControllerConfig,
    resolver: AreaResolver<R>,
    states: S,
    members: M,
    target: T,
    dispatcher: DispatcherHandle,
    timers: WindowTimerManager,
    fired: mpsc::UnboundedReceiver<TimerFired>,
    phases: HashMap<EntityId, WindowPhase>,
}

impl<R, S, M, T> WindowAreaController<R, S, M, T>
where
    R: AreaRegistry,
    S: StateReader,
    M: MemberProvider,
    T: TargetStateProvider,
{
    pub fn new(
        config: ControllerConfig,
        registry: R,
        states: S,
        members: M,
        target: T,
        dispatcher: DispatcherHandle,
    ) -> Self {
        let (timers, fired) = WindowTimerManager::new();
        let phases = config
            .window_sensors
            .iter()
            .map(|sensor| (sensor.clone(), WindowPhase::default()))
            .collect();
        Self {
            config,
            resolver: AreaResolver::new(registry),
            states,
            members,
            target,
            dispatcher,
            timers,
            fired,
            phases,
        }
    }

    #[must_use]
    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    #[must_use]
    pub fn timers(&self) -> &WindowTimerManager {
        &self.timers
    }

    /// Current phase of a monitored sensor.
    #[must_use]
    pub fn phase(&self, sensor_id: &EntityId) -> Option<WindowPhase> {
        self.phases.get(sensor_id).copied()
    }

    fn is_active(&self) -> bool {
        self.config.mode == WindowControlMode::AreaBased
    }

    /// Whether any monitored window currently reads open.
    #[must_use]
    pub fn any_window_open(&self) -> bool {
        self.config
            .window_sensors
            .iter()
            .any(|sensor| self.reads(sensor) == Some(WindowReading::Open))
    }

    /// Treat every window that already reads open as if it just opened.
    pub fn sync_initial_state(&mut self) {
        let armed = self.resync();
        if armed > 0 {
            tracing::info!(armed, "windows open at startup");
        }
    }

    /// Re-read every monitored sensor and arm those whose live reading
    /// differs from the reading their phase was entered on.
    ///
    /// Returns how many sensors were armed.
    pub fn resync(&mut self) -> usize {
        if !self.is_active() {
            return 0;
        }
        let changed: Vec<(EntityId, WindowReading)> = self
            .config
            .window_sensors
            .iter()
            .filter_map(|sensor| {
                let reading = self.reads(sensor)?;
                let phase = self.phases.get(sensor).copied().unwrap_or_default();
                (phase.reading() != reading).then(|| (sensor.clone(), reading))
            })
            .collect();
        let armed = changed.len();
        for (sensor, reading) in changed {
            tracing::debug!(sensor = %sensor, ?reading, "window reading out of sync");
            self.arm(sensor, reading);
        }
        armed
    }

    /// Re-arm the timer of a monitored sensor whose reading changed.
    ///
    /// Unmonitored entities, unknown or unavailable readings and changes
    /// that keep the same reading are ignored.
    pub fn handle_state_change(&mut self, event: &StateChangeEvent) {
        if !self.is_active() || !self.phases.contains_key(&event.entity_id) {
            return;
        }
        let Some(reading) = event.new_state.window_reading() else {
            tracing::debug!(
                sensor = %event.entity_id,
                state = %event.new_state,
                "non-actionable window state"
            );
            return;
        };
        if event.old_state.window_reading() == Some(reading) {
            return;
        }
        self.arm(event.entity_id.clone(), reading);
    }

    fn arm(&mut self, sensor: EntityId, reading: WindowReading) {
        let direction = PendingDirection::for_reading(reading);
        let delay = self.config.delay(direction);
        tracing::debug!(
            sensor = %sensor,
            %direction,
            delay_secs = delay.as_secs_f64(),
            "window changed"
        );
        let phase = self.phases.entry(sensor.clone()).or_default();
        *phase = phase.on_reading(reading);
        self.timers.schedule(sensor, direction, delay);
    }

    /// Evaluate a fired timer and dispatch the resulting decision, if any.
    pub fn handle_timer(&mut self, fired: TimerFired) -> Evaluation {
        if !self.timers.claim(&fired) {
            return Evaluation::Superseded;
        }
        let TimerFired {
            sensor_id,
            direction,
            ..
        } = fired;

        let still_matches = self.reads(&sensor_id) == Some(direction.expected_reading());
        if let Some(phase) = self.phases.get_mut(&sensor_id) {
            *phase = phase.on_fired(direction, still_matches);
        }

        let decision = if still_matches {
            match direction {
                PendingDirection::PendingOpen => self.evaluate_open(&sensor_id),
                PendingDirection::PendingClose => self.evaluate_close(&sensor_id),
            }
        } else {
            Err(SkipReason::Stale)
        };

        match decision {
            Ok(decision) => {
                tracing::info!(
                    sensor = %sensor_id,
                    area = %decision.area_id,
                    action = %decision.action,
                    targets = ?decision.entity_ids,
                    "window control decision"
                );
                self.dispatch(&decision);
                Evaluation::Dispatched(decision)
            }
            Err(SkipReason::NoArea) => {
                tracing::warn!(sensor = %sensor_id, "window sensor has no area, skipping");
                Evaluation::Skipped(SkipReason::NoArea)
            }
            Err(reason) => {
                tracing::debug!(sensor = %sensor_id, %direction, %reason, "no action");
                Evaluation::Skipped(reason)
            }
        }
    }

    fn evaluate_open(&self, sensor: &EntityId) -> Result<ControlDecision, SkipReason> {
        let area_id = self.resolver.resolve(sensor).ok_or(SkipReason::NoArea)?;
        let entity_ids = self.actuators_in(&area_id, Activity::Active);
        if entity_ids.is_empty() {
            return Err(SkipReason::NoEligibleActuators);
        }
        Ok(ControlDecision {
            area_id,
            action: ControlAction::TurnOff,
            entity_ids,
        })
    }

    fn evaluate_close(&self, sensor: &EntityId) -> Result<ControlDecision, SkipReason> {
        let area_id = self.resolver.resolve(sensor).ok_or(SkipReason::NoArea)?;
        if let Some(peer) = self.open_peer(sensor, &area_id) {
            return Err(SkipReason::PeerWindowOpen(peer));
        }
        let target = self.target.target_state();
        if target.is_off() {
            return Err(SkipReason::TargetOff);
        }
        if target.is_empty() {
            return Err(SkipReason::NothingToRestore);
        }
        let entity_ids = self.actuators_in(&area_id, Activity::Inactive);
        if entity_ids.is_empty() {
            return Err(SkipReason::NoEligibleActuators);
        }
        Ok(ControlDecision {
            area_id,
            action: ControlAction::Restore,
            entity_ids,
        })
    }

    /// Another monitored window of `area_id` that currently reads open.
    fn open_peer(&self, sensor: &EntityId, area_id: &AreaId) -> Option<EntityId> {
        self.config
            .window_sensors
            .iter()
            .filter(|peer| *peer != sensor)
            .filter(|peer| self.reads(peer) == Some(WindowReading::Open))
            .find(|peer| self.resolver.resolve(peer).as_ref() == Some(area_id))
            .cloned()
    }

    /// Group members bound to `area_id` that currently report `activity`.
    fn actuators_in(&self, area_id: &AreaId, activity: Activity) -> Vec<EntityId> {
        let Some(members) = self.members.member_ids() else {
            tracing::warn!(area = %area_id, "group has no member list");
            return Vec::new();
        };
        self.resolver
            .entities_in_area(&members, area_id)
            .into_iter()
            .filter(|entity_id| self.states.state(entity_id).activity() == Some(activity))
            .collect()
    }

    fn reads(&self, sensor: &EntityId) -> Option<WindowReading> {
        self.states.state(sensor).window_reading()
    }

    fn dispatch(&self, decision: &ControlDecision) {
        let request = match decision.action {
            ControlAction::TurnOff => {
                DispatchRequest::apply(StateFragment::turn_off(), decision.entity_ids.clone())
            }
            ControlAction::Restore => DispatchRequest::restore(decision.entity_ids.clone()),
        };
        let pending = self.dispatcher.enqueue(request);
        let area_id = decision.area_id.clone();
        let action = decision.action;
        tokio::spawn(async move {
            match pending.await {
                Ok(outcome) => {
                    tracing::debug!(area = %area_id, %action, ?outcome, "dispatch finished");
                }
                Err(err) => {
                    tracing::warn!(area = %area_id, %action, %err, "dispatch failed");
                }
            }
        });
    }

    /// Cancel every pending timer and settle all sensors on their live
    /// reading.
    pub fn teardown(&mut self) {
        let pending = self.timers.len();
        self.timers.cancel_all();
        for (sensor, phase) in &mut self.phases {
            if phase.pending().is_some() {
                let reading = self
                    .states
                    .state(sensor)
                    .window_reading()
                    .unwrap_or(phase.reading());
                *phase = WindowPhase::settled(reading);
            }
        }
        tracing::info!(cancelled = pending, "window control stopped");
    }

    /// Drive the controller until `shutdown` resolves or the event stream
    /// closes, then tear down.
    pub async fn run(
        &mut self,
        mut events: broadcast::Receiver<StateChangeEvent>,
        shutdown: impl Future<Output = ()>,
    ) {
        match self.config.mode {
            WindowControlMode::AreaBased => {
                tracing::info!(
                    sensors = self.config.window_sensors.len(),
                    open_delay_secs = self.config.open_delay.as_secs_f64(),
                    close_delay_secs = self.config.close_delay.as_secs_f64(),
                    any_open = self.any_window_open(),
                    "area-based window control started"
                );
            }
            WindowControlMode::Legacy => {
                tracing::warn!("legacy window control is not supported, staying idle");
            }
            WindowControlMode::Off => tracing::info!("window control disabled"),
        }
        self.sync_initial_state();

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                () = &mut shutdown => break,
                event = events.recv() => match event {
                    Ok(event) => {
                        if event.is_echo_of(CallOrigin::WindowControl) {
                            tracing::trace!(entity = %event.entity_id, "own command echo");
                        }
                        self.handle_state_change(&event);
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        let rearmed = self.resync();
                        tracing::warn!(
                            skipped,
                            rearmed,
                            "state change events lagged, sensors re-read"
                        );
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                Some(fired) = self.fired.recv() => {
                    self.handle_timer(fired);
                }
            }
        }
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::DispatcherConfig;
    use crate::testing::{FakeHome, area, id};
    use climgroup_domain::entity::{EntityRegistration, EntityState};
    use climgroup_domain::hvac::HvacMode;
    use climgroup_domain::id::DeviceId;
    use climgroup_domain::target::TargetState;
    use std::sync::Arc;

    type Controller =
        WindowAreaController<Arc<FakeHome>, Arc<FakeHome>, Arc<FakeHome>, Arc<FakeHome>>;

    const LIVING_WINDOW: &str = "binary_sensor.window_living";
    const BED_WINDOW: &str = "binary_sensor.window_bed";

    fn heating() -> EntityState {
        EntityState::Hvac(HvacMode::Heat)
    }

    /// Two areas, one window and one heating thermostat each.
    fn make_home() -> Arc<FakeHome> {
        let home = Arc::new(FakeHome::default());
        home.window(LIVING_WINDOW, Some("living"), EntityState::Off);
        home.window(BED_WINDOW, Some("bed"), EntityState::Off);
        home.thermostat("climate.thermo_living", Some("living"), heating());
        home.thermostat("climate.thermo_bed", Some("bed"), heating());
        home.set_target(TargetState::new(
            StateFragment::hvac(HvacMode::Heat).with_temperature(21.0),
        ));
        home
    }

    fn make_controller(home: &Arc<FakeHome>, sensors: &[&str]) -> Controller {
        let dispatcher = DispatcherHandle::spawn(
            DispatcherConfig::new(CallOrigin::WindowControl),
            Arc::clone(home),
            Arc::clone(home),
            Arc::clone(home),
            Arc::clone(home),
        );
        WindowAreaController::new(
            ControllerConfig::area_based(sensors.iter().map(|s| id(s)).collect()),
            Arc::clone(home),
            Arc::clone(home),
            Arc::clone(home),
            Arc::clone(home),
            dispatcher,
        )
    }

    /// Flip a sensor in the home and feed the change to the controller.
    fn flip(controller: &mut Controller, home: &FakeHome, sensor: &str, open: bool) {
        let (old, new) = if open {
            (EntityState::Off, EntityState::On)
        } else {
            (EntityState::On, EntityState::Off)
        };
        home.set_state(sensor, new);
        controller.handle_state_change(&StateChangeEvent::new(id(sensor), old, new));
    }

    async fn next_timer(controller: &mut Controller) -> TimerFired {
        controller.fired.recv().await.unwrap()
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn should_turn_off_only_actuators_of_opened_window_area() {
        let home = make_home();
        let mut controller = make_controller(&home, &[LIVING_WINDOW, BED_WINDOW]);

        flip(&mut controller, &home, LIVING_WINDOW, true);
        assert_eq!(
            controller.phase(&id(LIVING_WINDOW)),
            Some(WindowPhase::OpenPending)
        );
        let fired = next_timer(&mut controller).await;
        let evaluation = controller.handle_timer(fired);

        assert_eq!(
            evaluation,
            Evaluation::Dispatched(ControlDecision {
                area_id: area("living"),
                action: ControlAction::TurnOff,
                entity_ids: vec![id("climate.thermo_living")],
            })
        );
        assert_eq!(
            controller.phase(&id(LIVING_WINDOW)),
            Some(WindowPhase::OpenSettled)
        );
        settle().await;
        assert_eq!(home.state(&id("climate.thermo_living")), EntityState::Off);
        assert_eq!(home.state(&id("climate.thermo_bed")), heating());
    }

    #[tokio::test(start_paused = true)]
    async fn should_restore_after_window_closes() {
        let home = make_home();
        let mut controller = make_controller(&home, &[LIVING_WINDOW, BED_WINDOW]);
        flip(&mut controller, &home, LIVING_WINDOW, true);
        let fired = next_timer(&mut controller).await;
        controller.handle_timer(fired);
        settle().await;

        flip(&mut controller, &home, LIVING_WINDOW, false);
        let fired = next_timer(&mut controller).await;
        let evaluation = controller.handle_timer(fired);

        assert_eq!(
            evaluation,
            Evaluation::Dispatched(ControlDecision {
                area_id: area("living"),
                action: ControlAction::Restore,
                entity_ids: vec![id("climate.thermo_living")],
            })
        );
        settle().await;
        assert_eq!(home.state(&id("climate.thermo_living")), heating());
    }

    #[tokio::test(start_paused = true)]
    async fn should_discard_open_when_window_closed_before_delay() {
        let home = make_home();
        let mut controller = make_controller(&home, &[LIVING_WINDOW]);

        flip(&mut controller, &home, LIVING_WINDOW, true);
        tokio::time::sleep(Duration::from_secs(5)).await;
        flip(&mut controller, &home, LIVING_WINDOW, false);

        assert_eq!(controller.timers().len(), 1);
        let fired = next_timer(&mut controller).await;
        assert_eq!(fired.direction, PendingDirection::PendingClose);
        controller.handle_timer(fired);
        settle().await;
        assert!(
            home.calls()
                .iter()
                .all(|(call, _)| call.hvac_mode() != Some(HvacMode::Off))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn should_skip_stale_open_timer() {
        let home = make_home();
        let mut controller = make_controller(&home, &[LIVING_WINDOW]);

        flip(&mut controller, &home, LIVING_WINDOW, true);
        // closed without an event reaching the controller
        home.set_state(LIVING_WINDOW, EntityState::Off);
        let fired = next_timer(&mut controller).await;

        assert_eq!(
            controller.handle_timer(fired),
            Evaluation::Skipped(SkipReason::Stale)
        );
        assert_eq!(
            controller.phase(&id(LIVING_WINDOW)),
            Some(WindowPhase::ClosedSettled)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn should_ignore_superseded_timer() {
        let home = make_home();
        let mut controller = make_controller(&home, &[LIVING_WINDOW]);
        controller.config.open_delay = Duration::ZERO;

        flip(&mut controller, &home, LIVING_WINDOW, true);
        tokio::time::sleep(Duration::from_millis(1)).await;
        flip(&mut controller, &home, LIVING_WINDOW, false);

        let stale = next_timer(&mut controller).await;
        assert_eq!(controller.handle_timer(stale), Evaluation::Superseded);
    }

    #[tokio::test(start_paused = true)]
    async fn should_not_restore_while_peer_window_open() {
        let home = make_home();
        home.window("binary_sensor.window_a", Some("living"), EntityState::Off);
        home.window("binary_sensor.window_b", Some("living"), EntityState::Off);
        let mut controller =
            make_controller(&home, &["binary_sensor.window_a", "binary_sensor.window_b"]);

        flip(&mut controller, &home, "binary_sensor.window_a", true);
        let fired = next_timer(&mut controller).await;
        assert!(matches!(
            controller.handle_timer(fired),
            Evaluation::Dispatched(_)
        ));
        settle().await;

        flip(&mut controller, &home, "binary_sensor.window_b", true);
        flip(&mut controller, &home, "binary_sensor.window_a", false);

        // window_b open delay: living is already off
        let fired = next_timer(&mut controller).await;
        assert_eq!(fired.sensor_id, id("binary_sensor.window_b"));
        assert_eq!(
            controller.handle_timer(fired),
            Evaluation::Skipped(SkipReason::NoEligibleActuators)
        );

        let fired = next_timer(&mut controller).await;
        assert_eq!(fired.sensor_id, id("binary_sensor.window_a"));
        assert_eq!(
            controller.handle_timer(fired),
            Evaluation::Skipped(SkipReason::PeerWindowOpen(id("binary_sensor.window_b")))
        );

        flip(&mut controller, &home, "binary_sensor.window_b", false);
        let fired = next_timer(&mut controller).await;
        assert!(matches!(
            controller.handle_timer(fired),
            Evaluation::Dispatched(ControlDecision {
                action: ControlAction::Restore,
                ..
            })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn should_not_restore_when_target_is_off() {
        let home = make_home();
        let mut controller = make_controller(&home, &[LIVING_WINDOW]);
        flip(&mut controller, &home, LIVING_WINDOW, true);
        let fired = next_timer(&mut controller).await;
        controller.handle_timer(fired);
        settle().await;

        home.set_target(TargetState::new(StateFragment::turn_off()));
        flip(&mut controller, &home, LIVING_WINDOW, false);
        let fired = next_timer(&mut controller).await;

        assert_eq!(
            controller.handle_timer(fired),
            Evaluation::Skipped(SkipReason::TargetOff)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn should_not_restore_empty_target() {
        let home = make_home();
        home.set_state("climate.thermo_living", EntityState::Off);
        home.set_target(TargetState::default());
        let mut controller = make_controller(&home, &[LIVING_WINDOW]);

        home.set_state(LIVING_WINDOW, EntityState::On);
        flip(&mut controller, &home, LIVING_WINDOW, false);
        let fired = next_timer(&mut controller).await;

        assert_eq!(
            controller.handle_timer(fired),
            Evaluation::Skipped(SkipReason::NothingToRestore)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn should_skip_turn_off_when_area_already_off() {
        let home = make_home();
        home.set_state("climate.thermo_living", EntityState::Off);
        let mut controller = make_controller(&home, &[LIVING_WINDOW]);

        flip(&mut controller, &home, LIVING_WINDOW, true);
        let fired = next_timer(&mut controller).await;

        assert_eq!(
            controller.handle_timer(fired),
            Evaluation::Skipped(SkipReason::NoEligibleActuators)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn should_skip_window_without_area() {
        let home = make_home();
        home.window("binary_sensor.window_attic", None, EntityState::Off);
        let mut controller = make_controller(&home, &["binary_sensor.window_attic"]);

        flip(&mut controller, &home, "binary_sensor.window_attic", true);
        let fired = next_timer(&mut controller).await;

        assert_eq!(
            controller.handle_timer(fired),
            Evaluation::Skipped(SkipReason::NoArea)
        );
        settle().await;
        assert!(home.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn should_never_target_actuator_without_area() {
        let home = make_home();
        home.thermostat("climate.portable", None, heating());
        let mut controller = make_controller(&home, &[LIVING_WINDOW, BED_WINDOW]);

        flip(&mut controller, &home, LIVING_WINDOW, true);
        flip(&mut controller, &home, BED_WINDOW, true);
        for _ in 0..2 {
            let fired = next_timer(&mut controller).await;
            if let Evaluation::Dispatched(decision) = controller.handle_timer(fired) {
                assert!(!decision.entity_ids.contains(&id("climate.portable")));
            }
        }
        settle().await;
        assert_eq!(home.state(&id("climate.portable")), heating());
    }

    #[tokio::test(start_paused = true)]
    async fn should_resolve_actuator_area_through_device() {
        let home = make_home();
        home.place_device("trv_living", "living");
        home.thermostat("climate.trv", None, heating());
        home.register(
            EntityRegistration::orphan(id("climate.trv"))
                .with_device(DeviceId::new("trv_living").unwrap()),
        );
        let mut controller = make_controller(&home, &[LIVING_WINDOW]);

        flip(&mut controller, &home, LIVING_WINDOW, true);
        let fired = next_timer(&mut controller).await;

        match controller.handle_timer(fired) {
            Evaluation::Dispatched(decision) => {
                assert_eq!(
                    decision.entity_ids,
                    vec![id("climate.thermo_living"), id("climate.trv")]
                );
            }
            other => panic!("unexpected evaluation {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn should_ignore_unknown_and_unmonitored_states() {
        let home = make_home();
        let mut controller = make_controller(&home, &[LIVING_WINDOW]);

        controller.handle_state_change(&StateChangeEvent::new(
            id(LIVING_WINDOW),
            EntityState::Off,
            EntityState::Unavailable,
        ));
        controller.handle_state_change(&StateChangeEvent::new(
            id(BED_WINDOW),
            EntityState::Off,
            EntityState::On,
        ));
        controller.handle_state_change(&StateChangeEvent::new(
            id(LIVING_WINDOW),
            EntityState::Closed,
            EntityState::Off,
        ));

        assert!(controller.timers().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn should_stay_idle_unless_area_based() {
        let home = make_home();
        let mut controller = make_controller(&home, &[LIVING_WINDOW]);
        controller.config.mode = WindowControlMode::Legacy;

        flip(&mut controller, &home, LIVING_WINDOW, true);

        assert!(controller.timers().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn should_arm_windows_open_at_startup() {
        let home = make_home();
        home.set_state(BED_WINDOW, EntityState::On);
        let mut controller = make_controller(&home, &[LIVING_WINDOW, BED_WINDOW]);

        assert!(controller.any_window_open());
        controller.sync_initial_state();

        assert_eq!(controller.timers().len(), 1);
        assert_eq!(
            controller
                .timers()
                .pending(&id(BED_WINDOW))
                .map(|(direction, _)| direction),
            Some(PendingDirection::PendingOpen)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn should_cancel_timers_on_teardown() {
        let home = make_home();
        let mut controller = make_controller(&home, &[LIVING_WINDOW, BED_WINDOW]);
        flip(&mut controller, &home, LIVING_WINDOW, true);
        flip(&mut controller, &home, BED_WINDOW, true);

        controller.teardown();

        assert!(controller.timers().is_empty());
        assert_eq!(
            controller.phase(&id(LIVING_WINDOW)),
            Some(WindowPhase::OpenSettled)
        );
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(controller.fired.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn should_settle_closing_window_as_closed_on_teardown() {
        let home = make_home();
        let mut controller = make_controller(&home, &[LIVING_WINDOW, BED_WINDOW]);
        flip(&mut controller, &home, LIVING_WINDOW, true);
        let fired = next_timer(&mut controller).await;
        controller.handle_timer(fired);
        flip(&mut controller, &home, LIVING_WINDOW, false);
        flip(&mut controller, &home, BED_WINDOW, true);
        // gone unavailable while pending: keeps the reading it was armed on
        home.set_state(BED_WINDOW, EntityState::Unavailable);

        controller.teardown();

        assert_eq!(
            controller.phase(&id(LIVING_WINDOW)),
            Some(WindowPhase::ClosedSettled)
        );
        assert_eq!(
            controller.phase(&id(BED_WINDOW)),
            Some(WindowPhase::OpenSettled)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn should_rearm_sensors_whose_reading_drifted() {
        let home = make_home();
        let mut controller = make_controller(&home, &[LIVING_WINDOW, BED_WINDOW]);
        flip(&mut controller, &home, LIVING_WINDOW, true);
        let fired = next_timer(&mut controller).await;
        controller.handle_timer(fired);
        assert_eq!(controller.resync(), 0);

        // changes that never reached the controller
        home.set_state(LIVING_WINDOW, EntityState::Off);
        home.set_state(BED_WINDOW, EntityState::On);

        assert_eq!(controller.resync(), 2);
        assert_eq!(
            controller
                .timers()
                .pending(&id(LIVING_WINDOW))
                .map(|(direction, _)| direction),
            Some(PendingDirection::PendingClose)
        );
        assert_eq!(
            controller.phase(&id(BED_WINDOW)),
            Some(WindowPhase::OpenPending)
        );
        assert_eq!(controller.resync(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn should_resync_after_lagging_behind_events() {
        let home = make_home();
        let mut controller = make_controller(&home, &[LIVING_WINDOW]);
        let (events, receiver) = broadcast::channel(1);
        let (stop, stopped) = tokio::sync::oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            controller
                .run(receiver, async {
                    let _ = stopped.await;
                })
                .await;
        });
        settle().await;

        // the window event is overwritten before the controller sees it
        home.set_state(LIVING_WINDOW, EntityState::On);
        events
            .send(StateChangeEvent::new(
                id(LIVING_WINDOW),
                EntityState::Off,
                EntityState::On,
            ))
            .unwrap();
        events
            .send(StateChangeEvent::new(
                id("climate.thermo_bed"),
                heating(),
                heating(),
            ))
            .unwrap();
        tokio::time::sleep(Duration::from_secs(16)).await;

        assert_eq!(home.state(&id("climate.thermo_living")), EntityState::Off);
        stop.send(()).unwrap();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn should_run_until_shutdown() {
        let home = make_home();
        let mut controller = make_controller(&home, &[LIVING_WINDOW]);
        let (events, receiver) = broadcast::channel(16);
        let (stop, stopped) = tokio::sync::oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            controller
                .run(receiver, async {
                    let _ = stopped.await;
                })
                .await;
            controller
        });

        home.set_state(LIVING_WINDOW, EntityState::On);
        events
            .send(StateChangeEvent::new(
                id(LIVING_WINDOW),
                EntityState::Off,
                EntityState::On,
            ))
            .unwrap();
        tokio::time::sleep(Duration::from_secs(16)).await;
        assert_eq!(home.state(&id("climate.thermo_living")), EntityState::Off);

        stop.send(()).unwrap();
        let controller = task.await.unwrap();
        assert!(controller.timers().is_empty());
    }
}
