//! Command dispatcher — turns a state fragment into a debounced, retried and
//! context-tagged batch of service calls.
//!
//! Each dispatcher runs a single worker task, so its submissions are applied
//! one at a time. Callers talk to it through a cloneable [`DispatcherHandle`].

use std::collections::{BTreeSet, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep, sleep_until};

use climgroup_domain::context::{CallContext, CallOrigin};
use climgroup_domain::error::ClimGroupError;
use climgroup_domain::hvac::HvacMode;
use climgroup_domain::id::EntityId;
use climgroup_domain::service::ServiceCall;
use climgroup_domain::target::StateFragment;
use climgroup_domain::time::now;

use crate::ports::{CommandExecutor, MemberProvider, StateReader, TargetStateProvider};

/// Timing and identity of one dispatcher.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatcherConfig {
    /// Tag carried by every call this dispatcher issues.
    pub origin: CallOrigin,
    pub debounce_delay: Duration,
    /// Extra attempts after the first one.
    pub retry_attempts: u32,
    pub retry_delay: Duration,
    /// Temperature sent along with every turn-off, for devices that keep
    /// regulating while off.
    pub min_temp_off: Option<f64>,
}

impl DispatcherConfig {
    /// A dispatcher for `origin` with no debounce and one retry after 2.5s.
    #[must_use]
    pub fn new(origin: CallOrigin) -> Self {
        Self {
            origin,
            debounce_delay: Duration::ZERO,
            retry_attempts: 1,
            retry_delay: Duration::from_millis(2500),
            min_temp_off: None,
        }
    }

    #[must_use]
    pub fn with_debounce(mut self, delay: Duration) -> Self {
        self.debounce_delay = delay;
        self
    }

    #[must_use]
    pub fn with_retry(mut self, attempts: u32, delay: Duration) -> Self {
        self.retry_attempts = attempts;
        self.retry_delay = delay;
        self
    }

    #[must_use]
    pub fn with_min_temp_off(mut self, min_temp: f64) -> Self {
        self.min_temp_off = Some(min_temp);
        self
    }

    fn max_attempts(&self) -> u32 {
        self.retry_attempts.saturating_add(1)
    }
}

/// What to apply, and to whom.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DispatchRequest {
    /// `None` applies the group's current target state.
    pub fragment: Option<StateFragment>,
    /// `None` targets every member of the group.
    pub entity_ids: Option<Vec<EntityId>>,
}

impl DispatchRequest {
    /// Apply `fragment` to exactly `entity_ids`.
    #[must_use]
    pub fn apply(fragment: StateFragment, entity_ids: Vec<EntityId>) -> Self {
        Self {
            fragment: Some(fragment),
            entity_ids: Some(entity_ids),
        }
    }

    /// Bring `entity_ids` back to the current target state.
    #[must_use]
    pub fn restore(entity_ids: Vec<EntityId>) -> Self {
        Self {
            fragment: None,
            entity_ids: Some(entity_ids),
        }
    }

    /// Entities a later request must address to supersede this one.
    fn scope(&self) -> Option<BTreeSet<EntityId>> {
        self.entity_ids
            .as_ref()
            .map(|ids| ids.iter().cloned().collect())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Every call went through and, when an HVAC mode was requested, every
    /// target reported it.
    Applied {
        attempts: u32,
        entity_ids: Vec<EntityId>,
    },
    /// A newer request for the same entities replaced this one while it was
    /// still being debounced.
    Superseded,
    /// The fragment produced no call for the targets.
    NothingToSend,
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("no member list available for an implicit target")]
    NoMembers,

    #[error("{} entities unconfirmed after {attempts} attempts", .pending.len())]
    Unconfirmed {
        attempts: u32,
        pending: Vec<EntityId>,
    },

    #[error("command failed after {attempts} attempts")]
    Executor {
        attempts: u32,
        #[source]
        source: ClimGroupError,
    },

    #[error("dispatcher is shut down")]
    Closed,
}

pub type DispatchResult = Result<DispatchOutcome, DispatchError>;

struct Queued {
    request: DispatchRequest,
    scope: Option<BTreeSet<EntityId>>,
    submitted_at: Instant,
    reply: oneshot::Sender<DispatchResult>,
}

impl Queued {
    fn supersede(self) {
        tracing::debug!(targets = ?self.request.entity_ids, "request superseded");
        let _ = self.reply.send(Ok(DispatchOutcome::Superseded));
    }
}

/// Outcome of an enqueued request, resolved once the worker is done with it.
#[must_use = "the outcome is lost unless the dispatch is awaited"]
pub struct PendingDispatch {
    reply: Option<oneshot::Receiver<DispatchResult>>,
}

impl Future for PendingDispatch {
    type Output = DispatchResult;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.reply.as_mut() {
            Some(reply) => Pin::new(reply)
                .poll(cx)
                .map(|received| received.unwrap_or(Err(DispatchError::Closed))),
            None => Poll::Ready(Err(DispatchError::Closed)),
        }
    }
}

/// Cloneable entry point to a running dispatcher.
#[derive(Clone)]
pub struct DispatcherHandle {
    origin: CallOrigin,
    requests: mpsc::UnboundedSender<Queued>,
    worker: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl DispatcherHandle {
    /// Spawn the worker of a new dispatcher.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<E, M, T, S>(
        config: DispatcherConfig,
        executor: E,
        members: M,
        target: T,
        states: S,
    ) -> Self
    where
        E: CommandExecutor + Send + Sync + 'static,
        M: MemberProvider + Send + Sync + 'static,
        T: TargetStateProvider + Send + Sync + 'static,
        S: StateReader + Send + Sync + 'static,
    {
        let (requests, receiver) = mpsc::unbounded_channel();
        let origin = config.origin;
        let worker = DispatchWorker {
            config,
            executor,
            members,
            target,
            states,
            requests: receiver,
            backlog: VecDeque::new(),
            open: true,
        };
        let task = tokio::spawn(worker.run());
        tracing::debug!(%origin, "dispatcher started");
        Self {
            origin,
            requests,
            worker: Arc::new(Mutex::new(Some(task))),
        }
    }

    #[must_use]
    pub fn origin(&self) -> CallOrigin {
        self.origin
    }

    /// Queue `request` and return a future resolving to its outcome.
    ///
    /// Queuing happens immediately, so requests keep the order in which
    /// they were enqueued even if their outcomes are awaited later or not at
    /// all.
    pub fn enqueue(&self, request: DispatchRequest) -> PendingDispatch {
        let (reply, receiver) = oneshot::channel();
        let queued = Queued {
            scope: request.scope(),
            request,
            submitted_at: Instant::now(),
            reply,
        };
        match self.requests.send(queued) {
            Ok(()) => PendingDispatch {
                reply: Some(receiver),
            },
            Err(_) => PendingDispatch { reply: None },
        }
    }

    /// Queue `request` and wait for its outcome.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::NoMembers`] when no target list was given and
    /// the group has no member list, [`DispatchError::Unconfirmed`] or
    /// [`DispatchError::Executor`] when the retry budget ran out, and
    /// [`DispatchError::Closed`] when the dispatcher is shut down.
    pub async fn submit(&self, request: DispatchRequest) -> DispatchResult {
        self.enqueue(request).await
    }

    /// Stop the worker. Requests not yet applied resolve to
    /// [`DispatchError::Closed`].
    pub fn shutdown(&self) {
        let task = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            task.abort();
            tracing::debug!(origin = %self.origin, "dispatcher stopped");
        }
    }
}

struct DispatchWorker<E, M, T, S> {
    config: DispatcherConfig,
    executor: E,
    members: M,
    target: T,
    states: S,
    requests: mpsc::UnboundedReceiver<Queued>,
    /// Requests for other scopes that arrived while one was debounced.
    backlog: VecDeque<Queued>,
    open: bool,
}

impl<E, M, T, S> DispatchWorker<E, M, T, S>
where
    E: CommandExecutor + Send + Sync,
    M: MemberProvider + Send + Sync,
    T: TargetStateProvider + Send + Sync,
    S: StateReader + Send + Sync,
{
    async fn run(mut self) {
        while let Some(queued) = self.next().await {
            let Queued { request, reply, .. } = self.debounce(queued).await;
            let result = self.apply(request).await;
            if let Err(err) = &result {
                tracing::debug!(origin = %self.config.origin, %err, "dispatch failed");
            }
            // the caller may have stopped waiting
            let _ = reply.send(result);
        }
    }

    async fn next(&mut self) -> Option<Queued> {
        if let Some(queued) = self.backlog.pop_front() {
            return Some(queued);
        }
        if !self.open {
            return None;
        }
        let queued = self.requests.recv().await;
        self.open = queued.is_some();
        queued
    }

    /// Hold `current` until its debounce delay elapsed, letting newer
    /// requests for the same scope replace it.
    async fn debounce(&mut self, mut current: Queued) -> Queued {
        loop {
            let deadline = current.submitted_at + self.config.debounce_delay;
            tokio::select! {
                biased;
                incoming = self.requests.recv(), if self.open => match incoming {
                    Some(incoming) => current = self.absorb(current, incoming),
                    None => self.open = false,
                },
                () = sleep_until(deadline) => return current,
            }
        }
    }

    fn absorb(&mut self, current: Queued, incoming: Queued) -> Queued {
        if incoming.scope == current.scope {
            current.supersede();
            return incoming;
        }
        match self
            .backlog
            .iter_mut()
            .find(|queued| queued.scope == incoming.scope)
        {
            Some(slot) => std::mem::replace(slot, incoming).supersede(),
            None => self.backlog.push_back(incoming),
        }
        current
    }

    async fn apply(&self, request: DispatchRequest) -> DispatchResult {
        let target = self.target.target_state();
        let fragment = request
            .fragment
            .unwrap_or_else(|| target.attributes.clone());
        let entity_ids = match request.entity_ids {
            Some(entity_ids) => entity_ids,
            None => self.members.member_ids().ok_or(DispatchError::NoMembers)?,
        };
        if self.calls_for(&fragment, &entity_ids).is_empty() {
            tracing::debug!(origin = %self.config.origin, "nothing to send");
            return Ok(DispatchOutcome::NothingToSend);
        }

        let max_attempts = self.config.max_attempts();
        let mut pending = entity_ids.clone();
        let mut attempt = 0;
        loop {
            attempt += 1;
            let context = CallContext::new(self.config.origin, now(), target.last_entity());
            match self
                .issue(&fragment, &pending, &context, attempt, max_attempts)
                .await
            {
                Err(source) => {
                    if attempt >= max_attempts {
                        return Err(DispatchError::Executor {
                            attempts: attempt,
                            source,
                        });
                    }
                    sleep(self.config.retry_delay).await;
                }
                Ok(()) => {
                    let Some(mode) = fragment.hvac_mode else {
                        return Ok(DispatchOutcome::Applied { attempts: attempt, entity_ids });
                    };
                    if self.confirmed(&mut pending, mode) {
                        return Ok(DispatchOutcome::Applied { attempts: attempt, entity_ids });
                    }
                    // every attempt, the last one included, gets a settle window
                    sleep(self.config.retry_delay).await;
                    if self.confirmed(&mut pending, mode) {
                        return Ok(DispatchOutcome::Applied { attempts: attempt, entity_ids });
                    }
                    if attempt >= max_attempts {
                        return Err(DispatchError::Unconfirmed {
                            attempts: attempt,
                            pending,
                        });
                    }
                }
            }
            tracing::debug!(
                origin = %self.config.origin,
                attempt,
                pending = pending.len(),
                "retrying dispatch"
            );
        }
    }

    async fn issue(
        &self,
        fragment: &StateFragment,
        targets: &[EntityId],
        context: &CallContext,
        attempt: u32,
        max_attempts: u32,
    ) -> Result<(), ClimGroupError> {
        for call in self.calls_for(fragment, targets) {
            tracing::debug!(
                origin = %context.origin,
                service = %call.service,
                targets = ?call.entity_ids,
                data = %call.data,
                parent_id = %context.parent_id,
                attempt,
                max_attempts,
                "calling service"
            );
            if let Err(err) = self.executor.execute(call, context).await {
                tracing::warn!(
                    origin = %context.origin,
                    attempt,
                    max_attempts,
                    %err,
                    "call attempt failed"
                );
                return Err(err);
            }
        }
        Ok(())
    }

    fn calls_for(&self, fragment: &StateFragment, targets: &[EntityId]) -> Vec<ServiceCall> {
        ServiceCall::from_fragment_with_min_temp(fragment, targets, self.config.min_temp_off)
    }

    /// Drop the targets that report `mode`. Returns whether none is left.
    fn confirmed(&self, pending: &mut Vec<EntityId>, mode: HvacMode) -> bool {
        pending.retain(|entity_id| self.states.state(entity_id).hvac_mode() != Some(mode));
        pending.is_empty()
    }
}
