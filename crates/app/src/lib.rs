//! # climgroup-app
//!
//! Application layer — window-control use-cases and **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that adapters must implement:
//!   - `AreaRegistry` — entity and device area lookup
//!   - `StateReader` — last reported state of an entity
//!   - `MemberProvider` / `TargetStateProvider` — the owning climate group
//!   - `CommandExecutor` — issue climate service calls
//!   - `EventPublisher` — publish state changes
//! - Resolve entities to areas (`AreaResolver`)
//! - Run the per-sensor window state machine (`WindowAreaController`) on
//!   top of cancellable timers (`WindowTimerManager`)
//! - Debounce, retry and tag outgoing commands (`DispatcherHandle`)
//! - Provide **in-process infrastructure** (event bus, shared target state)
//!   that doesn't need IO
//!
//! ## Dependency rule
//! Depends on `climgroup-domain` only (plus `tokio` for tasks, timers and channels).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod dispatcher;
pub mod event_bus;
pub mod ports;
pub mod services;
pub mod window_control;

#[cfg(test)]
mod testing;
