//! Port definitions — traits that adapters implement.
//!
//! Ports are the boundaries between the window-control core and the home it
//! runs in. They are defined here (in `app`) so that both the use-case layer
//! and the adapter layer can depend on them without creating circular
//! dependencies.
//!
//! Every port is implemented for `Arc<T>`, so one adapter instance can back
//! several ports at once.

pub mod event_bus;
pub mod executor;
pub mod group;
pub mod registry;
pub mod state;

pub use event_bus::EventPublisher;
pub use executor::CommandExecutor;
pub use group::{MemberProvider, TargetStateProvider};
pub use registry::AreaRegistry;
pub use state::StateReader;
