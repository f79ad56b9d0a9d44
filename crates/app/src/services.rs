//! Application services — lookups and shared state the window-control core
//! is built on.
//!
//! Each service struct accepts port trait implementations via generic parameters
//! (constructor injection), keeping this layer decoupled from concrete adapters.

pub mod area_resolver;
pub mod target_state;

pub use area_resolver::AreaResolver;
pub use target_state::SharedTargetState;
