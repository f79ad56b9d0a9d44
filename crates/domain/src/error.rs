//! Common error types used across the workspace.
//!
//! Each layer defines its own typed errors and converts into
//! [`ClimGroupError`] via `#[from]` when crossing a port boundary.

/// Top-level error for domain and port operations.
#[derive(Debug, thiserror::Error)]
pub enum ClimGroupError {
    #[error("validation error")]
    Validation(#[from] ValidationError),

    #[error("not found")]
    NotFound(#[from] NotFoundError),

    #[error("command error")]
    Command(#[from] CommandError),
}

/// A domain invariant was violated.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("name must not be empty")]
    EmptyName,

    #[error("identifier must not be empty")]
    EmptyId,

    #[error("identifier {0} is registered twice")]
    DuplicateId(String),

    #[error("unknown state {0:?}")]
    UnknownState(String),

    #[error("unknown hvac mode {0:?}")]
    UnknownHvacMode(String),
}

/// A lookup did not find the requested record.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{entity} {id} not found")]
pub struct NotFoundError {
    pub entity: &'static str,
    pub id: String,
}

/// An actuator rejected or could not execute a command.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("entity {0} does not accept climate commands")]
    Unsupported(String),

    #[error("entity {0} is unavailable")]
    Unavailable(String),

    #[error("command rejected: {0}")]
    Rejected(String),
}
