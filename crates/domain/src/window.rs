//! Window control — per-sensor phases and the decisions they lead to.
//!
//! Each monitored window sensor moves through four phases:
//!
//! ```text
//!            open                 fired, still open
//! ClosedSettled ──▶ OpenPending ─────────────────▶ OpenSettled
//!      ▲                │  ▲                            │
//!      │ fired, still   │  │ open                 closed│
//!      │ closed         ▼  │                            ▼
//!      └──────────── ClosePending ◀─────────────────────┘
//! ```
//!
//! A reading always supersedes whatever was pending; a fired timer whose
//! condition no longer holds settles on the opposite side without acting.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::entity::WindowReading;
use crate::id::{AreaId, EntityId};

/// Direction of a delayed action waiting on a sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingDirection {
    PendingOpen,
    PendingClose,
}

impl PendingDirection {
    /// The direction a fresh reading arms.
    #[must_use]
    pub fn for_reading(reading: WindowReading) -> Self {
        match reading {
            WindowReading::Open => Self::PendingOpen,
            WindowReading::Closed => Self::PendingClose,
        }
    }

    /// The reading that must still hold when the timer fires.
    #[must_use]
    pub fn expected_reading(self) -> WindowReading {
        match self {
            Self::PendingOpen => WindowReading::Open,
            Self::PendingClose => WindowReading::Closed,
        }
    }
}

impl fmt::Display for PendingDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::PendingOpen => "pending-open",
            Self::PendingClose => "pending-close",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowPhase {
    #[default]
    ClosedSettled,
    OpenPending,
    OpenSettled,
    ClosePending,
}

impl WindowPhase {
    /// Phase after the sensor reports `reading`, from any prior phase.
    #[must_use]
    pub fn on_reading(self, reading: WindowReading) -> Self {
        match reading {
            WindowReading::Open => Self::OpenPending,
            WindowReading::Closed => Self::ClosePending,
        }
    }

    /// Phase after a `direction` timer fired and the live reading was checked.
    #[must_use]
    pub fn on_fired(self, direction: PendingDirection, still_matches: bool) -> Self {
        match (direction, still_matches) {
            (PendingDirection::PendingOpen, true) | (PendingDirection::PendingClose, false) => {
                Self::OpenSettled
            }
            (PendingDirection::PendingOpen, false) | (PendingDirection::PendingClose, true) => {
                Self::ClosedSettled
            }
        }
    }

    /// Settled phase matching `reading`.
    #[must_use]
    pub fn settled(reading: WindowReading) -> Self {
        match reading {
            WindowReading::Open => Self::OpenSettled,
            WindowReading::Closed => Self::ClosedSettled,
        }
    }

    /// The reading this phase was last entered on.
    #[must_use]
    pub fn reading(self) -> WindowReading {
        match self {
            Self::OpenPending | Self::OpenSettled => WindowReading::Open,
            Self::ClosedSettled | Self::ClosePending => WindowReading::Closed,
        }
    }

    /// The delayed action this phase is waiting on, if any.
    #[must_use]
    pub fn pending(self) -> Option<PendingDirection> {
        match self {
            Self::OpenPending => Some(PendingDirection::PendingOpen),
            Self::ClosePending => Some(PendingDirection::PendingClose),
            Self::ClosedSettled | Self::OpenSettled => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlAction {
    TurnOff,
    Restore,
}

impl fmt::Display for ControlAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::TurnOff => "turn-off",
            Self::Restore => "restore",
        })
    }
}

/// Which actuators of which area to turn off or restore.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlDecision {
    pub area_id: AreaId,
    pub action: ControlAction,
    pub entity_ids: Vec<EntityId>,
}

/// Why a fired timer led to no decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The live reading no longer matches what armed the timer.
    Stale,
    /// The sensor has no area, directly or through its device.
    NoArea,
    /// No actuator in the area is in the state the action applies to.
    NoEligibleActuators,
    /// Another window in the same area still reads open.
    PeerWindowOpen(EntityId),
    /// The desired target is itself off.
    TargetOff,
    /// The desired target carries no attribute.
    NothingToRestore,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stale => f.write_str("reading changed before the delay elapsed"),
            Self::NoArea => f.write_str("sensor has no area"),
            Self::NoEligibleActuators => f.write_str("no eligible actuator in area"),
            Self::PeerWindowOpen(peer) => write!(f, "window {peer} still open"),
            Self::TargetOff => f.write_str("desired target is off"),
            Self::NothingToRestore => f.write_str("desired target is empty"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowControlMode {
    #[default]
    Off,
    /// Group-wide control; accepted but not driven by the area controller.
    Legacy,
    AreaBased,
}
