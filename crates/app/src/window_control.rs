//! Area-based window control.
//!
//! When a window opens and stays open for the open delay, the actuators in
//! the window's area are turned off. When every window of that area is
//! closed again for the close delay, those actuators are restored to the
//! group's target state.

pub mod controller;
pub mod timer;

pub use controller::{ControllerConfig, Evaluation, WindowAreaController};
pub use timer::{TimerFired, WindowTimerManager};
