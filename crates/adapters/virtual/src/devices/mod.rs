//! Virtual device implementations — window contacts and thermostats.

mod thermostat;
mod window;

pub use thermostat::{ThermostatFault, VirtualThermostat};
pub use window::VirtualWindow;
