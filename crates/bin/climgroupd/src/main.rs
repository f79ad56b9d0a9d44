//! # climgroupd — climate group window-control daemon
//!
//! Composition root that wires the virtual home, the dispatcher and the
//! window-area controller together and runs them.
//!
//! ## Responsibilities
//! - Load configuration (`climgroup.toml`, env vars)
//! - Initialise `tracing`
//! - Build the virtual home from the configured layout
//! - Construct the shared target state and the window-control dispatcher
//! - Read operator commands from stdin (see [`console`])
//! - Run the window-area controller until Ctrl-C, then tear down timers and
//!   stop the dispatcher
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer — no domain logic belongs here.

mod config;
mod console;

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use climgroup_adapter_virtual::VirtualHome;
use climgroup_app::dispatcher::DispatcherHandle;
use climgroup_app::event_bus::InProcessEventBus;
use climgroup_app::services::SharedTargetState;
use climgroup_app::window_control::WindowAreaController;
use climgroup_domain::area::Area;
use climgroup_domain::entity::EntityRegistration;
use climgroup_domain::error::ClimGroupError;
use climgroup_domain::hvac::HvacMode;

use crate::config::{Config, HomeConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load().context("failed to load configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&config.logging.filter).context("invalid log filter")?,
        )
        .init();

    // Virtual home
    let bus = InProcessEventBus::new(256);
    let home = Arc::new(
        build_home(&config.home, config.initial_hvac_mode(), bus)
            .context("invalid home layout")?,
    );
    let events = home.subscribe();

    // Window control
    let target = SharedTargetState::new(config.initial_target());
    let dispatcher = DispatcherHandle::spawn(
        config.dispatcher_config(),
        Arc::clone(&home),
        Arc::clone(&home),
        target.clone(),
        Arc::clone(&home),
    );
    let mut controller = WindowAreaController::new(
        config.controller_config(),
        Arc::clone(&home),
        Arc::clone(&home),
        Arc::clone(&home),
        target.clone(),
        dispatcher.clone(),
    );

    // Operator console
    let lines = console::spawn_stdin_reader().context("failed to start console")?;
    let console = tokio::spawn(console::run(lines, Arc::clone(&home), target.clone()));

    tracing::info!(
        areas = home.areas().len(),
        windows = home.window_ids().len(),
        "climgroupd running, press Ctrl-C to stop"
    );
    controller.run(events, shutdown_signal()).await;
    console.abort();
    dispatcher.shutdown();

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(%err, "failed to listen for Ctrl-C");
    }
}

fn build_home(
    layout: &HomeConfig,
    mode: HvacMode,
    bus: InProcessEventBus,
) -> Result<VirtualHome, ClimGroupError> {
    let mut builder = VirtualHome::builder();
    for area in &layout.areas {
        let mut area_builder = Area::builder().id(area.id.clone());
        if let Some(name) = &area.name {
            area_builder = area_builder.name(name);
        }
        builder = builder.area(area_builder.build()?);
        for window in &area.windows {
            builder = builder
                .window(EntityRegistration::orphan(window.clone()).with_area(area.id.clone()));
        }
        for thermostat in &area.thermostats {
            builder = builder.thermostat(
                EntityRegistration::orphan(thermostat.clone()).with_area(area.id.clone()),
                mode,
            );
        }
    }
    for thermostat in &layout.unassigned_thermostats {
        builder = builder.thermostat(EntityRegistration::orphan(thermostat.clone()), mode);
    }
    builder.build(bus)
}
