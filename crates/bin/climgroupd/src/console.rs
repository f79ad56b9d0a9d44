//! Operator console — one command per line on stdin, driving the virtual
//! home by hand.
//!
//! Stdin is read on a plain OS thread and forwarded over a channel, so a
//! pending read never holds up runtime shutdown.

use std::io::BufRead;
use std::sync::Arc;

use tokio::sync::mpsc;

use climgroup_adapter_virtual::VirtualHome;
use climgroup_app::ports::{MemberProvider, StateReader};
use climgroup_app::services::SharedTargetState;
use climgroup_domain::context::CallOrigin;
use climgroup_domain::entity::EntityState;
use climgroup_domain::error::{ClimGroupError, ValidationError};
use climgroup_domain::hvac::HvacMode;
use climgroup_domain::id::EntityId;
use climgroup_domain::target::StateFragment;

const HELP: &str = "open <window> | close <window> | report <window> <state> | \
                    mode <thermostat> <hvac_mode> | target <hvac_mode> [temperature] | \
                    status | help";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Open(EntityId),
    Close(EntityId),
    /// Make a window report a raw state such as `unavailable`.
    Report(EntityId, EntityState),
    /// Change a thermostat's mode at the device.
    Mode(EntityId, HvacMode),
    /// Change the group's desired state.
    Target(StateFragment),
    Status,
    Help,
}

#[derive(Debug, thiserror::Error)]
pub enum ConsoleError {
    #[error("empty command")]
    Empty,
    #[error("unknown command {0:?}, try `help`")]
    Unknown(String),
    #[error("usage: {0}")]
    Usage(&'static str),
    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

impl Command {
    /// Parse one console line.
    ///
    /// # Errors
    ///
    /// Returns a [`ConsoleError`] for blank lines, unknown verbs, missing
    /// arguments and ids or states that do not parse.
    pub fn parse(line: &str) -> Result<Self, ConsoleError> {
        let mut words = line.split_whitespace();
        let verb = words.next().ok_or(ConsoleError::Empty)?;
        let mut arg = |usage| words.next().ok_or(ConsoleError::Usage(usage));
        let command = match verb {
            "open" => Self::Open(EntityId::new(arg("open <window>")?)?),
            "close" => Self::Close(EntityId::new(arg("close <window>")?)?),
            "report" => {
                const USAGE: &str = "report <window> <state>";
                let window = EntityId::new(arg(USAGE)?)?;
                Self::Report(window, arg(USAGE)?.parse()?)
            }
            "mode" => {
                const USAGE: &str = "mode <thermostat> <hvac_mode>";
                let thermostat = EntityId::new(arg(USAGE)?)?;
                Self::Mode(thermostat, arg(USAGE)?.parse()?)
            }
            "target" => {
                const USAGE: &str = "target <hvac_mode> [temperature]";
                let mut fragment = StateFragment::hvac(arg(USAGE)?.parse()?);
                if let Some(raw) = words.next() {
                    let temperature = raw.parse().map_err(|_| ConsoleError::Usage(USAGE))?;
                    fragment = fragment.with_temperature(temperature);
                }
                Self::Target(fragment)
            }
            "status" => Self::Status,
            "help" => Self::Help,
            other => return Err(ConsoleError::Unknown(other.to_string())),
        };
        Ok(command)
    }
}

/// Forward stdin lines until EOF or until the receiver is dropped.
///
/// # Errors
///
/// Returns an error if the reader thread cannot be spawned.
pub fn spawn_stdin_reader() -> std::io::Result<mpsc::Receiver<String>> {
    let (tx, rx) = mpsc::channel(16);
    std::thread::Builder::new()
        .name("console".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if tx.blocking_send(line).is_err() {
                    break;
                }
            }
        })?;
    Ok(rx)
}

/// Execute console lines until the input closes.
pub async fn run(
    mut lines: mpsc::Receiver<String>,
    home: Arc<VirtualHome>,
    target: SharedTargetState,
) {
    tracing::info!("console ready, type `help` for commands");
    while let Some(line) = lines.recv().await {
        match Command::parse(&line) {
            Ok(command) => {
                if let Err(err) = execute(&home, &target, command).await {
                    tracing::warn!(%err, "console command failed");
                }
            }
            Err(ConsoleError::Empty) => {}
            Err(err) => tracing::warn!(%err, "invalid console command"),
        }
    }
    tracing::debug!("console input closed");
}

/// Apply one command to the virtual home or the target state.
///
/// # Errors
///
/// Returns an error when the addressed window or thermostat does not exist.
pub async fn execute(
    home: &VirtualHome,
    target: &SharedTargetState,
    command: Command,
) -> Result<(), ClimGroupError> {
    match command {
        Command::Open(window) => home.set_window(&window, true).await,
        Command::Close(window) => home.set_window(&window, false).await,
        Command::Report(window, state) => home.report_window(&window, state).await,
        Command::Mode(thermostat, mode) => home.set_thermostat_mode(&thermostat, mode).await,
        Command::Target(fragment) => {
            if target.update(CallOrigin::Group, None, &fragment) {
                tracing::info!(desired = ?target.snapshot().attributes, "target updated");
            }
            Ok(())
        }
        Command::Status => {
            let snapshot = target.snapshot();
            tracing::info!(
                desired = ?snapshot.attributes,
                source = ?snapshot.provenance.map(|p| p.source),
                "target state"
            );
            for window in home.window_ids() {
                tracing::info!(window = %window, state = %home.state(&window), "window");
            }
            for thermostat in home.member_ids().unwrap_or_default() {
                tracing::info!(
                    thermostat = %thermostat,
                    state = %home.state(&thermostat),
                    attributes = ?home.thermostat_attributes(&thermostat),
                    "thermostat"
                );
            }
            Ok(())
        }
        Command::Help => {
            tracing::info!("commands: {HELP}");
            Ok(())
        }
    }
}
