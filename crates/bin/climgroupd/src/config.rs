//! Configuration loading — TOML file with environment variable overrides.
//!
//! Looks for `climgroup.toml` in the working directory. Every field has a
//! sensible default so the file is optional. Environment variables take
//! precedence over file values.

use std::time::Duration;

use serde::Deserialize;

use climgroup_app::dispatcher::DispatcherConfig;
use climgroup_app::window_control::ControllerConfig;
use climgroup_domain::context::CallOrigin;
use climgroup_domain::hvac::HvacMode;
use climgroup_domain::id::{AreaId, EntityId};
use climgroup_domain::target::{StateFragment, TargetState};
use climgroup_domain::window::WindowControlMode;

const MAX_OPEN_DELAY_SECS: u64 = 120;
const MAX_CLOSE_DELAY_SECS: u64 = 300;
const MAX_DEBOUNCE_SECS: f64 = 10.0;
const MAX_RETRY_ATTEMPTS: u32 = 5;
const MAX_RETRY_DELAY_SECS: f64 = 10.0;
const MIN_TEMP_OFF_RANGE: std::ops::RangeInclusive<f64> = 0.0..=35.0;

/// Top-level configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Window sensors and their delays.
    pub window_control: WindowControlConfig,
    /// Dispatcher debounce and retry settings.
    pub timings: TimingsConfig,
    /// Initial desired state of the group.
    pub target: StateFragment,
    /// Layout of the virtual home.
    pub home: HomeConfig,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

/// Window control configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct WindowControlConfig {
    pub mode: WindowControlMode,
    /// Monitored window sensors.
    pub window_sensors: Vec<EntityId>,
    /// How long a window must stay open before its area is turned off.
    pub open_delay_secs: u64,
    /// How long a window must stay closed before its area is restored.
    pub close_delay_secs: u64,
    /// Setpoint sent along with every window-triggered turn-off.
    pub min_temp_off: Option<f64>,
}

/// Dispatcher timings.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct TimingsConfig {
    pub debounce_delay_secs: f64,
    /// Attempts after the first one when a mode change is not confirmed.
    pub retry_attempts: u32,
    pub retry_delay_secs: f64,
}

/// Virtual home layout.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct HomeConfig {
    pub areas: Vec<AreaConfig>,
    /// Member thermostats not assigned to any area.
    pub unassigned_thermostats: Vec<EntityId>,
}

/// One area of the virtual home.
#[derive(Debug, Deserialize)]
pub struct AreaConfig {
    pub id: AreaId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub windows: Vec<EntityId>,
    #[serde(default)]
    pub thermostats: Vec<EntityId>,
}

impl Config {
    /// Load configuration from `climgroup.toml` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if the
    /// resulting configuration is out of range.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_file("climgroup.toml")?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("CLIMGROUP_OPEN_DELAY")
            && let Ok(secs) = val.parse()
        {
            self.window_control.open_delay_secs = secs;
        }
        if let Ok(val) = std::env::var("CLIMGROUP_CLOSE_DELAY")
            && let Ok(secs) = val.parse()
        {
            self.window_control.close_delay_secs = secs;
        }
        if let Ok(val) = std::env::var("CLIMGROUP_LOG") {
            self.logging.filter = val;
        }
        if let Ok(val) = std::env::var("RUST_LOG") {
            self.logging.filter = val;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let window = &self.window_control;
        if window.open_delay_secs > MAX_OPEN_DELAY_SECS {
            return Err(ConfigError::Validation(format!(
                "open_delay_secs must be at most {MAX_OPEN_DELAY_SECS}"
            )));
        }
        if window.close_delay_secs > MAX_CLOSE_DELAY_SECS {
            return Err(ConfigError::Validation(format!(
                "close_delay_secs must be at most {MAX_CLOSE_DELAY_SECS}"
            )));
        }
        if window.mode == WindowControlMode::AreaBased && window.window_sensors.is_empty() {
            return Err(ConfigError::Validation(
                "area_based window control needs at least one window sensor".to_string(),
            ));
        }
        if let Some(blank) = window
            .window_sensors
            .iter()
            .find(|sensor| sensor.as_str().trim().is_empty())
        {
            return Err(ConfigError::Validation(format!(
                "invalid window sensor id {:?}",
                blank.as_str()
            )));
        }

        if let Some(min_temp) = window.min_temp_off
            && !MIN_TEMP_OFF_RANGE.contains(&min_temp)
        {
            return Err(ConfigError::Validation(format!(
                "min_temp_off must be between {} and {}",
                MIN_TEMP_OFF_RANGE.start(),
                MIN_TEMP_OFF_RANGE.end()
            )));
        }

        let timings = &self.timings;
        if !(0.0..=MAX_DEBOUNCE_SECS).contains(&timings.debounce_delay_secs) {
            return Err(ConfigError::Validation(format!(
                "debounce_delay_secs must be between 0 and {MAX_DEBOUNCE_SECS}"
            )));
        }
        if timings.retry_attempts > MAX_RETRY_ATTEMPTS {
            return Err(ConfigError::Validation(format!(
                "retry_attempts must be at most {MAX_RETRY_ATTEMPTS}"
            )));
        }
        if !(0.0..=MAX_RETRY_DELAY_SECS).contains(&timings.retry_delay_secs) {
            return Err(ConfigError::Validation(format!(
                "retry_delay_secs must be between 0 and {MAX_RETRY_DELAY_SECS}"
            )));
        }
        Ok(())
    }

    /// Controller settings for the configured sensors and delays.
    #[must_use]
    pub fn controller_config(&self) -> ControllerConfig {
        let window = &self.window_control;
        ControllerConfig {
            mode: window.mode,
            window_sensors: window.window_sensors.clone(),
            open_delay: Duration::from_secs(window.open_delay_secs),
            close_delay: Duration::from_secs(window.close_delay_secs),
        }
    }

    /// Settings of the window-control dispatcher.
    #[must_use]
    pub fn dispatcher_config(&self) -> DispatcherConfig {
        let config = DispatcherConfig::new(CallOrigin::WindowControl)
            .with_debounce(seconds(self.timings.debounce_delay_secs))
            .with_retry(
                self.timings.retry_attempts,
                seconds(self.timings.retry_delay_secs),
            );
        match self.window_control.min_temp_off {
            Some(min_temp) => config.with_min_temp_off(min_temp),
            None => config,
        }
    }

    /// The desired state the group starts with.
    #[must_use]
    pub fn initial_target(&self) -> TargetState {
        TargetState::new(self.target.clone())
    }

    /// Mode the virtual thermostats start in.
    #[must_use]
    pub fn initial_hvac_mode(&self) -> HvacMode {
        self.target.hvac_mode.unwrap_or(HvacMode::Heat)
    }
}

fn seconds(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or_default()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            logging: LoggingConfig::default(),
            window_control: WindowControlConfig::default(),
            timings: TimingsConfig::default(),
            target: StateFragment::hvac(HvacMode::Heat).with_temperature(21.0),
            home: HomeConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "climgroupd=info,climgroup_app=info".to_string(),
        }
    }
}

impl Default for WindowControlConfig {
    fn default() -> Self {
        Self {
            mode: WindowControlMode::default(),
            window_sensors: Vec::new(),
            open_delay_secs: 15,
            close_delay_secs: 30,
            min_temp_off: None,
        }
    }
}

impl Default for TimingsConfig {
    fn default() -> Self {
        Self {
            debounce_delay_secs: 0.0,
            retry_attempts: 1,
            retry_delay_secs: 2.5,
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}
