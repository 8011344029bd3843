//! TOML (and legacy JSON) configuration.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::control::Timing;
use crate::devices::{DutyCurve, DutyMode, OutputSpec};

/// Top-level configuration.
///
/// Every section and field has a default, filled field by field: a file
/// that only sets `mqtt.host` keeps the default client id, topics and
/// intervals. Load with [`WattConfig::from_file`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WattConfig {
    /// Bus connection and topic root.
    pub mqtt: MqttConfig,
    /// Optimization throttling.
    pub optimize: OptimizeConfig,
    /// Heartbeat, reporting and shutdown timing.
    pub timing: TimingConfig,
    /// Controllable outputs, in any order.
    pub outputs: Vec<OutputConfig>,
}

/// Bus connection parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MqttConfig {
    /// Client id, also the root of every topic.
    #[serde(alias = "clientid")]
    pub client_id: String,
    /// Broker URL.
    pub host: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Extra topic on which available power is accepted, besides `<client_id>/input`.
    #[serde(alias = "powerTopic")]
    pub power_topic: Option<String>,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            client_id: "wattmgr".to_string(),
            host: "tcp://localhost".to_string(),
            username: None,
            password: None,
            power_topic: None,
        }
    }
}

/// Optimization throttling.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OptimizeConfig {
    /// Minimum seconds between two optimization passes.
    #[serde(alias = "interval")]
    pub interval_secs: u64,
}

impl Default for OptimizeConfig {
    fn default() -> Self {
        Self { interval_secs: 15 }
    }
}

/// Heartbeat, reporting and shutdown timing.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimingConfig {
    /// Heartbeat tick period (ms, must be > 0).
    pub tick_ms: u64,
    /// Seconds between two liveness announcements.
    pub alive_interval_secs: u64,
    /// Seconds between two available-vs-consumed reports.
    pub report_interval_secs: u64,
    /// Delay between closing every output and disconnecting (ms).
    pub stop_grace_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            tick_ms: 5_000,
            alive_interval_secs: 30 * 60,
            report_interval_secs: 60,
            stop_grace_ms: 1_000,
        }
    }
}

/// One controllable output.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    pub id: String,
    /// Lower is served first.
    pub priority: i32,
    /// Maximum power draw (kW).
    pub power: f32,
    /// Duty-cycle control. Defaults to on when `duty_fn` is given.
    #[serde(default, alias = "dcEnabled")]
    pub duty_enabled: Option<bool>,
    /// Measured `[level, power]` pairs, ascending by level.
    #[serde(default, alias = "dcFn")]
    pub duty_fn: Option<Vec<(u8, f32)>>,
    /// Extra topic that also receives the enabled state.
    #[serde(default, alias = "statusTopic")]
    pub status_topic: Option<String>,
    /// Extra topic that also receives the duty level.
    #[serde(default, alias = "dcTopic")]
    pub dc_topic: Option<String>,
}

impl OutputConfig {
    /// Converts to the static description an output is built from.
    pub fn to_spec(&self) -> OutputSpec {
        OutputSpec {
            id: self.id.clone(),
            priority: self.priority,
            max_kw: self.power,
            duty: DutyMode::from_config(
                self.duty_enabled,
                self.duty_fn.as_ref().map(|f| DutyCurve::new(f.iter().copied())),
            ),
        }
    }
}

/// Configuration error with field path and constraint description.
#[derive(Debug, thiserror::Error)]
#[error("config error: {field}: {message}")]
pub struct ConfigError {
    /// Dotted field path (e.g., `"outputs[2].power"`).
    pub field: String,
    /// Human-readable constraint description.
    pub message: String,
}

impl ConfigError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl WattConfig {
    /// Loads a configuration file; `.json` files are parsed as JSON, anything
    /// else as TOML.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| {
            ConfigError::new("config", format!("cannot read \"{}\": {e}", path.display()))
        })?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            Self::from_json_str(&content)
        } else {
            Self::from_toml_str(&content)
        }
    }

    /// Parses a configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the TOML is invalid or contains unknown fields.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::new("toml", e.to_string()))
    }

    /// Parses a configuration from a JSON string (camelCase keys accepted).
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the JSON is invalid or contains unknown fields.
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(s).map_err(|e| ConfigError::new("json", e.to_string()))
    }

    /// Allocator timing derived from the `optimize` and `timing` sections.
    pub fn timing(&self) -> Timing {
        Timing {
            optimize_interval_ms: self.optimize.interval_secs.saturating_mul(1000),
            report_interval_ms: self.timing.report_interval_secs.saturating_mul(1000),
            alive_interval_ms: self.timing.alive_interval_secs.saturating_mul(1000),
            tick_ms: self.timing.tick_ms,
            stop_grace_ms: self.timing.stop_grace_ms,
        }
    }

    /// Validates all fields and returns a list of errors.
    ///
    /// Returns an empty vector if configuration is valid. Duty curve power
    /// values are not checked for monotonicity.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.mqtt.client_id.trim().is_empty() {
            errors.push(ConfigError::new("mqtt.client_id", "must not be empty"));
        }
        if self.timing.tick_ms == 0 {
            errors.push(ConfigError::new("timing.tick_ms", "must be > 0"));
        }

        let mut seen = HashSet::new();
        for (i, o) in self.outputs.iter().enumerate() {
            let at = |field: &str| format!("outputs[{i}].{field}");

            if o.id.trim().is_empty() {
                errors.push(ConfigError::new(at("id"), "must not be empty"));
            } else if o.id.contains(['/', '+', '#']) {
                errors.push(ConfigError::new(
                    at("id"),
                    format!("\"{}\" must not contain '/', '+' or '#'", o.id),
                ));
            } else if !seen.insert(o.id.as_str()) {
                errors.push(ConfigError::new(
                    at("id"),
                    format!("duplicate output id \"{}\"", o.id),
                ));
            }

            if !o.power.is_finite() || o.power < 0.0 {
                errors.push(ConfigError::new(at("power"), "must be a finite value >= 0"));
            }

            let Some(points) = &o.duty_fn else {
                continue;
            };
            if o.duty_enabled == Some(false) && !points.is_empty() {
                errors.push(ConfigError::new(
                    at("duty_fn"),
                    "given but duty_enabled = false",
                ));
            }
            for (j, &(level, power)) in points.iter().enumerate() {
                if level > 100 {
                    errors.push(ConfigError::new(
                        format!("outputs[{i}].duty_fn[{j}]"),
                        format!("level {level} must be in [0, 100]"),
                    ));
                }
                if !power.is_finite() || power < 0.0 {
                    errors.push(ConfigError::new(
                        format!("outputs[{i}].duty_fn[{j}]"),
                        "power must be a finite value >= 0",
                    ));
                }
            }
            if points.windows(2).any(|w| w[0].0 >= w[1].0) {
                errors.push(ConfigError::new(
                    at("duty_fn"),
                    "levels must be strictly ascending",
                ));
            }
        }

        errors
    }
}
