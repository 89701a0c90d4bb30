//! Configuration for CNCRelay
//!
//! Aggregates the tuning of every engine component into one document that
//! can be stored as JSON or TOML. Each section is the component's own config
//! type, so a missing section or key falls back to that component's default.

use cncrelay_communication::{DispatchConfig, JogConfig, LineTransportConfig, TransferConfig};
use cncrelay_gcode::{AxisLimits, EstimatorConfig, ResumeOptions};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{SettingsError, SettingsResult};

const CONFIG_DIR_NAME: &str = "cncrelay";
const CONFIG_FILE_NAME: &str = "config.toml";

/// Controller connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionSettings {
    /// `host:port` of the controller's TCP bridge
    pub address: String,
    /// Line protocol tuning
    pub transport: LineTransportConfig,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:23".to_string(),
            transport: LineTransportConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Json,
    Toml,
}

impl Format {
    fn from_path(path: &Path) -> SettingsResult<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Ok(Self::Json),
            Some("toml") => Ok(Self::Toml),
            other => Err(SettingsError::UnsupportedFormat(
                other.unwrap_or("<none>").to_string(),
            )),
        }
    }
}

/// Complete engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Controller connection
    pub connection: ConnectionSettings,
    /// Continuous jog sessions
    pub jog: JogConfig,
    /// Binary file transfer
    pub transfer: TransferConfig,
    /// Command dispatch policy
    pub dispatch: DispatchConfig,
    /// Job resume sequence
    pub resume: ResumeOptions,
    /// Motion-time estimation
    pub estimator: EstimatorConfig,
}

impl Config {
    /// Create new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Default location: `<platform config dir>/cncrelay/config.toml`
    pub fn default_path() -> SettingsResult<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
            .ok_or_else(|| {
                SettingsError::ConfigDirectory("no platform config directory".to_string())
            })
    }

    /// Load config from file (JSON or TOML, by extension)
    pub fn load_from_file(path: &Path) -> SettingsResult<Self> {
        let format = Format::from_path(path)?;
        let content = std::fs::read_to_string(path)?;

        let config: Self = match format {
            Format::Json => serde_json::from_str(&content)?,
            Format::Toml => toml::from_str(&content)?,
        };

        config.validate()?;
        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Load config from file, or defaults when the file does not exist
    pub fn load_or_default(path: &Path) -> SettingsResult<Self> {
        if path.exists() {
            Self::load_from_file(path)
        } else {
            tracing::info!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Save config to file (JSON or TOML, by extension)
    pub fn save_to_file(&self, path: &Path) -> SettingsResult<()> {
        self.validate()?;
        let format = Format::from_path(path)?;

        let content = match format {
            Format::Json => serde_json::to_string_pretty(self)?,
            Format::Toml => toml::to_string_pretty(self)?,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                SettingsError::ConfigDirectory(format!("{}: {}", parent.display(), e))
            })?;
        }
        std::fs::write(path, content)?;
        tracing::debug!("Saved config to {}", path.display());
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> SettingsResult<()> {
        // Connection
        if self.connection.address.trim().is_empty() {
            return Err(SettingsError::invalid("connection.address", "must not be empty"));
        }
        positive_ms(
            "connection.transport.ack_timeout_ms",
            self.connection.transport.ack_timeout_ms,
        )?;
        positive_ms(
            "connection.transport.continuous_watchdog_ms",
            self.connection.transport.continuous_watchdog_ms,
        )?;

        // Jog
        positive_ms("jog.heartbeat_timeout_ms", self.jog.heartbeat_timeout_ms)?;
        positive_ms("jog.max_duration_ms", self.jog.max_duration_ms)?;

        // Transfer
        positive_ms("transfer.byte_timeout_ms", self.transfer.byte_timeout_ms)?;
        positive_ms("transfer.cancel_drain_ms", self.transfer.cancel_drain_ms)?;
        if self.transfer.max_attempts == 0 {
            return Err(SettingsError::invalid("transfer.max_attempts", "must be at least 1"));
        }

        // Resume
        non_negative("resume.safe_height", self.resume.safe_height)?;
        positive("resume.plunge_feed", self.resume.plunge_feed)?;
        non_negative("resume.spindle_delay_sec", self.resume.spindle_delay_sec)?;

        // Estimator
        positive("estimator.default_rapid_rate", self.estimator.default_rapid_rate)?;
        positive("estimator.default_feed_rate", self.estimator.default_feed_rate)?;
        axis_limits("estimator.max_rate", &self.estimator.max_rate)?;
        axis_limits("estimator.max_accel", &self.estimator.max_accel)?;
        if let Some(jd) = self.estimator.junction_deviation {
            positive("estimator.junction_deviation", jd)?;
        }

        Ok(())
    }
}

fn positive_ms(key: &str, value: u64) -> SettingsResult<()> {
    if value == 0 {
        return Err(SettingsError::invalid(key, "must be > 0"));
    }
    Ok(())
}

fn positive(key: &str, value: f64) -> SettingsResult<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(SettingsError::invalid(key, "must be a finite number > 0"));
    }
    Ok(())
}

fn non_negative(key: &str, value: f64) -> SettingsResult<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(SettingsError::invalid(key, "must be a finite number >= 0"));
    }
    Ok(())
}

fn axis_limits(key: &str, limits: &AxisLimits) -> SettingsResult<()> {
    for (axis, value) in [("x", limits.x), ("y", limits.y), ("z", limits.z)] {
        if let Some(value) = value {
            positive(&format!("{}.{}", key, axis), value)?;
        }
    }
    Ok(())
}
