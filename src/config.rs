//! Controller Configuration
//!
//! Static settings fixed for the lifetime of a controller run: canvas
//! geometry, frame pacing, output gamma and where durable state lives.
//! Loaded from an optional JSON file; missing fields take their defaults.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{LightstackError, Result};

/// Controller-wide settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Canvas width in pixels
    pub width: u32,
    /// Canvas height in pixels
    pub height: u32,
    /// Target period between frame starts
    pub frame_period_ms: u64,
    /// Number of frame periods averaged for the framerate statistic
    pub framerate_window: usize,
    /// Output gamma exponent; 1.0 disables correction
    pub gamma: f64,
    /// Root directory of durable state
    pub storage_root: PathBuf,
    /// Interval of the diagnostics report
    pub diagnostics_period_secs: u64,
    /// Stall timeout of the liveness watchdog (0 disables it)
    pub watchdog_timeout_ms: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            width: 22,
            height: 13,
            frame_period_ms: 30,
            framerate_window: 10,
            gamma: 2.2,
            storage_root: PathBuf::from("runtime"),
            diagnostics_period_secs: 5,
            watchdog_timeout_ms: 5000,
        }
    }
}

impl ControllerConfig {
    /// Load from `path`, or use defaults when no path is given
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => {
                let text = fs::read_to_string(path).map_err(|e| LightstackError::Config {
                    reason: format!("cannot read {}: {}", path.display(), e),
                })?;
                let config: Self = serde_json::from_str(&text).map_err(|e| LightstackError::Config {
                    reason: format!("cannot parse {}: {}", path.display(), e),
                })?;
                debug!(path = %path.display(), "configuration loaded");
                config
            }
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(LightstackError::Config {
                reason: format!("canvas geometry {}x{} is empty", self.width, self.height),
            });
        }
        if self.frame_period_ms == 0 {
            return Err(LightstackError::Config {
                reason: "frame_period_ms must be positive".to_string(),
            });
        }
        if self.framerate_window == 0 {
            return Err(LightstackError::Config {
                reason: "framerate_window must be positive".to_string(),
            });
        }
        if !(self.gamma.is_finite() && self.gamma > 0.0) {
            return Err(LightstackError::Config {
                reason: format!("gamma {} must be a positive number", self.gamma),
            });
        }
        Ok(())
    }

    pub fn frame_period(&self) -> Duration {
        Duration::from_millis(self.frame_period_ms)
    }

    pub fn diagnostics_period(&self) -> Duration {
        Duration::from_secs(self.diagnostics_period_secs.max(1))
    }

    /// Watchdog timeout, if enabled
    pub fn watchdog_timeout(&self) -> Option<Duration> {
        (self.watchdog_timeout_ms > 0).then(|| Duration::from_millis(self.watchdog_timeout_ms))
    }
}
