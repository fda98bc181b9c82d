use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::{slog_debug, Error, Result};

pub const DEFAULT_MIN_CYCLE_MS: u64 = 4000;
pub const DEFAULT_MAX_CYCLE_MS: u64 = 6000;
pub const DEFAULT_TICK_MS: u64 = 1;
pub const DEFAULT_STALL_THRESHOLD_MS: u64 = 1000;

/// Timing configuration for a traffic light.
///
/// Every field is optional in the TOML file; missing fields fall back to the
/// defaults above.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightConfig {
    /// Lower bound (inclusive) of a randomized phase duration.
    pub min_cycle_ms: u64,
    /// Upper bound (inclusive) of a randomized phase duration.
    pub max_cycle_ms: u64,
    /// Sleep between two timer iterations. Bounds how late a toggle can be.
    pub tick_ms: u64,
    /// Heartbeat age after which a running light is reported as stalled.
    pub stall_threshold_ms: u64,
    /// Fixed RNG seed for reproducible phase durations.
    pub seed: Option<u64>,
}

impl Default for LightConfig {
    fn default() -> Self {
        Self {
            min_cycle_ms: DEFAULT_MIN_CYCLE_MS,
            max_cycle_ms: DEFAULT_MAX_CYCLE_MS,
            tick_ms: DEFAULT_TICK_MS,
            stall_threshold_ms: DEFAULT_STALL_THRESHOLD_MS,
            seed: None,
        }
    }
}

impl LightConfig {
    pub fn stoplight_dir() -> Result<PathBuf> {
        Ok(dirs::home_dir().ok_or(Error::NoHomeDir)?.join(".stoplight"))
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::stoplight_dir()?.join("stoplight.toml"))
    }

    pub fn with_cycle_range(mut self, min_ms: u64, max_ms: u64) -> Self {
        self.min_cycle_ms = min_ms;
        self.max_cycle_ms = max_ms;
        self
    }

    pub fn with_tick(mut self, tick_ms: u64) -> Self {
        self.tick_ms = tick_ms;
        self
    }

    pub fn with_stall_threshold(mut self, threshold_ms: u64) -> Self {
        self.stall_threshold_ms = threshold_ms;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn stall_threshold(&self) -> Duration {
        Duration::from_millis(self.stall_threshold_ms)
    }

    /// Longest possible red+green round trip.
    pub fn max_round_trip(&self) -> Duration {
        Duration::from_millis(self.max_cycle_ms.saturating_mul(2))
    }

    pub fn validate(&self) -> Result<()> {
        if self.min_cycle_ms == 0 {
            return Err(Error::Validation("min_cycle_ms must be > 0".into()));
        }
        if self.min_cycle_ms > self.max_cycle_ms {
            return Err(Error::Validation(format!(
                "min_cycle_ms ({}) must not exceed max_cycle_ms ({})",
                self.min_cycle_ms, self.max_cycle_ms
            )));
        }
        if self.tick_ms == 0 {
            return Err(Error::Validation("tick_ms must be > 0".into()));
        }
        if self.tick_ms >= self.min_cycle_ms {
            return Err(Error::Validation(format!(
                "tick_ms ({}) must be smaller than min_cycle_ms ({})",
                self.tick_ms, self.min_cycle_ms
            )));
        }
        if self.stall_threshold_ms <= self.tick_ms {
            return Err(Error::Validation(format!(
                "stall_threshold_ms ({}) must exceed tick_ms ({})",
                self.stall_threshold_ms, self.tick_ms
            )));
        }
        Ok(())
    }

    /// Load from ~/.stoplight/stoplight.toml, or defaults if it is absent.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        slog_debug!("LightConfig::load path={}", path.display());
        if !path.exists() {
            slog_debug!("Config file not found, using defaults");
            return Ok(Self::default());
        }
        let config: Self = toml::from_str(&fs::read_to_string(path)?)?;
        config.validate()?;
        slog_debug!(
            "Config loaded: cycle={}..={}ms tick={}ms stall={}ms seed={:?}",
            config.min_cycle_ms,
            config.max_cycle_ms,
            config.tick_ms,
            config.stall_threshold_ms,
            config.seed
        );
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        self.validate()?;
        if let Some(dir) = path.parent() {
            if !dir.exists() {
                slog_debug!("Creating config directory: {}", dir.display());
                fs::create_dir_all(dir)?;
            }
        }
        fs::write(path, toml::to_string_pretty(self)?)?;
        slog_debug!("Config saved to {}", path.display());
        Ok(())
    }
}
