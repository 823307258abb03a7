// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! Configuration module

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use crate::camera::VideoConstraints;
use crate::detection::{ScriptedModelConfig, Watchlist, WatchlistEntry};

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Application name
    pub app_name: String,

    /// Log level used when no CLI flag overrides it
    pub log_level: String,

    /// Sampling and classification
    pub monitor: MonitorConfig,

    /// Requested camera stream
    pub camera: VideoConstraints,

    /// Detection model
    pub detector: DetectorConfig,

    /// Simulated devices used by the headless runner
    pub simulation: SimulationConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_name: "ExamWatch".to_string(),
            log_level: "info".to_string(),
            monitor: MonitorConfig::default(),
            camera: VideoConstraints::default(),
            detector: DetectorConfig::default(),
            simulation: SimulationConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Load or create default configuration
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            let config = Self::default();

            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            config.save(path)?;
            Ok(config)
        }
    }

    /// Get configuration directory
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|d| d.join("examwatch"))
            .unwrap_or_else(|| PathBuf::from("./config"))
    }

    /// Get default configuration path
    pub fn default_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }
}

/// Rejected monitor configuration
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("tick interval must be greater than zero")]
    ZeroTickInterval,

    #[error("watchlist entry {index} has min_confidence {value} outside 0-1")]
    ConfidenceOutOfRange { index: usize, value: f32 },
}

/// Sampling loop configuration, immutable once a monitor is built
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Milliseconds between ticks
    pub tick_interval_ms: u64,

    /// Watched classes, evaluated in order
    pub watchlist: Vec<WatchlistEntry>,

    /// Watchdog for a single inference; unset or zero waits indefinitely
    pub inference_timeout_ms: Option<u64>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 1000,
            watchlist: vec![WatchlistEntry::contains("phone", 0.5)],
            inference_timeout_ms: Some(5000),
        }
    }
}

impl MonitorConfig {
    /// No watchdog
    pub fn new(tick_interval_ms: u64, watchlist: Vec<WatchlistEntry>) -> Self {
        Self {
            tick_interval_ms,
            watchlist,
            inference_timeout_ms: None,
        }
    }

    pub fn with_inference_timeout(mut self, timeout: Duration) -> Self {
        self.inference_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn inference_timeout(&self) -> Option<Duration> {
        self.inference_timeout_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }

    /// Reject unusable settings. An empty watchlist is allowed but logged.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::ZeroTickInterval);
        }

        for (index, entry) in self.watchlist.iter().enumerate() {
            if !(0.0..=1.0).contains(&entry.min_confidence) {
                return Err(ConfigError::ConfidenceOutOfRange {
                    index,
                    value: entry.min_confidence,
                });
            }
        }

        if self.watchlist.is_empty() {
            warn!("Watchlist is empty: no violation will ever be raised");
        }

        Ok(())
    }

    pub fn watchlist(&self) -> Watchlist {
        Watchlist::new(self.watchlist.clone())
    }
}

/// Detection model configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Model identifier
    pub model: String,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            model: "scripted".to_string(),
        }
    }
}

/// Which acquisition failure the simulated camera reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimulatedCameraFailure {
    AccessDenied,
    NoDevice,
}

/// Simulated devices
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Number of video tracks delivered on open
    pub tracks: usize,

    /// Permission prompt delay in milliseconds
    pub open_delay_ms: u64,

    /// Fail acquisition
    pub camera_failure: Option<SimulatedCameraFailure>,

    /// End the first track after this many seconds (unplug)
    pub unplug_after_secs: Option<u64>,

    /// Detection model behaviour
    pub model: ScriptedModelConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tracks: 1,
            open_delay_ms: 250,
            camera_failure: None,
            unplug_after_secs: None,
            model: ScriptedModelConfig {
                load_delay: Duration::from_millis(1500),
                load_error: None,
                latency: Duration::from_millis(120),
                phone_probability: 0.2,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_tick_interval_rejected() {
        let config = MonitorConfig::new(0, vec![WatchlistEntry::contains("phone", 0.5)]);
        assert_eq!(config.validate(), Err(ConfigError::ZeroTickInterval));
    }

    #[test]
    fn test_confidence_out_of_range_rejected() {
        let config = MonitorConfig::new(
            500,
            vec![
                WatchlistEntry::contains("phone", 0.5),
                WatchlistEntry::exact("book", 1.5),
            ],
        );
        assert_eq!(
            config.validate(),
            Err(ConfigError::ConfidenceOutOfRange { index: 1, value: 1.5 })
        );
    }

    #[test]
    fn test_empty_watchlist_is_valid() {
        let config = MonitorConfig::new(500, Vec::new());
        assert!(config.validate().is_ok());
        assert!(config.watchlist().is_empty());
    }

    #[test]
    fn test_zero_timeout_disables_watchdog() {
        let config = MonitorConfig {
            inference_timeout_ms: Some(0),
            ..Default::default()
        };
        assert_eq!(config.inference_timeout(), None);
        assert_eq!(
            MonitorConfig::default().inference_timeout(),
            Some(Duration::from_secs(5))
        );
        assert_eq!(
            MonitorConfig::new(100, Vec::new())
                .with_inference_timeout(Duration::from_millis(250))
                .inference_timeout(),
            Some(Duration::from_millis(250))
        );
    }

    #[test]
    fn test_load_or_create_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let created = Config::load_or_create(&path).unwrap();
        assert!(path.exists());
        assert_eq!(created.monitor, MonitorConfig::default());

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.monitor.tick_interval_ms, 1000);
        assert_eq!(loaded.camera, VideoConstraints::default());
        assert_eq!(loaded.simulation.model.latency, Duration::from_millis(120));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [monitor]
            tick_interval_ms = 250

            [[monitor.watchlist]]
            min_confidence = 0.4
            matcher = { exact = "cell phone" }
            "#,
        )
        .unwrap();

        assert_eq!(config.monitor.tick_interval_ms, 250);
        assert_eq!(config.monitor.watchlist, vec![WatchlistEntry::exact("cell phone", 0.4)]);
        assert_eq!(config.detector.model, "scripted");
        assert_eq!(config.simulation.tracks, 1);
    }
}
