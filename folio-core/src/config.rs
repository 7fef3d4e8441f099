use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::analyzer::DEFAULT_READING_SPEED_WPM;
use crate::settings::Settings;

/// Pixel height of the bars a host draws around the reading area.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChromeConfig {
    pub status_bar_px: f32,
    pub progress_bar_px: f32,
}

impl Default for ChromeConfig {
    fn default() -> Self {
        Self {
            status_bar_px: 40.0,
            progress_bar_px: 30.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub settings: Settings,
    pub chrome: ChromeConfig,
    pub reading_speed_wpm: u32,
    /// Keep the reader in the transitioning state until the host calls
    /// `finish_transition`, so page turns can be animated.
    pub animated_transitions: bool,
    pub resize_debounce_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            settings: Settings::default(),
            chrome: ChromeConfig::default(),
            reading_speed_wpm: DEFAULT_READING_SPEED_WPM,
            animated_transitions: false,
            resize_debounce_ms: 300,
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let mut config: EngineConfig =
            toml::from_str(raw).context("failed to parse engine configuration")?;
        config.reading_speed_wpm = config.reading_speed_wpm.max(1);
        Ok(config)
    }

    /// Loads `path`, falling back to defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {:?}", path))?;
        Self::from_toml_str(&raw).with_context(|| format!("invalid config file {:?}", path))
    }
}
