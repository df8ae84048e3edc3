//! Configuration management for ClipPlayer
//!
//! This module handles loading and persisting player configuration from
//! a TOML file in the platform config directory, with environment
//! variable overrides. Engine timing constants are deliberately not
//! configurable; only user-facing playback preferences live here.

use crate::utils::error::{ClipPlayerError, Result};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Resolved user config file path, if the platform has a config dir
static USER_CONFIG_PATH: Lazy<Option<PathBuf>> =
    Lazy::new(|| dirs::config_dir().map(|p| p.join("clipplayer").join("config.toml")));

/// Main player configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Audio configuration
    pub audio: AudioConfig,

    /// Playback configuration
    pub playback: PlaybackConfig,

    /// General application settings
    pub general: GeneralConfig,
}

/// Audio configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Initial volume (0.0 - 1.0)
    pub volume: f32,

    /// Start muted
    pub muted: bool,

    /// Continue with video only if the audio device cannot be opened
    pub allow_video_only: bool,
}

/// Playback configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackConfig {
    /// Initial playback speed (0.0 exclusive to 4.0 inclusive)
    pub speed: f32,

    /// Show subtitles when a subtitle source is attached
    pub subtitles: bool,
}

/// General application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            audio: AudioConfig::default(),
            playback: PlaybackConfig::default(),
            general: GeneralConfig::default(),
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            volume: 0.7,
            muted: false,
            allow_video_only: true,
        }
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            speed: 1.0,
            subtitles: true,
        }
    }
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration
    ///
    /// Configuration is loaded in the following order (later sources
    /// override earlier):
    /// 1. Default values
    /// 2. User config file (~/.config/clipplayer/config.toml on Linux)
    /// 3. Environment variables (CLIPPLAYER_* prefix)
    pub fn load() -> Result<Self> {
        let mut config = Self::default();

        if let Some(user_path) = USER_CONFIG_PATH.as_deref() {
            if user_path.exists() {
                config = Self::from_file(user_path)?;
            }
        }

        config.apply_env_overrides()?;
        config.validate()?;

        Ok(config)
    }

    /// Save configuration to the user config file
    pub fn save(&self) -> Result<()> {
        let path = USER_CONFIG_PATH
            .as_deref()
            .ok_or_else(|| ClipPlayerError::Config("Cannot determine user config path".to_string()))?;

        self.save_to(path)
    }

    /// Save configuration to an explicit path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ClipPlayerError::Config(format!("Failed to create config directory: {}", e)))?;
        }

        let toml = toml::to_string_pretty(self)
            .map_err(|e| ClipPlayerError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, toml)
            .map_err(|e| ClipPlayerError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ClipPlayerError::Config(format!("Failed to read config file: {}", e)))?;

        toml::from_str(&contents)
            .map_err(|e| ClipPlayerError::Config(format!("Failed to parse config file: {}", e)))
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(volume) = std::env::var("CLIPPLAYER_AUDIO_VOLUME") {
            self.audio.volume = volume
                .parse()
                .map_err(|_| ClipPlayerError::Config("Invalid CLIPPLAYER_AUDIO_VOLUME".to_string()))?;
        }

        if let Ok(speed) = std::env::var("CLIPPLAYER_SPEED") {
            self.playback.speed = speed
                .parse()
                .map_err(|_| ClipPlayerError::Config("Invalid CLIPPLAYER_SPEED".to_string()))?;
        }

        if let Ok(log_level) = std::env::var("CLIPPLAYER_LOG_LEVEL") {
            self.general.log_level = log_level;
        }

        Ok(())
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.audio.volume) {
            return Err(ClipPlayerError::Config(
                "Audio volume must be between 0.0 and 1.0".to_string(),
            ));
        }

        if !(self.playback.speed > 0.0 && self.playback.speed <= 4.0) {
            return Err(ClipPlayerError::Config(
                "Playback speed must be in (0.0, 4.0]".to_string(),
            ));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.general.log_level.as_str()) {
            return Err(ClipPlayerError::Config(format!(
                "Invalid log level '{}', must be one of: {:?}",
                self.general.log_level, valid_log_levels
            )));
        }

        Ok(())
    }
}
