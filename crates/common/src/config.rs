//! Engine configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Global engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Logging configuration.
    pub logging: LoggingConfig,

    /// Mixer tuning shared by every runtime.
    pub mixer: MixerDefaults,
}

/// Mixer parameters that the manifest does not carry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MixerDefaults {
    /// Audio tick length in samples at the output rate.
    pub audio_frame_samples: i64,

    /// Fixed latency added to every audio source, in samples.
    pub audio_delay_samples: i64,

    /// Maximum number of backing images the picture mixer cycles through.
    pub backing_ring_capacity: usize,

    /// Ticks a picture source keeps being drawn without a fresh sample.
    pub picture_hold_ticks: u32,

    /// Picture output pixel format name (e.g. "y420p", "rgba").
    pub picture_format: String,

    /// Audio output sample format name (e.g. "s16i", "f32p").
    pub audio_format: String,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "livemix_mixer=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,
}

impl Default for MixerDefaults {
    fn default() -> Self {
        Self {
            audio_frame_samples: 960,
            audio_delay_samples: 1920,
            backing_ring_capacity: 10,
            picture_hold_ticks: 2,
            picture_format: "y420p".to_string(),
            audio_format: "s16i".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl EngineConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        Self::load_from(&config_file_path())
    }

    /// Load config from an explicit path, falling back to defaults.
    pub fn load_from(config_path: &std::path::Path) -> Self {
        if config_path.exists() {
            match std::fs::read_to_string(config_path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        tracing::warn!(path = ?config_path, error = %e, "Failed to parse config");
                    }
                },
                Err(e) => {
                    tracing::warn!(path = ?config_path, error = %e, "Failed to read config");
                }
            }
        }
        Self::default()
    }

    /// Save config to the standard location.
    pub fn save(&self) -> Result<(), std::io::Error> {
        self.save_to(&config_file_path())
    }

    /// Save config to an explicit path.
    pub fn save_to(&self, config_path: &std::path::Path) -> Result<(), std::io::Error> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(config_path, json)
    }
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("livemix").join("config.json")
}
