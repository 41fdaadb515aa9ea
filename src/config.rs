// SPDX-License-Identifier: GPL-3.0-only

//! Pipeline configuration
//!
//! Stored as JSON. Every field has a default, so partial files are accepted
//! and a missing file yields [`PipelineConfig::default`].

use crate::constants::{self, BitratePreset};
use crate::errors::ConfigError;
use crate::state::{CameraSide, LightMode};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Which GPU context backs the preview
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub enum GpuBackend {
    /// Hardware device through wgpu
    #[default]
    Wgpu,
    /// CPU framebuffer (headless runs, tests)
    Software,
}

/// Durations of the preview animations, in milliseconds
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct AnimationTimings {
    pub entrance_ms: u64,
    pub flash_half_ms: u64,
    pub flip_settle_ms: u64,
    pub flip_transition_ms: u64,
    pub flip_freeze_fade_ms: u64,
    pub orientation_fade_out_ms: u64,
    pub orientation_fade_in_ms: u64,
    pub orientation_fade_in_delay_ms: u64,
}

impl AnimationTimings {
    /// All animations complete immediately
    pub fn instant() -> Self {
        Self {
            entrance_ms: 0,
            flash_half_ms: 0,
            flip_settle_ms: 0,
            flip_transition_ms: 0,
            flip_freeze_fade_ms: 0,
            orientation_fade_out_ms: 0,
            orientation_fade_in_ms: 0,
            orientation_fade_in_delay_ms: 0,
        }
    }

    pub fn entrance(&self) -> Duration {
        Duration::from_millis(self.entrance_ms)
    }

    pub fn flash_half(&self) -> Duration {
        Duration::from_millis(self.flash_half_ms)
    }

    pub fn flip_settle(&self) -> Duration {
        Duration::from_millis(self.flip_settle_ms)
    }

    pub fn flip_transition(&self) -> Duration {
        Duration::from_millis(self.flip_transition_ms)
    }

    pub fn flip_freeze_fade(&self) -> Duration {
        Duration::from_millis(self.flip_freeze_fade_ms)
    }

    pub fn orientation_fade_out(&self) -> Duration {
        Duration::from_millis(self.orientation_fade_out_ms)
    }

    pub fn orientation_fade_in(&self) -> Duration {
        Duration::from_millis(self.orientation_fade_in_ms)
    }

    pub fn orientation_fade_in_delay(&self) -> Duration {
        Duration::from_millis(self.orientation_fade_in_delay_ms)
    }
}

impl Default for AnimationTimings {
    fn default() -> Self {
        Self {
            entrance_ms: constants::ENTRANCE_FADE.as_millis() as u64,
            flash_half_ms: constants::CAPTURE_FLASH_HALF.as_millis() as u64,
            flip_settle_ms: constants::FLIP_SETTLE.as_millis() as u64,
            flip_transition_ms: constants::FLIP_TRANSITION.as_millis() as u64,
            flip_freeze_fade_ms: constants::FLIP_FREEZE_FADE.as_millis() as u64,
            orientation_fade_out_ms: constants::ORIENTATION_FADE_OUT.as_millis() as u64,
            orientation_fade_in_ms: constants::ORIENTATION_FADE_IN.as_millis() as u64,
            orientation_fade_in_delay_ms: constants::ORIENTATION_FADE_IN_DELAY.as_millis() as u64,
        }
    }
}

/// Encoder settings for recordings and exports
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct EncodeSettings {
    pub framerate: u32,
    pub bitrate_preset: BitratePreset,
}

impl Default for EncodeSettings {
    fn default() -> Self {
        Self {
            framerate: constants::DEFAULT_FRAMERATE,
            bitrate_preset: BitratePreset::default(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Accelerometer sampling interval
    pub accelerometer_interval_ms: u64,
    /// Recording clock resolution
    pub recording_tick_ms: u64,
    /// Delay before a finished recording is published
    pub publish_delay_ms: u64,
    pub animations: AnimationTimings,
    pub gpu_backend: GpuBackend,
    pub encode: EncodeSettings,
    /// Where recordings are written (default: the user's video directory)
    pub output_dir: Option<PathBuf>,
    /// Capacity of the event channel; slow observers lose the oldest events
    pub event_capacity: usize,
    /// Initial camera side
    pub camera_side: CameraSide,
    /// Initial mirror preference
    pub mirror_output: bool,
    /// Initial orientation lock
    pub orientation_locked: bool,
    /// Initial torch setting
    pub light_mode: LightMode,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            accelerometer_interval_ms: constants::ACCELEROMETER_INTERVAL.as_millis() as u64,
            recording_tick_ms: constants::RECORDING_TICK.as_millis() as u64,
            publish_delay_ms: constants::PUBLISH_SETTLE_DELAY.as_millis() as u64,
            animations: AnimationTimings::default(),
            gpu_backend: GpuBackend::default(),
            encode: EncodeSettings::default(),
            output_dir: None,
            event_capacity: constants::EVENT_CHANNEL_CAPACITY,
            camera_side: CameraSide::default(),
            mirror_output: false,
            orientation_locked: false,
            light_mode: LightMode::default(),
        }
    }
}

impl PipelineConfig {
    /// Load a configuration file, falling back to defaults when it is missing
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No configuration file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Read(path.to_path_buf(), e.to_string())),
        };

        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| ConfigError::Parse(path.to_path_buf(), e.to_string()))?;
        info!(path = %path.display(), "Loaded pipeline configuration");
        Ok(config)
    }

    /// Default configuration file location
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("camera-pipeline").join("config.json"))
    }

    pub fn accelerometer_interval(&self) -> Duration {
        Duration::from_millis(self.accelerometer_interval_ms.max(1))
    }

    pub fn recording_tick(&self) -> Duration {
        Duration::from_millis(self.recording_tick_ms.max(1))
    }

    pub fn publish_delay(&self) -> Duration {
        Duration::from_millis(self.publish_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{ "mirror_output": true, "gpu_backend": "Software" }"#)
                .unwrap();
        assert!(config.mirror_output);
        assert_eq!(config.gpu_backend, GpuBackend::Software);
        assert_eq!(config.accelerometer_interval(), Duration::from_millis(50));
        assert_eq!(config.animations, AnimationTimings::default());
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let path = std::env::temp_dir().join("camera-pipeline-missing-config.json");
        let _ = std::fs::remove_file(&path);
        assert_eq!(PipelineConfig::load(&path).unwrap(), PipelineConfig::default());
    }

    #[test]
    fn test_invalid_file_is_a_parse_error() {
        let path = std::env::temp_dir().join(format!(
            "camera-pipeline-invalid-{}.json",
            uuid::Uuid::new_v4()
        ));
        std::fs::write(&path, "not json").unwrap();
        let result = PipelineConfig::load(&path);
        let _ = std::fs::remove_file(&path);
        assert!(matches!(result, Err(ConfigError::Parse(..))));
    }
}
