// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for configuration module

use camera_pipeline::PipelineConfig;
use camera_pipeline::config::{AnimationTimings, GpuBackend};
use std::time::Duration;

#[test]
fn test_config_default() {
    let config = PipelineConfig::default();

    assert_eq!(config.accelerometer_interval(), Duration::from_millis(50));
    assert_eq!(config.recording_tick(), Duration::from_secs(1));
    assert_eq!(config.gpu_backend, GpuBackend::Wgpu);
    assert!(!config.mirror_output, "Mirroring should be off by default");
    assert!(!config.orientation_locked);
}

#[test]
fn test_partial_json_keeps_defaults() {
    let config: PipelineConfig =
        serde_json::from_str(r#"{ "gpu_backend": "Software", "mirror_output": true }"#).unwrap();

    assert_eq!(config.gpu_backend, GpuBackend::Software);
    assert!(config.mirror_output);
    assert_eq!(config.animations, AnimationTimings::default());
}

#[test]
fn test_missing_file_falls_back_to_defaults() {
    let path = std::env::temp_dir().join("camera-pipeline-does-not-exist.json");
    let config = PipelineConfig::load(&path).unwrap();
    assert_eq!(config, PipelineConfig::default());
}

#[test]
fn test_instant_timings_are_zero() {
    let timings = AnimationTimings::instant();
    assert_eq!(timings.entrance(), Duration::ZERO);
    assert_eq!(timings.flip_transition(), Duration::ZERO);
}
