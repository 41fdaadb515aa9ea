// SPDX-License-Identifier: GPL-3.0-only

//! Pipeline-wide constants

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Acceleration (in g) at or beyond which an axis is considered dominant.
///
/// Both comparisons are inclusive: `x == 0.75` already classifies as
/// landscape-left. Readings below the threshold on both axes fall into the
/// dead zone and keep the previous device orientation.
pub const ORIENTATION_THRESHOLD: f64 = 0.75;

/// Default accelerometer sampling interval (20 Hz)
pub const ACCELEROMETER_INTERVAL: Duration = Duration::from_millis(50);

/// Recording clock resolution
pub const RECORDING_TICK: Duration = Duration::from_secs(1);

/// Delay before a finished recording is published, letting UI transitions settle
pub const PUBLISH_SETTLE_DELAY: Duration = Duration::from_millis(330);

/// Preview fade-in once setup completes
pub const ENTRANCE_FADE: Duration = Duration::from_millis(330);

/// Each half of the capture flash (matte in, matte out)
pub const CAPTURE_FLASH_HALF: Duration = Duration::from_millis(160);

/// Pause between inserting the freeze overlay and starting the flip
pub const FLIP_SETTLE: Duration = Duration::from_millis(10);

/// 3-D flip transition on the live surface
pub const FLIP_TRANSITION: Duration = Duration::from_millis(440);

/// Fade-out of the freeze overlay after the flip
pub const FLIP_FREEZE_FADE: Duration = Duration::from_millis(300);

/// Time the surface stays hidden before the new frame orientation is applied
pub const ORIENTATION_FADE_OUT: Duration = Duration::from_millis(100);

/// Fade-in after the new frame orientation is applied
pub const ORIENTATION_FADE_IN: Duration = Duration::from_millis(200);

/// Delay before the orientation fade-in starts
pub const ORIENTATION_FADE_IN_DELAY: Duration = Duration::from_millis(100);

/// Number of offscreen drawables the GPU surface cycles through
pub const DRAWABLE_POOL_SIZE: usize = 2;

/// Capacity of the pipeline event broadcast channel
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Default recording framerate
pub const DEFAULT_FRAMERATE: u32 = 30;

/// Folder created inside the user's video directory
pub const DEFAULT_SAVE_FOLDER: &str = "Camera";

/// Video encoder bitrate presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BitratePreset {
    /// Low bitrate - smaller files, reduced quality
    Low,
    /// Medium bitrate - balanced quality and file size (default)
    #[default]
    Medium,
    /// High bitrate - larger files, better quality
    High,
}

impl BitratePreset {
    /// All preset variants, lowest quality first
    pub const ALL: [BitratePreset; 3] = [
        BitratePreset::Low,
        BitratePreset::Medium,
        BitratePreset::High,
    ];

    /// Display name for the preset
    pub fn display_name(&self) -> &'static str {
        match self {
            BitratePreset::Low => "Low",
            BitratePreset::Medium => "Medium",
            BitratePreset::High => "High",
        }
    }

    /// Bitrate in kbps for a given frame width
    ///
    /// - SD (<= 640): Low=1, Medium=2, High=4 Mbps
    /// - HD (<= 1280): Low=2.5, Medium=5, High=10 Mbps
    /// - Full HD (<= 1920): Low=4, Medium=8, High=16 Mbps
    /// - above: Low=15, Medium=30, High=50 Mbps
    pub fn bitrate_kbps(&self, width: u32) -> u32 {
        match (width, self) {
            (0..=640, BitratePreset::Low) => 1_000,
            (0..=640, BitratePreset::Medium) => 2_000,
            (0..=640, BitratePreset::High) => 4_000,
            (641..=1280, BitratePreset::Low) => 2_500,
            (641..=1280, BitratePreset::Medium) => 5_000,
            (641..=1280, BitratePreset::High) => 10_000,
            (1281..=1920, BitratePreset::Low) => 4_000,
            (1281..=1920, BitratePreset::Medium) => 8_000,
            (1281..=1920, BitratePreset::High) => 16_000,
            (_, BitratePreset::Low) => 15_000,
            (_, BitratePreset::Medium) => 30_000,
            (_, BitratePreset::High) => 50_000,
        }
    }
}
