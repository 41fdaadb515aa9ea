// SPDX-License-Identifier: GPL-3.0-only

//! Shared capture state
//!
//! One [`SharedCaptureState`] exists per attached capture session. The
//! pipeline host owns it; every component reaches it through a
//! [`StateHandle`], a weak handle that resolves to nothing once the session
//! has been released. A vanished state turns reads and writes into no-ops.
//!
//! Each field has exactly one writer:
//!
//! | field                                         | writer              |
//! |-----------------------------------------------|---------------------|
//! | `device_orientation`, `frame_orientation`,    | OrientationTracker  |
//! | `user_blocked_screen_rotation`                |                     |
//! | `is_recording`, `recording_elapsed`,          | RecordingController |
//! | `recording_phase`                             |                     |
//! | `camera_side`, `mirror_output`,               | pipeline host       |
//! | `orientation_locked`, `active_filters`,       |                     |
//! | `light_mode`                                  |                     |

use crate::filters::FilterType;
use crate::recording::RecordingPhase;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, PoisonError, RwLock, Weak};
use std::time::Duration;

/// Physical device attitude derived from the accelerometer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DeviceOrientation {
    LandscapeLeft,
    LandscapeRight,
    #[default]
    Portrait,
    PortraitUpsideDown,
}

/// Device rotation as reported by the UI layer
///
/// Unlike [`DeviceOrientation`] this includes the flat and unknown states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum InterfaceOrientation {
    #[default]
    Unknown,
    Portrait,
    PortraitUpsideDown,
    LandscapeLeft,
    LandscapeRight,
    FaceUp,
    FaceDown,
}

impl InterfaceOrientation {
    /// All reported rotations
    pub const ALL: [InterfaceOrientation; 7] = [
        InterfaceOrientation::Unknown,
        InterfaceOrientation::Portrait,
        InterfaceOrientation::PortraitUpsideDown,
        InterfaceOrientation::LandscapeLeft,
        InterfaceOrientation::LandscapeRight,
        InterfaceOrientation::FaceUp,
        InterfaceOrientation::FaceDown,
    ];

    /// The matching device orientation, if this rotation has one
    pub fn as_device(self) -> Option<DeviceOrientation> {
        match self {
            InterfaceOrientation::Portrait => Some(DeviceOrientation::Portrait),
            InterfaceOrientation::PortraitUpsideDown => Some(DeviceOrientation::PortraitUpsideDown),
            InterfaceOrientation::LandscapeLeft => Some(DeviceOrientation::LandscapeLeft),
            InterfaceOrientation::LandscapeRight => Some(DeviceOrientation::LandscapeRight),
            InterfaceOrientation::Unknown
            | InterfaceOrientation::FaceUp
            | InterfaceOrientation::FaceDown => None,
        }
    }
}

impl From<DeviceOrientation> for InterfaceOrientation {
    fn from(orientation: DeviceOrientation) -> Self {
        match orientation {
            DeviceOrientation::Portrait => InterfaceOrientation::Portrait,
            DeviceOrientation::PortraitUpsideDown => InterfaceOrientation::PortraitUpsideDown,
            DeviceOrientation::LandscapeLeft => InterfaceOrientation::LandscapeLeft,
            DeviceOrientation::LandscapeRight => InterfaceOrientation::LandscapeRight,
        }
    }
}

/// Orientation applied to a pixel buffer before it is rendered or encoded
///
/// Values follow the EXIF orientation convention: `Right` means the stored
/// image must be rotated 90° clockwise to display upright.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FrameOrientation {
    Up,
    Down,
    Left,
    #[default]
    Right,
    UpMirrored,
    DownMirrored,
    LeftMirrored,
    RightMirrored,
}

impl FrameOrientation {
    /// All eight orientations, non-mirrored group first
    pub const ALL: [FrameOrientation; 8] = [
        FrameOrientation::Up,
        FrameOrientation::Down,
        FrameOrientation::Left,
        FrameOrientation::Right,
        FrameOrientation::UpMirrored,
        FrameOrientation::DownMirrored,
        FrameOrientation::LeftMirrored,
        FrameOrientation::RightMirrored,
    ];

    /// Whether this value belongs to the mirrored group
    pub fn is_mirrored(self) -> bool {
        matches!(
            self,
            FrameOrientation::UpMirrored
                | FrameOrientation::DownMirrored
                | FrameOrientation::LeftMirrored
                | FrameOrientation::RightMirrored
        )
    }

    /// The same rotation in the mirrored group
    pub fn mirrored(self) -> Self {
        match self {
            FrameOrientation::Up | FrameOrientation::UpMirrored => FrameOrientation::UpMirrored,
            FrameOrientation::Down | FrameOrientation::DownMirrored => {
                FrameOrientation::DownMirrored
            }
            FrameOrientation::Left | FrameOrientation::LeftMirrored => {
                FrameOrientation::LeftMirrored
            }
            FrameOrientation::Right | FrameOrientation::RightMirrored => {
                FrameOrientation::RightMirrored
            }
        }
    }

    /// Whether both values share a mirror group
    pub fn same_mirror_group(self, other: FrameOrientation) -> bool {
        self.is_mirrored() == other.is_mirrored()
    }

    /// EXIF orientation tag value (1-8)
    pub fn exif(self) -> u8 {
        match self {
            FrameOrientation::Up => 1,
            FrameOrientation::UpMirrored => 2,
            FrameOrientation::Down => 3,
            FrameOrientation::DownMirrored => 4,
            FrameOrientation::LeftMirrored => 5,
            FrameOrientation::Right => 6,
            FrameOrientation::RightMirrored => 7,
            FrameOrientation::Left => 8,
        }
    }

    /// Lowercase label, e.g. `right-mirrored`
    pub fn label(self) -> &'static str {
        match self {
            FrameOrientation::Up => "up",
            FrameOrientation::Down => "down",
            FrameOrientation::Left => "left",
            FrameOrientation::Right => "right",
            FrameOrientation::UpMirrored => "up-mirrored",
            FrameOrientation::DownMirrored => "down-mirrored",
            FrameOrientation::LeftMirrored => "left-mirrored",
            FrameOrientation::RightMirrored => "right-mirrored",
        }
    }
}

impl std::fmt::Display for FrameOrientation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Which physical camera feeds the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CameraSide {
    Front,
    #[default]
    Back,
}

impl CameraSide {
    pub fn flipped(self) -> Self {
        match self {
            CameraSide::Front => CameraSide::Back,
            CameraSide::Back => CameraSide::Front,
        }
    }
}

/// Torch setting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LightMode {
    #[default]
    Off,
    On,
    Auto,
}

/// Orientation, appearance and recording state shared by all components
#[derive(Debug, Clone, Default)]
pub struct SharedCaptureState {
    pub device_orientation: DeviceOrientation,
    pub frame_orientation: FrameOrientation,
    pub camera_side: CameraSide,
    pub mirror_output: bool,
    pub orientation_locked: bool,
    pub user_blocked_screen_rotation: bool,
    /// Applied in sequence order; empty is the identity
    pub active_filters: Vec<FilterType>,
    pub light_mode: LightMode,
    pub is_recording: bool,
    pub recording_elapsed: Duration,
    pub recording_phase: RecordingPhase,
}

/// Owning side of the shared state, held only by the pipeline host
#[derive(Debug, Default)]
pub struct StateOwner {
    inner: Arc<RwLock<SharedCaptureState>>,
}

impl StateOwner {
    pub fn new(initial: SharedCaptureState) -> Self {
        Self {
            inner: Arc::new(RwLock::new(initial)),
        }
    }

    /// Hand out a non-owning handle
    pub fn handle(&self) -> StateHandle {
        StateHandle {
            inner: Arc::downgrade(&self.inner),
        }
    }
}

/// Non-owning handle to the shared state
///
/// Every accessor returns `None` once the owner has been dropped.
#[derive(Debug, Clone, Default)]
pub struct StateHandle {
    inner: Weak<RwLock<SharedCaptureState>>,
}

impl StateHandle {
    /// Handle that never resolves, for components created before attachment
    pub fn detached() -> Self {
        Self::default()
    }

    /// Whether the owning session is still alive
    pub fn is_attached(&self) -> bool {
        self.inner.strong_count() > 0
    }

    /// Read through the handle
    pub fn read<R>(&self, f: impl FnOnce(&SharedCaptureState) -> R) -> Option<R> {
        let inner = self.inner.upgrade()?;
        let guard = inner.read().unwrap_or_else(PoisonError::into_inner);
        Some(f(&guard))
    }

    /// Write through the handle
    pub fn write<R>(&self, f: impl FnOnce(&mut SharedCaptureState) -> R) -> Option<R> {
        let inner = self.inner.upgrade()?;
        let mut guard = inner.write().unwrap_or_else(PoisonError::into_inner);
        Some(f(&mut guard))
    }

    /// Copy of the whole record
    pub fn snapshot(&self) -> Option<SharedCaptureState> {
        self.read(SharedCaptureState::clone)
    }
}
