// SPDX-License-Identifier: GPL-3.0-only

//! Media collaborators consumed by the recording controller
//!
//! The controller only talks to the traits defined here:
//! - [`MovieOutput`] encodes live frames into a movie file
//! - [`ExportFacility`] re-encodes a recorded file through a per-frame filter
//! - [`FileLocations`] hands out fresh output paths
//!
//! GStreamer-backed implementations live in the submodules.

pub mod gst_export;
pub mod gst_output;
pub mod storage;

pub use gst_export::GstExporter;
pub use gst_output::GstMovieOutput;
pub use storage::VideoDirLocations;

use crate::errors::MediaError;
use crate::filters::FrameFilter;
use crate::frame::VideoFrame;
use crate::state::{DeviceOrientation, FrameOrientation};
use futures::future::BoxFuture;
use std::path::{Path, PathBuf};

/// Invoked exactly once when encoding of a recording has finished
pub type FinishedCallback = Box<dyn FnOnce(Result<PathBuf, MediaError>) + Send>;

/// Orientation and mirroring applied by the movie output to recorded frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConnectionSettings {
    pub mirrored: bool,
    pub orientation: DeviceOrientation,
}

impl ConnectionSettings {
    /// Frame orientation equivalent of these settings
    pub fn frame_orientation(&self) -> FrameOrientation {
        let plain = match self.orientation {
            DeviceOrientation::Portrait => FrameOrientation::Right,
            DeviceOrientation::PortraitUpsideDown => FrameOrientation::Left,
            DeviceOrientation::LandscapeLeft => FrameOrientation::Up,
            DeviceOrientation::LandscapeRight => FrameOrientation::Down,
        };
        if self.mirrored { plain.mirrored() } else { plain }
    }

    /// `video-direction` value for the GStreamer `videoflip` element
    pub fn video_direction(&self) -> &'static str {
        match self.frame_orientation() {
            FrameOrientation::Up => "identity",
            FrameOrientation::UpMirrored => "horiz",
            FrameOrientation::Down => "180",
            FrameOrientation::DownMirrored => "vert",
            FrameOrientation::Right => "90r",
            FrameOrientation::Left => "90l",
            FrameOrientation::LeftMirrored => "ul-lr",
            FrameOrientation::RightMirrored => "ur-ll",
        }
    }
}

/// Movie file sink attached to the capture session
pub trait MovieOutput: Send + Sync {
    /// Attach to the session; failure is fatal for pipeline setup
    fn attach(&self) -> Result<(), MediaError>;

    /// Whether encoding is currently running
    fn is_recording(&self) -> bool;

    /// Begin encoding to `path`
    ///
    /// `on_finished` fires once, from any thread, after
    /// [`stop_recording`](Self::stop_recording) has flushed the file or
    /// encoding failed.
    fn start_recording(
        &self,
        path: &Path,
        settings: ConnectionSettings,
        on_finished: FinishedCallback,
    ) -> Result<(), MediaError>;

    /// Feed one live frame; ignored while not recording
    fn append_frame(&self, frame: &VideoFrame);

    /// Stop encoding and finalize the file
    fn stop_recording(&self);
}

/// Re-encodes a recorded asset through a per-frame filter
pub trait ExportFacility: Send + Sync {
    fn export(
        &self,
        source: PathBuf,
        filter: FrameFilter,
        destination: PathBuf,
    ) -> BoxFuture<'static, Result<PathBuf, MediaError>>;
}

/// Supplies fresh file locations for recordings and exports
pub trait FileLocations: Send + Sync {
    fn prepare_video_output(&self) -> Option<PathBuf>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_portrait_back_camera_rotates_clockwise() {
        let settings = ConnectionSettings {
            mirrored: false,
            orientation: DeviceOrientation::Portrait,
        };
        assert_eq!(settings.frame_orientation(), FrameOrientation::Right);
        assert_eq!(settings.video_direction(), "90r");
    }

    #[test]
    fn test_mirrored_settings_use_mirrored_group() {
        for orientation in [
            DeviceOrientation::Portrait,
            DeviceOrientation::PortraitUpsideDown,
            DeviceOrientation::LandscapeLeft,
            DeviceOrientation::LandscapeRight,
        ] {
            let settings = ConnectionSettings {
                mirrored: true,
                orientation,
            };
            assert!(settings.frame_orientation().is_mirrored());
        }
    }

    #[test]
    fn test_landscape_left_is_identity() {
        let settings = ConnectionSettings {
            mirrored: false,
            orientation: DeviceOrientation::LandscapeLeft,
        };
        assert_eq!(settings.video_direction(), "identity");
    }
}
