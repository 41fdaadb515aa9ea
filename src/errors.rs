// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the capture pipeline
//!
//! Only setup failures propagate to callers. Steady-state failures (dropped
//! frames, dropped sensor samples, failed exports) are absorbed where they
//! happen and logged; see [`FrameSkip`] and [`RecordingError`].

use std::fmt;
use std::path::PathBuf;

/// Result type alias for pipeline setup
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Fatal errors raised while attaching the pipeline to a capture session
#[derive(Debug, Clone)]
pub enum PipelineError {
    /// No GPU device/context could be acquired for the preview
    GpuUnavailable(String),
    /// The movie output sink could not be attached to the session
    OutputUnavailable(String),
    /// The async runtime needed for the control thread is missing
    NoRuntime,
    /// Configuration could not be loaded
    Config(ConfigError),
}

/// Recording state machine rejections and failures
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordingError {
    /// `start()` outside of the idle phase
    AlreadyRecording,
    /// `stop()` outside of the recording phase
    NotRecording,
    /// No fresh file location could be allocated
    NoOutputLocation,
    /// The movie output refused to start
    StartFailed(String),
    /// Shared state is gone (session released)
    Released,
}

/// Failures reported by the media collaborators (movie output, exporter)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaError {
    /// Required GStreamer element is missing or failed to link
    Pipeline(String),
    /// Encoding finished without a single frame
    NoFrames,
    /// Encoding or export reported an error
    Encoding(String),
    /// Filesystem problem at the given path
    Io(PathBuf, String),
}

/// Configuration loading errors
#[derive(Debug, Clone)]
pub enum ConfigError {
    /// File could not be read
    Read(PathBuf, String),
    /// File contents are not a valid configuration
    Parse(PathBuf, String),
}

/// Reasons a single live frame is skipped
///
/// Never propagated past the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameSkip {
    /// Surface has no drawable available right now
    NoDrawable,
    /// No command buffer can be recorded (GPU device lost)
    NoCommandBuffer,
    /// Pixel buffer is missing or shorter than its declared size
    BufferUnavailable,
    /// Shared state is gone (session released)
    Detached,
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::GpuUnavailable(msg) => write!(f, "GPU unavailable: {}", msg),
            PipelineError::OutputUnavailable(msg) => {
                write!(f, "Movie output cannot be attached: {}", msg)
            }
            PipelineError::NoRuntime => write!(f, "No tokio runtime available"),
            PipelineError::Config(e) => write!(f, "Configuration error: {}", e),
        }
    }
}

impl fmt::Display for RecordingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordingError::AlreadyRecording => write!(f, "Recording already in progress"),
            RecordingError::NotRecording => write!(f, "No recording in progress"),
            RecordingError::NoOutputLocation => write!(f, "No output location available"),
            RecordingError::StartFailed(msg) => write!(f, "Failed to start recording: {}", msg),
            RecordingError::Released => write!(f, "Capture session released"),
        }
    }
}

impl fmt::Display for MediaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaError::Pipeline(msg) => write!(f, "Media pipeline error: {}", msg),
            MediaError::NoFrames => write!(f, "No frames were recorded"),
            MediaError::Encoding(msg) => write!(f, "Encoding failed: {}", msg),
            MediaError::Io(path, msg) => write!(f, "I/O error at {}: {}", path.display(), msg),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Read(path, msg) => write!(f, "Cannot read {}: {}", path.display(), msg),
            ConfigError::Parse(path, msg) => {
                write!(f, "Invalid configuration in {}: {}", path.display(), msg)
            }
        }
    }
}

impl fmt::Display for FrameSkip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameSkip::NoDrawable => write!(f, "No drawable available"),
            FrameSkip::NoCommandBuffer => write!(f, "No command buffer available"),
            FrameSkip::BufferUnavailable => write!(f, "Pixel buffer unavailable"),
            FrameSkip::Detached => write!(f, "Pipeline state released"),
        }
    }
}

impl std::error::Error for PipelineError {}
impl std::error::Error for RecordingError {}
impl std::error::Error for MediaError {}
impl std::error::Error for ConfigError {}
impl std::error::Error for FrameSkip {}

impl From<ConfigError> for PipelineError {
    fn from(err: ConfigError) -> Self {
        PipelineError::Config(err)
    }
}

impl From<MediaError> for RecordingError {
    fn from(err: MediaError) -> Self {
        RecordingError::StartFailed(err.to_string())
    }
}

impl From<gstreamer::glib::Error> for MediaError {
    fn from(err: gstreamer::glib::Error) -> Self {
        MediaError::Pipeline(err.to_string())
    }
}

impl From<gstreamer::glib::BoolError> for MediaError {
    fn from(err: gstreamer::glib::BoolError) -> Self {
        MediaError::Pipeline(err.to_string())
    }
}

impl From<gstreamer::StateChangeError> for MediaError {
    fn from(err: gstreamer::StateChangeError) -> Self {
        MediaError::Pipeline(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setup_errors_render_their_cause() {
        let err = PipelineError::GpuUnavailable("no adapter".into());
        assert_eq!(err.to_string(), "GPU unavailable: no adapter");
    }

    #[test]
    fn test_media_error_converts_to_start_failure() {
        let err: RecordingError = MediaError::NoFrames.into();
        assert_eq!(
            err,
            RecordingError::StartFailed("No frames were recorded".into())
        );
    }
}
