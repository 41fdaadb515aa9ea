// SPDX-License-Identifier: GPL-3.0-only

//! Real-time camera capture pipeline
//!
//! Fuses accelerometer samples into a stable device and frame orientation,
//! renders every incoming video frame through a GPU context with optional
//! filters, and records, filters and exports video clips without blocking
//! the live preview.
//!
//! # Architecture
//!
//! - [`state`]: shared capture state and its weak handles
//! - [`orientation`]: accelerometer classification and frame orientation
//! - [`renderer`]: preview rendering, GPU contexts and animations
//! - [`recording`]: recording state machine
//! - [`media`]: movie output, export and file location collaborators
//! - [`pipeline`]: the control thread tying everything together
//! - [`filters`]: image filters shared by preview and export
//! - [`config`]: user configuration

pub mod config;
pub mod constants;
pub mod errors;
pub mod filters;
pub mod frame;
pub mod media;
pub mod orientation;
pub mod pipeline;
pub mod recording;
pub mod renderer;
pub mod state;

// Re-export commonly used types
pub use config::PipelineConfig;
pub use errors::{PipelineError, PipelineResult};
pub use filters::FilterType;
pub use pipeline::{
    CapturePipeline, CapturedMedia, Collaborators, PipelineEvent, PipelineHandle, SessionEvent,
};
pub use state::{CameraSide, DeviceOrientation, FrameOrientation, SharedCaptureState};
