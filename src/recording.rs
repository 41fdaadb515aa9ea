// SPDX-License-Identifier: GPL-3.0-only

//! Recording state machine
//!
//! ```text
//! Idle -> Recording -> Stopping -> Idle
//!                               -> Exporting -> Idle
//! ```
//!
//! [`RecordingController`] never blocks: encoding runs inside the
//! [`MovieOutput`], the filtered re-export inside the [`ExportFacility`].
//! The controller only decides what happens next and the pipeline host
//! performs the asynchronous work.

use crate::errors::{MediaError, RecordingError};
use crate::filters::{FilterChain, FilterType, FrameFilter};
use crate::media::{ConnectionSettings, FileLocations, FinishedCallback, MovieOutput};
use crate::state::{CameraSide, DeviceOrientation, StateHandle};
use image::RgbaImage;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Phase of the recording state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordingPhase {
    /// Ready to start a recording
    #[default]
    Idle,
    /// Encoding live frames
    Recording,
    /// Waiting for the movie output to finalize the file
    Stopping,
    /// Re-encoding the recorded file through the active filters
    Exporting,
}

impl RecordingPhase {
    pub fn is_busy(self) -> bool {
        self != RecordingPhase::Idle
    }
}

/// Still captured at recording start, shown before the video is ready
#[derive(Debug, Clone)]
pub struct PosterFrame {
    pub image: Arc<RgbaImage>,
    /// Device attitude when the poster was taken
    pub orientation: DeviceOrientation,
}

/// Result of a successful [`RecordingController::start`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingStarted {
    pub path: PathBuf,
    pub settings: ConnectionSettings,
    /// Clock generation; ticks of older generations are ignored
    pub generation: u64,
}

/// Filtered re-export to run off the control thread
#[derive(Clone)]
pub struct ExportJob {
    pub source: PathBuf,
    pub filter: FrameFilter,
    pub destination: PathBuf,
}

impl std::fmt::Debug for ExportJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExportJob")
            .field("source", &self.source)
            .field("destination", &self.destination)
            .finish_non_exhaustive()
    }
}

/// What to do once encoding has finished
#[derive(Debug)]
pub enum FinishAction {
    /// No filters active: the recorded file is the result
    Publish(PathBuf),
    /// Filters active: export first, then publish the exported file
    Export(ExportJob),
    /// Recording lost; nothing is published
    Discard,
}

/// Outcome of [`RecordingController::toggle`]
#[derive(Debug)]
pub enum Toggled {
    Started(RecordingStarted),
    Stopped(Option<PosterFrame>),
}

/// Mirror flag for the movie output connection
///
/// The front camera is mirrored by default; `mirror_output` inverts that for
/// both sides.
pub fn connection_mirrored(side: CameraSide, mirror_output: bool) -> bool {
    if mirror_output {
        side != CameraSide::Front
    } else {
        side == CameraSide::Front
    }
}

/// Sequences start, stop and the optional filtered export
pub struct RecordingController {
    state: StateHandle,
    output: Arc<dyn MovieOutput>,
    files: Arc<dyn FileLocations>,
    tick_interval: Duration,
    phase: RecordingPhase,
    poster: Option<PosterFrame>,
    elapsed: Duration,
    generation: u64,
}

impl RecordingController {
    pub fn new(
        state: StateHandle,
        output: Arc<dyn MovieOutput>,
        files: Arc<dyn FileLocations>,
        tick_interval: Duration,
    ) -> Self {
        Self {
            state,
            output,
            files,
            tick_interval,
            phase: RecordingPhase::Idle,
            poster: None,
            elapsed: Duration::ZERO,
            generation: 0,
        }
    }

    pub fn phase(&self) -> RecordingPhase {
        self.phase
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Current clock generation
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Start recording from `Idle`
    ///
    /// `last_frame` becomes the poster image. Any other phase is rejected
    /// with [`RecordingError::AlreadyRecording`].
    pub fn start(
        &mut self,
        last_frame: Option<Arc<RgbaImage>>,
        on_finished: FinishedCallback,
    ) -> Result<RecordingStarted, RecordingError> {
        if self.phase != RecordingPhase::Idle {
            return Err(RecordingError::AlreadyRecording);
        }

        let (side, mirror_output, device) = self
            .state
            .read(|s| (s.camera_side, s.mirror_output, s.device_orientation))
            .ok_or(RecordingError::Released)?;

        let path = self
            .files
            .prepare_video_output()
            .ok_or(RecordingError::NoOutputLocation)?;

        let settings = ConnectionSettings {
            mirrored: connection_mirrored(side, mirror_output),
            orientation: device,
        };

        if last_frame.is_none() {
            debug!("No rendered frame yet, recording without poster");
        }
        let poster = last_frame.map(|image| PosterFrame {
            image,
            orientation: device,
        });

        self.output.start_recording(&path, settings, on_finished)?;

        self.poster = poster;
        self.generation += 1;
        self.elapsed = Duration::ZERO;
        self.set_phase(RecordingPhase::Recording);

        info!(
            path = %path.display(),
            mirrored = settings.mirrored,
            orientation = ?settings.orientation,
            "Recording started"
        );

        Ok(RecordingStarted {
            path,
            settings,
            generation: self.generation,
        })
    }

    /// Stop recording from `Recording`
    ///
    /// Returns the poster placeholder. Any other phase is rejected with
    /// [`RecordingError::NotRecording`].
    pub fn stop(&mut self) -> Result<Option<PosterFrame>, RecordingError> {
        if self.phase != RecordingPhase::Recording {
            return Err(RecordingError::NotRecording);
        }

        let poster = self.poster.take();
        self.output.stop_recording();
        self.reset_clock();
        self.set_phase(RecordingPhase::Stopping);

        info!("Recording stopped, waiting for encoder");
        Ok(poster)
    }

    /// Start or stop depending on the movie output's encoding status
    pub fn toggle(
        &mut self,
        last_frame: Option<Arc<RgbaImage>>,
        on_finished: FinishedCallback,
    ) -> Result<Toggled, RecordingError> {
        if self.output.is_recording() {
            self.stop().map(Toggled::Stopped)
        } else {
            self.start(last_frame, on_finished).map(Toggled::Started)
        }
    }

    /// Advance the clock by one tick
    ///
    /// Returns the new elapsed time, or `None` for ticks of a stale
    /// generation or outside of `Recording`.
    pub fn tick(&mut self, generation: u64) -> Option<Duration> {
        if self.phase != RecordingPhase::Recording || generation != self.generation {
            return None;
        }

        self.elapsed += self.tick_interval;
        let elapsed = self.elapsed;
        self.state.write(|s| s.recording_elapsed = elapsed);
        Some(elapsed)
    }

    /// Decide how to finish a recording once encoding has ended
    pub fn on_encoding_finished(
        &mut self,
        result: Result<PathBuf, MediaError>,
        filters: &[FilterType],
    ) -> FinishAction {
        match self.phase {
            RecordingPhase::Stopping => {}
            RecordingPhase::Recording => {
                warn!("Encoder finished while recording");
                self.poster = None;
                self.reset_clock();
            }
            RecordingPhase::Idle | RecordingPhase::Exporting => {
                warn!(phase = ?self.phase, "Ignoring unexpected encoder completion");
                return FinishAction::Discard;
            }
        }

        let source = match result {
            Ok(path) => path,
            Err(e) => {
                error!(error = %e, "Recording failed, nothing to publish");
                self.set_phase(RecordingPhase::Idle);
                return FinishAction::Discard;
            }
        };

        let chain = FilterChain::new(filters);
        if chain.is_identity() {
            self.set_phase(RecordingPhase::Idle);
            return FinishAction::Publish(source);
        }

        let Some(destination) = self.files.prepare_video_output() else {
            error!("No location for the filtered export, nothing to publish");
            self.set_phase(RecordingPhase::Idle);
            return FinishAction::Discard;
        };

        info!(
            source = %source.display(),
            destination = %destination.display(),
            filters = ?chain.filters(),
            "Exporting filtered recording"
        );
        self.set_phase(RecordingPhase::Exporting);
        FinishAction::Export(ExportJob {
            source,
            filter: chain.into_frame_filter(),
            destination,
        })
    }

    /// Finish the export; returns the file to publish
    pub fn on_export_finished(&mut self, result: Result<PathBuf, MediaError>) -> Option<PathBuf> {
        if self.phase != RecordingPhase::Exporting {
            warn!(phase = ?self.phase, "Ignoring unexpected export completion");
            return None;
        }

        self.set_phase(RecordingPhase::Idle);
        match result {
            Ok(path) => {
                info!(path = %path.display(), "Export finished");
                Some(path)
            }
            Err(e) => {
                error!(error = %e, "Export failed, nothing to publish");
                None
            }
        }
    }

    /// Reset the clock after a session interruption
    pub fn reset(&mut self) {
        debug!(phase = ?self.phase, "Resetting recording clock");
        self.reset_clock();
    }

    fn reset_clock(&mut self) {
        self.generation += 1;
        self.elapsed = Duration::ZERO;
        self.state.write(|s| s.recording_elapsed = Duration::ZERO);
    }

    fn set_phase(&mut self, phase: RecordingPhase) {
        self.phase = phase;
        self.state.write(|s| {
            s.recording_phase = phase;
            s.is_recording = phase == RecordingPhase::Recording;
        });
    }
}

impl std::fmt::Debug for RecordingController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordingController")
            .field("phase", &self.phase)
            .field("elapsed", &self.elapsed)
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}
