// SPDX-License-Identifier: GPL-3.0-only

//! Pipeline host and control thread
//!
//! [`CapturePipeline::attach`] creates the shared state, the renderer, the
//! orientation tracker and the recording controller, then spawns a single
//! actor task that owns all of them. Every state mutation is a [`Command`]
//! processed by that task in arrival order, which makes it the one logical
//! control thread. Two-phase animations, the recording clock and the publish
//! delay are scheduled continuations: a short task sleeps and then sends the
//! follow-up command back into the same queue.
//!
//! The live frame path does not go through the actor. [`FrameSink`] renders
//! on the calling thread and forwards the raw frame to the movie output.

pub mod sources;

pub use sources::{
    MotionSource, MotionUpdates, ScriptedMotion, SourceLoop, SyntheticFrames, VideoSource,
};

use crate::config::PipelineConfig;
use crate::errors::{FrameSkip, MediaError, PipelineError, PipelineResult, RecordingError};
use crate::filters::FilterType;
use crate::frame::VideoFrame;
use crate::media::{
    ExportFacility, FileLocations, FinishedCallback, GstExporter, GstMovieOutput, MovieOutput,
    VideoDirLocations,
};
use crate::orientation::{
    Acceleration, FrameOrientationChange, OrientationTracker, OrientationUpdate,
    target_frame_orientation,
};
use crate::recording::{
    FinishAction, PosterFrame, RecordingController, RecordingPhase, RecordingStarted, Toggled,
};
use crate::renderer::{
    AnimationOutcome, AnimationStep, FrameRenderer, GpuContext, LastFrame, PreviewAnimator,
    PreviewEvent, create_context,
};
use crate::state::{
    CameraSide, DeviceOrientation, FrameOrientation, InterfaceOrientation, LightMode,
    SharedCaptureState, StateHandle, StateOwner,
};
use image::RgbaImage;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

/// Lifecycle notifications published by the host application
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// The capture session was interrupted (another app took the camera)
    Interrupted,
    /// The application returned to the foreground
    AppForegrounded,
}

/// Result handed to the user
#[derive(Debug, Clone)]
pub enum CapturedMedia {
    Photo(Arc<RgbaImage>),
    Video(PathBuf),
}

/// Notifications from the pipeline to observers
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    DeviceOrientationChanged(DeviceOrientation),
    FrameOrientationChanged {
        orientation: FrameOrientation,
        animated: bool,
    },
    ScreenRotationBlocked(bool),
    /// Orientation is unlocked and the grid overlay should be redrawn
    GridRedrawRequested,
    CameraSideChanged(CameraSide),
    LightModeChanged(LightMode),
    Preview(PreviewEvent),
    RecordingPhaseChanged(RecordingPhase),
    RecordingElapsed(Duration),
    /// Poster frame shown while the recording is being finalized
    PlaceholderReady(PosterFrame),
    MediaCaptured(CapturedMedia),
}

/// Messages processed by the control thread
#[derive(Debug)]
enum Command {
    Acceleration(Option<Acceleration>),
    InterfaceRotation(InterfaceOrientation),
    SetCameraSide(CameraSide),
    FlipCamera,
    SetMirrorOutput(bool),
    SetOrientationLocked(bool),
    SetFilters(Vec<FilterType>),
    SetLightMode(LightMode),
    CaptureStill,
    StartRecording,
    StopRecording,
    ToggleRecording,
    RecordingTick(u64),
    EncodingFinished(Result<PathBuf, MediaError>),
    ExportFinished(Result<PathBuf, MediaError>),
    Publish(PathBuf),
    Animation(AnimationStep),
    Session(SessionEvent),
    Release,
}

/// External collaborators the pipeline is attached to
pub struct Collaborators {
    pub movie_output: Arc<dyn MovieOutput>,
    pub exporter: Arc<dyn ExportFacility>,
    pub files: Arc<dyn FileLocations>,
    /// Preview context; `None` creates the one selected in the configuration
    pub gpu: Option<Box<dyn GpuContext>>,
}

impl Collaborators {
    /// GStreamer-backed collaborators writing to the configured directory
    pub fn gstreamer(config: &PipelineConfig) -> Self {
        Self {
            movie_output: Arc::new(GstMovieOutput::new(config.encode)),
            exporter: Arc::new(GstExporter::new(config.encode)),
            files: Arc::new(VideoDirLocations::from_config(config.output_dir.as_deref())),
            gpu: None,
        }
    }
}

/// Entry point for attaching the pipeline to a capture session
pub struct CapturePipeline;

impl CapturePipeline {
    /// Set up every component and start the control thread
    ///
    /// Must be called from within a tokio runtime. Fails when no GPU context
    /// can be acquired or the movie output cannot be attached.
    pub fn attach(
        config: PipelineConfig,
        collaborators: Collaborators,
    ) -> PipelineResult<PipelineHandle> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| PipelineError::NoRuntime)?;

        let context = match collaborators.gpu {
            Some(context) => context,
            None => create_context(config.gpu_backend)?,
        };

        collaborators
            .movie_output
            .attach()
            .map_err(|e| PipelineError::OutputUnavailable(e.to_string()))?;

        // The interface reports portrait until told otherwise
        let owner = StateOwner::new(SharedCaptureState {
            camera_side: config.camera_side,
            mirror_output: config.mirror_output,
            orientation_locked: config.orientation_locked,
            light_mode: config.light_mode,
            frame_orientation: target_frame_orientation(
                config.camera_side,
                config.mirror_output,
                InterfaceOrientation::Portrait,
            ),
            ..Default::default()
        });
        let state = owner.handle();

        let renderer = Arc::new(Mutex::new(FrameRenderer::new(state.clone(), context)));
        let recorder = RecordingController::new(
            state.clone(),
            Arc::clone(&collaborators.movie_output),
            collaborators.files,
            config.recording_tick(),
        );

        let (commands, receiver) = mpsc::unbounded_channel();
        let (events, first_events) = broadcast::channel(config.event_capacity.max(1));

        let actor = Actor {
            animator: PreviewAnimator::new(config.animations),
            tracker: OrientationTracker::new(state.clone()),
            recorder,
            last_frame: renderer
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .last_frame(),
            _renderer: Arc::clone(&renderer),
            requested_side: config.camera_side,
            exporter: collaborators.exporter,
            interface: InterfaceOrientation::Portrait,
            commands: commands.downgrade(),
            events: events.clone(),
            config,
            _owner: owner,
            state: state.clone(),
        };

        info!("Capture pipeline attached");
        let task = runtime.spawn(actor.run(receiver));

        Ok(PipelineHandle {
            control: PipelineController { commands },
            sink: FrameSink {
                renderer: Arc::downgrade(&renderer),
                output: collaborators.movie_output,
            },
            state,
            events,
            first_events: Mutex::new(Some(first_events)),
            task,
        })
    }
}

/// Cloneable sender for pipeline commands
///
/// Every method returns false once the pipeline has been released.
#[derive(Debug, Clone)]
pub struct PipelineController {
    commands: mpsc::UnboundedSender<Command>,
}

impl PipelineController {
    fn send(&self, command: Command) -> bool {
        match self.commands.send(command) {
            Ok(()) => true,
            Err(e) => {
                debug!(command = ?e.0, "Pipeline released, dropping command");
                false
            }
        }
    }

    /// Raw accelerometer sample; `None` for a failed reading
    pub fn acceleration_sample(&self, sample: Option<Acceleration>) -> bool {
        self.send(Command::Acceleration(sample))
    }

    /// Rotation reported by the user interface
    pub fn interface_rotation(&self, orientation: InterfaceOrientation) -> bool {
        self.send(Command::InterfaceRotation(orientation))
    }

    pub fn set_camera_side(&self, side: CameraSide) -> bool {
        self.send(Command::SetCameraSide(side))
    }

    pub fn flip_camera(&self) -> bool {
        self.send(Command::FlipCamera)
    }

    pub fn set_mirror_output(&self, mirror: bool) -> bool {
        self.send(Command::SetMirrorOutput(mirror))
    }

    pub fn set_orientation_locked(&self, locked: bool) -> bool {
        self.send(Command::SetOrientationLocked(locked))
    }

    pub fn set_filters(&self, filters: Vec<FilterType>) -> bool {
        self.send(Command::SetFilters(filters))
    }

    pub fn set_light_mode(&self, mode: LightMode) -> bool {
        self.send(Command::SetLightMode(mode))
    }

    /// Capture the last rendered frame as a photo
    pub fn capture_still(&self) -> bool {
        self.send(Command::CaptureStill)
    }

    pub fn start_recording(&self) -> bool {
        self.send(Command::StartRecording)
    }

    pub fn stop_recording(&self) -> bool {
        self.send(Command::StopRecording)
    }

    pub fn toggle_recording(&self) -> bool {
        self.send(Command::ToggleRecording)
    }

    /// Publish a session lifecycle event on the bus
    pub fn session_event(&self, event: SessionEvent) -> bool {
        self.send(Command::Session(event))
    }
}

/// Receives live frames on the video source's thread
#[derive(Clone)]
pub struct FrameSink {
    renderer: Weak<Mutex<FrameRenderer>>,
    output: Arc<dyn MovieOutput>,
}

impl FrameSink {
    /// Render one frame and feed it to the movie output
    pub fn on_video_frame(&self, frame: &VideoFrame) -> Result<(), FrameSkip> {
        let renderer = self.renderer.upgrade().ok_or(FrameSkip::Detached)?;
        let result = renderer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .on_video_frame(frame);
        drop(renderer);

        // Recording receives the raw frame even when the preview dropped it
        self.output.append_frame(frame);
        result
    }

    /// Whether the pipeline is still attached
    pub fn is_attached(&self) -> bool {
        self.renderer.strong_count() > 0
    }
}

impl std::fmt::Debug for FrameSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameSink")
            .field("attached", &self.is_attached())
            .finish_non_exhaustive()
    }
}

/// Owning handle returned by [`CapturePipeline::attach`]
pub struct PipelineHandle {
    control: PipelineController,
    sink: FrameSink,
    state: StateHandle,
    events: broadcast::Sender<PipelineEvent>,
    first_events: Mutex<Option<broadcast::Receiver<PipelineEvent>>>,
    task: tokio::task::JoinHandle<()>,
}

impl PipelineHandle {
    pub fn control(&self) -> &PipelineController {
        &self.control
    }

    /// Sink for the video source
    pub fn frame_sink(&self) -> FrameSink {
        self.sink.clone()
    }

    /// Read access to the shared state
    pub fn state(&self) -> StateHandle {
        self.state.clone()
    }

    /// Subscribe to pipeline events
    ///
    /// The first subscriber also receives the events emitted during attach.
    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.first_events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .unwrap_or_else(|| self.events.subscribe())
    }

    /// Tear down the session and wait for the control thread to exit
    pub async fn release(self) {
        self.control.send(Command::Release);
        if let Err(e) = self.task.await {
            warn!(error = %e, "Control thread ended abnormally");
        }
    }
}

struct Actor {
    config: PipelineConfig,
    _owner: StateOwner,
    state: StateHandle,
    tracker: OrientationTracker,
    animator: PreviewAnimator,
    recorder: RecordingController,
    /// Keeps the frame sink's renderer alive until release
    _renderer: Arc<Mutex<FrameRenderer>>,
    last_frame: LastFrame,
    /// Side of the most recent flip request, ahead of `camera_side` while
    /// a flip is animating
    requested_side: CameraSide,
    exporter: Arc<dyn ExportFacility>,
    interface: InterfaceOrientation,
    commands: mpsc::WeakUnboundedSender<Command>,
    events: broadcast::Sender<PipelineEvent>,
}

impl Actor {
    async fn run(mut self, mut receiver: mpsc::UnboundedReceiver<Command>) {
        let entrance = self.animator.begin_entrance();
        self.apply_outcome(entrance);

        while let Some(command) = receiver.recv().await {
            if !self.handle(command) {
                break;
            }
        }

        info!("Capture pipeline released");
    }

    /// Process one command; false ends the control thread
    fn handle(&mut self, command: Command) -> bool {
        match command {
            Command::Acceleration(sample) => {
                let update = self.tracker.on_acceleration_sample(sample, self.interface);
                self.apply_orientation_update(update);
            }
            Command::InterfaceRotation(orientation) => {
                self.interface = orientation;
                self.recompute_orientation();
            }
            Command::SetCameraSide(side) => self.begin_camera_flip(side),
            Command::FlipCamera => self.begin_camera_flip(self.requested_side.flipped()),
            Command::SetMirrorOutput(mirror) => {
                self.state.write(|s| s.mirror_output = mirror);
                self.recompute_orientation();
            }
            Command::SetOrientationLocked(locked) => {
                self.state.write(|s| s.orientation_locked = locked);
                self.recompute_orientation();
            }
            Command::SetFilters(filters) => {
                debug!(?filters, "Active filters changed");
                self.state.write(|s| s.active_filters = filters);
            }
            Command::SetLightMode(mode) => self.set_light_mode(mode),
            Command::CaptureStill => self.capture_still(),
            Command::StartRecording => {
                let last_frame = self.last_frame();
                let result = self.recorder.start(last_frame, self.finished_callback());
                self.after_start(result);
            }
            Command::StopRecording => {
                let result = self.recorder.stop();
                self.after_stop(result);
            }
            Command::ToggleRecording => {
                let last_frame = self.last_frame();
                match self.recorder.toggle(last_frame, self.finished_callback()) {
                    Ok(Toggled::Started(started)) => self.after_start(Ok(started)),
                    Ok(Toggled::Stopped(poster)) => self.after_stop(Ok(poster)),
                    Err(e) => debug!(error = %e, "Ignoring recording toggle"),
                }
            }
            Command::RecordingTick(generation) => {
                if let Some(elapsed) = self.recorder.tick(generation) {
                    self.emit(PipelineEvent::RecordingElapsed(elapsed));
                    self.schedule(self.config.recording_tick(), Command::RecordingTick(generation));
                }
            }
            Command::EncodingFinished(result) => self.on_encoding_finished(result),
            Command::ExportFinished(result) => {
                let published = self.recorder.on_export_finished(result);
                self.emit(PipelineEvent::RecordingPhaseChanged(self.recorder.phase()));
                if let Some(path) = published {
                    self.schedule(self.config.publish_delay(), Command::Publish(path));
                }
            }
            Command::Publish(path) => {
                info!(path = %path.display(), "Video ready");
                self.emit(PipelineEvent::MediaCaptured(CapturedMedia::Video(path)));
            }
            Command::Animation(step) => self.on_animation_step(step),
            Command::Session(event) => self.on_session_event(event),
            Command::Release => return false,
        }
        true
    }

    fn emit(&self, event: PipelineEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    /// Send `command` back into the queue after `delay`
    fn schedule(&self, delay: Duration, command: Command) {
        let commands = self.commands.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(commands) = commands.upgrade() {
                let _ = commands.send(command);
            }
        });
    }

    fn apply_outcome(&self, outcome: AnimationOutcome) {
        for event in outcome.events {
            self.emit(PipelineEvent::Preview(event));
        }
        if let Some(next) = outcome.next {
            self.schedule(next.delay, Command::Animation(next.step));
        }
    }

    fn last_frame(&self) -> Option<Arc<RgbaImage>> {
        self.last_frame.get()
    }

    fn apply_orientation_update(&mut self, update: OrientationUpdate) {
        if let Some(device) = update.device_orientation {
            self.emit(PipelineEvent::DeviceOrientationChanged(device));
        }
        if let Some(blocked) = update.screen_rotation_blocked {
            self.emit(PipelineEvent::ScreenRotationBlocked(blocked));
        }
        if let Some(change) = update.frame_change {
            self.apply_frame_change(change);
        }
        if update.redraw_grid {
            self.emit(PipelineEvent::GridRedrawRequested);
        }
    }

    fn recompute_orientation(&mut self) {
        if let Some(change) = self.tracker.recompute_frame_orientation(self.interface) {
            self.apply_frame_change(change);
        }
    }

    fn apply_frame_change(&mut self, change: FrameOrientationChange) {
        if change.animate {
            let outcome = self.animator.begin_orientation_change(change.to);
            self.apply_outcome(outcome);
        } else {
            self.emit(PipelineEvent::FrameOrientationChanged {
                orientation: change.to,
                animated: false,
            });
        }
    }

    fn begin_camera_flip(&mut self, side: CameraSide) {
        if self.requested_side == side {
            debug!(?side, "Camera side unchanged");
            return;
        }
        self.requested_side = side;
        let snapshot = self.last_frame();
        let outcome = self.animator.begin_camera_flip(snapshot, side);
        self.apply_outcome(outcome);
    }

    fn on_animation_step(&mut self, step: AnimationStep) {
        match step {
            AnimationStep::OrientationCommit { target } => {
                if self.tracker.commit(target) {
                    self.emit(PipelineEvent::FrameOrientationChanged {
                        orientation: target,
                        animated: true,
                    });
                } else if self.tracker.pending().is_some() {
                    // A newer animated change is in flight and fades in itself
                    return;
                }
            }
            AnimationStep::FlipSettled { id, side } => {
                if !self.animator.is_current_flip(id) {
                    debug!(id, ?side, "Superseded camera flip settled");
                    return;
                }
                let previous = self
                    .state
                    .write(|s| std::mem::replace(&mut s.camera_side, side));
                if previous.is_some_and(|previous| previous != side) {
                    self.emit(PipelineEvent::CameraSideChanged(side));
                }
                self.recompute_orientation();
            }
            _ => {}
        }

        let outcome = self.animator.advance(step);
        self.apply_outcome(outcome);
    }

    fn set_light_mode(&mut self, mode: LightMode) {
        if self.state.write(|s| std::mem::replace(&mut s.light_mode, mode)) != Some(mode) {
            self.emit(PipelineEvent::LightModeChanged(mode));
        }
    }

    fn capture_still(&mut self) {
        let Some(image) = self.last_frame() else {
            warn!("No rendered frame to capture");
            return;
        };
        let flash = self.animator.begin_capture_flash();
        self.apply_outcome(flash);
        self.emit(PipelineEvent::MediaCaptured(CapturedMedia::Photo(image)));
    }

    fn finished_callback(&self) -> FinishedCallback {
        let commands = self.commands.clone();
        Box::new(move |result| {
            if let Some(commands) = commands.upgrade() {
                let _ = commands.send(Command::EncodingFinished(result));
            }
        })
    }

    fn after_start(&mut self, result: Result<RecordingStarted, RecordingError>) {
        match result {
            Ok(started) => {
                self.emit(PipelineEvent::RecordingPhaseChanged(RecordingPhase::Recording));
                self.emit(PipelineEvent::RecordingElapsed(Duration::ZERO));
                self.schedule(
                    self.config.recording_tick(),
                    Command::RecordingTick(started.generation),
                );
            }
            Err(RecordingError::AlreadyRecording) => debug!("Recording already in progress"),
            Err(e) => warn!(error = %e, "Recording did not start"),
        }
    }

    fn after_stop(&mut self, result: Result<Option<PosterFrame>, RecordingError>) {
        match result {
            Ok(poster) => {
                if let Some(poster) = poster {
                    self.emit(PipelineEvent::PlaceholderReady(poster));
                }
                self.emit(PipelineEvent::RecordingElapsed(Duration::ZERO));
                self.emit(PipelineEvent::RecordingPhaseChanged(RecordingPhase::Stopping));
            }
            Err(e) => debug!(error = %e, "Ignoring stop request"),
        }
    }

    fn on_encoding_finished(&mut self, result: Result<PathBuf, MediaError>) {
        let filters = self
            .state
            .read(|s| s.active_filters.clone())
            .unwrap_or_default();

        match self.recorder.on_encoding_finished(result, &filters) {
            FinishAction::Publish(path) => {
                self.emit(PipelineEvent::RecordingPhaseChanged(RecordingPhase::Idle));
                self.schedule(self.config.publish_delay(), Command::Publish(path));
            }
            FinishAction::Export(job) => {
                self.emit(PipelineEvent::RecordingPhaseChanged(RecordingPhase::Exporting));
                let export = self.exporter.export(job.source, job.filter, job.destination);
                let commands = self.commands.clone();
                tokio::spawn(async move {
                    let result = export.await;
                    if let Some(commands) = commands.upgrade() {
                        let _ = commands.send(Command::ExportFinished(result));
                    }
                });
            }
            FinishAction::Discard => {
                self.emit(PipelineEvent::RecordingPhaseChanged(self.recorder.phase()));
            }
        }
    }

    fn on_session_event(&mut self, event: SessionEvent) {
        info!(?event, "Session event");
        match event {
            SessionEvent::Interrupted => {
                self.set_light_mode(LightMode::Off);
                self.recorder.reset();
                self.emit(PipelineEvent::RecordingElapsed(Duration::ZERO));
            }
            SessionEvent::AppForegrounded => {
                let entrance = self.animator.begin_entrance();
                self.apply_outcome(entrance);
                self.recompute_orientation();
            }
        }
    }
}
