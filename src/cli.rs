// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands
//!
//! - Classifying accelerometer readings
//! - Running the pipeline headless on synthetic input
//! - Re-exporting a video through a filter chain

use camera_pipeline::config::{GpuBackend, PipelineConfig};
use camera_pipeline::filters::{FilterChain, FilterType};
use camera_pipeline::media::gst_export::export_blocking;
use camera_pipeline::orientation::{
    Acceleration, classify_acceleration, effective_orientation, target_frame_orientation,
};
use camera_pipeline::pipeline::{
    CapturePipeline, CapturedMedia, Collaborators, MotionUpdates, PipelineEvent, ScriptedMotion,
    SourceLoop, SyntheticFrames,
};
use camera_pipeline::recording::RecordingPhase;
use camera_pipeline::renderer::PreviewEvent;
use camera_pipeline::state::{CameraSide, DeviceOrientation, InterfaceOrientation};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::broadcast::error::RecvError;

/// Steps per quarter turn of the simulated device rotation
const ROTATION_STEPS: usize = 40;

/// Longest wait for a recording to be finalized and exported
const FINALIZE_TIMEOUT: Duration = Duration::from_secs(60);

/// Classify one accelerometer reading
pub fn classify(x: f64, y: f64, z: f64) -> Result<(), Box<dyn std::error::Error>> {
    let sample = Acceleration::new(x, y, z);
    if !sample.is_valid() {
        return Err("Acceleration components must be finite".into());
    }

    let device = classify_acceleration(sample, DeviceOrientation::Portrait);
    println!("Device orientation: {:?}", device);
    println!();

    let Some(effective) = effective_orientation(false, InterfaceOrientation::from(device)) else {
        println!("Upside-down readings do not change the frame orientation.");
        return Ok(());
    };

    println!("Frame orientation:");
    for side in [CameraSide::Back, CameraSide::Front] {
        for mirror in [false, true] {
            let orientation = target_frame_orientation(side, mirror, effective);
            println!(
                "  {:<5} camera, mirror {:<5} -> {}",
                format!("{:?}", side).to_lowercase(),
                mirror,
                orientation
            );
        }
    }
    Ok(())
}

/// Options of the `simulate` command
pub struct SimulateOptions {
    pub duration: u64,
    pub record: bool,
    pub filters: Vec<FilterType>,
    pub software: bool,
    pub width: u32,
    pub height: u32,
}

/// Run the pipeline on synthetic motion and frames
pub fn simulate(
    mut config: PipelineConfig,
    options: SimulateOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    if options.software {
        config.gpu_backend = GpuBackend::Software;
    }

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(run_simulation(config, options))
}

async fn run_simulation(
    config: PipelineConfig,
    options: SimulateOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let collaborators = Collaborators::gstreamer(&config);
    let framerate = config.encode.framerate;
    let motion_interval = config.accelerometer_interval();

    let handle = CapturePipeline::attach(config, collaborators)?;
    let mut events = handle.subscribe();
    let control = handle.control().clone();
    control.set_filters(options.filters);

    let motion = MotionUpdates::start(
        ScriptedMotion::rotating(ROTATION_STEPS),
        motion_interval,
        control.clone(),
    );
    let mut source = SourceLoop::start(
        "synthetic",
        SyntheticFrames::new(options.width, options.height, framerate, None),
        handle.frame_sink(),
    );

    // Set up Ctrl+C handler
    let stop_flag = Arc::new(AtomicBool::new(false));
    let stop_flag_clone = stop_flag.clone();
    ctrlc::set_handler(move || {
        stop_flag_clone.store(true, Ordering::SeqCst);
    })?;

    if options.record {
        println!("Recording... (press Ctrl+C to stop early)");
        control.start_recording();
    } else {
        println!("Simulating... (press Ctrl+C to stop early)");
    }

    let deadline = Instant::now() + Duration::from_secs(options.duration);
    let mut ticker = tokio::time::interval(Duration::from_millis(100));
    while Instant::now() < deadline && !stop_flag.load(Ordering::SeqCst) {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    // The simulated interface follows the device
                    if let PipelineEvent::DeviceOrientationChanged(device) = event {
                        control.interface_rotation(InterfaceOrientation::from(device));
                    }
                    print_event(&event);
                }
                Err(RecvError::Lagged(missed)) => println!("  ({} events skipped)", missed),
                Err(RecvError::Closed) => break,
            },
            _ = ticker.tick() => {}
        }
    }

    if options.record {
        control.stop_recording();
        println!("Finalizing recording...");

        let mut finalize_deadline = Instant::now() + FINALIZE_TIMEOUT;
        loop {
            let remaining = finalize_deadline.saturating_duration_since(Instant::now());
            match tokio::time::timeout(remaining, events.recv()).await {
                Ok(Ok(PipelineEvent::MediaCaptured(CapturedMedia::Video(path)))) => {
                    println!("Video saved: {}", path.display());
                    break;
                }
                Ok(Ok(PipelineEvent::RecordingPhaseChanged(RecordingPhase::Idle))) => {
                    // A published result follows within the settle delay
                    finalize_deadline = Instant::now() + Duration::from_secs(2);
                }
                Ok(Ok(event)) => print_event(&event),
                Ok(Err(RecvError::Lagged(_))) => {}
                Ok(Err(RecvError::Closed)) | Err(_) => {
                    println!("No video was produced.");
                    break;
                }
            }
        }
    }

    source.stop();
    motion.stop();
    handle.release().await;
    Ok(())
}

fn print_event(event: &PipelineEvent) {
    match event {
        PipelineEvent::DeviceOrientationChanged(orientation) => {
            println!("  device orientation: {:?}", orientation);
        }
        PipelineEvent::FrameOrientationChanged {
            orientation,
            animated,
        } => {
            println!(
                "  frame orientation: {}{}",
                orientation,
                if *animated { " (animated)" } else { "" }
            );
        }
        PipelineEvent::ScreenRotationBlocked(blocked) => {
            println!("  screen rotation blocked: {}", blocked);
        }
        PipelineEvent::RecordingPhaseChanged(phase) => println!("  recording: {:?}", phase),
        PipelineEvent::RecordingElapsed(elapsed) if !elapsed.is_zero() => {
            println!("  recording time: {}s", elapsed.as_secs());
        }
        PipelineEvent::PlaceholderReady(poster) => {
            let (width, height) = poster.image.dimensions();
            println!("  poster frame: {}x{}", width, height);
        }
        PipelineEvent::Preview(PreviewEvent::FlipTransition { direction, .. }) => {
            println!("  camera flip: {:?}", direction);
        }
        _ => {}
    }
}

/// Re-encode `input` through the given filters
pub fn export(
    config: &PipelineConfig,
    input: &Path,
    output: &Path,
    filters: Vec<FilterType>,
) -> Result<(), Box<dyn std::error::Error>> {
    let chain = FilterChain::new(filters);
    println!("Exporting {} with {:?}", input.display(), chain.filters());

    let start = Instant::now();
    let path = export_blocking(input, &chain.into_frame_filter(), output, &config.encode)?;

    println!(
        "Saved {} in {:.1}s",
        path.display(),
        start.elapsed().as_secs_f64()
    );
    Ok(())
}
