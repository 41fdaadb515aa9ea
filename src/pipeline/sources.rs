// SPDX-License-Identifier: GPL-3.0-only

//! Producers feeding the pipeline
//!
//! Motion samples are polled at a fixed interval on the async runtime and
//! forwarded to the control thread. Video frames arrive on a dedicated
//! thread and go straight to the [`FrameSink`], which never waits for the
//! control thread.

use super::{FrameSink, PipelineController};
use crate::frame::VideoFrame;
use crate::orientation::Acceleration;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Accelerometer readings
pub trait MotionSource: Send + 'static {
    /// Current acceleration; `None` when the reading is unavailable
    fn read(&mut self) -> Option<Acceleration>;
}

/// Video frames at the session's native rate
pub trait VideoSource: Send + 'static {
    /// Block until the next frame; `None` ends the stream
    fn next_frame(&mut self) -> Option<VideoFrame>;
}

/// Fixed-interval accelerometer polling task
pub struct MotionUpdates {
    task: tokio::task::JoinHandle<()>,
}

impl MotionUpdates {
    /// Start polling `source` every `interval` on the current runtime
    pub fn start(
        mut source: impl MotionSource,
        interval: Duration,
        control: PipelineController,
    ) -> Self {
        info!(interval_ms = interval.as_millis() as u64, "Starting motion updates");
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if !control.acceleration_sample(source.read()) {
                    debug!("Pipeline released, stopping motion updates");
                    break;
                }
            }
        });
        Self { task }
    }

    pub fn stop(self) {
        self.task.abort();
    }
}

impl Drop for MotionUpdates {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Dedicated thread pulling frames from a [`VideoSource`]
pub struct SourceLoop {
    thread_handle: Option<JoinHandle<()>>,
    stop_signal: Arc<AtomicBool>,
    name: String,
}

impl SourceLoop {
    /// Start delivering frames from `source` into `sink`
    ///
    /// The loop ends when the source is exhausted, the sink's pipeline is
    /// released or [`stop`](Self::stop) is called.
    pub fn start(name: &str, mut source: impl VideoSource, sink: FrameSink) -> Self {
        let stop_signal = Arc::new(AtomicBool::new(false));
        let stop_signal_clone = Arc::clone(&stop_signal);
        let name_clone = name.to_string();

        info!(name = %name, "Starting video source loop");

        let thread_handle = thread::spawn(move || {
            loop {
                if stop_signal_clone.load(Ordering::SeqCst) {
                    debug!(name = %name_clone, "Stop signal received");
                    break;
                }

                let Some(frame) = source.next_frame() else {
                    debug!(name = %name_clone, "Video source exhausted");
                    break;
                };

                if !sink.is_attached() {
                    debug!(name = %name_clone, "Pipeline released");
                    break;
                }

                // Skips are per-frame and never end the loop
                let _ = sink.on_video_frame(&frame);
            }

            info!(name = %name_clone, "Video source loop exiting");
        });

        Self {
            thread_handle: Some(thread_handle),
            stop_signal,
            name: name.to_string(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.thread_handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// Signal the loop to stop and wait for the thread
    pub fn stop(&mut self) {
        self.stop_signal.store(true, Ordering::SeqCst);
        if let Some(handle) = self.thread_handle.take()
            && handle.join().is_err()
        {
            warn!(name = %self.name, "Video source thread panicked");
        }
    }
}

impl Drop for SourceLoop {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Replays a fixed list of readings, then repeats the last one
#[derive(Debug, Clone)]
pub struct ScriptedMotion {
    samples: Vec<Option<Acceleration>>,
    position: usize,
}

impl ScriptedMotion {
    pub fn new(samples: Vec<Option<Acceleration>>) -> Self {
        Self {
            samples,
            position: 0,
        }
    }

    /// Device slowly turning portrait -> landscape-left -> portrait ->
    /// landscape-right, `steps` samples per quarter turn
    pub fn rotating(steps: usize) -> Self {
        let steps = steps.max(1);
        let mut samples = Vec::with_capacity(steps * 4);
        for quarter in 0..4 {
            for i in 0..steps {
                let t = i as f64 / steps as f64 * std::f64::consts::FRAC_PI_2;
                let angle = quarter as f64 * std::f64::consts::FRAC_PI_2 + t;
                // Gravity rotating in the device's x/y plane
                samples.push(Some(Acceleration::new(angle.sin(), -angle.cos(), 0.0)));
            }
        }
        Self::new(samples)
    }
}

impl MotionSource for ScriptedMotion {
    fn read(&mut self) -> Option<Acceleration> {
        let sample = self
            .samples
            .get(self.position)
            .or_else(|| self.samples.last())
            .copied()
            .flatten();
        self.position += 1;
        sample
    }
}

/// Moving gradient frames at a fixed rate
#[derive(Debug, Clone)]
pub struct SyntheticFrames {
    width: u32,
    height: u32,
    frame_interval: Duration,
    remaining: Option<u64>,
    index: u64,
}

impl SyntheticFrames {
    /// `limit` bounds the number of frames; `None` runs until stopped
    pub fn new(width: u32, height: u32, framerate: u32, limit: Option<u64>) -> Self {
        Self {
            width,
            height,
            frame_interval: Duration::from_secs(1) / framerate.max(1),
            remaining: limit,
            index: 0,
        }
    }

    /// Generate frame `index` without pacing
    pub fn frame(&self, index: u64) -> VideoFrame {
        let (width, height) = (self.width, self.height);
        let shift = (index * 4) as u32;
        let mut data = Vec::with_capacity(width as usize * height as usize * 4);
        for y in 0..height {
            for x in 0..width {
                data.push(((x + shift) * 255 / width.max(1)) as u8);
                data.push((y * 255 / height.max(1)) as u8);
                data.push((index % 256) as u8);
                data.push(255);
            }
        }
        VideoFrame::from_rgba(width, height, data, self.frame_interval * index as u32)
    }
}

impl VideoSource for SyntheticFrames {
    fn next_frame(&mut self) -> Option<VideoFrame> {
        if let Some(remaining) = self.remaining.as_mut() {
            if *remaining == 0 {
                return None;
            }
            *remaining -= 1;
        }

        if self.index > 0 {
            thread::sleep(self.frame_interval);
        }
        let frame = self.frame(self.index);
        self.index += 1;
        Some(frame)
    }
}
