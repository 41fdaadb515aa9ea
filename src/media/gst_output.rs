// SPDX-License-Identifier: GPL-3.0-only

//! GStreamer movie output
//!
//! Live frames are pushed through
//! `appsrc -> videoflip -> videoconvert -> h264 encoder -> h264parse -> mp4mux -> filesink`.
//! The pipeline is built when the first frame of a recording arrives, since
//! only then the frame geometry is known. Stopping sends EOS and waits for
//! the muxer on a helper thread, which then fires the finished callback.

use super::{ConnectionSettings, FinishedCallback, MovieOutput};
use crate::config::EncodeSettings;
use crate::errors::MediaError;
use crate::frame::{PixelFormat, VideoFrame};
use gstreamer as gst;
use gstreamer::prelude::*;
use gstreamer_app as gst_app;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Maximum time to wait for the muxer to finalize a file
const FINALIZE_TIMEOUT_SECS: u64 = 10;

/// H.264 encoders in order of preference, with the unit of their bitrate
/// property (true = bits per second, false = kbit/s)
const H264_ENCODERS: &[(&str, bool)] = &[
    ("vah264enc", false),
    ("x264enc", false),
    ("openh264enc", true),
];

/// Elements that must exist for recording to work at all
const REQUIRED_ELEMENTS: &[&str] = &[
    "appsrc",
    "videoflip",
    "videoconvert",
    "h264parse",
    "mp4mux",
    "filesink",
];

/// Check that the required GStreamer elements are installed
pub fn check_elements() -> Result<(), MediaError> {
    gst::init()?;

    for name in REQUIRED_ELEMENTS {
        if gst::ElementFactory::find(name).is_none() {
            return Err(MediaError::Pipeline(format!("Missing element: {}", name)));
        }
    }

    if !H264_ENCODERS
        .iter()
        .any(|(name, _)| gst::ElementFactory::find(name).is_some())
    {
        return Err(MediaError::Pipeline("No H.264 encoder available".into()));
    }
    Ok(())
}

/// Create the first available H.264 encoder
fn select_h264_encoder(bitrate_kbps: u32) -> Result<gst::Element, MediaError> {
    for (name, bits_per_second) in H264_ENCODERS {
        if gst::ElementFactory::find(name).is_none() {
            continue;
        }

        let encoder = gst::ElementFactory::make(name)
            .build()
            .map_err(|e| MediaError::Pipeline(format!("Failed to create {}: {}", name, e)))?;

        let bitrate = if *bits_per_second {
            bitrate_kbps.saturating_mul(1000)
        } else {
            bitrate_kbps
        };
        if encoder.has_property("bitrate") {
            encoder.set_property("bitrate", bitrate);
        }
        if *name == "x264enc" {
            encoder.set_property_from_str("tune", "zerolatency");
            encoder.set_property_from_str("speed-preset", "veryfast");
        }

        debug!(encoder = name, bitrate_kbps, "Selected H.264 encoder");
        return Ok(encoder);
    }
    Err(MediaError::Pipeline("No H.264 encoder available".into()))
}

fn make(factory: &str) -> Result<gst::Element, MediaError> {
    gst::ElementFactory::make(factory)
        .build()
        .map_err(|e| MediaError::Pipeline(format!("Failed to create {}: {}", factory, e)))
}

/// Appsrc-fed encoding pipeline writing one MP4 file
pub(crate) struct EncodePipeline {
    pipeline: gst::Pipeline,
    appsrc: gst_app::AppSrc,
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) path: PathBuf,
}

impl EncodePipeline {
    /// Build and start the pipeline for frames of the given geometry
    pub(crate) fn new(
        width: u32,
        height: u32,
        format: PixelFormat,
        video_direction: &str,
        path: &Path,
        encode: &EncodeSettings,
    ) -> Result<Self, MediaError> {
        gst::init()?;

        info!(
            width,
            height,
            direction = video_direction,
            output = %path.display(),
            "Creating encode pipeline"
        );

        let pipeline = gst::Pipeline::new();

        let caps = gst::Caps::builder("video/x-raw")
            .field(
                "format",
                match format {
                    PixelFormat::Rgba => "RGBA",
                    PixelFormat::Bgra => "BGRA",
                },
            )
            .field("width", width as i32)
            .field("height", height as i32)
            .field("framerate", gst::Fraction::new(encode.framerate as i32, 1))
            .build();

        let appsrc = make("appsrc")?
            .dynamic_cast::<gst_app::AppSrc>()
            .map_err(|_| MediaError::Pipeline("Failed to cast to AppSrc".into()))?;
        appsrc.set_caps(Some(&caps));
        appsrc.set_format(gst::Format::Time);
        appsrc.set_is_live(false);

        let videoflip = gst::ElementFactory::make("videoflip")
            .property_from_str("video-direction", video_direction)
            .build()
            .map_err(|e| MediaError::Pipeline(format!("Failed to create videoflip: {}", e)))?;
        let videoconvert = make("videoconvert")?;

        // Rotated output swaps width and height
        let encoder = select_h264_encoder(encode.bitrate_preset.bitrate_kbps(width.max(height)))?;
        let parser = make("h264parse")?;
        let muxer = make("mp4mux")?;
        let filesink = gst::ElementFactory::make("filesink")
            .property("location", path.to_string_lossy().to_string())
            .build()
            .map_err(|e| MediaError::Pipeline(format!("Failed to create filesink: {}", e)))?;

        let elements = [
            appsrc.upcast_ref::<gst::Element>(),
            &videoflip,
            &videoconvert,
            &encoder,
            &parser,
            &muxer,
            &filesink,
        ];
        pipeline.add_many(elements)?;
        gst::Element::link_many(elements)?;

        pipeline.set_state(gst::State::Playing)?;

        Ok(Self {
            pipeline,
            appsrc,
            width,
            height,
            path: path.to_path_buf(),
        })
    }

    /// Push one tightly packed or strided buffer
    pub(crate) fn push(&self, data: &[u8], pts: Duration) -> Result<(), MediaError> {
        let mut buffer = gst::Buffer::from_slice(data.to_vec());
        if let Some(buffer) = buffer.get_mut() {
            buffer.set_pts(gst::ClockTime::from_nseconds(pts.as_nanos() as u64));
        }
        self.appsrc
            .push_buffer(buffer)
            .map_err(|e| MediaError::Encoding(format!("Failed to push frame: {:?}", e)))?;
        Ok(())
    }

    /// Send EOS and block until the file is finalized
    pub(crate) fn finish(self) -> Result<PathBuf, MediaError> {
        if let Err(e) = self.appsrc.end_of_stream() {
            warn!(?e, "Failed to send EOS to encoder");
        }

        let bus = self
            .pipeline
            .bus()
            .ok_or_else(|| MediaError::Pipeline("No bus available".into()))?;

        let result = match bus.timed_pop_filtered(
            gst::ClockTime::from_seconds(FINALIZE_TIMEOUT_SECS),
            &[gst::MessageType::Eos, gst::MessageType::Error],
        ) {
            Some(msg) => match msg.view() {
                gst::MessageView::Error(err) => {
                    error!(
                        error = %err.error(),
                        debug = ?err.debug(),
                        source = ?err.src().map(|s| s.name()),
                        "GStreamer error while finalizing"
                    );
                    Err(MediaError::Encoding(err.error().to_string()))
                }
                _ => Ok(self.path.clone()),
            },
            None => Err(MediaError::Encoding("Timed out finalizing file".into())),
        };

        self.pipeline.set_state(gst::State::Null)?;
        result
    }
}

impl Drop for EncodePipeline {
    fn drop(&mut self) {
        let _ = self.pipeline.set_state(gst::State::Null);
    }
}

struct ActiveRecording {
    path: PathBuf,
    settings: ConnectionSettings,
    encoder: Option<EncodePipeline>,
    on_finished: Option<FinishedCallback>,
    first_timestamp: Option<Duration>,
    frames: u64,
}

impl ActiveRecording {
    fn fail(mut self, err: MediaError) {
        error!(error = %err, path = %self.path.display(), "Recording failed");
        if let Some(callback) = self.on_finished.take() {
            callback(Err(err));
        }
    }
}

/// Movie output encoding live frames with GStreamer
pub struct GstMovieOutput {
    encode: EncodeSettings,
    active: Mutex<Option<ActiveRecording>>,
}

impl GstMovieOutput {
    pub fn new(encode: EncodeSettings) -> Self {
        Self {
            encode,
            active: Mutex::new(None),
        }
    }

    fn active(&self) -> std::sync::MutexGuard<'_, Option<ActiveRecording>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl MovieOutput for GstMovieOutput {
    fn attach(&self) -> Result<(), MediaError> {
        check_elements()
    }

    fn is_recording(&self) -> bool {
        self.active().is_some()
    }

    fn start_recording(
        &self,
        path: &Path,
        settings: ConnectionSettings,
        on_finished: FinishedCallback,
    ) -> Result<(), MediaError> {
        let mut active = self.active();
        if active.is_some() {
            return Err(MediaError::Pipeline("Recording already in progress".into()));
        }

        *active = Some(ActiveRecording {
            path: path.to_path_buf(),
            settings,
            encoder: None,
            on_finished: Some(on_finished),
            first_timestamp: None,
            frames: 0,
        });
        Ok(())
    }

    fn append_frame(&self, frame: &VideoFrame) {
        let mut guard = self.active();
        let Some(recording) = guard.as_mut() else {
            return;
        };

        if !frame.is_complete() {
            debug!("Skipping incomplete frame for recording");
            return;
        }

        if recording.encoder.is_none() {
            match EncodePipeline::new(
                frame.width,
                frame.height,
                frame.format,
                recording.settings.video_direction(),
                &recording.path,
                &self.encode,
            ) {
                Ok(encoder) => recording.encoder = Some(encoder),
                Err(e) => {
                    if let Some(recording) = guard.take() {
                        drop(guard);
                        recording.fail(e);
                    }
                    return;
                }
            }
        }

        let Some(encoder) = recording.encoder.as_ref() else {
            return;
        };
        if frame.width != encoder.width || frame.height != encoder.height {
            debug!(
                width = frame.width,
                height = frame.height,
                "Skipping frame with changed geometry"
            );
            return;
        }

        let first = *recording.first_timestamp.get_or_insert(frame.timestamp);
        let pts = frame.timestamp.saturating_sub(first);
        let data = packed_rows(frame);
        match encoder.push(&data, pts) {
            Ok(()) => recording.frames += 1,
            Err(e) => warn!(error = %e, "Dropped frame for recording"),
        }
    }

    fn stop_recording(&self) {
        let Some(mut recording) = self.active().take() else {
            debug!("Stop requested without active recording");
            return;
        };

        let Some(encoder) = recording.encoder.take() else {
            recording.fail(MediaError::NoFrames);
            return;
        };

        info!(
            path = %recording.path.display(),
            frames = recording.frames,
            "Finalizing recording"
        );

        let on_finished = recording.on_finished.take();
        std::thread::spawn(move || {
            let result = encoder.finish();
            if let Some(callback) = on_finished {
                callback(result);
            }
        });
    }
}

/// Copy frame rows without stride padding
fn packed_rows(frame: &VideoFrame) -> Vec<u8> {
    let row = frame.width as usize * frame.format.bytes_per_pixel();
    let stride = frame.stride as usize;
    if stride == row {
        return frame.data[..row * frame.height as usize].to_vec();
    }

    let mut packed = Vec::with_capacity(row * frame.height as usize);
    for y in 0..frame.height as usize {
        let start = y * stride;
        packed.extend_from_slice(&frame.data[start..start + row]);
    }
    packed
}
