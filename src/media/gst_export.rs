// SPDX-License-Identifier: GPL-3.0-only

//! Filtered re-export of recorded files
//!
//! The source is decoded to RGBA through an appsink, every frame passes the
//! [`FrameFilter`] and the result is encoded again through the same encode
//! branch the live movie output uses. Runs on the blocking thread pool.

use super::ExportFacility;
use super::gst_output::EncodePipeline;
use crate::config::EncodeSettings;
use crate::errors::MediaError;
use crate::filters::FrameFilter;
use crate::frame::{PixelFormat, VideoFrame};
use futures::future::BoxFuture;
use gstreamer as gst;
use gstreamer::prelude::*;
use gstreamer_app as gst_app;
use gstreamer_video as gst_video;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const DECODE_PIPELINE: &str = "filesrc name=src ! decodebin ! videoconvert ! \
     video/x-raw,format=RGBA ! appsink name=sink sync=false";

/// Wait per sample before the bus is checked again
const PULL_TIMEOUT_MS: u64 = 100;

/// Give up when the decoder produces nothing for this long
const STALL_TIMEOUT: Duration = Duration::from_secs(10);

/// Export facility backed by GStreamer
#[derive(Debug, Clone, Copy, Default)]
pub struct GstExporter {
    encode: EncodeSettings,
}

impl GstExporter {
    pub fn new(encode: EncodeSettings) -> Self {
        Self { encode }
    }
}

impl ExportFacility for GstExporter {
    fn export(
        &self,
        source: PathBuf,
        filter: FrameFilter,
        destination: PathBuf,
    ) -> BoxFuture<'static, Result<PathBuf, MediaError>> {
        let encode = self.encode;
        Box::pin(async move {
            tokio::task::spawn_blocking(move || {
                export_blocking(&source, &filter, &destination, &encode)
            })
            .await
            .map_err(|e| MediaError::Encoding(format!("Export task failed: {}", e)))?
        })
    }
}

/// Decode, filter and encode `source` into `destination`
pub fn export_blocking(
    source: &Path,
    filter: &FrameFilter,
    destination: &Path,
    encode: &EncodeSettings,
) -> Result<PathBuf, MediaError> {
    gst::init()?;

    if !source.exists() {
        return Err(MediaError::Io(source.to_path_buf(), "File not found".into()));
    }

    info!(
        source = %source.display(),
        destination = %destination.display(),
        "Starting filtered export"
    );

    let decoder = gst::parse::launch(DECODE_PIPELINE)?
        .downcast::<gst::Pipeline>()
        .map_err(|_| MediaError::Pipeline("Decode description is not a pipeline".into()))?;
    let filesrc = decoder
        .by_name("src")
        .ok_or_else(|| MediaError::Pipeline("filesrc missing".into()))?;
    filesrc.set_property("location", source.to_string_lossy().to_string());
    let appsink = decoder
        .by_name("sink")
        .ok_or_else(|| MediaError::Pipeline("appsink missing".into()))?
        .dynamic_cast::<gst_app::AppSink>()
        .map_err(|_| MediaError::Pipeline("Failed to cast to AppSink".into()))?;

    let bus = decoder
        .bus()
        .ok_or_else(|| MediaError::Pipeline("No bus on decode pipeline".into()))?;

    decoder.set_state(gst::State::Playing)?;

    let result = pump_frames(&appsink, &bus, filter, destination, encode);
    decoder.set_state(gst::State::Null)?;
    result
}

/// Filter and encode decoded samples until EOS
///
/// Decoder errors end the export; they are not followed by EOS, so the bus
/// is polled between samples.
fn pump_frames(
    appsink: &gst_app::AppSink,
    bus: &gst::Bus,
    filter: &FrameFilter,
    destination: &Path,
    encode: &EncodeSettings,
) -> Result<PathBuf, MediaError> {
    let mut encoder: Option<EncodePipeline> = None;
    let mut frames = 0u64;
    let mut last_progress = Instant::now();

    loop {
        if let Some(msg) = bus.pop_filtered(&[gst::MessageType::Error])
            && let gst::MessageView::Error(err) = msg.view()
        {
            warn!(
                error = %err.error(),
                debug = ?err.debug(),
                "Decoder error during export"
            );
            return Err(MediaError::Encoding(format!("Decode failed: {}", err.error())));
        }

        let Some(sample) =
            appsink.try_pull_sample(gst::ClockTime::from_mseconds(PULL_TIMEOUT_MS))
        else {
            if appsink.is_eos() {
                break;
            }
            if last_progress.elapsed() >= STALL_TIMEOUT {
                return Err(MediaError::Encoding("Decoder stalled".into()));
            }
            continue;
        };
        last_progress = Instant::now();

        let Some(frame) = sample_to_frame(&sample) else {
            warn!("Skipping undecodable sample");
            continue;
        };
        let Some(image) = frame.to_rgba_image() else {
            continue;
        };

        let filtered = filter(image);
        let (width, height) = filtered.dimensions();

        if encoder.is_none() {
            encoder = Some(EncodePipeline::new(
                width,
                height,
                PixelFormat::Rgba,
                "identity",
                destination,
                encode,
            )?);
        }
        let Some(target) = encoder.as_ref() else {
            continue;
        };
        if width != target.width || height != target.height {
            debug!(width, height, "Skipping frame with changed geometry");
            continue;
        }

        target.push(filtered.as_raw(), frame.timestamp)?;
        frames += 1;
    }

    let encoder = encoder.ok_or(MediaError::NoFrames)?;
    debug!(frames, "Export frames encoded");
    encoder.finish()
}

fn sample_to_frame(sample: &gst::Sample) -> Option<VideoFrame> {
    let caps = sample.caps()?;
    let info = gst_video::VideoInfo::from_caps(caps).ok()?;
    let buffer = sample.buffer()?;
    let map = buffer.map_readable().ok()?;
    let timestamp = buffer
        .pts()
        .map(|pts| Duration::from_nanos(pts.nseconds()))
        .unwrap_or_default();

    Some(VideoFrame {
        width: info.width(),
        height: info.height(),
        stride: u32::try_from(*info.stride().first()?).ok()?,
        format: PixelFormat::Rgba,
        data: map.as_slice().into(),
        timestamp,
    })
}
