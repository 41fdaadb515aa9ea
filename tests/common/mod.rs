// SPDX-License-Identifier: GPL-3.0-only

//! In-memory collaborators shared by the integration tests

#![allow(dead_code)]

use camera_pipeline::config::{AnimationTimings, GpuBackend, PipelineConfig};
use camera_pipeline::errors::MediaError;
use camera_pipeline::filters::FrameFilter;
use camera_pipeline::frame::VideoFrame;
use camera_pipeline::media::{
    ConnectionSettings, ExportFacility, FileLocations, FinishedCallback, MovieOutput,
};
use camera_pipeline::pipeline::{Collaborators, PipelineEvent};
use futures::future::BoxFuture;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{Notify, broadcast};

/// Movie output that "encodes" instantly and finishes on a helper thread
#[derive(Default)]
pub struct MockOutput {
    active: Mutex<Option<(PathBuf, FinishedCallback)>>,
    pub settings: Mutex<Vec<ConnectionSettings>>,
    pub frames: AtomicUsize,
    pub fail_encoding: AtomicBool,
    pub refuse_attach: AtomicBool,
    /// Keep finished recordings until `finish_held` is called
    pub hold_finish: AtomicBool,
    held: Mutex<Option<(PathBuf, FinishedCallback)>>,
}

impl MockOutput {
    /// Report a held recording as finished
    pub fn finish_held(&self) {
        if let Some((path, on_finished)) = self.held.lock().unwrap().take() {
            on_finished(Ok(path));
        }
    }
}

impl MovieOutput for MockOutput {
    fn attach(&self) -> Result<(), MediaError> {
        if self.refuse_attach.load(Ordering::SeqCst) {
            Err(MediaError::Pipeline("session busy".into()))
        } else {
            Ok(())
        }
    }

    fn is_recording(&self) -> bool {
        self.active.lock().unwrap().is_some()
    }

    fn start_recording(
        &self,
        path: &Path,
        settings: ConnectionSettings,
        on_finished: FinishedCallback,
    ) -> Result<(), MediaError> {
        self.settings.lock().unwrap().push(settings);
        *self.active.lock().unwrap() = Some((path.to_path_buf(), on_finished));
        Ok(())
    }

    fn append_frame(&self, _frame: &VideoFrame) {
        if self.is_recording() {
            self.frames.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn stop_recording(&self) {
        let Some((path, on_finished)) = self.active.lock().unwrap().take() else {
            return;
        };
        if self.hold_finish.load(Ordering::SeqCst) {
            *self.held.lock().unwrap() = Some((path, on_finished));
            return;
        }
        let fail = self.fail_encoding.load(Ordering::SeqCst);
        std::thread::spawn(move || {
            if fail {
                on_finished(Err(MediaError::Encoding("disk full".into())));
            } else {
                on_finished(Ok(path));
            }
        });
    }
}

/// Exporter that copies nothing and reports the destination
#[derive(Default)]
pub struct MockExporter {
    pub fail: AtomicBool,
    pub calls: Mutex<Vec<(PathBuf, PathBuf)>>,
    /// Exports wait for `release` while set
    pub hold: AtomicBool,
    pub release: Arc<Notify>,
}

impl ExportFacility for MockExporter {
    fn export(
        &self,
        source: PathBuf,
        filter: FrameFilter,
        destination: PathBuf,
    ) -> BoxFuture<'static, Result<PathBuf, MediaError>> {
        self.calls
            .lock()
            .unwrap()
            .push((source.clone(), destination.clone()));
        let fail = self.fail.load(Ordering::SeqCst);
        let gate = self
            .hold
            .load(Ordering::SeqCst)
            .then(|| Arc::clone(&self.release));
        Box::pin(async move {
            if let Some(gate) = gate {
                gate.notified().await;
            }
            // Exercise the filter like a real export would
            let _ = filter(image::RgbaImage::new(2, 2));
            if fail {
                Err(MediaError::Encoding("export failed".into()))
            } else {
                Ok(destination)
            }
        })
    }
}

/// Sequentially numbered paths
#[derive(Default)]
pub struct MockFiles {
    next: AtomicUsize,
}

impl FileLocations for MockFiles {
    fn prepare_video_output(&self) -> Option<PathBuf> {
        let n = self.next.fetch_add(1, Ordering::SeqCst);
        Some(PathBuf::from(format!("/virtual/clip-{}.mp4", n)))
    }
}

pub struct Mocks {
    pub output: Arc<MockOutput>,
    pub exporter: Arc<MockExporter>,
    pub files: Arc<MockFiles>,
}

impl Mocks {
    pub fn new() -> Self {
        Self {
            output: Arc::new(MockOutput::default()),
            exporter: Arc::new(MockExporter::default()),
            files: Arc::new(MockFiles::default()),
        }
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            movie_output: self.output.clone(),
            exporter: self.exporter.clone(),
            files: self.files.clone(),
            gpu: None,
        }
    }
}

/// Software rendering, instant animations, fast clock
pub fn test_config() -> PipelineConfig {
    PipelineConfig {
        gpu_backend: GpuBackend::Software,
        animations: AnimationTimings::instant(),
        recording_tick_ms: 10,
        publish_delay_ms: 0,
        ..Default::default()
    }
}

/// Solid 4x2 RGBA frame
pub fn frame() -> VideoFrame {
    VideoFrame::from_rgba(4, 2, vec![200u8; 4 * 2 * 4], Duration::ZERO)
}

/// Wait for the first event matching `predicate`
pub async fn wait_for(
    events: &mut broadcast::Receiver<PipelineEvent>,
    mut predicate: impl FnMut(&PipelineEvent) -> bool,
) -> Option<PipelineEvent> {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    loop {
        let event = tokio::time::timeout_at(deadline, events.recv()).await.ok()?;
        match event {
            Ok(event) if predicate(&event) => return Some(event),
            Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
            Err(broadcast::error::RecvError::Closed) => return None,
        }
    }
}

/// Every event arriving within `window`
pub async fn drain(
    events: &mut broadcast::Receiver<PipelineEvent>,
    window: Duration,
) -> Vec<PipelineEvent> {
    let mut collected = Vec::new();
    let deadline = tokio::time::Instant::now() + window;
    while let Ok(Ok(event)) = tokio::time::timeout_at(deadline, events.recv()).await {
        collected.push(event);
    }
    collected
}
