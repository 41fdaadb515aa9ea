// SPDX-License-Identifier: GPL-3.0-only

//! Live preview rendering
//!
//! [`FrameRenderer`] turns every incoming [`VideoFrame`] into an oriented,
//! filtered image and presents it through the [`GpuContext`]. The path never
//! waits: frames that cannot be presented right now are dropped.

pub mod animation;
pub mod context;
pub mod wgpu_context;

pub use animation::{
    AnimationOutcome, AnimationStep, Continuation, FlipDirection, PreviewAnimator,
    PreviewAppearance, PreviewEvent,
};
pub use context::{Extent, GpuContext, SoftwareContext, create_context};

use crate::errors::FrameSkip;
use crate::filters::FilterChain;
use crate::frame::VideoFrame;
use crate::state::{FrameOrientation, StateHandle};
use image::RgbaImage;
use image::imageops;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, trace};

/// Apply `orientation` to an image, producing the upright pixels
pub fn orient_image(image: RgbaImage, orientation: FrameOrientation) -> RgbaImage {
    match orientation {
        FrameOrientation::Up => image,
        FrameOrientation::UpMirrored => imageops::flip_horizontal(&image),
        FrameOrientation::Down => imageops::rotate180(&image),
        FrameOrientation::DownMirrored => imageops::flip_vertical(&image),
        FrameOrientation::Right => imageops::rotate90(&image),
        FrameOrientation::Left => imageops::rotate270(&image),
        FrameOrientation::LeftMirrored => imageops::flip_horizontal(&imageops::rotate90(&image)),
        FrameOrientation::RightMirrored => {
            imageops::flip_horizontal(&imageops::rotate270(&image))
        }
    }
}

/// Frame counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    pub rendered: u64,
    pub dropped: u64,
}

/// Most recently rendered image, shared with the control thread
///
/// Kept behind its own lock so readers never wait for a render in progress.
#[derive(Debug, Clone, Default)]
pub struct LastFrame {
    image: Arc<Mutex<Option<Arc<RgbaImage>>>>,
}

impl LastFrame {
    pub fn get(&self) -> Option<Arc<RgbaImage>> {
        self.image
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set(&self, image: Arc<RgbaImage>) {
        *self.image.lock().unwrap_or_else(PoisonError::into_inner) = Some(image);
    }
}

/// Owns the GPU context and the filter-and-present path
pub struct FrameRenderer {
    state: StateHandle,
    context: Box<dyn GpuContext>,
    last_frame: LastFrame,
    stats: RenderStats,
}

impl FrameRenderer {
    pub fn new(state: StateHandle, context: Box<dyn GpuContext>) -> Self {
        debug!(context = context.name(), "Frame renderer created");
        Self {
            state,
            context,
            last_frame: LastFrame::default(),
            stats: RenderStats::default(),
        }
    }

    /// Orient, filter and present one frame
    ///
    /// The returned [`FrameSkip`] is informational; callers drop the frame
    /// and continue with the next one.
    pub fn on_video_frame(&mut self, frame: &VideoFrame) -> Result<(), FrameSkip> {
        let result = self.render_frame(frame);
        match result {
            Ok(()) => self.stats.rendered += 1,
            Err(reason) => {
                self.stats.dropped += 1;
                trace!(%reason, "Dropped preview frame");
            }
        }
        result
    }

    fn render_frame(&mut self, frame: &VideoFrame) -> Result<(), FrameSkip> {
        let (orientation, filters) = self
            .state
            .read(|s| (s.frame_orientation, s.active_filters.clone()))
            .ok_or(FrameSkip::Detached)?;

        let image = frame.to_rgba_image().ok_or(FrameSkip::BufferUnavailable)?;
        let image = orient_image(image, orientation);
        let image = FilterChain::new(filters).apply(image);

        let extent = Extent::of(&image);
        if self.context.drawable_size() != extent {
            debug!(from = %self.context.drawable_size(), to = %extent, "Resizing drawable");
            self.context.set_drawable_size(extent);
        }

        // Retained before presenting so a missing drawable still leaves a
        // usable still and poster frame
        let image = Arc::new(image);
        self.last_frame.set(Arc::clone(&image));

        self.context.render(&image)
    }

    /// Last rendered image, for still capture and poster frames
    pub fn snapshot(&self) -> Option<Arc<RgbaImage>> {
        self.last_frame.get()
    }

    /// Handle to the last rendered image that outlives a locked renderer
    pub fn last_frame(&self) -> LastFrame {
        self.last_frame.clone()
    }

    pub fn stats(&self) -> RenderStats {
        self.stats
    }

    pub fn context_name(&self) -> &str {
        self.context.name()
    }
}

impl std::fmt::Debug for FrameRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameRenderer")
            .field("context", &self.context.name())
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::FilterType;
    use crate::state::{SharedCaptureState, StateOwner};
    use image::Rgba;
    use std::time::Duration;

    /// 2x1 frame: red on the left, blue on the right
    fn red_blue_frame() -> VideoFrame {
        VideoFrame::from_rgba(
            2,
            1,
            vec![255, 0, 0, 255, 0, 0, 255, 255],
            Duration::ZERO,
        )
    }

    fn red_blue_image() -> RgbaImage {
        red_blue_frame().to_rgba_image().unwrap()
    }

    #[test]
    fn test_orient_up_is_identity() {
        let image = red_blue_image();
        assert_eq!(orient_image(image.clone(), FrameOrientation::Up), image);
    }

    #[test]
    fn test_orient_quarter_turns_swap_dimensions() {
        for orientation in [
            FrameOrientation::Left,
            FrameOrientation::Right,
            FrameOrientation::LeftMirrored,
            FrameOrientation::RightMirrored,
        ] {
            let oriented = orient_image(red_blue_image(), orientation);
            assert_eq!(oriented.dimensions(), (1, 2), "{orientation}");
        }
        for orientation in [
            FrameOrientation::Up,
            FrameOrientation::Down,
            FrameOrientation::UpMirrored,
            FrameOrientation::DownMirrored,
        ] {
            let oriented = orient_image(red_blue_image(), orientation);
            assert_eq!(oriented.dimensions(), (2, 1), "{orientation}");
        }
    }

    #[test]
    fn test_orient_right_rotates_clockwise() {
        let oriented = orient_image(red_blue_image(), FrameOrientation::Right);
        // Left edge becomes the top edge
        assert_eq!(*oriented.get_pixel(0, 0), Rgba([255, 0, 0, 255]));
        assert_eq!(*oriented.get_pixel(0, 1), Rgba([0, 0, 255, 255]));
    }

    #[test]
    fn test_orient_mirrored_differs_from_plain() {
        let plain = orient_image(red_blue_image(), FrameOrientation::Up);
        let mirrored = orient_image(red_blue_image(), FrameOrientation::UpMirrored);
        assert_eq!(*mirrored.get_pixel(0, 0), *plain.get_pixel(1, 0));
    }

    #[test]
    fn test_render_resizes_drawable_and_retains_frame() {
        let owner = StateOwner::new(SharedCaptureState {
            frame_orientation: FrameOrientation::Right,
            ..Default::default()
        });
        let mut renderer = FrameRenderer::new(owner.handle(), Box::new(SoftwareContext::new()));

        assert!(renderer.on_video_frame(&red_blue_frame()).is_ok());
        assert_eq!(renderer.snapshot().unwrap().dimensions(), (1, 2));
        assert_eq!(renderer.stats().rendered, 1);
    }

    #[test]
    fn test_last_frame_is_readable_while_renderer_is_locked() {
        let owner = StateOwner::new(SharedCaptureState::default());
        let renderer = Mutex::new(FrameRenderer::new(
            owner.handle(),
            Box::new(SoftwareContext::new()),
        ));
        let last_frame = renderer.lock().unwrap().last_frame();
        assert!(last_frame.get().is_none());

        renderer
            .lock()
            .unwrap()
            .on_video_frame(&red_blue_frame())
            .unwrap();

        // A render in progress holds the renderer lock
        let _rendering = renderer.lock().unwrap();
        assert_eq!(last_frame.get().unwrap().dimensions(), (1, 2));
    }

    #[test]
    fn test_render_applies_filters() {
        let owner = StateOwner::new(SharedCaptureState {
            frame_orientation: FrameOrientation::Up,
            active_filters: vec![FilterType::Negative],
            ..Default::default()
        });
        let mut renderer = FrameRenderer::new(owner.handle(), Box::new(SoftwareContext::new()));
        renderer.on_video_frame(&red_blue_frame()).unwrap();
        let last = renderer.snapshot().unwrap();
        assert_eq!(*last.get_pixel(0, 0), Rgba([0, 255, 255, 255]));
    }

    #[test]
    fn test_truncated_buffer_is_dropped() {
        let owner = StateOwner::new(SharedCaptureState::default());
        let mut renderer = FrameRenderer::new(owner.handle(), Box::new(SoftwareContext::new()));
        let frame = VideoFrame::from_rgba(4, 4, vec![0u8; 8], Duration::ZERO);
        assert_eq!(
            renderer.on_video_frame(&frame),
            Err(FrameSkip::BufferUnavailable)
        );
        assert_eq!(renderer.stats().dropped, 1);
        assert!(renderer.snapshot().is_none());
    }

    #[test]
    fn test_released_state_skips_frames() {
        let owner = StateOwner::new(SharedCaptureState::default());
        let mut renderer = FrameRenderer::new(owner.handle(), Box::new(SoftwareContext::new()));
        drop(owner);
        assert_eq!(
            renderer.on_video_frame(&red_blue_frame()),
            Err(FrameSkip::Detached)
        );
    }
}
