// SPDX-License-Identifier: GPL-3.0-only

//! GPU context abstraction for the preview surface

use crate::config::GpuBackend;
use crate::errors::{FrameSkip, PipelineResult};
use image::RgbaImage;
use image::imageops::{self, FilterType as ResizeFilter};
use tracing::info;

/// Size of a drawable or image in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Extent {
    pub width: u32,
    pub height: u32,
}

impl Extent {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn of(image: &RgbaImage) -> Self {
        let (width, height) = image.dimensions();
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl std::fmt::Display for Extent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// GPU context plus the drawable surface it presents to
///
/// Exclusively owned by the frame renderer. `render` must never block on
/// the display: when no drawable or command buffer is free it returns a
/// [`FrameSkip`] and the frame is dropped.
pub trait GpuContext: Send {
    /// Human-readable adapter name
    fn name(&self) -> &str;

    /// Current drawable size
    fn drawable_size(&self) -> Extent;

    /// Resize the drawable surface
    fn set_drawable_size(&mut self, size: Extent);

    /// Render `image` into the current drawable, commit and present
    fn render(&mut self, image: &RgbaImage) -> Result<(), FrameSkip>;
}

/// Create the context selected in the configuration
///
/// Failure to acquire a hardware device is fatal for the pipeline; there is
/// no silent fallback to the software context.
pub fn create_context(backend: GpuBackend) -> PipelineResult<Box<dyn GpuContext>> {
    match backend {
        GpuBackend::Wgpu => Ok(Box::new(super::wgpu_context::WgpuContext::new()?)),
        GpuBackend::Software => Ok(Box::new(SoftwareContext::new())),
    }
}

/// CPU framebuffer standing in for a GPU surface
#[derive(Debug, Default)]
pub struct SoftwareContext {
    size: Extent,
    framebuffer: Option<RgbaImage>,
    presented: u64,
}

impl SoftwareContext {
    pub fn new() -> Self {
        info!("Using software preview context");
        Self::default()
    }

    /// Last presented image
    pub fn framebuffer(&self) -> Option<&RgbaImage> {
        self.framebuffer.as_ref()
    }

    /// Number of presented frames
    pub fn presented(&self) -> u64 {
        self.presented
    }
}

impl GpuContext for SoftwareContext {
    fn name(&self) -> &str {
        "software"
    }

    fn drawable_size(&self) -> Extent {
        self.size
    }

    fn set_drawable_size(&mut self, size: Extent) {
        self.size = size;
    }

    fn render(&mut self, image: &RgbaImage) -> Result<(), FrameSkip> {
        if self.size.is_empty() {
            return Err(FrameSkip::NoDrawable);
        }

        let target = if Extent::of(image) == self.size {
            image.clone()
        } else {
            imageops::resize(image, self.size.width, self.size.height, ResizeFilter::Triangle)
        };

        self.framebuffer = Some(target);
        self.presented += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_software_context_needs_a_drawable_size() {
        let mut context = SoftwareContext::new();
        let image = RgbaImage::from_pixel(2, 2, Rgba([1, 2, 3, 255]));
        assert_eq!(context.render(&image), Err(FrameSkip::NoDrawable));

        context.set_drawable_size(Extent::of(&image));
        assert_eq!(context.render(&image), Ok(()));
        assert_eq!(context.presented(), 1);
        assert_eq!(context.framebuffer(), Some(&image));
    }

    #[test]
    fn test_software_context_scales_to_drawable() {
        let mut context = SoftwareContext::new();
        context.set_drawable_size(Extent::new(4, 4));
        context
            .render(&RgbaImage::from_pixel(2, 2, Rgba([9, 9, 9, 255])))
            .unwrap();
        assert_eq!(context.framebuffer().unwrap().dimensions(), (4, 4));
    }
}
