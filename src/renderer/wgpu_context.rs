// SPDX-License-Identifier: GPL-3.0-only

//! wgpu-backed preview context
//!
//! The drawable surface is a small pool of offscreen textures. A drawable is
//! busy from submission until the queue reports the work done; when every
//! drawable is busy the frame is skipped rather than queued.

use super::context::{Extent, GpuContext};
use crate::constants::DRAWABLE_POOL_SIZE;
use crate::errors::{FrameSkip, PipelineError};
use image::RgbaImage;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error, info};

/// Information about the created GPU device
#[derive(Debug, Clone)]
pub struct GpuDeviceInfo {
    /// Name of the GPU adapter
    pub adapter_name: String,
    /// Backend being used (Vulkan, Metal, ...)
    pub backend: wgpu::Backend,
}

/// Create a wgpu device and queue for the preview
pub async fn create_render_device(
    label: &str,
) -> Result<(wgpu::Device, wgpu::Queue, GpuDeviceInfo), String> {
    info!(label = label, "Creating GPU device for preview");

    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::PRIMARY,
        ..Default::default()
    });

    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        })
        .await
        .map_err(|e| format!("Failed to find suitable GPU adapter: {}", e))?;

    let adapter_info = adapter.get_info();
    info!(
        adapter = %adapter_info.name,
        backend = ?adapter_info.backend,
        "GPU adapter selected for preview"
    );

    let (device, queue) = adapter
        .request_device(&wgpu::DeviceDescriptor {
            label: Some(label),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::downlevel_defaults().using_resolution(adapter.limits()),
            memory_hints: wgpu::MemoryHints::Performance,
            ..Default::default()
        })
        .await
        .map_err(|e| format!("Failed to create GPU device: {}", e))?;

    let info = GpuDeviceInfo {
        adapter_name: adapter_info.name.clone(),
        backend: adapter_info.backend,
    };

    Ok((device, queue, info))
}

struct Drawable {
    texture: wgpu::Texture,
    in_flight: Arc<AtomicBool>,
}

/// Preview context on a hardware GPU
pub struct WgpuContext {
    device: wgpu::Device,
    queue: wgpu::Queue,
    info: GpuDeviceInfo,
    size: Extent,
    drawables: Vec<Drawable>,
    presented: u64,
    /// Set by the device-lost callback; no command buffers after that
    lost: Arc<AtomicBool>,
}

impl WgpuContext {
    /// Acquire a device; failure is a fatal setup error
    pub fn new() -> Result<Self, PipelineError> {
        let (device, queue, info) = pollster::block_on(create_render_device("camera_preview"))
            .map_err(PipelineError::GpuUnavailable)?;

        let lost = Arc::new(AtomicBool::new(false));
        let lost_flag = Arc::clone(&lost);
        device.set_device_lost_callback(move |reason, message| {
            error!(?reason, %message, "Preview GPU device lost");
            lost_flag.store(true, Ordering::Release);
        });

        Ok(Self {
            device,
            queue,
            info,
            size: Extent::default(),
            drawables: Vec::new(),
            presented: 0,
            lost,
        })
    }

    pub fn info(&self) -> &GpuDeviceInfo {
        &self.info
    }

    pub fn presented(&self) -> u64 {
        self.presented
    }

    fn rebuild_drawables(&mut self) {
        self.drawables.clear();
        if self.size.is_empty() {
            return;
        }

        let limit = self.device.limits().max_texture_dimension_2d;
        if self.size.width > limit || self.size.height > limit {
            debug!(size = %self.size, limit, "Drawable size exceeds device limit");
            return;
        }

        for index in 0..DRAWABLE_POOL_SIZE {
            let texture = self.device.create_texture(&wgpu::TextureDescriptor {
                label: Some(&format!("preview_drawable_{}", index)),
                size: wgpu::Extent3d {
                    width: self.size.width,
                    height: self.size.height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba8Unorm,
                usage: wgpu::TextureUsages::COPY_DST
                    | wgpu::TextureUsages::TEXTURE_BINDING
                    | wgpu::TextureUsages::RENDER_ATTACHMENT,
                view_formats: &[],
            });
            self.drawables.push(Drawable {
                texture,
                in_flight: Arc::new(AtomicBool::new(false)),
            });
        }

        debug!(size = %self.size, count = DRAWABLE_POOL_SIZE, "Rebuilt drawable pool");
    }

    fn next_drawable(&self) -> Option<&Drawable> {
        // Drive completion callbacks without waiting
        let _ = self.device.poll(wgpu::PollType::Poll);
        self.drawables
            .iter()
            .find(|d| !d.in_flight.load(Ordering::Acquire))
    }
}

impl GpuContext for WgpuContext {
    fn name(&self) -> &str {
        &self.info.adapter_name
    }

    fn drawable_size(&self) -> Extent {
        self.size
    }

    fn set_drawable_size(&mut self, size: Extent) {
        if size != self.size {
            self.size = size;
            self.rebuild_drawables();
        }
    }

    fn render(&mut self, image: &RgbaImage) -> Result<(), FrameSkip> {
        if self.lost.load(Ordering::Acquire) {
            return Err(FrameSkip::NoCommandBuffer);
        }
        if Extent::of(image) != self.size {
            return Err(FrameSkip::NoDrawable);
        }
        let drawable = self.next_drawable().ok_or(FrameSkip::NoDrawable)?;

        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &drawable.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            image.as_raw(),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(self.size.width * 4),
                rows_per_image: Some(self.size.height),
            },
            wgpu::Extent3d {
                width: self.size.width,
                height: self.size.height,
                depth_or_array_layers: 1,
            },
        );

        let encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("preview_present"),
            });

        drawable.in_flight.store(true, Ordering::Release);
        self.queue.submit(Some(encoder.finish()));

        let in_flight = Arc::clone(&drawable.in_flight);
        self.queue.on_submitted_work_done(move || {
            in_flight.store(false, Ordering::Release);
        });

        self.presented += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_wgpu_context_presents_when_gpu_available() {
        // Requires a GPU, skipped otherwise
        let mut context = match WgpuContext::new() {
            Ok(context) => context,
            Err(e) => {
                println!("Skipping test (no GPU): {}", e);
                return;
            }
        };

        let image = RgbaImage::from_pixel(8, 8, Rgba([0, 128, 255, 255]));
        context.set_drawable_size(Extent::of(&image));
        assert!(context.render(&image).is_ok());
        assert_eq!(context.presented(), 1);
        assert!(!context.info().adapter_name.is_empty());
    }

    #[test]
    fn test_lost_device_yields_no_command_buffer() {
        // Requires a GPU, skipped otherwise
        let mut context = match WgpuContext::new() {
            Ok(context) => context,
            Err(e) => {
                println!("Skipping test (no GPU): {}", e);
                return;
            }
        };

        let image = RgbaImage::from_pixel(4, 4, Rgba([255, 0, 0, 255]));
        context.set_drawable_size(Extent::of(&image));
        context.lost.store(true, Ordering::Release);
        assert_eq!(context.render(&image), Err(FrameSkip::NoCommandBuffer));
        assert_eq!(context.presented(), 0);
    }
}
