// SPDX-License-Identifier: GPL-3.0-only

//! Video frames delivered by the capture session

use image::RgbaImage;
use std::sync::Arc;
use std::time::Duration;

/// Pixel layout of a frame buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PixelFormat {
    #[default]
    Rgba,
    Bgra,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> usize {
        4
    }
}

/// One raw frame from the video source
///
/// Pixel data is reference counted so the same buffer can be handed to the
/// renderer and the movie output without copying.
#[derive(Debug, Clone)]
pub struct VideoFrame {
    pub width: u32,
    pub height: u32,
    /// Bytes per row (may include padding)
    pub stride: u32,
    pub format: PixelFormat,
    pub data: Arc<[u8]>,
    /// Presentation time relative to the start of the session
    pub timestamp: Duration,
}

impl VideoFrame {
    /// Tightly packed RGBA frame
    pub fn from_rgba(width: u32, height: u32, data: impl Into<Arc<[u8]>>, timestamp: Duration) -> Self {
        Self {
            width,
            height,
            stride: width * 4,
            format: PixelFormat::Rgba,
            data: data.into(),
            timestamp,
        }
    }

    /// Whether the buffer is large enough for the declared geometry
    pub fn is_complete(&self) -> bool {
        let row = self.width as usize * self.format.bytes_per_pixel();
        if self.width == 0 || self.height == 0 || (self.stride as usize) < row {
            return false;
        }
        let needed = self.stride as usize * (self.height as usize - 1) + row;
        self.data.len() >= needed
    }

    /// Wrap the buffer as an RGBA image, dropping stride padding
    ///
    /// Returns `None` for truncated or empty buffers.
    pub fn to_rgba_image(&self) -> Option<RgbaImage> {
        if !self.is_complete() {
            return None;
        }

        let row = self.width as usize * 4;
        let stride = self.stride as usize;
        let mut packed = Vec::with_capacity(row * self.height as usize);
        for y in 0..self.height as usize {
            let start = y * stride;
            packed.extend_from_slice(&self.data[start..start + row]);
        }

        if self.format == PixelFormat::Bgra {
            for pixel in packed.chunks_exact_mut(4) {
                pixel.swap(0, 2);
            }
        }

        RgbaImage::from_raw(self.width, self.height, packed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stride_padding_is_removed() {
        // 2x2 frame with 4 bytes of padding per row
        let data: Vec<u8> = vec![
            1, 2, 3, 4, 5, 6, 7, 8, 0, 0, 0, 0, //
            9, 10, 11, 12, 13, 14, 15, 16, 0, 0, 0, 0,
        ];
        let frame = VideoFrame {
            width: 2,
            height: 2,
            stride: 12,
            format: PixelFormat::Rgba,
            data: data.into(),
            timestamp: Duration::ZERO,
        };
        let image = frame.to_rgba_image().unwrap();
        assert_eq!(image.get_pixel(1, 1).0, [13, 14, 15, 16]);
    }

    #[test]
    fn test_bgra_is_swizzled() {
        let frame = VideoFrame {
            format: PixelFormat::Bgra,
            ..VideoFrame::from_rgba(1, 1, vec![30u8, 20, 10, 255], Duration::ZERO)
        };
        assert_eq!(frame.to_rgba_image().unwrap().get_pixel(0, 0).0, [10, 20, 30, 255]);
    }

    #[test]
    fn test_truncated_buffer_is_rejected() {
        let frame = VideoFrame::from_rgba(4, 4, vec![0u8; 10], Duration::ZERO);
        assert!(!frame.is_complete());
        assert!(frame.to_rgba_image().is_none());
    }
}
