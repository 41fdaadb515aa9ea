// SPDX-License-Identifier: GPL-3.0-only

//! Image filter descriptors and the ordered filter chain
//!
//! The same [`FilterChain`] is used for the live preview and for burning
//! filters into a recorded clip, so both always look identical. Filters work
//! on RGBA images in place and never change the image extent.

use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Per-frame filter function handed to the export facility
pub type FrameFilter = Arc<dyn Fn(RgbaImage) -> RgbaImage + Send + Sync>;

/// Available image filters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FilterType {
    /// No filter applied
    #[default]
    Standard,
    /// Black & white
    Mono,
    /// Warm brownish tint
    Sepia,
    /// High contrast black & white
    Noir,
    /// Boosted saturation and contrast
    Vivid,
    /// Blue color temperature shift
    Cool,
    /// Orange/amber color temperature
    Warm,
    /// Lifted blacks with muted colors
    Fade,
    /// Darkened edges
    Vignette,
    /// Inverted colors
    Negative,
    /// Reduced color levels
    Posterize,
    /// Partially inverted tones
    Solarize,
}

impl FilterType {
    pub const ALL: [FilterType; 12] = [
        FilterType::Standard,
        FilterType::Mono,
        FilterType::Sepia,
        FilterType::Noir,
        FilterType::Vivid,
        FilterType::Cool,
        FilterType::Warm,
        FilterType::Fade,
        FilterType::Vignette,
        FilterType::Negative,
        FilterType::Posterize,
        FilterType::Solarize,
    ];

    /// Lowercase name used on the command line
    pub fn name(self) -> &'static str {
        match self {
            FilterType::Standard => "standard",
            FilterType::Mono => "mono",
            FilterType::Sepia => "sepia",
            FilterType::Noir => "noir",
            FilterType::Vivid => "vivid",
            FilterType::Cool => "cool",
            FilterType::Warm => "warm",
            FilterType::Fade => "fade",
            FilterType::Vignette => "vignette",
            FilterType::Negative => "negative",
            FilterType::Posterize => "posterize",
            FilterType::Solarize => "solarize",
        }
    }

    /// Parse a command line name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|f| f.name().eq_ignore_ascii_case(name.trim()))
    }

    /// Apply this filter to an image in place
    pub fn apply(self, image: &mut RgbaImage) {
        if self == FilterType::Standard {
            return;
        }

        let (width, height) = image.dimensions();
        for (x, y, pixel) in image.enumerate_pixels_mut() {
            let mut r = pixel[0] as f32 / 255.0;
            let mut g = pixel[1] as f32 / 255.0;
            let mut b = pixel[2] as f32 / 255.0;

            apply_filter_rgb(&mut r, &mut g, &mut b, self, x, y, width, height);

            pixel[0] = (r.clamp(0.0, 1.0) * 255.0).round() as u8;
            pixel[1] = (g.clamp(0.0, 1.0) * 255.0).round() as u8;
            pixel[2] = (b.clamp(0.0, 1.0) * 255.0).round() as u8;
        }
    }
}

/// Ordered sequence of filters, applied first to last
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterChain {
    filters: Vec<FilterType>,
}

impl FilterChain {
    pub fn new(filters: impl Into<Vec<FilterType>>) -> Self {
        Self {
            filters: filters.into(),
        }
    }

    /// True when applying the chain leaves images untouched
    pub fn is_identity(&self) -> bool {
        self.filters.iter().all(|f| *f == FilterType::Standard)
    }

    pub fn filters(&self) -> &[FilterType] {
        &self.filters
    }

    /// Apply every filter in order
    pub fn apply(&self, mut image: RgbaImage) -> RgbaImage {
        for filter in &self.filters {
            filter.apply(&mut image);
        }
        image
    }

    /// Convert into a shareable per-frame closure for the exporter
    pub fn into_frame_filter(self) -> FrameFilter {
        Arc::new(move |image| self.apply(image))
    }
}

#[inline]
fn luminance(r: f32, g: f32, b: f32) -> f32 {
    0.299 * r + 0.587 * g + 0.114 * b
}

#[inline]
fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Apply a filter effect to normalized RGB values in place
#[inline]
#[allow(clippy::too_many_arguments)]
fn apply_filter_rgb(
    r: &mut f32,
    g: &mut f32,
    b: &mut f32,
    filter: FilterType,
    x: u32,
    y: u32,
    width: u32,
    height: u32,
) {
    match filter {
        FilterType::Standard => {}

        FilterType::Mono => {
            let gray = luminance(*r, *g, *b);
            *r = gray;
            *g = gray;
            *b = gray;
        }

        FilterType::Sepia => {
            let lum = luminance(*r, *g, *b);
            *r = (lum * 1.2 + 0.1).clamp(0.0, 1.0);
            *g = (lum * 0.9 + 0.05).clamp(0.0, 1.0);
            *b = (lum * 0.7).clamp(0.0, 1.0);
        }

        FilterType::Noir => {
            let adjusted = ((luminance(*r, *g, *b) - 0.5) * 2.0 + 0.5).clamp(0.0, 1.0);
            *r = adjusted;
            *g = adjusted;
            *b = adjusted;
        }

        FilterType::Vivid => {
            let lum = luminance(*r, *g, *b);
            for c in [&mut *r, &mut *g, &mut *b] {
                let saturated = (lum + (*c - lum) * 1.4).clamp(0.0, 1.0);
                *c = ((saturated - 0.5) * 1.15 + 0.5).clamp(0.0, 1.0);
            }
        }

        FilterType::Cool => {
            *r *= 0.9;
            *g *= 0.95;
            *b *= 1.1;
        }

        FilterType::Warm => {
            *r *= 1.1;
            *b *= 0.85;
        }

        FilterType::Fade => {
            for c in [&mut *r, &mut *g, &mut *b] {
                *c = (*c * 0.85 + 0.1).clamp(0.0, 1.0);
            }
            let lum = luminance(*r, *g, *b);
            for c in [&mut *r, &mut *g, &mut *b] {
                *c = lum + (*c - lum) * 0.7;
            }
        }

        FilterType::Vignette => {
            let dx = x as f32 / width.max(1) as f32 - 0.5;
            let dy = y as f32 / height.max(1) as f32 - 0.5;
            let vignette = 1.0 - smoothstep(0.3, 0.9, (dx * dx + dy * dy).sqrt());
            *r *= vignette;
            *g *= vignette;
            *b *= vignette;
        }

        FilterType::Negative => {
            *r = 1.0 - *r;
            *g = 1.0 - *g;
            *b = 1.0 - *b;
        }

        FilterType::Posterize => {
            let levels = 4.0;
            *r = (*r * levels).floor() / levels;
            *g = (*g * levels).floor() / levels;
            *b = (*b * levels).floor() / levels;
        }

        FilterType::Solarize => {
            for c in [&mut *r, &mut *g, &mut *b] {
                if *c > 0.5 {
                    *c = 1.0 - *c;
                }
            }
        }
    }
}
