//! Tiled watermark overlay for preview renders.
//!
//! Stateless transform: scale the logo to a fraction of the shorter image
//! dimension, tile it across the canvas at reduced opacity with alternate
//! rows staggered, and recompress to JPEG. The paid deliverable skips this
//! path entirely.

use image::{imageops, DynamicImage, GenericImageView, RgbaImage};

use crate::config::WatermarkConfig;
use crate::error::{AppError, AppResult};

const JPEG_QUALITY: u8 = 85;

/// Compositing parameters
#[derive(Debug, Clone, Copy)]
pub struct WatermarkOptions {
    /// Logo width as a fraction of the shorter image dimension
    pub scale: f32,
    /// Overlay opacity, 0.0..=1.0
    pub opacity: f32,
}

impl Default for WatermarkOptions {
    fn default() -> Self {
        Self {
            scale: 0.25,
            opacity: 0.35,
        }
    }
}

impl From<&WatermarkConfig> for WatermarkOptions {
    fn from(config: &WatermarkConfig) -> Self {
        Self {
            scale: config.scale,
            opacity: config.opacity,
        }
    }
}

/// Produces the watermarked JPEG for a generated image
pub fn tile_watermark(
    photo_bytes: &[u8],
    logo_bytes: &[u8],
    options: &WatermarkOptions,
) -> AppResult<Vec<u8>> {
    let photo = image::load_from_memory(photo_bytes)
        .map_err(|e| AppError::Validation(format!("Unreadable image: {}", e)))?;
    let logo = image::load_from_memory(logo_bytes)
        .map_err(|e| AppError::Internal(format!("Unreadable logo asset: {}", e)))?;

    let mut canvas = photo.to_rgba8();
    let (width, height) = (canvas.width(), canvas.height());

    let shorter = width.min(height);
    let logo_w = ((shorter as f32 * options.scale).round() as u32).clamp(1, width);
    let logo_h = (((logo_w as f32) * logo.height() as f32 / logo.width() as f32).round() as u32)
        .clamp(1, height);
    let logo = logo
        .resize_exact(logo_w, logo_h, imageops::FilterType::Lanczos3)
        .to_rgba8();

    let opacity = options.opacity.clamp(0.0, 1.0);

    // Stagger alternate rows by half a period so cropping cannot dodge the mark
    let step_x = logo_w * 2;
    let step_y = logo_h * 2;
    let mut row = 0u32;
    let mut y = 0u32;
    while y < height {
        let mut x = if row % 2 == 1 { logo_w } else { 0 };
        while x < width {
            blend_logo(&mut canvas, &logo, x, y, opacity);
            x += step_x;
        }
        y += step_y;
        row += 1;
    }

    let rgb = DynamicImage::ImageRgba8(canvas).to_rgb8();
    let mut out = Vec::new();
    let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY);
    encoder
        .encode_image(&rgb)
        .map_err(|e| AppError::Internal(format!("Recompression failed: {}", e)))?;

    Ok(out)
}

/// Alpha-blends the logo onto the canvas at the given origin
fn blend_logo(canvas: &mut RgbaImage, logo: &RgbaImage, origin_x: u32, origin_y: u32, opacity: f32) {
    for (lx, ly, pixel) in logo.enumerate_pixels() {
        let x = origin_x + lx;
        let y = origin_y + ly;
        if x >= canvas.width() || y >= canvas.height() {
            continue;
        }

        let alpha = (pixel[3] as f32 / 255.0) * opacity;
        if alpha <= 0.0 {
            continue;
        }

        let base = canvas.get_pixel_mut(x, y);
        for channel in 0..3 {
            base[channel] = (pixel[channel] as f32 * alpha
                + base[channel] as f32 * (1.0 - alpha))
                .round() as u8;
        }
    }
}
