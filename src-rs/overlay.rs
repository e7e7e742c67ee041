//! Pixel-perfect comparison of a captured preview against a design mock.

use anyhow::{Context, Result};
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, Pixel, Rgba, RgbaImage};
use serde::Serialize;
use std::path::Path;

pub const DEFAULT_OVERLAY_ALPHA: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChangeBounds {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct OverlayComparison {
    pub width: u32,
    pub height: u32,
    pub resized: bool,
    pub changed_pixels: u64,
    pub percent_changed: f64,
    pub avg_diff_percent: f64,
    pub changed_bounds: Option<ChangeBounds>,
}

/// Compares `preview` with `overlay`. The overlay is stretched to the preview
/// size first, the way it is drawn over the preview. A pixel counts as changed
/// when its largest channel difference exceeds `threshold`.
pub fn compare_overlay(
    preview: &DynamicImage,
    overlay: &DynamicImage,
    threshold: u8,
) -> OverlayComparison {
    let (width, height) = preview.dimensions();
    let resized = overlay.dimensions() != (width, height);
    let overlay = if resized {
        overlay.resize_exact(width, height, FilterType::Lanczos3)
    } else {
        overlay.clone()
    };

    let a_rgba = preview.to_rgba8();
    let b_rgba = overlay.to_rgba8();

    let total_pixels = u64::from(width) * u64::from(height);
    let mut changed_pixels: u64 = 0;
    let mut diff_sum: u64 = 0;
    let mut bounds: Option<(u32, u32, u32, u32)> = None;

    for y in 0..height {
        for x in 0..width {
            let a = a_rgba.get_pixel(x, y).channels();
            let b = b_rgba.get_pixel(x, y).channels();

            let dr = (a[0] as i16 - b[0] as i16).unsigned_abs() as u8;
            let dg = (a[1] as i16 - b[1] as i16).unsigned_abs() as u8;
            let db = (a[2] as i16 - b[2] as i16).unsigned_abs() as u8;
            let diff_v = dr.max(dg).max(db);
            diff_sum += u64::from(diff_v);
            if diff_v > threshold {
                changed_pixels += 1;
                bounds = Some(match bounds {
                    None => (x, y, x, y),
                    Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
                });
            }
        }
    }

    let percent_changed = if total_pixels > 0 {
        (changed_pixels as f64 / total_pixels as f64) * 100.0
    } else {
        0.0
    };
    let avg_diff_percent = if total_pixels > 0 {
        (diff_sum as f64 / (255.0 * total_pixels as f64)) * 100.0
    } else {
        0.0
    };

    OverlayComparison {
        width,
        height,
        resized,
        changed_pixels,
        percent_changed: round_to(percent_changed, 3),
        avg_diff_percent: round_to(avg_diff_percent, 3),
        changed_bounds: bounds.map(|(x0, y0, x1, y1)| ChangeBounds {
            x: x0,
            y: y0,
            w: x1 - x0 + 1,
            h: y1 - y0 + 1,
        }),
    }
}

/// Draws `overlay` over `preview` at `alpha` (clamped to `0.0..=1.0`).
pub fn blend_overlay(preview: &DynamicImage, overlay: &DynamicImage, alpha: f32) -> RgbaImage {
    let alpha = alpha.clamp(0.0, 1.0);
    let (width, height) = preview.dimensions();
    let overlay = overlay
        .resize_exact(width, height, FilterType::Lanczos3)
        .to_rgba8();
    let mut out = preview.to_rgba8();

    for y in 0..height {
        for x in 0..width {
            let base = out.get_pixel(x, y).0;
            let top = overlay.get_pixel(x, y).0;
            let a = alpha * top[3] as f32 / 255.0;
            let blended = [
                ((1.0 - a) * base[0] as f32 + a * top[0] as f32).round() as u8,
                ((1.0 - a) * base[1] as f32 + a * top[1] as f32).round() as u8,
                ((1.0 - a) * base[2] as f32 + a * top[2] as f32).round() as u8,
                base[3],
            ];
            out.put_pixel(x, y, Rgba(blended));
        }
    }
    out
}

pub fn decode_preview(bytes: &[u8]) -> Result<DynamicImage> {
    image::load_from_memory(bytes).context("failed to decode preview image")
}

pub fn open_overlay(path: &Path) -> Result<DynamicImage> {
    image::open(path)
        .with_context(|| format!("Failed to read image from \"{}\"", path.display()))
}

pub fn save_image(image: RgbaImage, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create parent directory: {}", parent.display())
            })?;
        }
    }
    DynamicImage::ImageRgba8(image)
        .save(path)
        .with_context(|| format!("failed to save overlay image: {}", path.display()))
}

fn round_to(v: f64, digits: u32) -> f64 {
    let factor = 10f64.powi(digits as i32);
    (v * factor).round() / factor
}
