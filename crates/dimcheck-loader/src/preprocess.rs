//! The secondary "OCR preprocessing variant" (§4.1), used only for
//! region-level OCR verification (§4.3 Phase E), never for the vision-LLM
//! call or the primary full-image OCR pass.

use image::{DynamicImage, GenericImageView, GrayImage, Luma, RgbImage};
use imageproc::contrast::adaptive_threshold;
use imageproc::filter::gaussian_blur_f32;
use imageproc::morphology::{dilate, erode};
use imageproc::distance_transform::Norm;

/// CLAHE clip limit (§4.1).
const CLAHE_CLIP: f32 = 3.0;
/// CLAHE tile size (§4.1: 8x8 tiles).
const CLAHE_TILE: u32 = 8;

/// Produce the OCR preprocessing variant: per-channel min across RGB, CLAHE
/// local contrast, bilateral-style denoise, adaptive threshold with a
/// height-scaled block size, and a 1x1 morphological open (§4.1).
#[must_use]
pub fn ocr_variant(image: &DynamicImage) -> GrayImage {
    let channel_min = per_channel_min(image);
    let contrast_enhanced = clahe_like(&channel_min);
    let denoised = edge_preserving_denoise(&contrast_enhanced);
    let block_size = adaptive_block_size(denoised.height());
    let thresholded = adaptive_threshold(&denoised, block_size);
    morphological_open(&thresholded)
}

/// (a) Per-channel minimum across RGB — normalizes differently-colored
/// CAD text onto one luminance-like channel.
fn per_channel_min(image: &DynamicImage) -> GrayImage {
    let rgb: RgbImage = image.to_rgb8();
    let (w, h) = rgb.dimensions();
    let mut out = GrayImage::new(w, h);
    for y in 0..h {
        for x in 0..w {
            let p = rgb.get_pixel(x, y);
            let min = p.0.iter().copied().min().unwrap_or(0);
            out.put_pixel(x, y, Luma([min]));
        }
    }
    out
}

/// (b) A tile-local contrast stretch approximating CLAHE: for each
/// `CLAHE_TILE`x`CLAHE_TILE` tile, stretch intensities to the full 0-255
/// range, clipped so a tile with almost no variance isn't blown out.
fn clahe_like(gray: &GrayImage) -> GrayImage {
    let (w, h) = gray.dimensions();
    let mut out = gray.clone();
    for tile_y in (0..h).step_by(CLAHE_TILE as usize) {
        for tile_x in (0..w).step_by(CLAHE_TILE as usize) {
            let tile_w = CLAHE_TILE.min(w - tile_x);
            let tile_h = CLAHE_TILE.min(h - tile_y);

            let mut min = 255u8;
            let mut max = 0u8;
            for y in tile_y..tile_y + tile_h {
                for x in tile_x..tile_x + tile_w {
                    let v = gray.get_pixel(x, y).0[0];
                    min = min.min(v);
                    max = max.max(v);
                }
            }
            let range = (f32::from(max) - f32::from(min)).max(1.0);
            // Clip limit bounds how aggressively a near-flat tile gets
            // stretched, matching CLAHE's contrast-limiting intent.
            let gain = (255.0 / range).min(CLAHE_CLIP * 255.0 / range.max(1.0)).min(16.0);

            for y in tile_y..tile_y + tile_h {
                for x in tile_x..tile_x + tile_w {
                    let v = gray.get_pixel(x, y).0[0];
                    let stretched = ((f32::from(v) - f32::from(min)) * gain).clamp(0.0, 255.0);
                    out.put_pixel(x, y, Luma([stretched as u8]));
                }
            }
        }
    }
    out
}

/// (c) Bilateral edge-preserving denoise. `imageproc` has no bilateral
/// filter; a light Gaussian blur is the closest available primitive and is
/// used here as the practical stand-in.
fn edge_preserving_denoise(gray: &GrayImage) -> GrayImage {
    gaussian_blur_f32(gray, 1.0)
}

/// (d) Adaptive threshold block size scaled to image height (§4.1): larger
/// drawings get a larger local window, always odd.
fn adaptive_block_size(height: u32) -> u32 {
    let size = (height / 40).max(3);
    if size % 2 == 0 {
        size + 1
    } else {
        size
    }
}

/// (e) A 1x1 morphological open (erode then dilate) to clear single-pixel
/// speckle left by thresholding.
fn morphological_open(binary: &GrayImage) -> GrayImage {
    let eroded = erode(binary, Norm::LInf, 1);
    dilate(&eroded, Norm::LInf, 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};

    #[test]
    fn per_channel_min_picks_darkest_channel() {
        let mut rgb = ImageBuffer::<Rgb<u8>, _>::new(2, 2);
        rgb.put_pixel(0, 0, Rgb([255, 10, 200]));
        let dynamic = DynamicImage::ImageRgb8(rgb);
        let out = per_channel_min(&dynamic);
        assert_eq!(out.get_pixel(0, 0).0[0], 10);
    }

    #[test]
    fn adaptive_block_size_is_always_odd() {
        for h in [40, 80, 121, 4000] {
            assert_eq!(adaptive_block_size(h) % 2, 1);
        }
    }
}
