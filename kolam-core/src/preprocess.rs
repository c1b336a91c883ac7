use anyhow::{Context, Result};
use image::{GrayImage, Luma, RgbImage};
use imageproc::contrast::{otsu_level, threshold, ThresholdType};

use crate::config::PathConfig;

/// Decode raw bytes into an RGB image. Decode failure is the one hard
/// error of the pipeline: no partial result is possible without pixels.
pub fn load_rgb(bytes: &[u8]) -> Result<RgbImage> {
    let img = image::load_from_memory(bytes).context("Failed to decode image")?;
    Ok(img.to_rgb8())
}

pub fn to_gray(img: &RgbImage) -> GrayImage {
    image::imageops::grayscale(img)
}

/// Otsu-thresholded binary image with dark ink mapped to white (255)
/// foreground, matching the downstream contour and blob passes.
pub fn binarize_inverted(gray: &GrayImage) -> GrayImage {
    let level = otsu_level(gray);
    threshold(gray, level, ThresholdType::BinaryInverted)
}

/// Fraction of pixels darker than mid-gray. Uses a fixed cut rather than
/// Otsu: Otsu is degenerate on a uniform canvas, and a blank image must
/// read as empty here so the grid fallback picks its smallest size.
pub fn foreground_density(gray: &GrayImage) -> f64 {
    let total = (gray.width() as u64 * gray.height() as u64).max(1);
    let dark = gray.pixels().filter(|p| p[0] < 128).count() as u64;
    dark as f64 / total as f64
}

pub fn count_foreground(mask: &GrayImage) -> usize {
    mask.pixels().filter(|p| p[0] > 0).count()
}

/// Binary mask of pixels inside the configured accent hue band (a red
/// band split across the hue wrap-around) with sufficient saturation and
/// value. Curve inference is gated on this mask having enough matches.
pub fn accent_mask(img: &RgbImage, cfg: &PathConfig) -> GrayImage {
    let mut mask = GrayImage::new(img.width(), img.height());
    for (x, y, pixel) in img.enumerate_pixels() {
        let (hue, saturation, value) = rgb_to_hsv(pixel[0], pixel[1], pixel[2]);
        let in_band = hue <= cfg.accent_hue_low || hue >= cfg.accent_hue_high;
        if in_band && saturation >= cfg.accent_min_saturation && value >= cfg.accent_min_value {
            mask.put_pixel(x, y, Luma([255]));
        }
    }
    mask
}

/// Mean channel intensity over a (2r+1)^2 neighborhood, clamped at the
/// image border. Used by the recreation presence test.
pub fn region_mean(img: &RgbImage, cx: i64, cy: i64, radius: u32) -> f64 {
    let (width, height) = (img.width() as i64, img.height() as i64);
    let r = radius as i64;
    let mut sum = 0u64;
    let mut count = 0u64;
    for y in (cy - r)..=(cy + r) {
        for x in (cx - r)..=(cx + r) {
            if x < 0 || y < 0 || x >= width || y >= height {
                continue;
            }
            let p = img.get_pixel(x as u32, y as u32);
            sum += p[0] as u64 + p[1] as u64 + p[2] as u64;
            count += 3;
        }
    }
    if count == 0 {
        return 255.0;
    }
    sum as f64 / count as f64
}

/// Hue in degrees [0, 360), saturation and value in [0, 1].
fn rgb_to_hsv(r: u8, g: u8, b: u8) -> (f64, f64, f64) {
    let r = r as f64 / 255.0;
    let g = g as f64 / 255.0;
    let b = b as f64 / 255.0;
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let hue = if delta == 0.0 {
        0.0
    } else if max == r {
        60.0 * ((g - b) / delta).rem_euclid(6.0)
    } else if max == g {
        60.0 * ((b - r) / delta + 2.0)
    } else {
        60.0 * ((r - g) / delta + 4.0)
    };
    let saturation = if max == 0.0 { 0.0 } else { delta / max };
    (hue, saturation, max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn white_image(w: u32, h: u32) -> RgbImage {
        RgbImage::from_pixel(w, h, Rgb([255, 255, 255]))
    }

    #[test]
    fn test_load_rgb_rejects_garbage() {
        let result = load_rgb(&[0u8, 1, 2, 3]);
        assert!(result.is_err(), "non-image bytes must be a hard failure");
    }

    #[test]
    fn test_density_of_blank_image_is_zero() {
        let gray = to_gray(&white_image(64, 64));
        assert_eq!(foreground_density(&gray), 0.0);
    }

    #[test]
    fn test_density_counts_dark_fraction() {
        let mut img = white_image(10, 10);
        for x in 0..10 {
            img.put_pixel(x, 0, Rgb([0, 0, 0]));
        }
        let gray = to_gray(&img);
        let density = foreground_density(&gray);
        assert!((density - 0.1).abs() < 1e-9, "one dark row of 10x10 is 10%");
    }

    #[test]
    fn test_rgb_to_hsv_primaries() {
        let (h, s, v) = rgb_to_hsv(255, 0, 0);
        assert!((h - 0.0).abs() < 1e-9);
        assert!((s - 1.0).abs() < 1e-9);
        assert!((v - 1.0).abs() < 1e-9);

        let (h, _, _) = rgb_to_hsv(0, 255, 0);
        assert!((h - 120.0).abs() < 1e-9);

        let (h, _, _) = rgb_to_hsv(0, 0, 255);
        assert!((h - 240.0).abs() < 1e-9);
    }

    #[test]
    fn test_accent_mask_catches_red_not_blue() {
        let cfg = PathConfig::default();
        let mut img = white_image(20, 20);
        for x in 0..10 {
            img.put_pixel(x, 5, Rgb([220, 20, 20]));
            img.put_pixel(x, 10, Rgb([20, 20, 220]));
        }
        let mask = accent_mask(&img, &cfg);
        assert_eq!(count_foreground(&mask), 10, "only the red run should match");
        assert_eq!(mask.get_pixel(3, 5)[0], 255);
        assert_eq!(mask.get_pixel(3, 10)[0], 0);
    }

    #[test]
    fn test_region_mean_sees_dark_stroke() {
        let mut img = white_image(50, 50);
        for x in 10..40 {
            for y in 24..27 {
                img.put_pixel(x, y, Rgb([0, 0, 0]));
            }
        }
        assert!(region_mean(&img, 25, 25, 1) < 50.0);
        assert!(region_mean(&img, 5, 5, 1) > 200.0);
    }

    #[test]
    fn test_binarize_inverts_dark_ink() {
        let mut img = white_image(30, 30);
        for x in 5..25 {
            img.put_pixel(x, 15, Rgb([0, 0, 0]));
        }
        let binary = binarize_inverted(&to_gray(&img));
        assert_eq!(binary.get_pixel(10, 15)[0], 255, "ink becomes foreground");
        assert_eq!(binary.get_pixel(10, 5)[0], 0, "paper becomes background");
    }
}
