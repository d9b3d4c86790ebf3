/*
 * SPDX-FileCopyrightText: 2026 Wavelens GmbH <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! Perceptual pixel comparison producing a score and a red highlight mask.

use anyhow::{Context, Result};
use common::error::CorruptContent;
use common::input::vec_to_hex;
use image::imageops::{self, FilterType};
use image::{DynamicImage, GenericImageView, ImageFormat, ImageReader, Rgba, RgbaImage};
use sha2::{Digest, Sha256};
use std::io::Cursor;

use super::fingerprint::{FingerprintOptions, fingerprint_diff};

const BASE_THRESHOLD: f64 = 0.15;
const BASE_MAX_SCORE: f64 = 0.0002;
const MAXIMUM_PIXELS_TO_IGNORE: f64 = 20.0;
const COLOR_SENSITIVE_THRESHOLD: f64 = 0.0225;
const COLOR_SENSITIVE_MAX_SCORE: f64 = 0.03;

const MAX_PIXELS: u64 = 80_000_000;
const DEFAULT_MAX_WIDTH: u32 = 2048;

/// Largest possible YIQ distance between two colours.
const MAX_YIQ_DELTA: f64 = 35215.0;

const HIGHLIGHT: Rgba<u8> = Rgba([255, 0, 0, 255]);

/// Highlight mask of a diff, kept decoded for fingerprinting next to its encoded bytes.
#[derive(Debug, Clone)]
pub struct DiffRaster {
    pub image: RgbaImage,
    pub png: Vec<u8>,
}

impl DiffRaster {
    fn new(image: RgbaImage) -> Result<Self> {
        let mut png = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .context("Failed to encode diff image")?;
        Ok(Self { image, png })
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Hex sha256 of the encoded bytes.
    pub fn content_hash(&self) -> String {
        vec_to_hex(&Sha256::digest(&self.png))
    }

    pub fn fingerprint(&self, options: &FingerprintOptions) -> Result<String> {
        fingerprint_diff(self.image.as_raw(), self.width(), self.height(), options)
    }
}

#[derive(Debug, Clone)]
pub struct ImageDiff {
    pub score: f64,
    pub raster: Option<DiffRaster>,
}

pub fn is_image(bytes: &[u8]) -> bool {
    image::guess_format(bytes).is_ok()
}

pub fn read_dimensions(bytes: &[u8]) -> Result<(u32, u32)> {
    let dimensions = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .context("Failed to detect image format")?
        .into_dimensions()
        .map_err(|e| CorruptContent {
            what: "image header".to_string(),
            reason: e.to_string(),
        })?;

    Ok(dimensions)
}

fn decode(bytes: &[u8], side: &str) -> Result<DynamicImage> {
    let image = image::load_from_memory(bytes).map_err(|e| CorruptContent {
        what: format!("{} image", side),
        reason: e.to_string(),
    })?;

    Ok(image)
}

/// Scales `size` down until it fits into the pixel budget.
fn fit_into_max_pixels((width, height): (u32, u32)) -> (u32, u32) {
    let pixels = u64::from(width) * u64::from(height);
    if pixels <= MAX_PIXELS {
        return (width, height);
    }

    let scale = (MAX_PIXELS as f64 / pixels as f64).sqrt();
    (
        (f64::from(width) * scale).floor() as u32,
        (f64::from(height) * scale).floor() as u32,
    )
}

fn max_dimensions(a: (u32, u32), b: (u32, u32)) -> (u32, u32) {
    let width = a.0.max(b.0);
    let height = a.1.max(b.1);
    let pixels = u64::from(width) * u64::from(height);

    // Very long portrait captures are cut to a default width first.
    if pixels > MAX_PIXELS && width < height {
        return fit_into_max_pixels((
            DEFAULT_MAX_WIDTH,
            (MAX_PIXELS / u64::from(DEFAULT_MAX_WIDTH)) as u32,
        ));
    }

    fit_into_max_pixels((width, height))
}

/// Places the image on a transparent canvas of the given size, shrinking it first if needed.
fn enlarge(image: &DynamicImage, (width, height): (u32, u32)) -> RgbaImage {
    if image.dimensions() == (width, height) {
        return image.to_rgba8();
    }

    let source = if image.width() > width || image.height() > height {
        image.resize(width, height, FilterType::Triangle).to_rgba8()
    } else {
        image.to_rgba8()
    };

    let mut canvas = RgbaImage::new(width, height);
    imageops::overlay(&mut canvas, &source, 0, 0);
    canvas
}

fn blend(channel: u8, alpha: f64) -> f64 {
    255.0 + (f64::from(channel) - 255.0) * alpha
}

fn yiq(pixel: &Rgba<u8>) -> (f64, f64, f64) {
    let alpha = f64::from(pixel[3]) / 255.0;
    let (r, g, b) = (
        blend(pixel[0], alpha),
        blend(pixel[1], alpha),
        blend(pixel[2], alpha),
    );

    (
        r * 0.29889531 + g * 0.58662247 + b * 0.11448223,
        r * 0.59597799 - g * 0.27417610 - b * 0.32180189,
        r * 0.21147017 - g * 0.52261711 + b * 0.31114694,
    )
}

/// Squared perceptual distance of two pixels blended over white.
pub fn color_delta(a: &Rgba<u8>, b: &Rgba<u8>) -> f64 {
    if a == b {
        return 0.0;
    }

    let (ya, ia, qa) = yiq(a);
    let (yb, ib, qb) = yiq(b);
    let (dy, di, dq) = (ya - yb, ia - ib, qa - qb);

    0.5053 * dy * dy + 0.299 * di * di + 0.1957 * dq * dq
}

/// Share of differing pixels at `threshold`, plus the mask of those pixels.
fn compare(base: &RgbaImage, head: &RgbaImage, threshold: f64) -> (f64, RgbaImage) {
    let max_delta = MAX_YIQ_DELTA * threshold * threshold;
    let mut mask = RgbaImage::new(base.width(), base.height());
    let mut different = 0u64;

    for ((x, y, a), b) in base.enumerate_pixels().zip(head.pixels()) {
        if color_delta(a, b) > max_delta {
            mask.put_pixel(x, y, HIGHLIGHT);
            different += 1;
        }
    }

    let total = u64::from(base.width()) * u64::from(base.height());
    let score = if total == 0 {
        0.0
    } else {
        different as f64 / total as f64
    };

    (score, mask)
}

/// Compares two encoded images. `threshold` is 0..1, 0.5 by default; lower is stricter.
pub fn diff_images(base: &[u8], head: &[u8], threshold: f64) -> Result<ImageDiff> {
    let base = decode(base, "base")?;
    let head = decode(head, "head")?;

    let size = max_dimensions(base.dimensions(), head.dimensions());
    let base = enlarge(&base, size);
    let head = enlarge(&head, size);

    // 0.5 maps onto the reference tuning.
    let relative = threshold * 2.0;
    let base_threshold = BASE_THRESHOLD * relative;
    let base_max_score = BASE_MAX_SCORE * relative;
    let pixels_to_ignore = MAXIMUM_PIXELS_TO_IGNORE * relative;
    let sensitive_threshold = COLOR_SENSITIVE_THRESHOLD * relative;
    let sensitive_max_score = COLOR_SENSITIVE_MAX_SCORE * relative;

    let (base_score, base_mask) = compare(&base, &head, base_threshold);
    let (sensitive_score, sensitive_mask) = compare(&base, &head, sensitive_threshold);

    let area = (f64::from(size.0) * f64::from(size.1)).max(1.0);
    let max_base_score = base_max_score.min(pixels_to_ignore / area);

    let base_score = if base_score < max_base_score { 0.0 } else { base_score };
    let sensitive_score = if sensitive_score < sensitive_max_score {
        0.0
    } else {
        sensitive_score
    };

    if base_score > 0.0 && base_score >= sensitive_score {
        return Ok(ImageDiff {
            score: base_score,
            raster: Some(DiffRaster::new(base_mask)?),
        });
    }

    if sensitive_score > 0.0 && sensitive_score > base_score {
        return Ok(ImageDiff {
            score: sensitive_score,
            raster: Some(DiffRaster::new(sensitive_mask)?),
        });
    }

    Ok(ImageDiff {
        score: 0.0,
        raster: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use entity::screenshot::DEFAULT_THRESHOLD;

    fn png(width: u32, height: u32, paint: impl Fn(u32, u32) -> Rgba<u8>) -> Vec<u8> {
        let image = RgbaImage::from_fn(width, height, paint);
        let mut out = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
            .unwrap();
        out
    }

    fn white(_: u32, _: u32) -> Rgba<u8> {
        Rgba([255, 255, 255, 255])
    }

    #[test]
    fn test_identical_images_score_zero() {
        let image = png(20, 20, white);
        let diff = diff_images(&image, &image, DEFAULT_THRESHOLD).unwrap();

        assert_eq!(diff.score, 0.0);
        assert!(diff.raster.is_none());
    }

    #[test]
    fn test_truncated_png_is_unretryable() {
        let valid = png(20, 20, white);
        let truncated = &valid[..24];

        let err = diff_images(truncated, &valid, DEFAULT_THRESHOLD).unwrap_err();
        assert!(common::error::is_unretryable(&err));

        let err = read_dimensions(&valid[..12]).unwrap_err();
        assert!(common::error::is_unretryable(&err));
    }

    #[test]
    fn test_changed_region_produces_mask() {
        let base = png(20, 20, white);
        let head = png(20, 20, |x, y| {
            if x < 10 && y < 10 {
                Rgba([0, 0, 0, 255])
            } else {
                Rgba([255, 255, 255, 255])
            }
        });

        let diff = diff_images(&base, &head, DEFAULT_THRESHOLD).unwrap();
        assert!((diff.score - 0.25).abs() < f64::EPSILON);

        let raster = diff.raster.unwrap();
        assert_eq!((raster.width(), raster.height()), (20, 20));
        assert_eq!(raster.image.get_pixel(0, 0), &HIGHLIGHT);
        assert_eq!(raster.image.get_pixel(15, 15)[3], 0);
        assert_eq!(raster.content_hash().len(), 64);
        assert!(raster.fingerprint(&FingerprintOptions::default()).unwrap().starts_with("v1:"));
    }

    #[test]
    fn test_size_mismatch_is_padded() {
        let base = png(10, 10, white);
        let head = png(10, 20, |_, y| {
            if y < 10 {
                Rgba([255, 255, 255, 255])
            } else {
                Rgba([0, 0, 0, 255])
            }
        });

        let diff = diff_images(&base, &head, DEFAULT_THRESHOLD).unwrap();
        let raster = diff.raster.unwrap();

        assert_eq!((raster.width(), raster.height()), (10, 20));
        assert!((diff.score - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_read_dimensions_and_detection() {
        let image = png(7, 3, white);
        assert_eq!(read_dimensions(&image).unwrap(), (7, 3));
        assert!(is_image(&image));
        assert!(!is_image(b"plain text"));
    }

    #[test]
    fn test_fit_into_max_pixels() {
        assert_eq!(fit_into_max_pixels((100, 100)), (100, 100));
        let (w, h) = fit_into_max_pixels((20_000, 20_000));
        assert!(u64::from(w) * u64::from(h) <= MAX_PIXELS);
    }

    #[test]
    fn test_color_delta_is_symmetric() {
        let a = Rgba([10, 200, 30, 255]);
        let b = Rgba([200, 10, 30, 255]);

        assert_eq!(color_delta(&a, &a), 0.0);
        assert_eq!(color_delta(&a, &b), color_delta(&b, &a));
        assert!(color_delta(&Rgba([0, 0, 0, 255]), &Rgba([255, 255, 255, 255])) <= MAX_YIQ_DELTA);
    }
}
