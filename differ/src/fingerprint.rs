/*
 * SPDX-FileCopyrightText: 2026 Wavelens GmbH <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! Quantized, versioned digest of the highlighted region of a diff raster.
//!
//! Small pixel jitter collapses to the same fingerprint while materially different
//! regions diverge. The parameters are part of the output, so fingerprints computed
//! under different settings never compare equal.

use anyhow::{Result, bail};

pub const FINGERPRINT_VERSION: &str = "v1";
pub const EMPTY_FINGERPRINT: &str = "empty";

const FNV_OFFSET: u64 = 0xcbf29ce484222325;
const FNV_PRIME: u64 = 0x100000001b3;

/// Channel bounds a pixel must meet to count as highlighted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RedThreshold {
    pub r_min: u8,
    pub g_max: u8,
    pub b_max: u8,
    pub a_min: u8,
}

impl Default for RedThreshold {
    fn default() -> Self {
        Self {
            r_min: 200,
            g_max: 90,
            b_max: 90,
            a_min: 16,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FingerprintOptions {
    pub red_threshold: RedThreshold,
    /// 0 or 1.
    pub dilate_radius: u8,
    /// 8, 16 or 32.
    pub grid_size: usize,
    /// Ascending, within 0..=1.
    pub density_thresholds: Vec<f64>,
    pub pad_to_square: bool,
}

impl Default for FingerprintOptions {
    fn default() -> Self {
        Self {
            red_threshold: RedThreshold::default(),
            dilate_radius: 1,
            grid_size: 16,
            density_thresholds: vec![0.002, 0.02, 0.08],
            pad_to_square: true,
        }
    }
}

impl FingerprintOptions {
    fn validate(&self) -> Result<()> {
        if self.dilate_radius > 1 {
            bail!("dilate radius must be 0 or 1, got {}", self.dilate_radius);
        }

        if ![8, 16, 32].contains(&self.grid_size) {
            bail!("grid size must be 8, 16 or 32, got {}", self.grid_size);
        }

        if self.density_thresholds.len() > 3 {
            bail!("at most three density thresholds fit into two bits per cell");
        }

        let in_range = self
            .density_thresholds
            .iter()
            .all(|t| (0.0..=1.0).contains(t));
        let ascending = self.density_thresholds.windows(2).all(|w| w[0] < w[1]);
        if !in_range || !ascending {
            bail!("density thresholds must be ascending within 0..=1");
        }

        Ok(())
    }

    fn prefix(&self) -> String {
        let thresholds = self
            .density_thresholds
            .iter()
            .map(|t| t.to_string())
            .collect::<Vec<_>>()
            .join(",");

        format!(
            "{}:g{}:d{}:t{}",
            FINGERPRINT_VERSION, self.grid_size, self.dilate_radius, thresholds
        )
    }
}

/// Binary raster, one byte per pixel.
struct Mask {
    data: Vec<u8>,
    width: usize,
    height: usize,
}

struct BoundingBox {
    x: usize,
    y: usize,
    width: usize,
    height: usize,
}

/// Fingerprints an RGBA buffer of `width` x `height` pixels.
pub fn fingerprint_diff(
    rgba: &[u8],
    width: u32,
    height: u32,
    options: &FingerprintOptions,
) -> Result<String> {
    options.validate()?;

    let (width, height) = (width as usize, height as usize);
    if rgba.len() != width * height * 4 {
        bail!(
            "raster of {} bytes does not match {}x{} rgba",
            rgba.len(),
            width,
            height
        );
    }

    let mask = extract_red_mask(rgba, width, height, &options.red_threshold);
    let mask = if options.dilate_radius == 1 {
        dilate(&mask)
    } else {
        mask
    };

    let Some(bbox) = bounding_box(&mask) else {
        return Ok(EMPTY_FINGERPRINT.to_string());
    };

    let cropped = crop(&mask, &bbox);
    let normalized = if options.pad_to_square {
        pad_to_square(&cropped)
    } else {
        cropped
    };

    let cells = quantize_grid(&normalized, options.grid_size, &options.density_thresholds);
    let hash = fnv1a64(&pack_2bit(&cells));

    Ok(format!("{}:{:016x}", options.prefix(), hash))
}

fn extract_red_mask(rgba: &[u8], width: usize, height: usize, t: &RedThreshold) -> Mask {
    let data = rgba
        .chunks_exact(4)
        .map(|px| u8::from(px[0] >= t.r_min && px[1] <= t.g_max && px[2] <= t.b_max && px[3] >= t.a_min))
        .collect();

    Mask { data, width, height }
}

/// 3x3 OR filter.
fn dilate(mask: &Mask) -> Mask {
    let (w, h) = (mask.width, mask.height);
    let mut data = vec![0u8; mask.data.len()];

    for y in 0..h {
        let rows = y.saturating_sub(1)..=(y + 1).min(h - 1);
        for x in 0..w {
            let cols = x.saturating_sub(1)..=(x + 1).min(w - 1);
            let set = rows
                .clone()
                .any(|yy| cols.clone().any(|xx| mask.data[yy * w + xx] == 1));
            data[y * w + x] = u8::from(set);
        }
    }

    Mask {
        data,
        width: w,
        height: h,
    }
}

fn bounding_box(mask: &Mask) -> Option<BoundingBox> {
    let mut min_x = usize::MAX;
    let mut min_y = usize::MAX;
    let mut max_x = 0;
    let mut max_y = 0;
    let mut found = false;

    for y in 0..mask.height {
        for x in 0..mask.width {
            if mask.data[y * mask.width + x] == 1 {
                found = true;
                min_x = min_x.min(x);
                min_y = min_y.min(y);
                max_x = max_x.max(x);
                max_y = max_y.max(y);
            }
        }
    }

    found.then(|| BoundingBox {
        x: min_x,
        y: min_y,
        width: max_x - min_x + 1,
        height: max_y - min_y + 1,
    })
}

fn crop(mask: &Mask, bbox: &BoundingBox) -> Mask {
    let mut data = Vec::with_capacity(bbox.width * bbox.height);
    for y in bbox.y..bbox.y + bbox.height {
        let row = y * mask.width;
        data.extend_from_slice(&mask.data[row + bbox.x..row + bbox.x + bbox.width]);
    }

    Mask {
        data,
        width: bbox.width,
        height: bbox.height,
    }
}

/// Centers the mask on a zeroed square canvas.
fn pad_to_square(mask: &Mask) -> Mask {
    let side = mask.width.max(mask.height);
    let off_x = (side - mask.width) / 2;
    let off_y = (side - mask.height) / 2;
    let mut data = vec![0u8; side * side];

    for y in 0..mask.height {
        let src = y * mask.width;
        let dst = (y + off_y) * side + off_x;
        data[dst..dst + mask.width].copy_from_slice(&mask.data[src..src + mask.width]);
    }

    Mask {
        data,
        width: side,
        height: side,
    }
}

/// Inclusive prefix sums: entry (x, y) holds the count of set pixels in [0..=x] x [0..=y].
fn integral_image(mask: &Mask) -> Vec<u64> {
    let w = mask.width;
    let mut out = vec![0u64; mask.data.len()];

    for y in 0..mask.height {
        let mut row_sum = 0u64;
        for x in 0..w {
            row_sum += u64::from(mask.data[y * w + x]);
            let above = if y > 0 { out[(y - 1) * w + x] } else { 0 };
            out[y * w + x] = above + row_sum;
        }
    }

    out
}

/// Set pixels in the half open rectangle [x0, x1) x [y0, y1).
fn rect_sum(integral: &[u64], w: usize, x0: usize, y0: usize, x1: usize, y1: usize) -> u64 {
    if x1 <= x0 || y1 <= y0 {
        return 0;
    }

    let at = |x: usize, y: usize| integral[y * w + x];
    let d = at(x1 - 1, y1 - 1);
    let b = if y0 > 0 { at(x1 - 1, y0 - 1) } else { 0 };
    let c = if x0 > 0 { at(x0 - 1, y1 - 1) } else { 0 };
    let a = if x0 > 0 && y0 > 0 { at(x0 - 1, y0 - 1) } else { 0 };

    (d + a) - (b + c)
}

fn quantize_density(density: f64, thresholds: &[f64]) -> u8 {
    thresholds
        .iter()
        .position(|t| density < *t)
        .unwrap_or(thresholds.len()) as u8
}

fn quantize_grid(mask: &Mask, grid: usize, thresholds: &[f64]) -> Vec<u8> {
    let integral = integral_image(mask);
    let (w, h) = (mask.width, mask.height);
    let mut out = Vec::with_capacity(grid * grid);

    for gy in 0..grid {
        let y0 = gy * h / grid;
        let y1 = (gy + 1) * h / grid;

        for gx in 0..grid {
            let x0 = gx * w / grid;
            let x1 = (gx + 1) * w / grid;

            let area = ((x1 - x0) * (y1 - y0)).max(1);
            let sum = rect_sum(&integral, w, x0, y0, x1, y1);
            out.push(quantize_density(sum as f64 / area as f64, thresholds));
        }
    }

    out
}

fn pack_2bit(values: &[u8]) -> Vec<u8> {
    let mut out = vec![0u8; values.len().div_ceil(4)];
    for (i, value) in values.iter().enumerate() {
        out[i / 4] |= (value & 3) << ((i & 3) * 2);
    }
    out
}

pub fn fnv1a64(data: &[u8]) -> u64 {
    data.iter().fold(FNV_OFFSET, |hash, byte| {
        (hash ^ u64::from(*byte)).wrapping_mul(FNV_PRIME)
    })
}
