// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Contrast-limited adaptive histogram equalization on 8-bit grayscale images.

use image::{GrayImage, Luma};
use tracing::debug;

const BINS: usize = 256;

/// Equalize `gray` tile by tile, limiting each tile's histogram to
/// `clip_limit` times the uniform bin height, and blend neighbouring tile
/// mappings bilinearly.
///
/// The grid shrinks when the image has fewer pixels than tiles along an axis.
/// Empty images come back unchanged.
pub fn equalize(gray: &GrayImage, clip_limit: f32, grid: (u32, u32)) -> GrayImage {
    let (width, height) = gray.dimensions();
    if width == 0 || height == 0 {
        return gray.clone();
    }

    let tiles = TileGrid::new(width, height, grid);
    let luts = tile_luts(gray, &tiles, clip_limit);
    debug!(
        tiles_x = tiles.count_x,
        tiles_y = tiles.count_y,
        tile_w = tiles.tile_w,
        tile_h = tiles.tile_h,
        "CLAHE tile mappings computed"
    );

    let mut output = GrayImage::new(width, height);
    for y in 0..height {
        let (ty1, ty2, ya) = tiles.neighbours(y, tiles.tile_h, tiles.count_y);
        for x in 0..width {
            let (tx1, tx2, xa) = tiles.neighbours(x, tiles.tile_w, tiles.count_x);
            let v = gray.get_pixel(x, y).0[0] as usize;

            let top = luts[tiles.index(tx1, ty1)][v] as f32 * (1.0 - xa)
                + luts[tiles.index(tx2, ty1)][v] as f32 * xa;
            let bottom = luts[tiles.index(tx1, ty2)][v] as f32 * (1.0 - xa)
                + luts[tiles.index(tx2, ty2)][v] as f32 * xa;
            let blended = top * (1.0 - ya) + bottom * ya;

            output.put_pixel(x, y, Luma([blended.round().clamp(0.0, 255.0) as u8]));
        }
    }
    output
}

/// Tile layout covering an image. Tiles are `tile_w` x `tile_h`; the last
/// row/column may be narrower.
struct TileGrid {
    tile_w: u32,
    tile_h: u32,
    count_x: u32,
    count_y: u32,
}

impl TileGrid {
    fn new(width: u32, height: u32, grid: (u32, u32)) -> Self {
        let gx = grid.0.clamp(1, width);
        let gy = grid.1.clamp(1, height);
        let tile_w = width.div_ceil(gx);
        let tile_h = height.div_ceil(gy);
        Self {
            tile_w,
            tile_h,
            count_x: width.div_ceil(tile_w),
            count_y: height.div_ceil(tile_h),
        }
    }

    fn index(&self, tx: u32, ty: u32) -> usize {
        (ty * self.count_x + tx) as usize
    }

    /// The two tiles whose centres bracket `pos` along one axis, and the
    /// weight of the second.
    fn neighbours(&self, pos: u32, tile: u32, count: u32) -> (u32, u32, f32) {
        let t = pos as f32 / tile as f32 - 0.5;
        let first = t.floor();
        let weight = t - first;
        let last = count as i64 - 1;
        let t1 = (first as i64).clamp(0, last) as u32;
        let t2 = (first as i64 + 1).clamp(0, last) as u32;
        (t1, t2, weight)
    }
}

/// Clipped, redistributed cumulative mapping for every tile.
fn tile_luts(gray: &GrayImage, tiles: &TileGrid, clip_limit: f32) -> Vec<[u8; BINS]> {
    let (width, height) = gray.dimensions();
    let mut luts = Vec::with_capacity((tiles.count_x * tiles.count_y) as usize);

    for ty in 0..tiles.count_y {
        for tx in 0..tiles.count_x {
            let x0 = tx * tiles.tile_w;
            let y0 = ty * tiles.tile_h;
            let x1 = (x0 + tiles.tile_w).min(width);
            let y1 = (y0 + tiles.tile_h).min(height);

            let mut hist = [0u32; BINS];
            for y in y0..y1 {
                for x in x0..x1 {
                    hist[gray.get_pixel(x, y).0[0] as usize] += 1;
                }
            }
            let area = (x1 - x0) * (y1 - y0);
            clip_histogram(&mut hist, clip_limit, area);
            luts.push(cumulative_lut(&hist, area));
        }
    }
    luts
}

/// Cap every bin and spread the excess evenly, remainder from the low bins up.
fn clip_histogram(hist: &mut [u32; BINS], clip_limit: f32, area: u32) {
    if clip_limit <= 0.0 {
        return;
    }
    let limit = ((clip_limit * area as f32 / BINS as f32) as u32).max(1);

    let mut excess = 0u32;
    for bin in hist.iter_mut() {
        if *bin > limit {
            excess += *bin - limit;
            *bin = limit;
        }
    }

    let per_bin = excess / BINS as u32;
    let mut residual = excess - per_bin * BINS as u32;
    for bin in hist.iter_mut() {
        *bin += per_bin;
    }

    if residual > 0 {
        let step = (BINS as u32 / residual).max(1) as usize;
        let mut i = 0;
        while i < BINS && residual > 0 {
            hist[i] += 1;
            residual -= 1;
            i += step;
        }
    }
}

fn cumulative_lut(hist: &[u32; BINS], area: u32) -> [u8; BINS] {
    if area == 0 {
        return std::array::from_fn(|i| i as u8);
    }
    let scale = 255.0 / area as f32;
    let mut sum = 0u32;
    std::array::from_fn(|i| {
        sum += hist[i];
        (sum as f32 * scale).round().clamp(0.0, 255.0) as u8
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn low_contrast_image_is_stretched() {
        // Values squeezed into 100..=131.
        let gray = GrayImage::from_fn(64, 64, |x, y| Luma([100 + ((x + y) % 32) as u8]));
        let out = equalize(&gray, 2.0, (8, 8));

        let span = |img: &GrayImage| {
            let min = img.pixels().map(|p| p.0[0]).min().unwrap_or(0);
            let max = img.pixels().map(|p| p.0[0]).max().unwrap_or(0);
            max - min
        };
        assert!(span(&out) > span(&gray), "equalization should widen the range");
    }

    #[test]
    fn uniform_image_stays_uniform() {
        let gray = GrayImage::from_pixel(40, 40, Luma([255]));
        let out = equalize(&gray, 2.0, (8, 8));
        let first = out.get_pixel(0, 0).0[0];
        assert!(out.pixels().all(|p| p.0[0] == first));
    }

    #[test]
    fn grid_shrinks_for_tiny_images() {
        let gray = GrayImage::from_fn(3, 2, |x, _| Luma([(x * 100) as u8]));
        let out = equalize(&gray, 2.0, (8, 8));
        assert_eq!(out.dimensions(), (3, 2));
    }

    #[test]
    fn clipping_preserves_total_count() {
        let mut hist = [0u32; BINS];
        hist[10] = 900;
        hist[200] = 124;
        clip_histogram(&mut hist, 2.0, 1024);
        assert_eq!(hist.iter().sum::<u32>(), 1024);
        assert!(hist[10] < 900);
    }

    #[test]
    fn empty_image_is_returned_unchanged() {
        let gray = GrayImage::new(0, 5);
        assert_eq!(equalize(&gray, 2.0, (8, 8)).dimensions(), (0, 5));
    }
}
