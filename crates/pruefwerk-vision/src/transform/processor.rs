// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image transform stage: brightness/contrast, gamma, local histogram
// equalization and rotation, applied in that fixed order.

use image::{DynamicImage, GrayImage, Luma, LumaA, Pixel, Rgb, Rgba};
use imageproc::definitions::Image;
use imageproc::geometric_transformations::{Interpolation, Projection, warp_into};
use pruefwerk_core::PreprocessConfig;
use pruefwerk_core::error::{PruefwerkError, Result};
use tracing::{debug, instrument};

use super::clahe;

/// Smallest gamma accepted by the gamma step; anything lower is raised to it.
pub const MIN_GAMMA: f32 = 0.01;

/// Clip limit used by the equalization step.
pub const CLAHE_CLIP_LIMIT: f32 = 2.0;

/// Tile grid used by the equalization step.
pub const CLAHE_GRID: (u32, u32) = (8, 8);

/// Enhancement pipeline operating on a single in-memory image.
///
/// Each method consumes `self` and returns the transformed image wrapped in a
/// new `ImageTransformer`, so steps chain:
///
/// ```ignore
/// let out = ImageTransformer::open("label.png")?
///     .adjust_levels(10, 1.2)
///     .gamma(0.8)
///     .equalize()
///     .rotate(15)
///     .into_dynamic();
/// ```
pub struct ImageTransformer {
    image: DynamicImage,
}

impl ImageTransformer {
    // -- Construction ---------------------------------------------------------

    /// Load an image from a file path.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let image = image::open(path.as_ref()).map_err(|err| {
            PruefwerkError::ImageError(format!(
                "failed to open {}: {}",
                path.as_ref().display(),
                err
            ))
        })?;
        debug!(width = image.width(), height = image.height(), "Image loaded");
        Ok(Self { image })
    }

    /// Wrap an already-decoded `DynamicImage`.
    pub fn from_dynamic(image: DynamicImage) -> Self {
        Self { image }
    }

    // -- Accessors ------------------------------------------------------------

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn as_dynamic(&self) -> &DynamicImage {
        &self.image
    }

    pub fn into_dynamic(self) -> DynamicImage {
        self.image
    }

    // -- Pixel adjustments ----------------------------------------------------

    /// Linear adjustment `out = clip(in * contrast + brightness, 0, 255)` on
    /// every colour channel. Alpha is left untouched.
    #[instrument(skip(self))]
    pub fn adjust_levels(self, brightness: i32, contrast: f32) -> Self {
        let lut = levels_lut(brightness, contrast);
        Self {
            image: map_color_channels(self.image, &lut),
        }
    }

    /// Gamma correction `out = 255 * (in / 255) ^ (1 / gamma)`.
    ///
    /// Gamma values at or below zero (and NaN) are raised to [`MIN_GAMMA`].
    #[instrument(skip(self))]
    pub fn gamma(self, gamma: f32) -> Self {
        let lut = gamma_lut(gamma);
        Self {
            image: map_color_channels(self.image, &lut),
        }
    }

    /// Local histogram equalization on the luminance, with the default clip
    /// limit and tile grid.
    pub fn equalize(self) -> Self {
        self.equalize_with(CLAHE_CLIP_LIMIT, CLAHE_GRID)
    }

    /// Local histogram equalization on the luminance.
    ///
    /// The image is reduced to one luminance channel, equalized, then
    /// re-expanded to its original layout: colour channels all carry the
    /// equalized luminance, alpha is preserved.
    #[instrument(skip(self), fields(width = self.image.width(), height = self.image.height()))]
    pub fn equalize_with(self, clip_limit: f32, grid: (u32, u32)) -> Self {
        let gray = self.image.to_luma8();
        let equalized = clahe::equalize(&gray, clip_limit, grid);
        Self {
            image: expand_luma(self.image, &equalized),
        }
    }

    // -- Geometry -------------------------------------------------------------

    /// Rotate counter-clockwise by `degrees` around the image centre.
    ///
    /// The canvas grows to hold the whole rotated image; uncovered pixels are
    /// black. Multiples of 90 degrees are lossless, multiples of 360 are a
    /// no-op.
    #[instrument(skip(self), fields(degrees))]
    pub fn rotate(self, degrees: i32) -> Self {
        let normalised = degrees.rem_euclid(360);
        let image = match normalised {
            0 => return self,
            90 => self.image.rotate270(),
            180 => self.image.rotate180(),
            270 => self.image.rotate90(),
            _ => rotate_expanded(self.image, normalised as f32),
        };
        debug!(
            width = image.width(),
            height = image.height(),
            "Rotation applied"
        );
        Self { image }
    }

    // -- Full stage -----------------------------------------------------------

    /// Run the whole stage for `config`, in the fixed order levels, gamma,
    /// equalization, rotation.
    ///
    /// Numeric parameters are clamped first. A disabled config leaves the
    /// image untouched.
    pub fn apply(self, config: &PreprocessConfig) -> Self {
        if !config.enabled {
            return self;
        }
        let config = config.clamped();

        // The levels result stays fractional until gamma has run.
        let lut = levels_gamma_lut(config.brightness, config.contrast, config.gamma);
        let mut stage = Self {
            image: map_color_channels(self.image, &lut),
        };
        if config.use_clahe {
            stage = stage.equalize();
        }
        stage.rotate(config.rotation_deg)
    }
}

/// Apply the transform stage to a borrowed image.
#[instrument(skip_all, fields(width = image.width(), height = image.height()))]
pub fn transform(image: &DynamicImage, config: &PreprocessConfig) -> DynamicImage {
    if !config.enabled {
        return image.clone();
    }
    ImageTransformer::from_dynamic(image.clone())
        .apply(config)
        .into_dynamic()
}

// ---------------------------------------------------------------------------
// Lookup tables
// ---------------------------------------------------------------------------

/// `clip(v * contrast + brightness, 0, 255)`, unrounded.
fn levels(v: f32, brightness: i32, contrast: f32) -> f32 {
    let contrast = if contrast.is_finite() { contrast } else { 1.0 };
    (v * contrast + brightness as f32).clamp(0.0, 255.0)
}

/// `255 * (v / 255) ^ (1 / gamma)`, unrounded.
fn gamma_curve(v: f32, gamma: f32) -> f32 {
    // `max` also turns NaN into MIN_GAMMA.
    255.0 * (v / 255.0).powf(1.0 / gamma.max(MIN_GAMMA))
}

fn quantize(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

fn levels_lut(brightness: i32, contrast: f32) -> [u8; 256] {
    std::array::from_fn(|v| quantize(levels(v as f32, brightness, contrast)))
}

fn gamma_lut(gamma: f32) -> [u8; 256] {
    std::array::from_fn(|v| quantize(gamma_curve(v as f32, gamma)))
}

fn levels_gamma_lut(brightness: i32, contrast: f32, gamma: f32) -> [u8; 256] {
    std::array::from_fn(|v| quantize(gamma_curve(levels(v as f32, brightness, contrast), gamma)))
}

/// Map every colour channel through `lut`, leaving alpha alone.
///
/// Formats other than 8-bit luma/RGB (with or without alpha) are converted to
/// 8-bit RGB or RGBA first.
fn map_color_channels(image: DynamicImage, lut: &[u8; 256]) -> DynamicImage {
    match image {
        DynamicImage::ImageLuma8(mut buf) => {
            for p in buf.pixels_mut() {
                p.0[0] = lut[p.0[0] as usize];
            }
            DynamicImage::ImageLuma8(buf)
        }
        DynamicImage::ImageLumaA8(mut buf) => {
            for p in buf.pixels_mut() {
                p.0[0] = lut[p.0[0] as usize];
            }
            DynamicImage::ImageLumaA8(buf)
        }
        DynamicImage::ImageRgb8(mut buf) => {
            for p in buf.pixels_mut() {
                for c in p.0.iter_mut() {
                    *c = lut[*c as usize];
                }
            }
            DynamicImage::ImageRgb8(buf)
        }
        DynamicImage::ImageRgba8(mut buf) => {
            for p in buf.pixels_mut() {
                for c in p.0[..3].iter_mut() {
                    *c = lut[*c as usize];
                }
            }
            DynamicImage::ImageRgba8(buf)
        }
        other => {
            let converted = if other.color().has_alpha() {
                DynamicImage::ImageRgba8(other.to_rgba8())
            } else {
                DynamicImage::ImageRgb8(other.to_rgb8())
            };
            map_color_channels(converted, lut)
        }
    }
}

/// Put the equalized luminance back into the layout of `original`.
fn expand_luma(original: DynamicImage, gray: &GrayImage) -> DynamicImage {
    let luma_at = |x: u32, y: u32| gray.get_pixel(x, y).0[0];
    match original {
        DynamicImage::ImageLuma8(_) => DynamicImage::ImageLuma8(gray.clone()),
        DynamicImage::ImageLumaA8(mut buf) => {
            for (x, y, p) in buf.enumerate_pixels_mut() {
                p.0[0] = luma_at(x, y);
            }
            DynamicImage::ImageLumaA8(buf)
        }
        DynamicImage::ImageRgba8(mut buf) => {
            for (x, y, p) in buf.enumerate_pixels_mut() {
                let l = luma_at(x, y);
                p.0[..3].fill(l);
            }
            DynamicImage::ImageRgba8(buf)
        }
        other if other.color().has_alpha() => expand_luma(DynamicImage::ImageRgba8(other.to_rgba8()), gray),
        _ => DynamicImage::ImageLuma8(gray.clone()).to_rgb8().into(),
    }
}

// ---------------------------------------------------------------------------
// Rotation
// ---------------------------------------------------------------------------

/// Size of the canvas that holds a `width` x `height` image rotated by
/// `degrees`, truncated to whole pixels.
pub fn expanded_size(width: u32, height: u32, degrees: f32) -> (u32, u32) {
    let rad = degrees.to_radians();
    let (sin, cos) = (rad.sin().abs(), rad.cos().abs());
    let (w, h) = (width as f32, height as f32);
    let new_w = (h * sin + w * cos) as u32;
    let new_h = (h * cos + w * sin) as u32;
    (new_w.max(1), new_h.max(1))
}

fn rotate_expanded(image: DynamicImage, degrees: f32) -> DynamicImage {
    if image.width() == 0 || image.height() == 0 {
        return image;
    }
    match image {
        DynamicImage::ImageLuma8(buf) => {
            DynamicImage::ImageLuma8(warp_rotated(&buf, degrees, Luma([0])))
        }
        DynamicImage::ImageLumaA8(buf) => {
            DynamicImage::ImageLumaA8(warp_rotated(&buf, degrees, LumaA([0, 0])))
        }
        DynamicImage::ImageRgb8(buf) => {
            DynamicImage::ImageRgb8(warp_rotated(&buf, degrees, Rgb([0, 0, 0])))
        }
        DynamicImage::ImageRgba8(buf) => {
            DynamicImage::ImageRgba8(warp_rotated(&buf, degrees, Rgba([0, 0, 0, 0])))
        }
        other if other.color().has_alpha() => {
            rotate_expanded(DynamicImage::ImageRgba8(other.to_rgba8()), degrees)
        }
        other => rotate_expanded(DynamicImage::ImageRgb8(other.to_rgb8()), degrees),
    }
}

/// Counter-clockwise rotation about the centre onto an expanded canvas.
fn warp_rotated<P>(image: &Image<P>, degrees: f32, default: P) -> Image<P>
where
    P: Pixel<Subpixel = u8> + Send + Sync,
{
    let (width, height) = image.dimensions();
    let (out_w, out_h) = expanded_size(width, height, degrees);

    // Image y grows downwards, so a positive `Projection::rotate` angle turns
    // clockwise on screen.
    let projection = Projection::translate(out_w as f32 / 2.0, out_h as f32 / 2.0)
        * Projection::rotate(-degrees.to_radians())
        * Projection::translate(-(width as f32) / 2.0, -(height as f32) / 2.0);

    let mut output = Image::<P>::from_pixel(out_w, out_h, default);
    warp_into(image, &projection, Interpolation::Bilinear, default, &mut output);
    output
}
