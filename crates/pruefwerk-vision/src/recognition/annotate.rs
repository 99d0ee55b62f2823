// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Drawing of recognition findings: token outlines, value labels and the
// barcode status banner.

use std::path::Path;

use ab_glyph::{FontArc, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_line_segment_mut, draw_text_mut};
use imageproc::rect::Rect;
use pruefwerk_core::ExtractionToken;
use pruefwerk_core::error::{PruefwerkError, Result};
use tracing::{debug, info, instrument};

/// Outline and label colour for matched tokens.
pub const MATCH_COLOR: Rgb<u8> = Rgb([0, 0, 255]);

/// Fonts tried, in order, by [`Annotator::with_system_font`].
const SYSTEM_FONTS: [&str; 6] = [
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// Pixel offsets used to thicken outlines to two pixels.
const STROKE: [(f32, f32); 2] = [(0.0, 0.0), (1.0, 1.0)];

/// Draws findings onto RGB canvases.
///
/// Outlines are always drawn; value labels only when a font is loaded.
#[derive(Clone)]
pub struct Annotator {
    font: Option<FontArc>,
    scale: PxScale,
}

impl Default for Annotator {
    fn default() -> Self {
        Self {
            font: None,
            scale: PxScale::from(18.0),
        }
    }
}

impl std::fmt::Debug for Annotator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Annotator")
            .field("has_font", &self.font.is_some())
            .field("scale", &self.scale.y)
            .finish()
    }
}

impl Annotator {
    /// Load a TrueType/OpenType font for value labels.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn with_font_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|err| {
            PruefwerkError::ImageError(format!("cannot read font {}: {}", path.display(), err))
        })?;
        let font = FontArc::try_from_vec(data).map_err(|err| {
            PruefwerkError::ImageError(format!("invalid font {}: {}", path.display(), err))
        })?;
        info!("Label font loaded");
        Ok(Self {
            font: Some(font),
            ..Self::default()
        })
    }

    /// Use the first readable font from the usual system locations. Without
    /// one, labels are skipped and only outlines and banners are drawn.
    pub fn with_system_font() -> Self {
        for path in SYSTEM_FONTS {
            if let Ok(annotator) = Self::with_font_file(path) {
                info!(path, "Using system font for labels");
                return annotator;
            }
        }
        debug!("No system font found; labels will not be drawn");
        Self::default()
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    /// Outline a token and label it with its value.
    ///
    /// Tokens without geometry are skipped.
    pub fn draw_token(&self, canvas: &mut RgbImage, token: &ExtractionToken) {
        let (width, height) = canvas.dimensions();
        if width == 0 || height == 0 {
            return;
        }
        let Some(geometry) = token.geometry else {
            return;
        };
        let corners = geometry.to_pixels(width, height);

        for (dx, dy) in STROKE {
            for i in 0..corners.len() {
                let (x0, y0) = corners[i];
                let (x1, y1) = corners[(i + 1) % corners.len()];
                draw_line_segment_mut(canvas, (x0 + dx, y0 + dy), (x1 + dx, y1 + dy), MATCH_COLOR);
            }
        }

        if let Some(font) = &self.font {
            let (x, y) = corners[0];
            let label_y = (y - self.scale.y - 4.0).max(0.0);
            draw_text_mut(
                canvas,
                MATCH_COLOR,
                x as i32,
                label_y as i32,
                self.scale,
                font,
                &token.value,
            );
        }
    }

    /// Fill a banner across the top of the canvas and write `text` into it.
    pub fn draw_banner(&self, canvas: &mut RgbImage, text: &str, color: Rgb<u8>) {
        let (width, height) = canvas.dimensions();
        if width == 0 || height == 0 {
            return;
        }
        let banner_h = ((self.scale.y as u32) + 12).min(height);
        draw_filled_rect_mut(canvas, Rect::at(0, 0).of_size(width, banner_h), color);

        if let Some(font) = &self.font {
            draw_text_mut(canvas, Rgb([255, 255, 255]), 6, 6, self.scale, font, text);
        }
    }
}
