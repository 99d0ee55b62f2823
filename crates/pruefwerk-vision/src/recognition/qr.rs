// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// QR code decoder backed by `rqrr` (behind the `barcode` feature).

use image::DynamicImage;
use pruefwerk_core::error::{PruefwerkError, Result};
use pruefwerk_core::{ExtractionToken, TokenGeometry};
use tracing::{debug, warn};

use super::barcode::BarcodeDecoder;

/// Finds and decodes every QR symbol in an image.
///
/// Grids that are located but fail to decode are logged and skipped. When
/// every located grid fails, the image is reported as a decoding error.
#[derive(Debug, Clone, Copy, Default)]
pub struct QrDecoder;

impl BarcodeDecoder for QrDecoder {
    fn decode(&self, image: &DynamicImage) -> Result<Vec<ExtractionToken>> {
        let gray = image.to_luma8();
        let (width, height) = gray.dimensions();
        let mut prepared =
            rqrr::PreparedImage::prepare_from_greyscale(width as usize, height as usize, |x, y| {
                gray.get_pixel(x as u32, y as u32).0[0]
            });
        let grids = prepared.detect_grids();
        debug!(grids = grids.len(), "QR grids located");

        let located = grids.len();
        let mut tokens = Vec::with_capacity(located);
        let mut last_error = None;
        for grid in grids {
            let corners = grid.bounds.map(|p| (p.x as f32, p.y as f32));
            match grid.decode() {
                Ok((_meta, content)) => {
                    tokens.push(
                        ExtractionToken::new(content)
                            .with_geometry(TokenGeometry::Pixel(corners)),
                    );
                }
                Err(err) => {
                    warn!(error = %err, "QR grid found but could not be decoded");
                    last_error = Some(err.to_string());
                }
            }
        }
        match last_error {
            Some(reason) if tokens.is_empty() => Err(PruefwerkError::BarcodeError(format!(
                "{located} QR symbol(s) located, none decoded: {reason}"
            ))),
            _ => Ok(tokens),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    #[test]
    fn blank_image_has_no_symbols() {
        let image = DynamicImage::ImageLuma8(GrayImage::from_pixel(64, 64, Luma([255])));
        let tokens = QrDecoder.decode(&image).expect("decode");
        assert!(tokens.is_empty());
    }
}
