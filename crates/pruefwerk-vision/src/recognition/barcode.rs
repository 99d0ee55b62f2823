// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Barcode decoding backend.

use image::{DynamicImage, Rgb};
use pruefwerk_core::{EngineKind, ExtractionToken};
use pruefwerk_core::error::Result;
use tracing::{debug, instrument, warn};

use super::annotate::Annotator;
use super::{RawResult, Recognizer, TokenPattern};

/// Decodes every barcode symbol visible in an image.
pub trait BarcodeDecoder: Send + Sync {
    /// Decoded symbols in decode order.
    fn decode(&self, image: &DynamicImage) -> Result<Vec<ExtractionToken>>;
}

/// Overall state of a barcode inspection, shown as a banner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarcodeStatus {
    /// A decoded value matches the pattern.
    Match,
    /// Symbols were decoded but none matches.
    NotMatch,
    /// Nothing was decoded.
    NoBarcode,
}

impl BarcodeStatus {
    /// Status for a result. Without a pattern any decoded symbol counts as a
    /// match.
    pub fn of(raw: &RawResult, pattern: Option<&TokenPattern>) -> Self {
        if raw.is_empty() {
            return Self::NoBarcode;
        }
        let matched = match pattern {
            Some(p) => raw.matching(p).next().is_some(),
            // No pattern and no expected value: nothing to mismatch against,
            // so a successful decode is reported as MATCH rather than the
            // NOT MATCH an empty expected value would give.
            None => true,
        };
        if matched { Self::Match } else { Self::NotMatch }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Match => "MATCH",
            Self::NotMatch => "NOT MATCH",
            Self::NoBarcode => "NO BARCODE",
        }
    }

    pub fn color(&self) -> Rgb<u8> {
        match self {
            Self::Match => Rgb([0, 255, 0]),
            Self::NotMatch => Rgb([255, 165, 0]),
            Self::NoBarcode => Rgb([255, 0, 0]),
        }
    }
}

impl std::fmt::Display for BarcodeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Barcode backend: decoded values, annotated with one status banner.
pub struct BarcodeExtractor {
    decoder: Box<dyn BarcodeDecoder>,
    annotator: Annotator,
}

impl BarcodeExtractor {
    pub fn new(decoder: Box<dyn BarcodeDecoder>) -> Self {
        Self {
            decoder,
            annotator: Annotator::default(),
        }
    }

    pub fn with_annotator(mut self, annotator: Annotator) -> Self {
        self.annotator = annotator;
        self
    }
}

impl Recognizer for BarcodeExtractor {
    fn kind(&self) -> EngineKind {
        EngineKind::Barcode
    }

    #[instrument(skip_all, fields(images = images.len()))]
    fn run_batch(&self, images: &[DynamicImage]) -> Vec<RawResult> {
        images
            .iter()
            .enumerate()
            .map(|(index, image)| match self.decoder.decode(image) {
                Ok(symbols) => {
                    debug!(index, symbols = symbols.len(), "Barcodes decoded");
                    RawResult::new(symbols)
                }
                Err(err) => {
                    warn!(index, error = %err, "Barcode decoding failed; recording empty result");
                    RawResult::empty()
                }
            })
            .collect()
    }

    fn annotate(
        &self,
        image: &DynamicImage,
        raw: &RawResult,
        pattern: Option<&TokenPattern>,
    ) -> DynamicImage {
        let status = BarcodeStatus::of(raw, pattern);
        let mut canvas = image.to_rgb8();
        self.annotator
            .draw_banner(&mut canvas, status.label(), status.color());
        DynamicImage::ImageRgb8(canvas)
    }
}
