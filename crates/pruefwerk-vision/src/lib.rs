// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// pruefwerk-vision — Image side of the Pruefwerk inspection engine.
//
// Provides the transform stage (brightness/contrast, gamma, CLAHE, rotation),
// the recognition backends (text and barcode) with annotation, and the
// validation engine shared by live and batch inspection.

pub mod recognition;
pub mod transform;
pub mod validation;

pub use recognition::{
    Backend, BarcodeExtractor, Extraction, RawResult, Recognizer, TextExtractor, TokenPattern,
};
pub use transform::{ImageTransformer, transform};
pub use validation::evaluate;

#[cfg(feature = "ocr")]
pub use recognition::OcrsEngine;

#[cfg(feature = "barcode")]
pub use recognition::QrDecoder;
