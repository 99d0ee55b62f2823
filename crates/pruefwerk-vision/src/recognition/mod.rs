// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Recognition backends — text extraction and barcode decoding behind one
// four-operation contract.
//
// Both variants turn images into `RawResult`s (flat token lists in the
// backend's reading order), filter tokens against a fullmatch pattern, and
// draw their findings onto a copy of the image. The concrete engines
// (`ocrs`, `rqrr`) sit behind the `TextEngine` / `BarcodeDecoder` traits so
// tests and alternative engines can be plugged in.

pub mod annotate;
pub mod barcode;
pub mod text;

#[cfg(feature = "ocr")]
pub mod ocr;

#[cfg(feature = "barcode")]
pub mod qr;

use image::DynamicImage;
use pruefwerk_core::error::{PruefwerkError, Result};
use pruefwerk_core::{EngineKind, ExtractionToken};
use regex::{Regex, RegexBuilder};
use serde::Serialize;

pub use annotate::Annotator;
pub use barcode::{BarcodeDecoder, BarcodeExtractor, BarcodeStatus};
pub use text::{TextEngine, TextExtractor, TextPage};

#[cfg(feature = "ocr")]
pub use ocr::{OcrConfig, OcrsEngine};

#[cfg(feature = "barcode")]
pub use qr::QrDecoder;

// ---------------------------------------------------------------------------
// Results and patterns
// ---------------------------------------------------------------------------

/// Everything one backend recognized in one image.
///
/// An empty token list is a normal result, not a failure.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RawResult {
    pub tokens: Vec<ExtractionToken>,
}

impl RawResult {
    pub fn new(tokens: Vec<ExtractionToken>) -> Self {
        Self { tokens }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Tokens whose normalized value fully matches `pattern`.
    pub fn matching<'a>(
        &'a self,
        pattern: &'a TokenPattern,
    ) -> impl Iterator<Item = &'a ExtractionToken> + 'a {
        self.tokens.iter().filter(|t| pattern.matches(&t.value))
    }
}

/// Strip the separators that recognition tends to insert or drop: spaces,
/// hyphens and underscores.
pub fn normalize(value: &str) -> String {
    value
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '_'))
        .collect()
}

/// Case-insensitive pattern that must match a whole normalized token.
#[derive(Debug, Clone)]
pub struct TokenPattern {
    source: String,
    regex: Regex,
}

impl TokenPattern {
    pub fn new(pattern: &str) -> Result<Self> {
        let regex = RegexBuilder::new(&format!("^(?:{pattern})$"))
            .case_insensitive(true)
            .build()
            .map_err(|err| PruefwerkError::InvalidPattern {
                pattern: pattern.to_string(),
                reason: err.to_string(),
            })?;
        Ok(Self {
            source: pattern.to_string(),
            regex,
        })
    }

    /// Build a pattern from an optional, possibly blank, source.
    pub fn optional(pattern: Option<&str>) -> Result<Option<Self>> {
        pattern
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(Self::new)
            .transpose()
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Whether the normalized form of `value` matches in full.
    pub fn matches(&self, value: &str) -> bool {
        self.regex.is_match(&normalize(value))
    }
}

/// Output of `extract_matches`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Extraction {
    /// Values whose normalized form fully matched the pattern.
    pub matched: Vec<String>,
    /// Every recognized value, in reading order.
    pub all_values: Vec<String>,
}

// ---------------------------------------------------------------------------
// Backend contract
// ---------------------------------------------------------------------------

/// The contract every recognition backend fulfils.
///
/// Backends hold model handles and are expensive to build; construct once and
/// reuse. They are `Send + Sync` so a pipeline thread can own them, but the
/// calls are blocking CPU work: from async code, wrap them in
/// `tokio::task::spawn_blocking`.
pub trait Recognizer: Send + Sync {
    /// Which backend variant this is.
    fn kind(&self) -> EngineKind;

    /// Engine name written to exports.
    fn name(&self) -> &'static str {
        self.kind().label()
    }

    /// One result per input image, in input order. An image the backend cannot
    /// process yields an empty result in its slot.
    fn run_batch(&self, images: &[DynamicImage]) -> Vec<RawResult>;

    /// All recognized values in the backend's reading order.
    fn extract_all_tokens(&self, raw: &RawResult) -> Vec<String> {
        raw.tokens.iter().map(|t| t.value.clone()).collect()
    }

    /// Split recognized values into pattern matches and the full list.
    ///
    /// With no pattern `matched` is empty and `all_values` still filled.
    fn extract_matches(&self, raw: &RawResult, pattern: Option<&TokenPattern>) -> Extraction {
        let all_values = self.extract_all_tokens(raw);
        let matched = match pattern {
            Some(p) => raw.matching(p).map(|t| t.value.clone()).collect(),
            None => Vec::new(),
        };
        Extraction {
            matched,
            all_values,
        }
    }

    /// Draw the findings on a copy of `image`.
    fn annotate(
        &self,
        image: &DynamicImage,
        raw: &RawResult,
        pattern: Option<&TokenPattern>,
    ) -> DynamicImage;
}

/// The recognition backend selected by a profile.
pub enum Backend {
    Text(TextExtractor),
    Barcode(BarcodeExtractor),
}

impl Backend {
    fn inner(&self) -> &dyn Recognizer {
        match self {
            Self::Text(t) => t,
            Self::Barcode(b) => b,
        }
    }

    /// Build the default backend for `kind` with the engines compiled into
    /// this build.
    ///
    /// Text recognition needs the `ocr` feature and the model files in the
    /// default cache directory; barcode decoding needs the `barcode` feature.
    pub fn for_kind(kind: EngineKind) -> Result<Self> {
        match kind {
            EngineKind::Text => Self::default_text(),
            EngineKind::Barcode => Self::default_barcode(),
        }
    }

    /// Swap the annotator, e.g. for one with a label font.
    pub fn with_annotator(self, annotator: Annotator) -> Self {
        match self {
            Self::Text(t) => Self::Text(t.with_annotator(annotator)),
            Self::Barcode(b) => Self::Barcode(b.with_annotator(annotator)),
        }
    }

    #[cfg(feature = "ocr")]
    fn default_text() -> Result<Self> {
        let engine = OcrsEngine::with_defaults()?;
        Ok(Self::Text(TextExtractor::new(Box::new(engine))))
    }

    #[cfg(not(feature = "ocr"))]
    fn default_text() -> Result<Self> {
        Err(PruefwerkError::FeatureUnavailable("ocr"))
    }

    #[cfg(feature = "barcode")]
    fn default_barcode() -> Result<Self> {
        Ok(Self::Barcode(BarcodeExtractor::new(Box::new(QrDecoder))))
    }

    #[cfg(not(feature = "barcode"))]
    fn default_barcode() -> Result<Self> {
        Err(PruefwerkError::FeatureUnavailable("barcode"))
    }
}

impl Recognizer for Backend {
    fn kind(&self) -> EngineKind {
        match self {
            Self::Text(_) => EngineKind::Text,
            Self::Barcode(_) => EngineKind::Barcode,
        }
    }

    fn run_batch(&self, images: &[DynamicImage]) -> Vec<RawResult> {
        self.inner().run_batch(images)
    }

    fn extract_all_tokens(&self, raw: &RawResult) -> Vec<String> {
        self.inner().extract_all_tokens(raw)
    }

    fn extract_matches(&self, raw: &RawResult, pattern: Option<&TokenPattern>) -> Extraction {
        self.inner().extract_matches(raw, pattern)
    }

    fn annotate(
        &self,
        image: &DynamicImage,
        raw: &RawResult,
        pattern: Option<&TokenPattern>,
    ) -> DynamicImage {
        self.inner().annotate(image, raw, pattern)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(values: &[&str]) -> RawResult {
        RawResult::new(values.iter().map(|v| ExtractionToken::new(*v)).collect())
    }

    #[test]
    fn normalize_strips_separators() {
        assert_eq!(normalize("AB 12-3_4"), "AB1234");
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn pattern_fullmatches_normalized_value() {
        let p = TokenPattern::new(r"^[A-Z]{2}\d{2}$").expect("pattern");
        assert!(p.matches("AB12"));
        assert!(p.matches("ab-12"));
        assert!(p.matches("A B 1 2"));
        assert!(!p.matches("AB123"));

        // Without anchors the whole token must still match.
        let bare = TokenPattern::new(r"\d{3}").expect("pattern");
        assert!(bare.matches("123"));
        assert!(!bare.matches("X123"));
    }

    #[test]
    fn blank_pattern_is_none() {
        assert!(TokenPattern::optional(Some("  ")).expect("blank").is_none());
        assert!(TokenPattern::optional(None).expect("none").is_none());
        assert!(TokenPattern::optional(Some("(")).is_err());
    }

    #[test]
    fn matching_keeps_reading_order() {
        let result = raw(&["LOT", "AB12", "x", "CD34"]);
        let p = TokenPattern::new("[a-z]{2}[0-9]{2}").expect("pattern");
        let values: Vec<_> = result.matching(&p).map(|t| t.value.as_str()).collect();
        assert_eq!(values, ["AB12", "CD34"]);
    }
}
