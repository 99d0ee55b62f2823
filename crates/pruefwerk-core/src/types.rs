// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Pruefwerk inspection engine.

use chrono::{DateTime, Utc};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{PruefwerkError, Result};

/// Unique identifier for a batch job or live session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Quadrilateral around a recognized token.
///
/// Corners are ordered top-left, top-right, bottom-right, bottom-left.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum TokenGeometry {
    /// Corners as fractions of the image width/height (0.0..=1.0).
    Normalized([(f32, f32); 4]),
    /// Corners in pixel coordinates of the recognized image.
    Pixel([(f32, f32); 4]),
}

impl TokenGeometry {
    /// Axis-aligned box given as two opposite corners in normalized coordinates.
    pub fn normalized_box(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self::Normalized([(x0, y0), (x1, y0), (x1, y1), (x0, y1)])
    }

    /// Resolve the corners to pixel coordinates for an image of the given size.
    pub fn to_pixels(&self, width: u32, height: u32) -> [(f32, f32); 4] {
        match *self {
            Self::Pixel(corners) => corners,
            Self::Normalized(corners) => {
                corners.map(|(x, y)| (x * width as f32, y * height as f32))
            }
        }
    }
}

/// A single recognized unit: a word, a line, or a decoded barcode value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionToken {
    /// Recognized value.
    pub value: String,
    /// Where the value was found, if the backend reports it.
    pub geometry: Option<TokenGeometry>,
    /// Backend-reported confidence, if any.
    pub confidence: Option<f32>,
}

impl ExtractionToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            geometry: None,
            confidence: None,
        }
    }

    pub fn with_geometry(mut self, geometry: TokenGeometry) -> Self {
        self.geometry = Some(geometry);
        self
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = Some(confidence);
        self
    }
}

/// Pass/fail rule applied to the recognized tokens of one image.
///
/// The pattern is compiled once, case-insensitive, with search semantics.
#[derive(Debug, Clone, Default)]
pub struct ValidationRule {
    pattern: Option<Regex>,
    pattern_source: Option<String>,
    expected_char_count: Option<u32>,
}

impl ValidationRule {
    /// Build a rule. A blank pattern is treated as "no pattern".
    pub fn new(pattern: Option<&str>, expected_char_count: Option<u32>) -> Result<Self> {
        let source = pattern.map(str::trim).filter(|p| !p.is_empty());
        let compiled = match source {
            Some(p) => Some(
                RegexBuilder::new(p)
                    .case_insensitive(true)
                    .build()
                    .map_err(|err| PruefwerkError::InvalidPattern {
                        pattern: p.to_string(),
                        reason: err.to_string(),
                    })?,
            ),
            None => None,
        };

        Ok(Self {
            pattern: compiled,
            pattern_source: source.map(str::to_string),
            expected_char_count,
        })
    }

    /// The compiled search pattern, if one is set.
    pub fn pattern(&self) -> Option<&Regex> {
        self.pattern.as_ref()
    }

    /// The pattern as the operator wrote it.
    pub fn pattern_source(&self) -> Option<&str> {
        self.pattern_source.as_deref()
    }

    pub fn expected_char_count(&self) -> Option<u32> {
        self.expected_char_count
    }
}

/// Outcome of validating one image. Built fresh per evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationVerdict {
    /// Letters and digits left after noise removal.
    pub detected_count: usize,
    /// Minimum count the rule asked for.
    pub expected_count: Option<u32>,
    /// Whether the pattern was found; `None` when the rule has no pattern.
    pub regex_matched: Option<bool>,
    /// Combined count and pattern verdict.
    pub passed: bool,
}

impl ValidationVerdict {
    /// `OK` / `NOT_OK`, as written to result exports.
    pub fn final_result(&self) -> &'static str {
        if self.passed { "OK" } else { "NOT_OK" }
    }
}

/// One processed batch item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchRecord {
    /// File name (without directory) of the processed image.
    pub file_name: String,
    /// Pattern that was active when the item was processed.
    pub regex: Option<String>,
    /// All recognized values in reading order.
    pub raw_text: Vec<String>,
    /// Values whose normalized form fully matched the pattern.
    pub matches: Vec<String>,
    pub verdict: ValidationVerdict,
}

/// One processed live frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveRecord {
    /// Capture time of the frame.
    pub timestamp: DateTime<Utc>,
    /// Frame sequence number assigned by the producer.
    pub frame: u64,
    pub regex: Option<String>,
    pub raw_text: Vec<String>,
    pub matches: Vec<String>,
    pub verdict: ValidationVerdict,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_pattern_is_unset() {
        let rule = ValidationRule::new(Some("   "), None).expect("blank pattern");
        assert!(rule.pattern().is_none());
        assert!(rule.pattern_source().is_none());
    }

    #[test]
    fn invalid_pattern_is_rejected() {
        let err = ValidationRule::new(Some("[A-Z"), None).unwrap_err();
        assert!(matches!(err, PruefwerkError::InvalidPattern { .. }));
    }

    #[test]
    fn pattern_is_case_insensitive() {
        let rule = ValidationRule::new(Some("lot\\d+"), Some(4)).expect("rule");
        assert!(rule.pattern().expect("pattern").is_match("LOT42"));
        assert_eq!(rule.expected_char_count(), Some(4));
    }

    #[test]
    fn normalized_geometry_scales_to_pixels() {
        let geometry = TokenGeometry::normalized_box(0.25, 0.5, 0.75, 1.0);
        let corners = geometry.to_pixels(200, 100);
        assert_eq!(corners[0], (50.0, 50.0));
        assert_eq!(corners[2], (150.0, 100.0));
    }

    #[test]
    fn final_result_strings() {
        let mut verdict = ValidationVerdict {
            detected_count: 3,
            expected_count: None,
            regex_matched: None,
            passed: true,
        };
        assert_eq!(verdict.final_result(), "OK");
        verdict.passed = false;
        assert_eq!(verdict.final_result(), "NOT_OK");
    }
}
