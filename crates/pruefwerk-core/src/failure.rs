// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Failure taxonomy and operator-facing messages.
//
// Every error is mapped onto one of four recovery classes. None of them ends
// the process: acquisition and extraction failures are skipped, configuration
// failures refuse to start, export failures are logged and the in-memory
// results are kept.

use crate::error::PruefwerkError;

/// How the pipeline recovers from an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Capture timeout or device fault: treated as "no frame", retried on the next poll.
    Acquisition,
    /// Unreadable image or backend failure on one item: empty result, job continues.
    Extraction,
    /// Missing or invalid configuration: start is refused, no partial state.
    Configuration,
    /// Filesystem failure while writing results: logged, results kept in memory.
    Export,
}

impl FailureClass {
    /// Whether the operation that failed can simply be skipped.
    pub fn is_skippable(&self) -> bool {
        matches!(self, Self::Acquisition | Self::Extraction)
    }
}

/// An operator-facing description with a suggested next step.
#[derive(Debug, Clone)]
pub struct FailureReport {
    /// One-line summary shown in the log console.
    pub message: String,
    /// What the operator should try.
    pub suggestion: String,
    /// Recovery class.
    pub class: FailureClass,
}

impl std::fmt::Display for FailureReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.message, self.suggestion)
    }
}

/// Map an error onto the recovery taxonomy.
pub fn classify(err: &PruefwerkError) -> FailureClass {
    match err {
        PruefwerkError::Capture(_) => FailureClass::Acquisition,

        PruefwerkError::ImageError(_)
        | PruefwerkError::OcrError(_)
        | PruefwerkError::BarcodeError(_) => FailureClass::Extraction,

        PruefwerkError::MissingProfile
        | PruefwerkError::MissingCameraConfig
        | PruefwerkError::MissingCaptureSource
        | PruefwerkError::InvalidPattern { .. }
        | PruefwerkError::InvalidTransition { .. }
        | PruefwerkError::EmptyBatch
        | PruefwerkError::FeatureUnavailable(_) => FailureClass::Configuration,

        PruefwerkError::Export(_) | PruefwerkError::Csv(_) => FailureClass::Export,

        // Result writers wrap their failures in `Export`, so bare I/O and JSON
        // errors come from reading a profile, folder or font.
        PruefwerkError::Serialization(_) | PruefwerkError::Io(_) => FailureClass::Configuration,
    }
}

/// Build the log line shown to the operator for an error.
pub fn describe(err: &PruefwerkError) -> FailureReport {
    let class = classify(err);
    let (message, suggestion) = match err {
        PruefwerkError::Capture(detail) => (
            format!("Camera problem: {detail}."),
            "Check the cable and that no other program holds the device.".to_string(),
        ),
        PruefwerkError::ImageError(detail) => (
            format!("Image skipped: {detail}."),
            "Make sure the file is a readable JPEG, PNG, BMP or TIFF.".to_string(),
        ),
        PruefwerkError::OcrError(detail) => (
            format!("Text recognition failed: {detail}."),
            "The item is recorded with no recognized text.".to_string(),
        ),
        PruefwerkError::BarcodeError(detail) => (
            format!("Barcode decoding failed: {detail}."),
            "The item is recorded with no decoded values.".to_string(),
        ),
        PruefwerkError::MissingProfile | PruefwerkError::MissingCameraConfig => (
            "Load config first.".to_string(),
            "Both a preprocess profile and a camera configuration are required.".to_string(),
        ),
        PruefwerkError::MissingCaptureSource => (
            "No camera connected.".to_string(),
            "Connect a camera or pass a replay folder.".to_string(),
        ),
        PruefwerkError::InvalidPattern { pattern, reason } => (
            format!("The regex {pattern:?} is not valid ({reason})."),
            "Fix the pattern in the profile and start again.".to_string(),
        ),
        PruefwerkError::InvalidTransition { .. } => (
            format!("{err}."),
            "The request was ignored.".to_string(),
        ),
        PruefwerkError::EmptyBatch => (
            "No folder loaded.".to_string(),
            "Pick a folder containing jpg, png, bmp or tif images.".to_string(),
        ),
        PruefwerkError::FeatureUnavailable(feature) => (
            format!("This build has no {feature} support."),
            format!("Rebuild with the `{feature}` feature enabled."),
        ),
        PruefwerkError::Io(detail) => (
            format!("Could not read input: {detail}."),
            "Check that the profile, folder or font path exists and is readable.".to_string(),
        ),
        PruefwerkError::Export(_) | PruefwerkError::Csv(_) => (
            format!("Failed to save output: {err}."),
            "Results are still held in memory; check the output directory permissions.".to_string(),
        ),
        PruefwerkError::Serialization(detail) => (
            format!("The profile is not valid JSON: {detail}."),
            "Re-save the profile and load it again.".to_string(),
        ),
    };

    FailureReport {
        message,
        suggestion,
        class,
    }
}
