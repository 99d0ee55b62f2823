// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Pruefwerk.

use thiserror::Error;

/// Top-level error type for all Pruefwerk operations.
#[derive(Debug, Error)]
pub enum PruefwerkError {
    // -- Acquisition errors --
    #[error("capture device error: {0}")]
    Capture(String),

    // -- Decode / extraction errors --
    #[error("image processing failed: {0}")]
    ImageError(String),

    #[error("OCR failed: {0}")]
    OcrError(String),

    #[error("barcode decoding failed: {0}")]
    BarcodeError(String),

    // -- Configuration errors --
    #[error("no inspection profile loaded")]
    MissingProfile,

    #[error("no camera configuration loaded")]
    MissingCameraConfig,

    #[error("no capture source available")]
    MissingCaptureSource,

    #[error("invalid regex {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("cannot {action} while {state}")]
    InvalidTransition { action: &'static str, state: String },

    #[error("no images to process")]
    EmptyBatch,

    // -- Export errors --
    #[error("export failed: {0}")]
    Export(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    // -- Storage / persistence --
    // Reads of profiles, folders and fonts. Writes of results are `Export`.
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("feature not available in this build: {0}")]
    FeatureUnavailable(&'static str),
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, PruefwerkError>;
