// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Inspection profile: the JSON file holding preprocessing settings, the
// recognition backend choice and the validation rule.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::error::{PruefwerkError, Result};
use crate::types::ValidationRule;

/// Pixel enhancement settings consumed by the transform stage.
///
/// A value snapshot: the pipeline reads it per operation and never mutates it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PreprocessConfig {
    /// Master switch; when false images go to recognition untouched.
    pub enabled: bool,
    /// Added to every channel after contrast scaling (-100..=100).
    pub brightness: i32,
    /// Multiplier applied to every channel (0.1..=3.0).
    pub contrast: f32,
    /// Gamma exponent denominator (0.1..=3.0).
    pub gamma: f32,
    /// Counter-clockwise rotation in degrees.
    pub rotation_deg: i32,
    /// Apply local histogram equalization on the luminance.
    pub use_clahe: bool,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            brightness: 0,
            contrast: 1.0,
            gamma: 1.0,
            rotation_deg: 0,
            use_clahe: false,
        }
    }
}

impl PreprocessConfig {
    pub const BRIGHTNESS_RANGE: (i32, i32) = (-100, 100);
    pub const CONTRAST_RANGE: (f32, f32) = (0.1, 3.0);
    pub const GAMMA_RANGE: (f32, f32) = (0.1, 3.0);

    /// Copy with every numeric field forced into its valid range.
    ///
    /// Non-finite floats fall back to the neutral value 1.0.
    pub fn clamped(&self) -> Self {
        let finite_or_one = |v: f32| if v.is_finite() { v } else { 1.0 };
        Self {
            enabled: self.enabled,
            brightness: self
                .brightness
                .clamp(Self::BRIGHTNESS_RANGE.0, Self::BRIGHTNESS_RANGE.1),
            contrast: finite_or_one(self.contrast)
                .clamp(Self::CONTRAST_RANGE.0, Self::CONTRAST_RANGE.1),
            gamma: finite_or_one(self.gamma).clamp(Self::GAMMA_RANGE.0, Self::GAMMA_RANGE.1),
            rotation_deg: self.rotation_deg,
            use_clahe: self.use_clahe,
        }
    }
}

/// Recognition backend variant selected by a profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineKind {
    /// Word-level text recognition.
    Text,
    /// Barcode / QR decoding.
    Barcode,
}

impl EngineKind {
    /// Resolve the `ocr_model` profile value.
    ///
    /// Legacy model names from older profiles all select text recognition.
    /// Unknown names fall back to text recognition.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "barcode" | "qr" | "qrcode" => Self::Barcode,
            "ocrs" | "text" | "doctr" | "easyocr" | "paddleocr" => Self::Text,
            other => {
                warn!(model = other, "unknown recognition model, using text recognition");
                Self::Text
            }
        }
    }

    /// Name written to result exports.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Text => "Ocrs",
            Self::Barcode => "Barcode",
        }
    }
}

impl std::fmt::Display for EngineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// On-disk inspection profile.
///
/// Missing keys take their defaults and unknown keys are ignored, so profiles
/// written by older tools keep loading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InspectionProfile {
    pub ocr_model: String,
    pub enable_preprocessing: bool,
    pub use_clahe: bool,
    pub brightness: i32,
    pub contrast: f32,
    pub gamma: f32,
    /// Slider rotation, added to `rotate_preset`.
    pub fine_rotate: i32,
    /// Preset rotation (0, 45, 90, ...), added to `fine_rotate`.
    pub rotate_preset: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub regex: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_char_count: Option<u32>,
    /// Literal barcode value to look for when no regex is given.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_value: Option<String>,
}

impl Default for InspectionProfile {
    fn default() -> Self {
        let pre = PreprocessConfig::default();
        Self {
            ocr_model: EngineKind::Text.label().to_string(),
            enable_preprocessing: pre.enabled,
            use_clahe: pre.use_clahe,
            brightness: pre.brightness,
            contrast: pre.contrast,
            gamma: pre.gamma,
            fine_rotate: 0,
            rotate_preset: 0,
            regex: None,
            expected_char_count: None,
            expected_value: None,
        }
    }
}

impl InspectionProfile {
    /// Load a profile from a JSON file.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read_to_string(path.as_ref())?;
        let profile = Self::from_json(&data)?;
        info!(model = %profile.ocr_model, "inspection profile loaded");
        Ok(profile)
    }

    /// Parse a profile from a JSON string.
    pub fn from_json(data: &str) -> Result<Self> {
        Ok(serde_json::from_str(data)?)
    }

    /// Write the profile as pretty-printed JSON.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), json).map_err(|e| {
            PruefwerkError::Export(format!("{}: {e}", path.as_ref().display()))
        })?;
        info!("inspection profile saved");
        Ok(())
    }

    /// Preprocessing snapshot, clamped to valid ranges.
    pub fn preprocess(&self) -> PreprocessConfig {
        PreprocessConfig {
            enabled: self.enable_preprocessing,
            brightness: self.brightness,
            contrast: self.contrast,
            gamma: self.gamma,
            rotation_deg: self.fine_rotate.saturating_add(self.rotate_preset),
            use_clahe: self.use_clahe,
        }
        .clamped()
    }

    /// Copy the preprocessing settings of `config` into this profile.
    ///
    /// The whole rotation goes into `fine_rotate`.
    pub fn set_preprocess(&mut self, config: &PreprocessConfig) {
        self.enable_preprocessing = config.enabled;
        self.use_clahe = config.use_clahe;
        self.brightness = config.brightness;
        self.contrast = config.contrast;
        self.gamma = config.gamma;
        self.fine_rotate = config.rotation_deg;
        self.rotate_preset = 0;
    }

    pub fn engine(&self) -> EngineKind {
        EngineKind::from_name(&self.ocr_model)
    }

    /// Pattern the backend and validator should look for.
    ///
    /// An explicit regex wins; otherwise the expected barcode value is matched
    /// literally.
    pub fn pattern(&self) -> Option<String> {
        let regex = self.regex.as_deref().map(str::trim).filter(|r| !r.is_empty());
        match regex {
            Some(r) => Some(r.to_string()),
            None => self
                .expected_value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(regex::escape),
        }
    }

    /// Compile the validation rule.
    pub fn rule(&self) -> Result<ValidationRule> {
        ValidationRule::new(self.pattern().as_deref(), self.expected_char_count)
    }
}
