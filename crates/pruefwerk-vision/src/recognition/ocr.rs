// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Text engine backed by the `ocrs` crate, a pure-Rust OCR engine running
// neural network models via `rten`.
//
// # Feature Gate
//
// Only available with the `ocr` feature:
//
// ```toml
// pruefwerk-vision = { path = "crates/pruefwerk-vision", features = ["ocr"] }
// ```
//
// # Model Setup
//
// Two model files are required:
//
// - **Detection model** (`text-detection.rten`) locates words.
// - **Recognition model** (`text-recognition.rten`) decodes characters.
//
// Running `ocrs-cli` once downloads both into `$XDG_CACHE_HOME/ocrs`
// (typically `~/.cache/ocrs`), which is where `OcrConfig::default()` looks.

use std::path::{Path, PathBuf};

use image::DynamicImage;
use ocrs::{ImageSource, OcrEngine, OcrEngineParams, TextItem};
use pruefwerk_core::error::{PruefwerkError, Result};
use pruefwerk_core::{ExtractionToken, TokenGeometry};
use rten::Model;
use rten_imageproc::RotatedRect;
use tracing::{debug, info, instrument};

use super::text::{TextEngine, TextPage};

const DETECTION_MODEL_FILENAME: &str = "text-detection.rten";
const RECOGNITION_MODEL_FILENAME: &str = "text-recognition.rten";

/// `$XDG_CACHE_HOME/ocrs`, falling back to `~/.cache/ocrs`.
fn default_model_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CACHE_HOME") {
        PathBuf::from(xdg).join("ocrs")
    } else if let Ok(home) = std::env::var("HOME") {
        PathBuf::from(home).join(".cache").join("ocrs")
    } else {
        PathBuf::from("ocrs-models")
    }
}

/// Model locations for an [`OcrsEngine`].
#[derive(Debug, Clone)]
pub struct OcrConfig {
    pub detection_model_path: PathBuf,
    pub recognition_model_path: PathBuf,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self::from_dir(default_model_dir())
    }
}

impl OcrConfig {
    /// Expect both model files inside `dir`.
    pub fn from_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            detection_model_path: dir.join(DETECTION_MODEL_FILENAME),
            recognition_model_path: dir.join(RECOGNITION_MODEL_FILENAME),
        }
    }

    pub fn validate(&self) -> Result<()> {
        for (kind, path) in [
            ("detection", &self.detection_model_path),
            ("recognition", &self.recognition_model_path),
        ] {
            if !path.exists() {
                return Err(PruefwerkError::OcrError(format!(
                    "{kind} model not found at {}; run `ocrs-cli` once to download models",
                    path.display()
                )));
            }
        }
        Ok(())
    }
}

/// Word-level text engine with rotated word boxes.
///
/// Model loading is the expensive step; build once and reuse. The `ocrs` and
/// `rten` crates must be compiled in release mode, debug builds are 10-100x
/// slower.
pub struct OcrsEngine {
    engine: OcrEngine,
}

impl OcrsEngine {
    #[instrument(skip_all, fields(
        detection = %config.detection_model_path.display(),
        recognition = %config.recognition_model_path.display(),
    ))]
    pub fn new(config: OcrConfig) -> Result<Self> {
        config.validate()?;

        let load = |path: &Path| {
            Model::load_file(path).map_err(|err| {
                PruefwerkError::OcrError(format!(
                    "failed to load model from {}: {}",
                    path.display(),
                    err
                ))
            })
        };
        let detection_model = load(&config.detection_model_path)?;
        let recognition_model = load(&config.recognition_model_path)?;

        let engine = OcrEngine::new(OcrEngineParams {
            detection_model: Some(detection_model),
            recognition_model: Some(recognition_model),
            ..Default::default()
        })
        .map_err(|err| PruefwerkError::OcrError(format!("failed to initialise OCR engine: {err}")))?;

        info!("OCR engine initialised");
        Ok(Self { engine })
    }

    /// Load models from the default cache directory.
    pub fn with_defaults() -> Result<Self> {
        Self::new(OcrConfig::default())
    }
}

impl TextEngine for OcrsEngine {
    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    fn recognize(&self, image: &DynamicImage) -> Result<TextPage> {
        let rgb = image.to_rgb8();
        let (width, height) = rgb.dimensions();
        if width == 0 || height == 0 {
            return Ok(TextPage::default());
        }

        let source = ImageSource::from_bytes(rgb.as_raw(), (width, height)).map_err(|err| {
            PruefwerkError::OcrError(format!(
                "failed to create image source ({width}x{height}): {err}"
            ))
        })?;
        let input = self
            .engine
            .prepare_input(source)
            .map_err(|err| PruefwerkError::OcrError(format!("OCR preprocessing failed: {err}")))?;

        let word_rects = self
            .engine
            .detect_words(&input)
            .map_err(|err| PruefwerkError::OcrError(format!("word detection failed: {err}")))?;
        let line_rects = self.engine.find_text_lines(&input, &word_rects);
        let lines = self
            .engine
            .recognize_text(&input, &line_rects)
            .map_err(|err| PruefwerkError::OcrError(format!("line recognition failed: {err}")))?;

        let lines: Vec<Vec<ExtractionToken>> = lines
            .iter()
            .flatten()
            .map(|line| {
                line.words()
                    .map(|word| {
                        ExtractionToken::new(word.to_string())
                            .with_geometry(pixel_quad(&word.rotated_rect()))
                    })
                    .filter(|token| !token.value.trim().is_empty())
                    .collect::<Vec<_>>()
            })
            .filter(|words| !words.is_empty())
            .collect();

        debug!(lines = lines.len(), "OCR recognition complete");
        Ok(TextPage::from_lines(lines))
    }
}

fn pixel_quad(rect: &RotatedRect) -> TokenGeometry {
    TokenGeometry::Pixel(rect.corners().map(|p| (p.x, p.y)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_from_dir() {
        let config = OcrConfig::from_dir("/tmp/my-models");
        assert_eq!(
            config.detection_model_path,
            PathBuf::from("/tmp/my-models/text-detection.rten")
        );
        assert_eq!(
            config.recognition_model_path,
            PathBuf::from("/tmp/my-models/text-recognition.rten")
        );
    }

    #[test]
    fn missing_models_are_reported() {
        let err = OcrsEngine::new(OcrConfig::from_dir("/nonexistent/ocr-models"))
            .err()
            .expect("models are missing");
        assert!(matches!(err, PruefwerkError::OcrError(_)));
    }
}
