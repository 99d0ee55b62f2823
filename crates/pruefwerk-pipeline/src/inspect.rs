// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Per-image inspection shared by the single-image, batch and live paths:
// transform, recognize, pick matches, validate.

use std::path::Path;

use image::DynamicImage;
use pruefwerk_core::error::{PruefwerkError, Result};
use pruefwerk_core::{InspectionProfile, PreprocessConfig, ValidationRule, ValidationVerdict};
use pruefwerk_vision::{RawResult, Recognizer, TokenPattern, evaluate, transform};
use tracing::{info, instrument};

use crate::export::{ResultEntry, ResultExporter};
use crate::folder::display_name;

/// Everything needed to inspect one image, built once per run (or per batch
/// chunk) from the operator's current settings.
#[derive(Debug, Clone)]
pub struct InspectionSettings {
    pub preprocess: PreprocessConfig,
    pub rule: ValidationRule,
    /// Fullmatch form of the rule's pattern, for per-token matching.
    pub pattern: Option<TokenPattern>,
}

impl InspectionSettings {
    /// Fails when the pattern does not compile.
    pub fn new(preprocess: PreprocessConfig, rule: ValidationRule) -> Result<Self> {
        let pattern = TokenPattern::optional(rule.pattern_source())?;
        Ok(Self {
            preprocess,
            rule,
            pattern,
        })
    }

    pub fn from_profile(profile: &InspectionProfile) -> Result<Self> {
        Self::new(profile.preprocess(), profile.rule()?)
    }

    /// The pattern as written, for reports.
    pub fn regex(&self) -> Option<&str> {
        self.rule.pattern_source()
    }
}

/// Outcome of inspecting one image.
#[derive(Debug, Clone)]
pub struct Inspection {
    pub raw_text: Vec<String>,
    pub matches: Vec<String>,
    pub verdict: ValidationVerdict,
}

/// Turn one backend result into matches and a verdict.
pub fn inspect_result(
    backend: &dyn Recognizer,
    raw: &RawResult,
    settings: &InspectionSettings,
) -> Inspection {
    let extraction = backend.extract_matches(raw, settings.pattern.as_ref());
    let verdict = evaluate(&extraction.all_values, &settings.rule);
    Inspection {
        raw_text: extraction.all_values,
        matches: extraction.matched,
        verdict,
    }
}

/// Transform, recognize and validate one image. Returns the inspection and
/// the transformed image with the findings drawn on it.
pub fn inspect_image(
    backend: &dyn Recognizer,
    image: &DynamicImage,
    settings: &InspectionSettings,
) -> (Inspection, DynamicImage) {
    let processed = transform(image, &settings.preprocess);
    let raw = backend
        .run_batch(std::slice::from_ref(&processed))
        .into_iter()
        .next()
        .unwrap_or_default();
    let inspection = inspect_result(backend, &raw, settings);
    let annotated = backend.annotate(&processed, &raw, settings.pattern.as_ref());
    (inspection, annotated)
}

/// Result of a single-image run.
#[derive(Debug, Clone)]
pub struct SingleInspection {
    pub image: String,
    pub inspection: Inspection,
    pub annotated: DynamicImage,
}

/// Inspect the image at `path` and, with an exporter, write
/// `ocr_output_single.json`. Export failures are logged only.
#[instrument(skip(backend, settings, exporter), fields(path = %path.as_ref().display()))]
pub fn inspect_file(
    backend: &dyn Recognizer,
    path: impl AsRef<Path>,
    settings: &InspectionSettings,
    exporter: Option<&ResultExporter>,
) -> Result<SingleInspection> {
    let path = path.as_ref();
    let image = image::open(path).map_err(|err| {
        PruefwerkError::ImageError(format!("failed to open {}: {}", path.display(), err))
    })?;

    let (inspection, annotated) = inspect_image(backend, &image, settings);
    let name = display_name(path);
    info!(
        image = %name,
        tokens = inspection.raw_text.len(),
        matches = inspection.matches.len(),
        result = inspection.verdict.final_result(),
        "Single image inspected"
    );

    if let Some(exporter) = exporter {
        let entry = ResultEntry {
            image: name.clone(),
            raw_text: inspection.raw_text.clone(),
            matches: inspection.matches.clone(),
        };
        ResultExporter::report(exporter.write_results_json(
            "single",
            backend.name(),
            settings.regex(),
            std::slice::from_ref(&entry),
        ));
    }

    Ok(SingleInspection {
        image: name,
        inspection,
        annotated,
    })
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted text engine shared by the pipeline tests.

    use image::DynamicImage;
    use pruefwerk_core::ExtractionToken;
    use pruefwerk_core::error::{PruefwerkError, Result};
    use pruefwerk_vision::recognition::{TextEngine, TextExtractor, TextPage};

    /// "Reads" the brightness of the top-left pixel as a token, e.g. `AB12`
    /// for value 12. Fails on pixel value 0.
    pub struct PixelEngine;

    impl TextEngine for PixelEngine {
        fn recognize(&self, image: &DynamicImage) -> Result<TextPage> {
            let value = image.to_luma8().get_pixel(0, 0).0[0];
            if value == 0 {
                return Err(PruefwerkError::OcrError("dark frame".into()));
            }
            Ok(TextPage::from_lines(vec![vec![
                ExtractionToken::new(format!("AB{value}")),
                ExtractionToken::new("x"),
            ]]))
        }
    }

    pub fn extractor() -> TextExtractor {
        TextExtractor::new(Box::new(PixelEngine))
    }
}

#[cfg(test)]
mod tests {
    use super::testing::extractor;
    use super::*;
    use image::{GrayImage, Luma};

    fn settings(pattern: Option<&str>, count: Option<u32>) -> InspectionSettings {
        InspectionSettings::new(
            PreprocessConfig::default(),
            ValidationRule::new(pattern, count).expect("rule"),
        )
        .expect("settings")
    }

    #[test]
    fn inspection_combines_matches_and_verdict() {
        let backend = extractor();
        let image = DynamicImage::ImageLuma8(GrayImage::from_pixel(8, 8, Luma([12])));
        let (inspection, annotated) =
            inspect_image(&backend, &image, &settings(Some(r"[a-z]{2}\d{2}"), Some(4)));

        assert_eq!(inspection.raw_text, ["AB12", "x"]);
        assert_eq!(inspection.matches, ["AB12"]);
        assert_eq!(inspection.verdict.detected_count, 4);
        assert!(inspection.verdict.passed);
        assert_eq!((annotated.width(), annotated.height()), (8, 8));
    }

    #[test]
    fn failing_recognition_gives_empty_verdict() {
        let backend = extractor();
        let image = DynamicImage::ImageLuma8(GrayImage::from_pixel(4, 4, Luma([0])));
        let (inspection, _) = inspect_image(&backend, &image, &settings(None, Some(1)));
        assert!(inspection.raw_text.is_empty());
        assert!(!inspection.verdict.passed);
    }

    #[test]
    fn white_frame_with_equalization_gives_valid_result() {
        let backend = extractor();
        let image = DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
            64,
            48,
            image::Rgb([255, 255, 255]),
        ));
        let preprocess = PreprocessConfig {
            use_clahe: true,
            ..PreprocessConfig::default()
        };
        let settings = InspectionSettings::new(
            preprocess,
            ValidationRule::new(Some(r"AB\d+"), Some(2)).expect("rule"),
        )
        .expect("settings");

        let (inspection, annotated) = inspect_image(&backend, &image, &settings);
        assert_eq!((annotated.width(), annotated.height()), (64, 48));
        assert!(inspection.matches.iter().all(|m| inspection.raw_text.contains(m)));
        assert_eq!(
            inspection.verdict.passed,
            inspection.verdict.detected_count >= 2
                && inspection.verdict.regex_matched == Some(true)
        );
    }

    #[test]
    fn single_file_writes_json() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("label.png");
        GrayImage::from_pixel(6, 6, Luma([34])).save(&path).expect("save");
        let exporter = ResultExporter::new(dir.path().join("out"));

        let single = inspect_file(&extractor(), &path, &settings(None, None), Some(&exporter))
            .expect("inspect");
        assert_eq!(single.image, "label.png");
        assert!(single.inspection.matches.is_empty());

        let json = std::fs::read_to_string(dir.path().join("out/ocr_output_single.json"))
            .expect("json written");
        assert!(json.contains("\"mode\": \"single\""));
        assert!(json.contains("AB34"));
    }

    #[test]
    fn unreadable_file_is_an_extraction_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("broken.png");
        std::fs::write(&path, b"not a png").expect("write");
        let err = inspect_file(&extractor(), &path, &settings(None, None), None)
            .err()
            .expect("decode fails");
        assert!(matches!(err, PruefwerkError::ImageError(_)));
    }
}
