// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Text extraction backend.

use image::DynamicImage;
use pruefwerk_core::{EngineKind, ExtractionToken};
use pruefwerk_core::error::Result;
use tracing::{debug, instrument, warn};

use super::annotate::Annotator;
use super::{RawResult, Recognizer, TokenPattern};

/// Page layout returned by a text engine: blocks of lines of words.
#[derive(Debug, Clone, Default)]
pub struct TextPage {
    pub blocks: Vec<TextBlock>,
}

#[derive(Debug, Clone, Default)]
pub struct TextBlock {
    pub lines: Vec<TextLine>,
}

#[derive(Debug, Clone, Default)]
pub struct TextLine {
    pub words: Vec<ExtractionToken>,
}

impl TextPage {
    /// A page holding a single block with one line per entry.
    pub fn from_lines(lines: Vec<Vec<ExtractionToken>>) -> Self {
        Self {
            blocks: vec![TextBlock {
                lines: lines.into_iter().map(|words| TextLine { words }).collect(),
            }],
        }
    }

    /// Words in block, line, word order.
    pub fn into_tokens(self) -> Vec<ExtractionToken> {
        self.blocks
            .into_iter()
            .flat_map(|b| b.lines)
            .flat_map(|l| l.words)
            .collect()
    }
}

/// A word-level text recognizer.
pub trait TextEngine: Send + Sync {
    fn recognize(&self, image: &DynamicImage) -> Result<TextPage>;
}

/// Text recognition backend: words with their boxes.
pub struct TextExtractor {
    engine: Box<dyn TextEngine>,
    annotator: Annotator,
}

impl TextExtractor {
    pub fn new(engine: Box<dyn TextEngine>) -> Self {
        Self {
            engine,
            annotator: Annotator::default(),
        }
    }

    pub fn with_annotator(mut self, annotator: Annotator) -> Self {
        self.annotator = annotator;
        self
    }
}

impl Recognizer for TextExtractor {
    fn kind(&self) -> EngineKind {
        EngineKind::Text
    }

    #[instrument(skip_all, fields(images = images.len()))]
    fn run_batch(&self, images: &[DynamicImage]) -> Vec<RawResult> {
        images
            .iter()
            .enumerate()
            .map(|(index, image)| match self.engine.recognize(image) {
                Ok(page) => {
                    let tokens = page.into_tokens();
                    debug!(index, words = tokens.len(), "Text recognized");
                    RawResult::new(tokens)
                }
                Err(err) => {
                    warn!(index, error = %err, "Text recognition failed; recording empty result");
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
        let mut canvas = image.to_rgb8();
        if let Some(pattern) = pattern {
            for token in raw.matching(pattern) {
                self.annotator.draw_token(&mut canvas, token);
            }
        }
        DynamicImage::ImageRgb8(canvas)
    }
}
