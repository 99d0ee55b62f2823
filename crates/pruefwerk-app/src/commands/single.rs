// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// `pruefwerk single` — inspect one image.

use std::path::{Path, PathBuf};

use pruefwerk_core::error::Result;
use pruefwerk_pipeline::inspect_file;
use tracing::{info, warn};

use crate::services::app_services::AppServices;

/// Inspect `image`, print the findings, write `ocr_output_single.json` and
/// save the annotated image (to `annotated` or next to the results).
pub fn run(services: &AppServices, image: &Path, annotated: Option<PathBuf>) -> Result<()> {
    let settings = services.settings()?;
    let backend = services.backend();
    let single = inspect_file(backend.as_ref(), image, &settings, Some(services.exporter()))?;

    println!("{}", single.image);
    println!("  engine:   {}", backend.name());
    println!("  text:     {}", single.inspection.raw_text.join(" "));
    if settings.pattern.is_some() {
        println!("  matches:  {}", single.inspection.matches.join(", "));
    }
    let verdict = &single.inspection.verdict;
    println!(
        "  result:   {} ({} chars{})",
        verdict.final_result(),
        verdict.detected_count,
        verdict
            .expected_count
            .map(|n| format!(", expected {n}"))
            .unwrap_or_default()
    );

    let target = annotated.unwrap_or_else(|| {
        let stem = image
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "single_image".into());
        services.exporter().dir().join(format!("annotated_{stem}.png"))
    });
    match single.annotated.save(&target) {
        Ok(()) => info!(path = %target.display(), "annotated image saved"),
        Err(e) => warn!(path = %target.display(), error = %e, "could not save annotated image"),
    }
    Ok(())
}
