// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Central service layer — loads the inspection profile, builds the
// recognition backend once, and hands both to the command handlers.
//
// The backend holds model handles and is shared behind an `Arc` so the batch
// scheduler and the live pipeline threads can use it without reloading.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use pruefwerk_core::InspectionProfile;
use pruefwerk_core::error::Result;
use pruefwerk_pipeline::{InspectionSettings, ResultExporter};
use pruefwerk_vision::recognition::Annotator;
use pruefwerk_vision::{Backend, Recognizer};
use tracing::{info, warn};

use super::data_dir;

/// Shared services for one command invocation.
///
/// All fields are cheaply cloneable so the struct can be moved into
/// `spawn_blocking` closures.
#[derive(Clone)]
pub struct AppServices {
    profile: InspectionProfile,
    profile_path: Option<PathBuf>,
    backend: Arc<dyn Recognizer>,
    exporter: ResultExporter,
}

impl AppServices {
    /// Load the profile (defaults when `profile_path` is `None`), build the
    /// backend it selects and resolve the output directory.
    pub fn init(
        profile_path: Option<&Path>,
        output: Option<&Path>,
        font: Option<&Path>,
    ) -> Result<Self> {
        let profile = match profile_path {
            Some(path) => InspectionProfile::load(path)?,
            None => {
                info!("no profile given; using defaults");
                InspectionProfile::default()
            }
        };
        let annotator = match font {
            Some(font) => Annotator::with_font_file(font)?,
            None => Annotator::with_system_font(),
        };
        if !annotator.has_font() {
            warn!("no label font available; pass --font to draw recognized values");
        }
        let backend = Backend::for_kind(profile.engine())?.with_annotator(annotator);

        let exporter = ResultExporter::new(data_dir::results_dir(output));
        info!(
            engine = backend.name(),
            output = %exporter.dir().display(),
            "app services initialised"
        );

        Ok(Self {
            profile,
            profile_path: profile_path.map(Path::to_path_buf),
            backend: Arc::new(backend),
            exporter,
        })
    }

    pub fn profile(&self) -> &InspectionProfile {
        &self.profile
    }

    pub fn backend(&self) -> Arc<dyn Recognizer> {
        Arc::clone(&self.backend)
    }

    pub fn exporter(&self) -> &ResultExporter {
        &self.exporter
    }

    /// Settings from the profile loaded at startup.
    pub fn settings(&self) -> Result<InspectionSettings> {
        InspectionSettings::from_profile(&self.profile)
    }

    /// Settings from the profile file as it is on disk now, so edits made
    /// while a batch runs apply to the next chunk.
    ///
    /// A file that no longer loads or compiles keeps `current` in force.
    pub fn refresh(&self, current: InspectionSettings) -> InspectionSettings {
        let Some(path) = &self.profile_path else {
            return current;
        };
        let reloaded = std::fs::read_to_string(path)
            .map_err(Into::into)
            .and_then(|data| InspectionProfile::from_json(&data))
            .and_then(|profile| InspectionSettings::from_profile(&profile));
        match reloaded {
            Ok(settings) => settings,
            Err(err) => {
                warn!(error = %err, "profile reload failed; keeping previous settings");
                current
            }
        }
    }
}
