// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// `pruefwerk profile` — show, edit and save inspection profiles.

use std::path::{Path, PathBuf};

use pruefwerk_core::InspectionProfile;
use pruefwerk_core::error::Result;

/// Settings to change before the profile is shown or written. Unset fields
/// keep their loaded value.
#[derive(Debug, Clone, Default)]
pub struct ProfileEdits {
    pub engine: Option<String>,
    pub preprocessing: Option<bool>,
    pub clahe: Option<bool>,
    pub brightness: Option<i32>,
    pub contrast: Option<f32>,
    pub gamma: Option<f32>,
    pub rotate: Option<i32>,
    pub regex: Option<String>,
    pub expected_count: Option<u32>,
    pub expected_value: Option<String>,
}

impl ProfileEdits {
    /// Apply the edits. Numeric values are clamped like any loaded profile,
    /// and the pattern is checked before anything is saved.
    pub fn apply(&self, profile: &mut InspectionProfile) -> Result<()> {
        if let Some(engine) = &self.engine {
            profile.ocr_model = engine.clone();
        }
        let mut pre = profile.preprocess();
        if let Some(v) = self.preprocessing {
            pre.enabled = v;
        }
        if let Some(v) = self.clahe {
            pre.use_clahe = v;
        }
        if let Some(v) = self.brightness {
            pre.brightness = v;
        }
        if let Some(v) = self.contrast {
            pre.contrast = v;
        }
        if let Some(v) = self.gamma {
            pre.gamma = v;
        }
        if let Some(v) = self.rotate {
            pre.rotation_deg = v;
        }
        profile.set_preprocess(&pre.clamped());

        if let Some(regex) = &self.regex {
            // An empty argument clears the pattern.
            profile.regex = Some(regex.clone()).filter(|r| !r.trim().is_empty());
        }
        if let Some(count) = self.expected_count {
            profile.expected_char_count = Some(count).filter(|&n| n > 0);
        }
        if let Some(value) = &self.expected_value {
            profile.expected_value = Some(value.clone()).filter(|v| !v.trim().is_empty());
        }
        profile.rule()?;
        Ok(())
    }
}

/// Load `source` (or defaults), apply `edits`, then print the JSON or write it
/// to `write`.
pub fn run(source: Option<&Path>, edits: &ProfileEdits, write: Option<PathBuf>) -> Result<()> {
    let mut profile = match source {
        Some(path) => InspectionProfile::load(path)?,
        None => InspectionProfile::default(),
    };
    edits.apply(&mut profile)?;

    match write {
        Some(path) => {
            profile.save(&path)?;
            println!("Saved {}", path.display());
        }
        None => println!("{}", serde_json::to_string_pretty(&profile)?),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edits_are_clamped_and_rotation_folded() {
        let mut profile = InspectionProfile {
            rotate_preset: 90,
            fine_rotate: 5,
            ..InspectionProfile::default()
        };
        let edits = ProfileEdits {
            brightness: Some(500),
            clahe: Some(true),
            ..ProfileEdits::default()
        };
        edits.apply(&mut profile).expect("apply");

        assert_eq!(profile.brightness, 100);
        assert!(profile.use_clahe);
        assert_eq!(profile.preprocess().rotation_deg, 95);
    }

    #[test]
    fn invalid_regex_is_rejected() {
        let mut profile = InspectionProfile::default();
        let edits = ProfileEdits {
            regex: Some("([".into()),
            ..ProfileEdits::default()
        };
        assert!(edits.apply(&mut profile).is_err());
    }

    #[test]
    fn written_profile_loads_back() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("profile.json");
        let edits = ProfileEdits {
            engine: Some("Barcode".into()),
            regex: Some(r"^AB\d{4}$".into()),
            expected_count: Some(6),
            ..ProfileEdits::default()
        };
        run(None, &edits, Some(path.clone())).expect("write");

        let loaded = InspectionProfile::load(&path).expect("load");
        assert_eq!(loaded.ocr_model, "Barcode");
        assert_eq!(loaded.regex.as_deref(), Some(r"^AB\d{4}$"));
        assert_eq!(loaded.expected_char_count, Some(6));
    }
}
