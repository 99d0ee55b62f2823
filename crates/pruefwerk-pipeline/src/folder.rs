// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image folder listing for batch jobs and replay capture.

use std::path::{Path, PathBuf};

use pruefwerk_core::error::Result;
use tracing::{info, instrument};

/// File extensions treated as images, compared case-insensitively.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tif", "tiff"];

pub fn is_image_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}

/// Image files directly inside `dir` (no recursion), sorted by path.
#[instrument(skip_all, fields(dir = %dir.as_ref().display()))]
pub fn list_images(dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    let mut images = Vec::new();
    for entry in std::fs::read_dir(dir.as_ref())? {
        let path = entry?.path();
        if path.is_file() && is_image_path(&path) {
            images.push(path);
        }
    }
    images.sort();
    info!(count = images.len(), "Images listed");
    Ok(images)
}

/// File name of `path` for reports, falling back to the whole path.
pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_only_images_sorted() {
        let dir = tempfile::tempdir().expect("tempdir");
        for name in ["b.PNG", "a.jpg", "c.tiff", "notes.txt", "d.jpeg", "e.gif"] {
            std::fs::write(dir.path().join(name), b"x").expect("write");
        }
        std::fs::create_dir(dir.path().join("sub.png")).expect("mkdir");

        let names: Vec<_> = list_images(dir.path())
            .expect("list")
            .iter()
            .map(|p| display_name(p))
            .collect();
        assert_eq!(names, ["a.jpg", "b.PNG", "c.tiff", "d.jpeg"]);
    }

    #[test]
    fn missing_folder_is_an_error() {
        assert!(list_images("/nonexistent/pruefwerk/folder").is_err());
    }
}
