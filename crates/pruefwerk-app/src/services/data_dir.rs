// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Output directory resolution.

use std::path::{Path, PathBuf};

/// Where result files go: `override_dir` when given, otherwise
/// `$XDG_DATA_HOME/pruefwerk/results` (or `~/.local/share/...`).
///
/// The directory is created lazily by the exporter.
pub fn results_dir(override_dir: Option<&Path>) -> PathBuf {
    match override_dir {
        Some(dir) => dir.to_path_buf(),
        None => data_dir().join("results"),
    }
}

/// Application data directory. Not created here.
pub fn data_dir() -> PathBuf {
    resolve(
        std::env::var_os("XDG_DATA_HOME").map(PathBuf::from),
        std::env::var_os("HOME").map(PathBuf::from),
    )
}

fn resolve(xdg_data_home: Option<PathBuf>, home: Option<PathBuf>) -> PathBuf {
    // An empty XDG_DATA_HOME counts as unset.
    let base = match (xdg_data_home.filter(|p| !p.as_os_str().is_empty()), home) {
        (Some(xdg), _) => xdg,
        (None, Some(home)) => home.join(".local").join("share"),
        (None, None) => std::env::temp_dir(),
    };
    base.join("pruefwerk")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn xdg_wins_over_home() {
        let dir = resolve(Some("/xdg".into()), Some("/home/op".into()));
        assert_eq!(dir, PathBuf::from("/xdg/pruefwerk"));
    }

    #[test]
    fn home_fallback() {
        let dir = resolve(Some(PathBuf::new()), Some("/home/op".into()));
        assert_eq!(dir, PathBuf::from("/home/op/.local/share/pruefwerk"));
    }

    #[test]
    fn override_is_used_verbatim() {
        assert_eq!(results_dir(Some(Path::new("out"))), PathBuf::from("out"));
    }
}
