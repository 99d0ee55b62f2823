// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Capture sources feeding the live pipeline.

pub mod replay;

#[cfg(feature = "camera")]
pub mod camera;

use std::path::Path;

use image::DynamicImage;
use pruefwerk_core::error::Result;

pub use replay::ReplaySource;

#[cfg(feature = "camera")]
pub use camera::CameraSource;

/// A blocking frame source.
///
/// The live pipeline initializes the source on its own thread, moves it to the
/// capture thread, and releases it after both pipeline threads have been
/// joined.
pub trait CaptureSource: Send {
    /// Human-readable name for log lines.
    fn describe(&self) -> String;

    /// Open the device. `camera_config` is handed through untouched; what it
    /// contains is up to the source.
    fn initialize(&mut self, camera_config: &Path) -> Result<()>;

    /// Block until the next frame arrives.
    ///
    /// `Ok(None)` means no frame this time (e.g. a device timeout); the caller
    /// simply polls again.
    fn capture_frame(&mut self) -> Result<Option<DynamicImage>>;

    /// Close the device. Called once, after capture has stopped.
    fn release(&mut self);
}
