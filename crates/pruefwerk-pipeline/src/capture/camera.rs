// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Camera source backed by `nokhwa` (behind the `camera` feature).
//
// Frames are requested as RGB and copied into our own `image` buffers so the
// rest of the pipeline never sees nokhwa's types.

use std::path::Path;

use image::{DynamicImage, RgbImage};
use nokhwa::CallbackCamera;
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{CameraIndex, RequestedFormat, RequestedFormatType};
use pruefwerk_core::error::{PruefwerkError, Result};
use tracing::{debug, info, instrument, warn};

use super::CaptureSource;

/// A local camera addressed by index.
pub struct CameraSource {
    index: u32,
    camera: Option<CallbackCamera>,
}

impl CameraSource {
    pub fn new(index: u32) -> Self {
        Self {
            index,
            camera: None,
        }
    }
}

impl CaptureSource for CameraSource {
    fn describe(&self) -> String {
        format!("camera #{}", self.index)
    }

    #[instrument(skip(self), fields(index = self.index))]
    fn initialize(&mut self, camera_config: &Path) -> Result<()> {
        let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::None);
        let mut camera = CallbackCamera::new(CameraIndex::Index(self.index), requested, |_| {})
            .map_err(|e| PruefwerkError::Capture(format!("failed to open camera: {e}")))?;
        camera
            .open_stream()
            .map_err(|e| PruefwerkError::Capture(format!("failed to start stream: {e}")))?;

        info!(config = %camera_config.display(), "Camera stream opened");
        self.camera = Some(camera);
        Ok(())
    }

    fn capture_frame(&mut self) -> Result<Option<DynamicImage>> {
        let camera = self
            .camera
            .as_mut()
            .ok_or_else(|| PruefwerkError::Capture("camera not initialized".into()))?;

        let buffer = camera
            .poll_frame()
            .map_err(|e| PruefwerkError::Capture(format!("failed to capture frame: {e}")))?;
        let decoded = buffer
            .decode_image::<RgbFormat>()
            .map_err(|e| PruefwerkError::Capture(format!("failed to decode frame: {e}")))?;

        let (width, height) = (decoded.width(), decoded.height());
        match RgbImage::from_raw(width, height, decoded.into_raw()) {
            Some(rgb) => Ok(Some(DynamicImage::ImageRgb8(rgb))),
            None => {
                debug!(width, height, "Short frame buffer; skipping");
                Ok(None)
            }
        }
    }

    fn release(&mut self) {
        if let Some(mut camera) = self.camera.take() {
            if let Err(e) = camera.stop_stream() {
                warn!(error = %e, "Failed to stop camera stream");
            }
            info!(index = self.index, "Camera released");
        }
    }
}
