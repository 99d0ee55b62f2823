// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Replay source: plays a folder of images (or a set of in-memory frames) as
// if they came from a camera, at a fixed frame interval.

use std::path::{Path, PathBuf};
use std::time::Duration;

use image::DynamicImage;
use pruefwerk_core::error::{PruefwerkError, Result};
use tracing::{debug, info};

use super::CaptureSource;
use crate::folder;

enum Frames {
    /// Images listed from `dir` on initialize.
    Folder { dir: PathBuf, paths: Vec<PathBuf> },
    Memory(Vec<DynamicImage>),
}

/// Replays still images at a fixed rate.
pub struct ReplaySource {
    frames: Frames,
    interval: Duration,
    looping: bool,
    next: usize,
    open: bool,
}

impl ReplaySource {
    /// Replay the images found in `dir`, sorted by name.
    pub fn from_folder(dir: impl Into<PathBuf>, interval: Duration) -> Self {
        Self::with_frames(
            Frames::Folder {
                dir: dir.into(),
                paths: Vec::new(),
            },
            interval,
        )
    }

    /// Replay decoded images.
    pub fn from_images(images: Vec<DynamicImage>, interval: Duration) -> Self {
        Self::with_frames(Frames::Memory(images), interval)
    }

    fn with_frames(frames: Frames, interval: Duration) -> Self {
        Self {
            frames,
            interval,
            looping: true,
            next: 0,
            open: false,
        }
    }

    /// Stop after one pass instead of starting over.
    pub fn once(mut self) -> Self {
        self.looping = false;
        self
    }

    fn len(&self) -> usize {
        match &self.frames {
            Frames::Folder { paths, .. } => paths.len(),
            Frames::Memory(images) => images.len(),
        }
    }

    fn frame_at(&self, index: usize) -> Result<DynamicImage> {
        match &self.frames {
            Frames::Memory(images) => Ok(images[index].clone()),
            Frames::Folder { paths, .. } => load(&paths[index]),
        }
    }
}

fn load(path: &Path) -> Result<DynamicImage> {
    image::open(path).map_err(|err| {
        PruefwerkError::Capture(format!("cannot read {}: {}", path.display(), err))
    })
}

impl CaptureSource for ReplaySource {
    fn describe(&self) -> String {
        match &self.frames {
            Frames::Folder { dir, .. } => format!("replay of {}", dir.display()),
            Frames::Memory(images) => format!("replay of {} frames", images.len()),
        }
    }

    fn initialize(&mut self, camera_config: &Path) -> Result<()> {
        if let Frames::Folder { dir, paths } = &mut self.frames {
            *paths = folder::list_images(dir.as_path())?;
        }
        if self.len() == 0 {
            return Err(PruefwerkError::Capture(format!(
                "{} has no frames",
                self.describe()
            )));
        }
        self.next = 0;
        self.open = true;
        info!(
            frames = self.len(),
            config = %camera_config.display(),
            "Replay source initialized"
        );
        Ok(())
    }

    fn capture_frame(&mut self) -> Result<Option<DynamicImage>> {
        if !self.open {
            return Err(PruefwerkError::Capture("replay source not initialized".into()));
        }
        std::thread::sleep(self.interval);

        if self.next >= self.len() {
            if !self.looping {
                return Ok(None);
            }
            self.next = 0;
        }
        let index = self.next;
        self.next += 1;
        debug!(index, "Replaying frame");
        self.frame_at(index).map(Some)
    }

    fn release(&mut self) {
        self.open = false;
        debug!("Replay source released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    fn image(v: u8) -> DynamicImage {
        DynamicImage::ImageLuma8(GrayImage::from_pixel(2, 2, Luma([v])))
    }

    fn first_pixel(img: &DynamicImage) -> u8 {
        img.to_luma8().get_pixel(0, 0).0[0]
    }

    #[test]
    fn loops_over_frames() {
        let mut source = ReplaySource::from_images(vec![image(1), image(2)], Duration::ZERO);
        source.initialize(Path::new("camera.cfg")).expect("init");

        let values: Vec<u8> = (0..5)
            .map(|_| first_pixel(&source.capture_frame().expect("capture").expect("frame")))
            .collect();
        assert_eq!(values, [1, 2, 1, 2, 1]);
    }

    #[test]
    fn single_pass_runs_dry() {
        let mut source = ReplaySource::from_images(vec![image(1)], Duration::ZERO).once();
        source.initialize(Path::new("camera.cfg")).expect("init");
        assert!(source.capture_frame().expect("capture").is_some());
        assert!(source.capture_frame().expect("capture").is_none());
    }

    #[test]
    fn capture_before_initialize_fails() {
        let mut source = ReplaySource::from_images(vec![image(1)], Duration::ZERO);
        assert!(source.capture_frame().is_err());
    }

    #[test]
    fn empty_folder_refuses_to_initialize() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut source = ReplaySource::from_folder(dir.path(), Duration::ZERO);
        assert!(source.initialize(Path::new("camera.cfg")).is_err());
    }

    #[test]
    fn folder_frames_are_decoded() {
        let dir = tempfile::tempdir().expect("tempdir");
        GrayImage::from_pixel(3, 3, Luma([77]))
            .save(dir.path().join("frame.png"))
            .expect("save");

        let mut source = ReplaySource::from_folder(dir.path(), Duration::ZERO);
        source.initialize(Path::new("camera.cfg")).expect("init");
        let frame = source.capture_frame().expect("capture").expect("frame");
        assert_eq!(first_pixel(&frame), 77);
        source.release();
        assert!(source.capture_frame().is_err());
    }
}
