// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// `pruefwerk live` — run the live pipeline and print its events until Ctrl-C
// or the optional time limit.

use std::path::PathBuf;
use std::time::Duration;

use image::DynamicImage;
use pruefwerk_core::error::{PruefwerkError, Result};
use pruefwerk_pipeline::{CaptureSource, LiveEvent, LivePipeline, ReplaySource};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::services::app_services::AppServices;

/// Where live frames come from.
#[derive(Debug, Clone)]
pub enum SourceChoice {
    Camera(u32),
    Replay { dir: PathBuf, interval: Duration },
}

impl SourceChoice {
    fn open(self) -> Result<Box<dyn CaptureSource>> {
        match self {
            Self::Replay { dir, interval } => Ok(Box::new(ReplaySource::from_folder(dir, interval))),
            Self::Camera(index) => camera(index),
        }
    }
}

#[cfg(feature = "camera")]
fn camera(index: u32) -> Result<Box<dyn CaptureSource>> {
    Ok(Box::new(pruefwerk_pipeline::CameraSource::new(index)))
}

#[cfg(not(feature = "camera"))]
fn camera(_index: u32) -> Result<Box<dyn CaptureSource>> {
    Err(PruefwerkError::FeatureUnavailable("camera"))
}

pub async fn run(
    services: &AppServices,
    source: SourceChoice,
    camera_config: PathBuf,
    limit: Option<Duration>,
) -> Result<()> {
    let (events, mut rx) = mpsc::unbounded_channel();
    let mut pipeline = LivePipeline::new()
        .with_events(events)
        .with_exporter(services.exporter().clone());
    pipeline.set_source(source.open()?);
    pipeline.set_camera_config(camera_config);
    pipeline.configure(services.settings()?, services.backend());

    // Opening a camera blocks.
    let mut pipeline = blocking(move || pipeline.start().map(|()| pipeline)).await??;

    let deadline = async {
        match limit {
            Some(limit) => tokio::time::sleep(limit).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(deadline);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut last_frame: Option<DynamicImage> = None;
    loop {
        tokio::select! {
            event = rx.recv() => match event {
                Some(event) => handle(event, &mut last_frame),
                None => break,
            },
            _ = &mut ctrl_c => break,
            _ = &mut deadline => {
                info!("live time limit reached");
                break;
            }
        }
    }

    let (pipeline, summary) = blocking(move || {
        let summary = pipeline.stop();
        (pipeline, summary)
    })
    .await?;
    drop(pipeline);
    let summary = summary?;
    while let Ok(event) = rx.try_recv() {
        handle(event, &mut last_frame);
    }

    println!(
        "{} frames captured, {} inspected, {} dropped",
        summary.frames_captured,
        summary.inspected,
        summary.dropped
    );
    if let Some(path) = &summary.exported {
        println!("Saved {}", path.display());
    }
    if let Some(frame) = last_frame {
        let path = services.exporter().dir().join("live_last_frame.png");
        match frame.save(&path) {
            Ok(()) => println!("Saved {}", path.display()),
            Err(e) => warn!(path = %path.display(), error = %e, "could not save last frame"),
        }
    }
    Ok(())
}

fn handle(event: LiveEvent, last_frame: &mut Option<DynamicImage>) {
    match event {
        LiveEvent::Log(line) => println!("{line}"),
        LiveEvent::Frame {
            sequence,
            annotated,
        } => {
            debug!(sequence, "annotated frame received");
            *last_frame = Some(annotated);
        }
        LiveEvent::Record(record) => {
            debug!(frame = record.frame, result = record.verdict.final_result(), "live record");
        }
    }
}

async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| PruefwerkError::Io(std::io::Error::other(e)))
}
