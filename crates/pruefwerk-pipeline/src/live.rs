// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Live inspection: a capture thread and an inspection thread joined by a
// latest-wins frame exchange.
//
// The capture thread never waits for inspection; when inspection is slower
// than the camera, intermediate frames are overwritten and counted as
// dropped. Both threads watch one stop flag. `stop` joins them before the
// capture source is released.
//
// Records are not kept for the whole session: each one is sent as an event
// and appended to `live_results.csv` as soon as its frame is inspected.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use image::DynamicImage;
use pruefwerk_core::LiveRecord;
use pruefwerk_core::error::{PruefwerkError, Result};
use pruefwerk_vision::Recognizer;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, info, instrument, warn};

use crate::capture::CaptureSource;
use crate::exchange::{Frame, FrameExchange};
use crate::export::{LiveCsvWriter, ResultExporter};
use crate::inspect::{InspectionSettings, inspect_image};

/// Pause after a failed capture before trying again.
const CAPTURE_BACKOFF: Duration = Duration::from_millis(20);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiveState {
    Stopped,
    Running,
}

/// Emitted by the inspection thread for whoever displays the session.
#[derive(Debug, Clone)]
pub enum LiveEvent {
    /// Operator-facing log line.
    Log(String),
    /// The transformed frame with findings drawn on it.
    Frame {
        sequence: u64,
        annotated: DynamicImage,
    },
    Record(LiveRecord),
}

/// What a finished session produced.
#[derive(Debug, Clone)]
pub struct LiveSummary {
    /// Frames handed to the exchange by the capture thread.
    pub frames_captured: u64,
    /// Frames overwritten before the inspection thread got to them.
    pub dropped: u64,
    /// Frames the inspection thread finished.
    pub inspected: u64,
    /// `live_results.csv`, when every row of the session reached it.
    pub exported: Option<PathBuf>,
}

/// What the inspection thread hands back when it exits.
#[derive(Debug, Default)]
struct InspectOutcome {
    inspected: u64,
    exported: Option<PathBuf>,
}

struct Session {
    stop: Arc<AtomicBool>,
    exchange: Arc<FrameExchange>,
    capture: JoinHandle<Box<dyn CaptureSource>>,
    inspect: JoinHandle<InspectOutcome>,
}

/// Start/stop controller for one live session at a time.
#[derive(Default)]
pub struct LivePipeline {
    source: Option<Box<dyn CaptureSource>>,
    camera_config: Option<PathBuf>,
    settings: Option<InspectionSettings>,
    backend: Option<Arc<dyn Recognizer>>,
    events: Option<UnboundedSender<LiveEvent>>,
    exporter: Option<ResultExporter>,
    session: Option<Session>,
}

impl LivePipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_events(mut self, events: UnboundedSender<LiveEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Stream each session's rows into `live_results.csv` through `exporter`.
    pub fn with_exporter(mut self, exporter: ResultExporter) -> Self {
        self.exporter = Some(exporter);
        self
    }

    pub fn set_source(&mut self, source: Box<dyn CaptureSource>) {
        self.source = Some(source);
    }

    pub fn has_source(&self) -> bool {
        self.source.is_some()
    }

    /// Opaque path handed to the capture source on start.
    pub fn set_camera_config(&mut self, path: impl Into<PathBuf>) {
        self.camera_config = Some(path.into());
    }

    /// Settings and backend for the next session. A running session keeps the
    /// ones it started with.
    pub fn configure(&mut self, settings: InspectionSettings, backend: Arc<dyn Recognizer>) {
        self.settings = Some(settings);
        self.backend = Some(backend);
    }

    pub fn state(&self) -> LiveState {
        if self.session.is_some() {
            LiveState::Running
        } else {
            LiveState::Stopped
        }
    }

    pub fn is_running(&self) -> bool {
        self.session.is_some()
    }

    fn emit(&self, event: LiveEvent) {
        emit(self.events.as_ref(), event);
    }

    /// Initialize the capture source and start both threads.
    ///
    /// Refused, with nothing started, when already running or when the
    /// source, camera configuration or profile is missing. A source that
    /// fails to initialize stays attached for another attempt.
    #[instrument(skip_all)]
    pub fn start(&mut self) -> Result<()> {
        if self.session.is_some() {
            return Err(PruefwerkError::InvalidTransition {
                action: "start",
                state: "running".into(),
            });
        }
        if let Err(err) = self.check_ready() {
            self.emit(LiveEvent::Log(format!("Live start refused: {err}")));
            return Err(err);
        }
        let (Some(camera_config), Some(settings), Some(backend), Some(mut source)) = (
            self.camera_config.clone(),
            self.settings.clone(),
            self.backend.clone(),
            self.source.take(),
        ) else {
            return Err(PruefwerkError::MissingProfile);
        };

        if let Err(err) = source.initialize(&camera_config) {
            warn!(source = %source.describe(), error = %err, "Capture source failed to initialize");
            self.emit(LiveEvent::Log(format!("Camera initialization failed: {err}")));
            self.source = Some(source);
            return Err(err);
        }

        let description = source.describe();
        let stop = Arc::new(AtomicBool::new(false));
        let exchange = Arc::new(FrameExchange::new());

        let capture = thread::Builder::new()
            .name("pruefwerk-capture".into())
            .spawn({
                let stop = Arc::clone(&stop);
                let exchange = Arc::clone(&exchange);
                move || capture_loop(source, &exchange, &stop)
            })
            .map_err(|e| PruefwerkError::Capture(format!("failed to spawn capture thread: {e}")))?;

        let inspect = thread::Builder::new()
            .name("pruefwerk-inspect".into())
            .spawn({
                let stop = Arc::clone(&stop);
                let exchange = Arc::clone(&exchange);
                let events = self.events.clone();
                let exporter = self.exporter.clone();
                move || {
                    inspect_loop(
                        backend.as_ref(),
                        &settings,
                        &exchange,
                        &stop,
                        events.as_ref(),
                        exporter.as_ref(),
                    )
                }
            });
        let inspect = match inspect {
            Ok(handle) => handle,
            Err(e) => {
                stop.store(true, Ordering::Relaxed);
                if let Ok(mut source) = capture.join() {
                    source.release();
                    self.source = Some(source);
                }
                return Err(PruefwerkError::Capture(format!(
                    "failed to spawn inspection thread: {e}"
                )));
            }
        };

        info!(source = %description, "Live pipeline started");
        self.emit(LiveEvent::Log(format!("Live started on {description}")));
        self.session = Some(Session {
            stop,
            exchange,
            capture,
            inspect,
        });
        Ok(())
    }

    fn check_ready(&self) -> Result<()> {
        if self.source.is_none() {
            return Err(PruefwerkError::MissingCaptureSource);
        }
        if self.camera_config.is_none() {
            return Err(PruefwerkError::MissingCameraConfig);
        }
        if self.settings.is_none() || self.backend.is_none() {
            return Err(PruefwerkError::MissingProfile);
        }
        Ok(())
    }

    /// Signal both threads, join them, then release the capture source.
    #[instrument(skip_all)]
    pub fn stop(&mut self) -> Result<LiveSummary> {
        let Some(session) = self.session.take() else {
            return Err(PruefwerkError::InvalidTransition {
                action: "stop",
                state: "stopped".into(),
            });
        };
        session.stop.store(true, Ordering::Relaxed);

        let source = session.capture.join();
        let outcome = session.inspect.join().unwrap_or_else(|_| {
            error!("Inspection thread panicked; the live CSV may be incomplete");
            InspectOutcome::default()
        });
        match source {
            Ok(mut source) => {
                source.release();
                self.source = Some(source);
            }
            Err(_) => error!("Capture thread panicked; capture source dropped"),
        }

        let frames_captured = session.exchange.published();
        let dropped = session.exchange.dropped();
        let InspectOutcome {
            inspected,
            exported,
        } = outcome;

        info!(frames_captured, inspected, dropped, "Live pipeline stopped");
        self.emit(LiveEvent::Log(format!(
            "Live stopped: {inspected} frames inspected, {dropped} dropped"
        )));

        Ok(LiveSummary {
            frames_captured,
            dropped,
            inspected,
            exported,
        })
    }
}

impl Drop for LivePipeline {
    fn drop(&mut self) {
        if self.is_running() {
            if let Err(err) = self.stop() {
                warn!(error = %err, "Failed to stop live pipeline on drop");
            }
        }
    }
}

fn emit(events: Option<&UnboundedSender<LiveEvent>>, event: LiveEvent) {
    if let Some(events) = events {
        // A closed receiver just means nobody is watching.
        let _ = events.send(event);
    }
}

/// Capture until stopped, publishing every frame. Hands the source back for
/// release.
fn capture_loop(
    mut source: Box<dyn CaptureSource>,
    exchange: &FrameExchange,
    stop: &AtomicBool,
) -> Box<dyn CaptureSource> {
    let mut sequence = 0u64;
    while !stop.load(Ordering::Relaxed) {
        match source.capture_frame() {
            Ok(Some(image)) => {
                sequence += 1;
                exchange.publish(Frame::new(image, sequence));
            }
            Ok(None) => thread::yield_now(),
            Err(err) => {
                warn!(error = %err, "Frame capture failed; retrying");
                thread::sleep(CAPTURE_BACKOFF);
            }
        }
    }
    debug!(frames = sequence, "Capture loop finished");
    source
}

/// Inspect the newest frame until stopped. Polls without a fixed delay.
///
/// The CSV is created with the first record. After a write failure the
/// session goes on without it.
fn inspect_loop(
    backend: &dyn Recognizer,
    settings: &InspectionSettings,
    exchange: &FrameExchange,
    stop: &AtomicBool,
    events: Option<&UnboundedSender<LiveEvent>>,
    mut exporter: Option<&ResultExporter>,
) -> InspectOutcome {
    let regex = settings.regex().map(str::to_string);
    let mut csv: Option<LiveCsvWriter> = None;
    let mut inspected = 0u64;

    while !stop.load(Ordering::Relaxed) {
        let Some(frame) = exchange.claim() else {
            thread::yield_now();
            continue;
        };

        let (inspection, annotated) = inspect_image(backend, &frame.image, settings);
        let record = LiveRecord {
            timestamp: frame.captured_at,
            frame: frame.sequence,
            regex: regex.clone(),
            raw_text: inspection.raw_text,
            matches: inspection.matches,
            verdict: inspection.verdict,
        };
        debug!(
            frame = frame.sequence,
            detected = record.verdict.detected_count,
            result = record.verdict.final_result(),
            "Frame inspected"
        );

        let line = format!(
            "Frame {}: {} chars, {} matches, {}",
            frame.sequence,
            record.verdict.detected_count,
            record.matches.len(),
            record.verdict.final_result()
        );
        emit(
            events,
            LiveEvent::Frame {
                sequence: frame.sequence,
                annotated,
            },
        );
        if let Some(target) = exporter {
            if let Err(err) = append_row(target, &mut csv, &record) {
                ResultExporter::report(Err(err));
                emit(events, LiveEvent::Log("Live CSV export stopped after a write failure".into()));
                exporter = None;
                csv = None;
            }
        }
        emit(events, LiveEvent::Record(record));
        emit(events, LiveEvent::Log(line));
        inspected += 1;
    }
    InspectOutcome {
        inspected,
        exported: csv.map(LiveCsvWriter::finish),
    }
}

fn append_row(
    exporter: &ResultExporter,
    csv: &mut Option<LiveCsvWriter>,
    record: &LiveRecord,
) -> Result<()> {
    if csv.is_none() {
        *csv = Some(exporter.open_live_csv()?);
    }
    match csv.as_mut() {
        Some(writer) => writer.append(record),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inspect::testing::extractor;
    use image::{GrayImage, Luma};
    use pruefwerk_core::{PreprocessConfig, ValidationRule};
    use std::path::Path;
    use std::time::Instant;
    use tokio::sync::mpsc;

    /// Endless frames with non-zero pixel values; records its release.
    struct CountingSource {
        released: Arc<AtomicBool>,
        value: u8,
    }

    impl CaptureSource for CountingSource {
        fn describe(&self) -> String {
            "counting".into()
        }

        fn initialize(&mut self, _camera_config: &Path) -> Result<()> {
            Ok(())
        }

        fn capture_frame(&mut self) -> Result<Option<DynamicImage>> {
            thread::sleep(Duration::from_millis(1));
            self.value = self.value % 200 + 1;
            Ok(Some(DynamicImage::ImageLuma8(GrayImage::from_pixel(
                4,
                4,
                Luma([self.value]),
            ))))
        }

        fn release(&mut self) {
            self.released.store(true, Ordering::Relaxed);
        }
    }

    struct BrokenSource;

    impl CaptureSource for BrokenSource {
        fn describe(&self) -> String {
            "broken".into()
        }

        fn initialize(&mut self, _camera_config: &Path) -> Result<()> {
            Err(PruefwerkError::Capture("no device".into()))
        }

        fn capture_frame(&mut self) -> Result<Option<DynamicImage>> {
            Ok(None)
        }

        fn release(&mut self) {}
    }

    fn settings() -> InspectionSettings {
        let rule = ValidationRule::new(Some(r"AB\d+"), None).expect("rule");
        InspectionSettings::new(PreprocessConfig::default(), rule).expect("settings")
    }

    fn ready_pipeline(source: Box<dyn CaptureSource>) -> LivePipeline {
        let mut pipeline = LivePipeline::new();
        pipeline.set_source(source);
        pipeline.set_camera_config("camera.cfg");
        pipeline.configure(settings(), Arc::new(extractor()));
        pipeline
    }

    #[test]
    fn start_is_refused_until_configured() {
        let mut pipeline = LivePipeline::new();
        assert!(matches!(pipeline.start(), Err(PruefwerkError::MissingCaptureSource)));

        pipeline.set_source(Box::new(BrokenSource));
        assert!(matches!(pipeline.start(), Err(PruefwerkError::MissingCameraConfig)));

        pipeline.set_camera_config("camera.cfg");
        assert!(matches!(pipeline.start(), Err(PruefwerkError::MissingProfile)));
        assert_eq!(pipeline.state(), LiveState::Stopped);
        assert!(pipeline.has_source());
    }

    #[test]
    fn failed_initialization_keeps_the_source() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut pipeline = ready_pipeline(Box::new(BrokenSource)).with_events(tx);
        assert!(matches!(pipeline.start(), Err(PruefwerkError::Capture(_))));
        assert_eq!(pipeline.state(), LiveState::Stopped);
        assert!(pipeline.has_source());
        assert!(matches!(rx.try_recv(), Ok(LiveEvent::Log(line)) if line.contains("no device")));
    }

    #[test]
    fn stop_when_stopped_is_refused() {
        let mut pipeline = LivePipeline::new();
        let err = pipeline.stop().err().expect("not running");
        assert_eq!(err.to_string(), "cannot stop while stopped");
    }

    #[test]
    fn session_produces_records_and_releases_source() {
        let dir = tempfile::tempdir().expect("tempdir");
        let released = Arc::new(AtomicBool::new(false));
        let source = CountingSource {
            released: Arc::clone(&released),
            value: 0,
        };
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut pipeline = ready_pipeline(Box::new(source))
            .with_events(tx)
            .with_exporter(ResultExporter::new(dir.path()));

        pipeline.start().expect("start");
        assert!(pipeline.is_running());
        assert!(pipeline.start().is_err(), "second start refused");

        let deadline = Instant::now() + Duration::from_secs(10);
        let mut records = Vec::new();
        while records.len() < 3 && Instant::now() < deadline {
            match rx.try_recv() {
                Ok(LiveEvent::Record(record)) => records.push(record),
                Ok(_) => {}
                Err(_) => thread::sleep(Duration::from_millis(2)),
            }
        }
        assert!(!released.load(Ordering::Relaxed));
        // Rows are on disk while the session is still running.
        let live_csv = dir.path().join(crate::export::LIVE_CSV);
        let rows_so_far = std::fs::read_to_string(&live_csv).expect("read").lines().count();
        assert!(rows_so_far >= records.len() + 1);

        let summary = pipeline.stop().expect("stop");
        assert!(released.load(Ordering::Relaxed));
        assert_eq!(pipeline.state(), LiveState::Stopped);
        assert!(summary.inspected >= 3);
        assert!(summary.frames_captured >= summary.inspected);
        assert!(
            records.windows(2).all(|w| w[0].frame < w[1].frame),
            "frames are inspected in capture order"
        );
        assert!(records.iter().all(|r| r.matches.len() == 1));

        let csv = summary.exported.expect("live csv written");
        let text = std::fs::read_to_string(csv).expect("read");
        assert_eq!(text.lines().count() as u64, summary.inspected + 1);
    }
}
