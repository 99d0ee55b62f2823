// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Chunked batch jobs over a list of image files.
//
// The controller owns no timer. Whoever drives it calls `step` periodically;
// each call processes the next chunk of items with the settings passed in
// for that call, so configuration changes apply from the next chunk on.
//
// All methods are synchronous and `step` does blocking recognition work.  In
// an async context, wrap calls in `tokio::task::spawn_blocking`.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use pruefwerk_core::error::{PruefwerkError, Result};
use pruefwerk_core::{BatchRecord, JobId};
use pruefwerk_vision::{RawResult, Recognizer, transform};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::export::{ResultEntry, ResultExporter};
use crate::folder::display_name;
use crate::inspect::{InspectionSettings, inspect_result};

/// Items processed per step unless configured otherwise.
pub const DEFAULT_CHUNK_SIZE: usize = 4;

/// Lifecycle of the current batch job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BatchState {
    /// No job has been started.
    Idle,
    Running,
    /// Suspended; the cursor is kept.
    Paused,
    /// Aborted by the operator. Nothing is exported.
    Stopped,
    /// Every item was processed and the results were exported.
    Completed,
}

impl BatchState {
    /// Running or paused.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Running | Self::Paused)
    }
}

impl fmt::Display for BatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Stopped => "stopped",
            Self::Completed => "completed",
        };
        f.write_str(name)
    }
}

/// One batch run: the items, how far we got, and what we found so far.
#[derive(Debug)]
pub struct BatchJob {
    pub id: JobId,
    items: Vec<PathBuf>,
    /// Index of the next unprocessed item. Never decreases, never passes
    /// `items.len()`.
    cursor: usize,
    results: Vec<BatchRecord>,
    state: BatchState,
}

impl BatchJob {
    fn new(items: Vec<PathBuf>) -> Self {
        Self {
            id: JobId::new(),
            items,
            cursor: 0,
            results: Vec::new(),
            state: BatchState::Running,
        }
    }

    pub fn total(&self) -> usize {
        self.items.len()
    }
}

/// What one call to `step` did.
#[derive(Debug, Clone)]
pub struct StepReport {
    pub state: BatchState,
    pub cursor: usize,
    pub total: usize,
    /// Records produced by this step.
    pub records: Vec<BatchRecord>,
    /// Items in this step's chunk that could not be read.
    pub skipped: Vec<PathBuf>,
    /// Files written when this step completed the job.
    pub exported: Vec<PathBuf>,
}

impl StepReport {
    fn idle(state: BatchState, cursor: usize, total: usize) -> Self {
        Self {
            state,
            cursor,
            total,
            records: Vec::new(),
            skipped: Vec::new(),
            exported: Vec::new(),
        }
    }

    /// Whether this step processed anything.
    pub fn did_work(&self) -> bool {
        !self.records.is_empty() || !self.skipped.is_empty()
    }
}

/// Drives at most one batch job at a time.
pub struct BatchController {
    backend: Arc<dyn Recognizer>,
    exporter: Option<ResultExporter>,
    chunk_size: usize,
    job: Option<BatchJob>,
}

impl BatchController {
    /// Results are exported through `exporter` on completion; without one they
    /// stay in memory only.
    pub fn new(backend: Arc<dyn Recognizer>, exporter: Option<ResultExporter>) -> Self {
        Self {
            backend,
            exporter,
            chunk_size: DEFAULT_CHUNK_SIZE,
            job: None,
        }
    }

    /// Set the chunk size. Zero is raised to one.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn state(&self) -> BatchState {
        self.job.as_ref().map_or(BatchState::Idle, |job| job.state)
    }

    pub fn job(&self) -> Option<&BatchJob> {
        self.job.as_ref()
    }

    pub fn cursor(&self) -> usize {
        self.job.as_ref().map_or(0, |job| job.cursor)
    }

    pub fn total(&self) -> usize {
        self.job.as_ref().map_or(0, BatchJob::total)
    }

    /// Records accumulated so far. Emptied once a job completes and exports.
    pub fn results(&self) -> &[BatchRecord] {
        self.job
            .as_ref()
            .map(|job| job.results.as_slice())
            .unwrap_or_default()
    }

    // -- Transitions ----------------------------------------------------------

    /// Start a job over `items`. An active job is stopped and replaced.
    #[instrument(skip_all, fields(items = items.len()))]
    pub fn start(&mut self, items: Vec<PathBuf>) -> Result<JobId> {
        if items.is_empty() {
            return Err(PruefwerkError::EmptyBatch);
        }
        if let Some(old) = self.job.as_ref().filter(|job| job.state.is_active()) {
            info!(
                job = %old.id,
                cursor = old.cursor,
                total = old.total(),
                "Replacing active batch job"
            );
        }

        let job = BatchJob::new(items);
        let id = job.id;
        info!(job = %id, total = job.total(), chunk = self.chunk_size, "Batch job started");
        self.job = Some(job);
        Ok(id)
    }

    /// Running -> Paused.
    pub fn pause(&mut self) -> Result<()> {
        self.transition("pause", &[BatchState::Running], BatchState::Paused)
    }

    /// Paused -> Running.
    pub fn resume(&mut self) -> Result<()> {
        self.transition("resume", &[BatchState::Paused], BatchState::Running)
    }

    /// Running or Paused -> Stopped. Accumulated results are kept but not
    /// exported.
    pub fn stop(&mut self) -> Result<()> {
        self.transition(
            "stop",
            &[BatchState::Running, BatchState::Paused],
            BatchState::Stopped,
        )
    }

    fn transition(
        &mut self,
        action: &'static str,
        from: &[BatchState],
        to: BatchState,
    ) -> Result<()> {
        let current = self.state();
        let job = match self.job.as_mut() {
            Some(job) if from.contains(&current) => job,
            _ => {
                return Err(PruefwerkError::InvalidTransition {
                    action,
                    state: current.to_string(),
                });
            }
        };
        job.state = to;
        info!(
            job = %job.id,
            cursor = job.cursor,
            total = job.total(),
            "Batch {action}: {current} -> {to}"
        );
        Ok(())
    }

    // -- Stepping -------------------------------------------------------------

    /// Process the next chunk if the job is running; otherwise do nothing.
    ///
    /// The cursor advances over the whole chunk, skipped items included, so a
    /// job always terminates. The step that reaches the end completes the job
    /// and exports its results.
    #[instrument(skip_all, fields(cursor = self.cursor(), total = self.total()))]
    pub fn step(&mut self, settings: &InspectionSettings) -> StepReport {
        let Some(job) = self.job.as_mut() else {
            return StepReport::idle(BatchState::Idle, 0, 0);
        };
        if job.state != BatchState::Running {
            return StepReport::idle(job.state, job.cursor, job.total());
        }

        let end = (job.cursor + self.chunk_size).min(job.items.len());
        let chunk = &job.items[job.cursor..end];
        let (records, skipped) = process_chunk(self.backend.as_ref(), chunk, settings);
        debug!(
            from = job.cursor,
            to = end,
            processed = records.len(),
            skipped = skipped.len(),
            "Batch chunk processed"
        );

        job.cursor = end;
        job.results.extend(records.iter().cloned());

        let mut exported = Vec::new();
        if job.cursor == job.items.len() {
            job.state = BatchState::Completed;
            let results = std::mem::take(&mut job.results);
            info!(job = %job.id, records = results.len(), "Batch job completed");
            if let Some(exporter) = &self.exporter {
                exported = export(exporter, self.backend.name(), settings, &results);
            }
        }

        StepReport {
            state: job.state,
            cursor: job.cursor,
            total: job.items.len(),
            records,
            skipped,
            exported,
        }
    }
}

/// Read, transform, recognize and validate one chunk. Unreadable items are
/// returned separately and produce no record.
fn process_chunk(
    backend: &dyn Recognizer,
    chunk: &[PathBuf],
    settings: &InspectionSettings,
) -> (Vec<BatchRecord>, Vec<PathBuf>) {
    let mut names = Vec::with_capacity(chunk.len());
    let mut images = Vec::with_capacity(chunk.len());
    let mut skipped = Vec::new();

    for path in chunk {
        match image::open(path) {
            Ok(image) => {
                names.push(display_name(path));
                images.push(transform(&image, &settings.preprocess));
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "Skipping unreadable image");
                skipped.push(path.clone());
            }
        }
    }
    if images.is_empty() {
        return (Vec::new(), skipped);
    }

    let raws = backend.run_batch(&images);
    let regex = settings.regex().map(str::to_string);
    let records = names
        .into_iter()
        .enumerate()
        .map(|(i, file_name)| {
            let raw = raws.get(i).cloned().unwrap_or_else(RawResult::empty);
            let inspection = inspect_result(backend, &raw, settings);
            BatchRecord {
                file_name,
                regex: regex.clone(),
                raw_text: inspection.raw_text,
                matches: inspection.matches,
                verdict: inspection.verdict,
            }
        })
        .collect();
    (records, skipped)
}

/// Write the batch CSV and JSON. Failures are logged and leave no path.
fn export(
    exporter: &ResultExporter,
    engine: &str,
    settings: &InspectionSettings,
    results: &[BatchRecord],
) -> Vec<PathBuf> {
    let entries: Vec<ResultEntry> = results.iter().map(ResultEntry::from).collect();
    [
        ResultExporter::report(exporter.write_batch_csv(results)),
        ResultExporter::report(exporter.write_results_json(
            "batch",
            engine,
            settings.regex(),
            &entries,
        )),
    ]
    .into_iter()
    .flatten()
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inspect::testing::extractor;
    use image::{GrayImage, Luma};
    use pruefwerk_core::{PreprocessConfig, ValidationRule};
    use std::path::Path;

    /// Write `count` frames whose top-left pixel is 10, 11, 12, ...
    fn write_items(dir: &Path, count: usize) -> Vec<PathBuf> {
        (0..count)
            .map(|i| {
                let path = dir.join(format!("item_{i:02}.png"));
                GrayImage::from_pixel(4, 4, Luma([10 + i as u8]))
                    .save(&path)
                    .expect("save");
                path
            })
            .collect()
    }

    fn settings(brightness: i32) -> InspectionSettings {
        let preprocess = PreprocessConfig {
            brightness,
            ..PreprocessConfig::default()
        };
        let rule = ValidationRule::new(Some(r"AB\d+"), Some(4)).expect("rule");
        InspectionSettings::new(preprocess, rule).expect("settings")
    }

    fn controller(out: &Path) -> BatchController {
        BatchController::new(Arc::new(extractor()), Some(ResultExporter::new(out)))
    }

    #[test]
    fn ten_items_complete_in_three_chunks() {
        let dir = tempfile::tempdir().expect("tempdir");
        let out = dir.path().join("out");
        let mut batch = controller(&out);
        batch.start(write_items(dir.path(), 10)).expect("start");

        let sizes: Vec<usize> = (0..3).map(|_| batch.step(&settings(0)).records.len()).collect();
        assert_eq!(sizes, [4, 4, 2]);
        assert_eq!(batch.state(), BatchState::Completed);
        assert_eq!(batch.cursor(), 10);
        assert!(batch.results().is_empty(), "accumulator cleared on completion");

        let csv = std::fs::read_to_string(out.join("batch_results.csv")).expect("csv");
        assert_eq!(csv.lines().count(), 11);
        assert!(csv.lines().nth(1).is_some_and(|l| l.starts_with("item_00.png,4,")));
        assert!(out.join("ocr_output_batch.json").exists());

        // Completed is terminal.
        assert!(!batch.step(&settings(0)).did_work());
    }

    #[test]
    fn completing_step_reports_exports() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut batch = controller(&dir.path().join("out")).with_chunk_size(8);
        batch.start(write_items(dir.path(), 3)).expect("start");
        let report = batch.step(&settings(0));
        assert_eq!(report.state, BatchState::Completed);
        assert_eq!(report.exported.len(), 2);
    }

    #[test]
    fn pause_holds_the_cursor_until_resume() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut batch = controller(&dir.path().join("out"));
        batch.start(write_items(dir.path(), 10)).expect("start");

        batch.step(&settings(0));
        batch.pause().expect("pause");
        let report = batch.step(&settings(0));
        assert!(!report.did_work());
        assert_eq!(report.state, BatchState::Paused);
        assert_eq!(batch.cursor(), 4);

        batch.resume().expect("resume");
        batch.step(&settings(0));
        assert_eq!(batch.cursor(), 8);
        assert_eq!(batch.results().len(), 8);
    }

    #[test]
    fn stop_prevents_export() {
        let dir = tempfile::tempdir().expect("tempdir");
        let out = dir.path().join("out");
        let mut batch = controller(&out);
        batch.start(write_items(dir.path(), 6)).expect("start");

        batch.step(&settings(0));
        batch.stop().expect("stop");
        let report = batch.step(&settings(0));
        assert_eq!(report.state, BatchState::Stopped);
        assert!(!report.did_work());
        assert_eq!(batch.results().len(), 4, "partial results are kept");
        assert!(!out.join("batch_results.csv").exists());
    }

    #[test]
    fn illegal_transitions_are_refused() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut batch = controller(dir.path());
        assert!(matches!(
            batch.pause(),
            Err(PruefwerkError::InvalidTransition { action: "pause", .. })
        ));

        batch.start(write_items(dir.path(), 2)).expect("start");
        assert!(batch.resume().is_err());
        batch.step(&settings(0));
        assert_eq!(batch.state(), BatchState::Completed);
        let err = batch.stop().err().expect("stop after completion");
        assert_eq!(err.to_string(), "cannot stop while completed");
    }

    #[test]
    fn empty_batch_is_refused() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut batch = controller(dir.path());
        assert!(matches!(batch.start(Vec::new()), Err(PruefwerkError::EmptyBatch)));
        assert_eq!(batch.state(), BatchState::Idle);
    }

    #[test]
    fn unreadable_items_are_skipped_and_passed() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut items = write_items(dir.path(), 3);
        let broken = dir.path().join("broken.png");
        std::fs::write(&broken, b"garbage").expect("write");
        items.insert(1, broken.clone());

        let mut batch = controller(&dir.path().join("out"));
        batch.start(items).expect("start");
        let report = batch.step(&settings(0));
        assert_eq!(report.records.len(), 3);
        assert_eq!(report.skipped, [broken]);
        assert_eq!(report.cursor, 4);
        assert_eq!(report.state, BatchState::Completed);
    }

    #[test]
    fn settings_changes_apply_from_next_chunk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut batch = controller(&dir.path().join("out")).with_chunk_size(2);
        batch.start(write_items(dir.path(), 4)).expect("start");

        let first = batch.step(&settings(0));
        assert_eq!(first.records[0].raw_text[0], "AB10");
        let second = batch.step(&settings(10));
        // Item 2 has pixel value 12, brightened by 10.
        assert_eq!(second.records[0].raw_text[0], "AB22");
        assert_eq!(second.records[0].matches, ["AB22"]);
    }

    #[test]
    fn start_replaces_an_active_job() {
        let dir = tempfile::tempdir().expect("tempdir");
        let items = write_items(dir.path(), 6);
        let mut batch = controller(&dir.path().join("out"));

        let first = batch.start(items.clone()).expect("start");
        batch.step(&settings(0));
        let second = batch.start(items[..2].to_vec()).expect("restart");

        assert_ne!(first, second);
        assert_eq!(batch.cursor(), 0);
        assert_eq!(batch.total(), 2);
        assert_eq!(batch.state(), BatchState::Running);
    }
}
