// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Result export — flat CSV and JSON files in one output directory.
//
// Write failures never end a run: callers go through `ResultExporter::report`
// which logs the failure and keeps the in-memory results untouched. Every
// failure while writing surfaces as `PruefwerkError::Export`.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use pruefwerk_core::error::{PruefwerkError, Result};
use pruefwerk_core::failure;
use pruefwerk_core::{BatchRecord, LiveRecord, ValidationVerdict};
use serde::Serialize;
use tracing::{error, info, instrument};

pub const BATCH_CSV: &str = "batch_results.csv";
pub const LIVE_CSV: &str = "live_results.csv";

const BATCH_HEADER: [&str; 6] = [
    "file_name",
    "expected_count",
    "regex",
    "detected_count",
    "regex_match",
    "final_result",
];

const LIVE_HEADER: [&str; 7] = [
    "timestamp",
    "frame",
    "detected_count",
    "expected_count",
    "regex",
    "regex_match",
    "final_result",
];

/// One entry of a JSON results file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultEntry {
    pub image: String,
    pub raw_text: Vec<String>,
    pub matches: Vec<String>,
}

impl From<&BatchRecord> for ResultEntry {
    fn from(record: &BatchRecord) -> Self {
        Self {
            image: record.file_name.clone(),
            raw_text: record.raw_text.clone(),
            matches: record.matches.clone(),
        }
    }
}

/// Top-level shape of `ocr_output_{mode}.json`.
#[derive(Debug, Serialize)]
struct ResultsDocument<'a> {
    mode: &'a str,
    engine: &'a str,
    /// Empty when no pattern was active.
    regex: &'a str,
    results: &'a [ResultEntry],
}

/// Writes result files into one directory, creating it on first use.
#[derive(Debug, Clone)]
pub struct ResultExporter {
    dir: PathBuf,
}

impl ResultExporter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create `name` in the output directory and fill it with `body`.
    fn write_file(&self, name: &str, body: impl FnOnce(File) -> Result<()>) -> Result<PathBuf> {
        let path = self.dir.join(name);
        std::fs::create_dir_all(&self.dir)
            .and_then(|()| File::create(&path))
            .map_err(PruefwerkError::from)
            .and_then(body)
            .map_err(|e| export_failed(&path, e))?;
        Ok(path)
    }

    /// `batch_results.csv`, one row per processed item.
    #[instrument(skip_all, fields(records = records.len()))]
    pub fn write_batch_csv(&self, records: &[BatchRecord]) -> Result<PathBuf> {
        let path = self.write_file(BATCH_CSV, |file| {
            let mut writer = csv::Writer::from_writer(file);
            writer.write_record(BATCH_HEADER)?;
            for record in records {
                let verdict = verdict_columns(&record.verdict);
                writer.write_record([
                    record.file_name.as_str(),
                    verdict.expected.as_str(),
                    record.regex.as_deref().unwrap_or(""),
                    verdict.detected.as_str(),
                    verdict.regex_match,
                    record.verdict.final_result(),
                ])?;
            }
            writer.flush()?;
            Ok(())
        })?;
        info!(path = %path.display(), "Batch CSV written");
        Ok(path)
    }

    /// Create `live_results.csv` with its header, ready for rows to be
    /// appended as frames are inspected.
    #[instrument(skip_all)]
    pub fn open_live_csv(&self) -> Result<LiveCsvWriter> {
        let path = self.dir.join(LIVE_CSV);
        let file = std::fs::create_dir_all(&self.dir)
            .and_then(|()| File::create(&path))
            .map_err(|e| export_failed(&path, e))?;
        let mut writer = LiveCsvWriter {
            writer: csv::Writer::from_writer(file),
            path,
            rows: 0,
        };
        writer
            .writer
            .write_record(LIVE_HEADER)
            .map_err(|e| export_failed(&writer.path, e))?;
        info!(path = %writer.path.display(), "Live CSV opened");
        Ok(writer)
    }

    /// `live_results.csv` for a finished set of records.
    pub fn write_live_csv(&self, records: &[LiveRecord]) -> Result<PathBuf> {
        let mut writer = self.open_live_csv()?;
        for record in records {
            writer.append(record)?;
        }
        Ok(writer.finish())
    }

    /// `ocr_output_{mode}.json` with the engine, pattern and per-image tokens.
    #[instrument(skip(self, results), fields(results = results.len()))]
    pub fn write_results_json(
        &self,
        mode: &str,
        engine: &str,
        regex: Option<&str>,
        results: &[ResultEntry],
    ) -> Result<PathBuf> {
        let document = ResultsDocument {
            mode,
            engine,
            regex: regex.unwrap_or(""),
            results,
        };
        let path = self.write_file(&format!("ocr_output_{mode}.json"), |file| {
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, &document)?;
            writer.flush()?;
            Ok(())
        })?;
        info!(path = %path.display(), "Results JSON written");
        Ok(path)
    }

    /// Log the outcome of a write. Failures become an operator-facing error
    /// line and `None`.
    pub fn report(outcome: Result<PathBuf>) -> Option<PathBuf> {
        match outcome {
            Ok(path) => Some(path),
            Err(err) => {
                let report = failure::describe(&err);
                error!(error = %err, "{report}");
                None
            }
        }
    }
}

/// `live_results.csv` being written one row at a time.
///
/// Every row is flushed to disk as it is appended, so a long session keeps
/// nothing in memory and a crash loses at most the row being written.
pub struct LiveCsvWriter {
    writer: csv::Writer<File>,
    path: PathBuf,
    rows: u64,
}

impl LiveCsvWriter {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rows appended so far, header excluded.
    pub fn rows(&self) -> u64 {
        self.rows
    }

    pub fn append(&mut self, record: &LiveRecord) -> Result<()> {
        let verdict = verdict_columns(&record.verdict);
        self.writer
            .write_record([
                record.timestamp.to_rfc3339().as_str(),
                record.frame.to_string().as_str(),
                verdict.detected.as_str(),
                verdict.expected.as_str(),
                record.regex.as_deref().unwrap_or(""),
                verdict.regex_match,
                record.verdict.final_result(),
            ])
            .map_err(|e| export_failed(&self.path, e))?;
        self.writer
            .flush()
            .map_err(|e| export_failed(&self.path, e))?;
        self.rows += 1;
        Ok(())
    }

    /// Close the file and return its path.
    pub fn finish(self) -> PathBuf {
        info!(path = %self.path.display(), rows = self.rows, "Live CSV written");
        self.path
    }
}

fn export_failed(path: &Path, err: impl std::fmt::Display) -> PruefwerkError {
    PruefwerkError::Export(format!("{}: {err}", path.display()))
}

struct VerdictColumns {
    expected: String,
    detected: String,
    regex_match: &'static str,
}

fn verdict_columns(verdict: &ValidationVerdict) -> VerdictColumns {
    VerdictColumns {
        expected: verdict
            .expected_count
            .map(|n| n.to_string())
            .unwrap_or_default(),
        detected: verdict.detected_count.to_string(),
        regex_match: match verdict.regex_matched {
            Some(true) => "true",
            Some(false) => "false",
            None => "",
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn verdict(passed: bool) -> ValidationVerdict {
        ValidationVerdict {
            detected_count: 6,
            expected_count: Some(6),
            regex_matched: Some(passed),
            passed,
        }
    }

    fn batch_record(name: &str, passed: bool) -> BatchRecord {
        BatchRecord {
            file_name: name.to_string(),
            regex: Some("^AB".to_string()),
            raw_text: vec!["AB12".into(), "34".into()],
            matches: vec!["AB12".into()],
            verdict: verdict(passed),
        }
    }

    #[test]
    fn batch_csv_has_expected_columns() {
        let dir = tempfile::tempdir().expect("tempdir");
        let exporter = ResultExporter::new(dir.path().join("out"));
        let path = exporter
            .write_batch_csv(&[batch_record("a.png", true), batch_record("b.png", false)])
            .expect("write");

        let text = std::fs::read_to_string(path).expect("read");
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(
            lines[0],
            "file_name,expected_count,regex,detected_count,regex_match,final_result"
        );
        assert_eq!(lines[1], "a.png,6,^AB,6,true,OK");
        assert_eq!(lines[2], "b.png,6,^AB,6,false,NOT_OK");
    }

    #[test]
    fn live_csv_rows_carry_frame_and_timestamp() {
        let dir = tempfile::tempdir().expect("tempdir");
        let exporter = ResultExporter::new(dir.path());
        let record = LiveRecord {
            timestamp: Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).single().expect("time"),
            frame: 42,
            regex: None,
            raw_text: vec![],
            matches: vec![],
            verdict: ValidationVerdict {
                detected_count: 0,
                expected_count: None,
                regex_matched: None,
                passed: true,
            },
        };
        let path = exporter.write_live_csv(&[record]).expect("write");
        let text = std::fs::read_to_string(path).expect("read");
        assert_eq!(
            text.lines().nth(1),
            Some("2026-03-01T12:00:00+00:00,42,0,,,,OK")
        );
    }

    #[test]
    fn results_json_shape() {
        let dir = tempfile::tempdir().expect("tempdir");
        let exporter = ResultExporter::new(dir.path());
        let entries = [ResultEntry::from(&batch_record("a.png", true))];
        let path = exporter
            .write_results_json("batch", "Ocrs", Some("^AB"), &entries)
            .expect("write");
        assert!(path.ends_with("ocr_output_batch.json"));

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(path).expect("read")).expect("json");
        assert_eq!(value["mode"], "batch");
        assert_eq!(value["engine"], "Ocrs");
        assert_eq!(value["regex"], "^AB");
        assert_eq!(value["results"][0]["image"], "a.png");
        assert_eq!(value["results"][0]["matches"][0], "AB12");
    }

    #[test]
    fn unwritable_directory_is_reported_not_raised() {
        let dir = tempfile::tempdir().expect("tempdir");
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"x").expect("write");
        // A regular file where the output directory should be.
        let exporter = ResultExporter::new(blocker.join("out"));
        let outcome = exporter.write_batch_csv(&[batch_record("a.png", true)]);
        let err = outcome.as_ref().err().expect("write must fail");
        assert!(matches!(err, PruefwerkError::Export(_)));
        assert_eq!(failure::classify(err), failure::FailureClass::Export);
        assert!(ResultExporter::report(outcome).is_none());
    }

    #[test]
    fn live_rows_reach_disk_as_they_are_appended() {
        let dir = tempfile::tempdir().expect("tempdir");
        let exporter = ResultExporter::new(dir.path());
        let mut writer = exporter.open_live_csv().expect("open");
        for frame in [3, 7] {
            let record = LiveRecord {
                timestamp: Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).single().expect("time"),
                frame,
                regex: Some("^AB".into()),
                raw_text: vec!["AB12".into()],
                matches: vec!["AB12".into()],
                verdict: verdict(true),
            };
            writer.append(&record).expect("append");
        }
        // Readable before the writer is finished.
        let text = std::fs::read_to_string(writer.path()).expect("read");
        assert_eq!(text.lines().count(), 3);
        assert_eq!(writer.rows(), 2);
        assert!(writer.finish().ends_with(LIVE_CSV));
    }
}
