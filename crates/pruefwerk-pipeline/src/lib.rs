// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pruefwerk Pipeline — live camera inspection, chunked batch jobs and result
// export.  This crate drives the image stages of `pruefwerk-vision` over
// frames from a capture source or files from a folder.

pub mod batch;
pub mod capture;
pub mod exchange;
pub mod export;
pub mod folder;
pub mod inspect;
pub mod live;

pub use batch::{BatchController, BatchState, StepReport};
pub use capture::{CaptureSource, ReplaySource};
pub use exchange::{Frame, FrameExchange};
pub use export::{LiveCsvWriter, ResultExporter};
pub use inspect::{InspectionSettings, inspect_file};
pub use live::{LiveEvent, LivePipeline, LiveState, LiveSummary};

#[cfg(feature = "camera")]
pub use capture::CameraSource;
