// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pruefwerk — Core types, profiles and error definitions shared across all crates.

pub mod config;
pub mod error;
pub mod failure;
pub mod types;

pub use config::{EngineKind, InspectionProfile, PreprocessConfig};
pub use error::{PruefwerkError, Result};
pub use types::*;
