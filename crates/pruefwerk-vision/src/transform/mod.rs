// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Transform module — brightness/contrast, gamma, CLAHE and rotation.

pub mod clahe;
pub mod processor;

pub use processor::{ImageTransformer, transform};
