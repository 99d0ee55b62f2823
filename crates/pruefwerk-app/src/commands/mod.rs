// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Command handlers, one per subcommand.

pub mod batch;
pub mod live;
pub mod profile;
pub mod single;
