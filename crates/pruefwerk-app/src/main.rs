// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pruefwerk — OCR and barcode inspection station
//
// Entry point. Initialises logging, parses the command line, builds the
// backend services and dispatches to the command handlers.

mod commands;
mod services;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use pruefwerk_core::error::Result;
use pruefwerk_core::failure;

use commands::batch::BatchOptions;
use commands::live::SourceChoice;
use commands::profile::ProfileEdits;
use services::app_services::AppServices;

#[derive(Debug, Parser)]
#[command(name = "pruefwerk", version, about = "Inspect labels and codes on camera frames and image folders")]
struct Cli {
    /// Inspection profile (JSON). Defaults apply when omitted.
    #[arg(long, short, global = true)]
    profile: Option<PathBuf>,

    /// Directory for result files [default: $XDG_DATA_HOME/pruefwerk/results].
    #[arg(long, short, global = true)]
    output: Option<PathBuf>,

    /// TrueType font for labels drawn on annotated images [default: the first
    /// common system font found].
    #[arg(long, global = true)]
    font: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Inspect one image.
    Single {
        image: PathBuf,
        /// Where to save the annotated image.
        #[arg(long)]
        annotated: Option<PathBuf>,
    },
    /// Inspect every image in a folder, a chunk per tick.
    Batch {
        folder: PathBuf,
        #[arg(long, default_value_t = pruefwerk_pipeline::batch::DEFAULT_CHUNK_SIZE)]
        chunk_size: usize,
        /// Milliseconds between steps.
        #[arg(long, default_value_t = 250)]
        tick_ms: u64,
    },
    /// Inspect camera frames until Ctrl-C.
    Live {
        /// Camera configuration file, passed to the capture device.
        #[arg(long)]
        camera_config: PathBuf,
        /// Camera index.
        #[arg(long, default_value_t = 0, conflicts_with = "replay")]
        camera: u32,
        /// Replay a folder of images instead of using a camera.
        #[arg(long)]
        replay: Option<PathBuf>,
        /// Replay frame interval in milliseconds.
        #[arg(long, default_value_t = 100)]
        interval_ms: u64,
        /// Stop after this many seconds.
        #[arg(long)]
        seconds: Option<u64>,
    },
    /// Show or write an inspection profile.
    Profile {
        /// Write the profile here instead of printing it.
        #[arg(long)]
        write: Option<PathBuf>,
        /// Recognition engine (Ocrs, Barcode).
        #[arg(long)]
        engine: Option<String>,
        #[arg(long)]
        preprocessing: Option<bool>,
        #[arg(long)]
        clahe: Option<bool>,
        #[arg(long, allow_hyphen_values = true)]
        brightness: Option<i32>,
        #[arg(long)]
        contrast: Option<f32>,
        #[arg(long)]
        gamma: Option<f32>,
        /// Counter-clockwise rotation in degrees.
        #[arg(long, allow_hyphen_values = true)]
        rotate: Option<i32>,
        /// Pattern to validate; an empty string clears it.
        #[arg(long)]
        regex: Option<String>,
        /// Minimum letters and digits; 0 clears it.
        #[arg(long)]
        expected_count: Option<u32>,
        /// Literal barcode value to expect when no regex is set.
        #[arg(long)]
        expected_value: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    tracing::info!("Pruefwerk starting");

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let report = failure::describe(&err);
            tracing::error!(error = %err, class = ?report.class, "command failed");
            eprintln!("{report}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let Cli {
        profile,
        output,
        font,
        command,
    } = cli;

    if let Command::Profile {
        write,
        engine,
        preprocessing,
        clahe,
        brightness,
        contrast,
        gamma,
        rotate,
        regex,
        expected_count,
        expected_value,
    } = command
    {
        let edits = ProfileEdits {
            engine,
            preprocessing,
            clahe,
            brightness,
            contrast,
            gamma,
            rotate,
            regex,
            expected_count,
            expected_value,
        };
        return commands::profile::run(profile.as_deref(), &edits, write);
    }

    let services = AppServices::init(profile.as_deref(), output.as_deref(), font.as_deref())?;
    match command {
        Command::Single { image, annotated } => {
            let services = services.clone();
            tokio::task::spawn_blocking(move || commands::single::run(&services, &image, annotated))
                .await
                .map_err(|e| pruefwerk_core::PruefwerkError::Io(std::io::Error::other(e)))?
        }
        Command::Batch {
            folder,
            chunk_size,
            tick_ms,
        } => {
            let options = BatchOptions {
                chunk_size,
                tick: Duration::from_millis(tick_ms),
            };
            commands::batch::run(&services, &folder, options).await
        }
        Command::Live {
            camera_config,
            camera,
            replay,
            interval_ms,
            seconds,
        } => {
            let source = match replay {
                Some(dir) => SourceChoice::Replay {
                    dir,
                    interval: Duration::from_millis(interval_ms),
                },
                None => SourceChoice::Camera(camera),
            };
            let limit = seconds.map(Duration::from_secs);
            commands::live::run(&services, source, camera_config, limit).await
        }
        Command::Profile { .. } => Ok(()),
    }
}
