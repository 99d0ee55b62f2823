// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// `pruefwerk batch` — the periodic scheduler around `BatchController`.
//
// A tokio interval triggers one step per tick. The controller is moved into
// `spawn_blocking` for the step and moved back afterwards, so a step that
// outlasts the tick simply delays the next one; steps never overlap. Operator
// commands arrive on stdin: `p` pause, `r` resume, `s` stop. Ctrl-C stops.

use std::path::Path;
use std::time::Duration;

use pruefwerk_core::error::{PruefwerkError, Result};
use pruefwerk_core::failure;
use pruefwerk_pipeline::folder::list_images;
use pruefwerk_pipeline::{BatchController, BatchState, StepReport};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use crate::services::app_services::AppServices;

/// Scheduling knobs for a batch run.
#[derive(Debug, Clone, Copy)]
pub struct BatchOptions {
    pub chunk_size: usize,
    pub tick: Duration,
}

pub async fn run(services: &AppServices, folder: &Path, options: BatchOptions) -> Result<()> {
    let items = list_images(folder)?;
    info!(folder = %folder.display(), images = items.len(), "folder loaded");

    let mut controller = BatchController::new(services.backend(), Some(services.exporter().clone()))
        .with_chunk_size(options.chunk_size);
    controller.start(items)?;
    let mut settings = services.settings()?;
    println!(
        "Processing {} images in chunks of {} (p = pause, r = resume, s = stop)",
        controller.total(),
        controller.chunk_size()
    );

    let mut ticker = tokio::time::interval(options.tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut commands = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    while controller.state().is_active() {
        tokio::select! {
            _ = ticker.tick() => {
                if controller.state() != BatchState::Running {
                    continue;
                }
                settings = services.refresh(settings);
                let step_settings = settings.clone();
                let (returned, report) = tokio::task::spawn_blocking(move || {
                    let report = controller.step(&step_settings);
                    (controller, report)
                })
                .await
                .map_err(|e| PruefwerkError::Io(std::io::Error::other(e)))?;
                controller = returned;
                print_report(&report);
            }
            line = commands.next_line(), if stdin_open => match line {
                Ok(Some(line)) => apply_command(&mut controller, line.trim()),
                Ok(None) => stdin_open = false,
                Err(e) => {
                    warn!(error = %e, "stdin closed");
                    stdin_open = false;
                }
            },
            _ = &mut ctrl_c => {
                apply_command(&mut controller, "s");
            }
        }
    }

    match controller.state() {
        BatchState::Stopped => println!(
            "Stopped at {}/{}; {} results kept, nothing exported",
            controller.cursor(),
            controller.total(),
            controller.results().len()
        ),
        state => println!("Batch {state}"),
    }
    Ok(())
}

fn apply_command(controller: &mut BatchController, command: &str) {
    let outcome = match command {
        "p" | "pause" => controller.pause(),
        "r" | "resume" => controller.resume(),
        "s" | "stop" => controller.stop(),
        "" => return,
        other => {
            println!("Unknown command {other:?} (p = pause, r = resume, s = stop)");
            return;
        }
    };
    match outcome {
        Ok(()) => println!("Batch {}", controller.state()),
        Err(err) => error!("{}", failure::describe(&err)),
    }
}

fn print_report(report: &StepReport) {
    for path in &report.skipped {
        println!("  skipped {}", path.display());
    }
    for record in &report.records {
        println!(
            "  {:<32} {:<6} {} chars  [{}]",
            record.file_name,
            record.verdict.final_result(),
            record.verdict.detected_count,
            record.matches.join(", ")
        );
    }
    println!("Processed {}/{}", report.cursor, report.total);
    for path in &report.exported {
        println!("Saved {}", path.display());
    }
}
