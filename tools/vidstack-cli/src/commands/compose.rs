//! Render a composition.

use std::io::Write;
use std::path::PathBuf;

use vidstack_common::config::AppConfig;
use vidstack_render_engine::{compose, CancelFlag, EncodeProgress, ProgressCallback};

use crate::job::build_job;

pub async fn run(
    app: &AppConfig,
    path: PathBuf,
    output: Option<PathBuf>,
    dry_run: bool,
    debug_report: bool,
) -> anyhow::Result<()> {
    println!("Composing: {}", path.display());

    let mut job = build_job(app, &path).await?;
    if let Some(output) = output {
        job.output_path = output;
    }
    job.dry_run = dry_run;
    job.debug_report = debug_report;

    println!("  Inputs: {}", job.sources.len());
    for (idx, source) in job.sources.iter().enumerate() {
        println!(
            "    {}. {}{}",
            idx + 1,
            source.path.display(),
            if source.is_still() { " (still)" } else { "" }
        );
    }
    println!("  Output: {}", job.output_path.display());
    println!("  Preset: {}", job.output.preset);
    println!("  Threads: {}", job.output.threads);
    println!("  Bitrate: {}", job.output.bitrate);

    let cancel = CancelFlag::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nInterrupted, stopping encoder...");
            on_interrupt.cancel();
        }
    });

    let progress_cb: ProgressCallback = Box::new(|p: EncodeProgress| {
        print!(
            "\r  Progress: {:.1}% ({}/{} frames, ETA: {:.0}s)  ",
            p.progress * 100.0,
            p.frames_rendered,
            p.total_frames,
            p.eta_secs,
        );
        let _ = std::io::stdout().flush();
    });

    let outcome = compose(job, Some(progress_cb), cancel).await?;
    let plan = &outcome.compiled.plan;

    match outcome.output_path {
        Some(path) => {
            println!("\nComposite written: {}", path.display());
            println!(
                "  Canvas: {}x{} @ {} fps, {:.2}s",
                plan.canvas_width, plan.canvas_height, plan.output_frame_rate, plan.canvas_duration
            );
        }
        None => {
            println!(
                "Dry run: canvas {}x{} @ {} fps, {:.2}s",
                plan.canvas_width, plan.canvas_height, plan.output_frame_rate, plan.canvas_duration
            );
            println!();
            println!("{}", outcome.compiled.filter_graph);
        }
    }

    Ok(())
}
