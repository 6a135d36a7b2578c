//! Show the planned layout and filtergraph without encoding.

use std::path::PathBuf;

use vidstack_common::config::AppConfig;
use vidstack_common::error::VidstackResult;
use vidstack_render_engine::{compose, CancelFlag, FilterChain, Fragment};

use crate::job::build_job;

pub async fn run(app: &AppConfig, path: PathBuf) -> anyhow::Result<()> {
    let mut job = build_job(app, &path).await?;
    job.dry_run = true;
    let sources = job.sources.clone();

    let outcome = compose(job, None, CancelFlag::new()).await?;
    let compiled = &outcome.compiled;
    let plan = &compiled.plan;

    println!("Composition: {}", path.display());
    println!("{}", "=".repeat(50));
    println!(
        "Canvas: {}x{}  duration {:.3}s  {} fps  ({} frames)",
        plan.canvas_width,
        plan.canvas_height,
        plan.canvas_duration,
        plan.output_frame_rate,
        plan.total_frames()
    );
    println!();

    for (idx, (((source, descriptor), layout), x)) in sources
        .iter()
        .zip(&compiled.descriptors)
        .zip(&plan.videos)
        .zip(plan.x_offsets())
        .enumerate()
    {
        println!("[{idx}] {}", source.path.display());
        println!(
            "     source {}x{}  {:.3}s @ {:.3} fps{}",
            descriptor.width,
            descriptor.height,
            descriptor.duration,
            descriptor.frame_rate,
            if source.is_still() { "  (still)" } else { "" }
        );
        println!(
            "     placed at x={x}  scaled {}x{}  pad {:.3}s",
            layout.scaled_width, layout.scaled_height, layout.duration_pad
        );
        if let Some(heading) = source.heading() {
            println!("     heading: {heading}");
        }
        if let Some(subheading) = source.subheading() {
            println!("     subheading: {subheading}");
        }
    }

    println!();
    println!("Filtergraph:");
    let lines = graph_lines(&compiled.chain)?;
    let last = lines.len().saturating_sub(1);
    for (idx, line) in lines.iter().enumerate() {
        let sep = if idx < last { ";" } else { "" };
        println!("  {line}{sep}");
    }

    Ok(())
}

/// One serialized fragment per entry. Splitting the joined graph on `;`
/// would also cut at escaped semicolons inside captions.
fn graph_lines(chain: &FilterChain) -> VidstackResult<Vec<String>> {
    chain
        .fragments()
        .iter()
        .map(Fragment::to_graph_string)
        .collect()
}
