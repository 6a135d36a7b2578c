//! Show media properties as ffprobe reports them.

use std::path::PathBuf;

use vidstack_common::config::AppConfig;
use vidstack_render_engine::{probe_all, FfprobeProber};

pub fn run(app: &AppConfig, paths: Vec<PathBuf>) -> anyhow::Result<()> {
    let prober = FfprobeProber::new(&app.tools.ffprobe);
    let descriptors = probe_all(&prober, &paths)?;

    for (path, d) in paths.iter().zip(&descriptors) {
        println!("{}", path.display());
        println!("  Resolution: {}x{} (aspect {:.3})", d.width, d.height, d.aspect_ratio());
        println!("  Duration: {:.3}s", d.duration);
        println!("  Frame rate: {:.3}", d.frame_rate);
        match d.frame_count {
            Some(frames) => println!("  Frames: {frames}"),
            None => println!("  Frames: ~{} (estimated)", d.effective_frame_count()),
        }
    }

    Ok(())
}
