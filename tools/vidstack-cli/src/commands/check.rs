//! Check that the external tools are available.

use vidstack_common::config::{config_file_path, AppConfig};
use vidstack_render_engine::command_exists;

pub fn run(app: &AppConfig) -> anyhow::Result<()> {
    println!("vidstack System Check");
    println!("{}", "=".repeat(50));

    let mut all_ok = true;
    for (label, binary) in [("ffmpeg", &app.tools.ffmpeg), ("ffprobe", &app.tools.ffprobe)] {
        if command_exists(binary) {
            println!("[OK] {label}: {binary}");
        } else {
            println!("[MISSING] {label}: {binary} not found");
            all_ok = false;
        }
    }

    println!();
    println!("Config file: {}", config_file_path().display());
    println!(
        "Cache: {} (entries kept {}h)",
        app.cache.dir.display(),
        app.cache.max_age_hours
    );

    println!();
    if all_ok {
        println!("All required tools are available. vidstack is ready.");
    } else {
        println!("Install ffmpeg (which provides ffprobe) or set tools paths in the config file.");
    }

    Ok(())
}
