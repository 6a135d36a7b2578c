//! Write an example composition file.

use std::path::PathBuf;

use vidstack_project_model::composition::write_example_config;

pub fn run(path: PathBuf) -> anyhow::Result<()> {
    write_example_config(&path)?;

    println!("Example configuration written to {}", path.display());
    println!();
    println!("Next steps:");
    println!("  1. Edit the [[videos]] entries to point at your clips");
    println!("  2. vidstack plan {}", path.display());
    println!("  3. vidstack compose {}", path.display());

    Ok(())
}
