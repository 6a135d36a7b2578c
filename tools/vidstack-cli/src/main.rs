//! vidstack CLI: compose videos side by side with ffmpeg.
//!
//! Usage:
//!   vidstack compose <CONFIG|DIR>   Render a composition
//!   vidstack plan <CONFIG|DIR>      Show the layout and filtergraph
//!   vidstack probe <PATH>...        Show media properties
//!   vidstack init [PATH]            Write an example configuration
//!   vidstack cache clear|resolve    Manage downloaded share links
//!   vidstack check                  Check ffmpeg availability

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use vidstack_common::config::AppConfig;

mod commands;
mod job;

#[derive(Parser)]
#[command(
    name = "vidstack",
    about = "Side-by-side video compositor built on ffmpeg",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a composition to video
    Compose {
        /// Composition TOML file, or a directory `foo/` with a sibling `foo.toml`
        path: PathBuf,

        /// Override the output file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Stop after compiling the filtergraph
        #[arg(long)]
        dry_run: bool,

        /// Write <output>.ffmpeg-debug.txt next to the output
        #[arg(long)]
        debug_report: bool,
    },

    /// Print the planned layout and filtergraph
    Plan {
        /// Composition TOML file or directory
        path: PathBuf,
    },

    /// Probe media files
    Probe {
        /// Files to probe
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Write an example composition file
    Init {
        /// Where to write it
        #[arg(default_value = "config.toml")]
        path: PathBuf,
    },

    /// Manage the share-link download cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Check that ffmpeg and ffprobe are available
    Check,
}

#[derive(Subcommand)]
enum CacheAction {
    /// Remove cached downloads
    Clear {
        /// Only remove entries older than this many hours
        #[arg(long)]
        older_than_hours: Option<u64>,
    },

    /// Download (or look up) a share link and print its local path
    Resolve {
        /// Share link
        url: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let app = AppConfig::load();

    // Initialize logging
    let mut logging = app.logging.clone();
    if cli.verbose {
        logging.level = "debug".to_string();
    }
    vidstack_common::logging::init_logging(&logging);
    app.validate()?;

    match cli.command {
        Commands::Compose {
            path,
            output,
            dry_run,
            debug_report,
        } => commands::compose::run(&app, path, output, dry_run, debug_report).await,
        Commands::Plan { path } => commands::plan::run(&app, path).await,
        Commands::Probe { paths } => commands::probe::run(&app, paths),
        Commands::Init { path } => commands::init::run(path),
        Commands::Cache { action } => match action {
            CacheAction::Clear { older_than_hours } => {
                commands::cache::clear(&app, older_than_hours)
            }
            CacheAction::Resolve { url } => commands::cache::resolve(&app, url).await,
        },
        Commands::Check => commands::check::run(&app),
    }
}
