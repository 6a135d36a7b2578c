//! Turning a composition file into a runnable job.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;

use vidstack_common::config::AppConfig;
use vidstack_common::error::VidstackError;
use vidstack_project_model::composition::{resolve_config_path, LoadedComposition, VideoEntry};
use vidstack_project_model::media::{MediaKind, VideoSource};
use vidstack_remote_cache::RemoteAssetCache;
use vidstack_render_engine::CompositionJob;

/// Load the composition at `path` and resolve every entry to a local file.
pub async fn build_job(app: &AppConfig, path: &Path) -> anyhow::Result<CompositionJob> {
    let config_path = resolve_config_path(path)?;
    let loaded = LoadedComposition::load(&config_path)
        .with_context(|| format!("Failed to load composition {}", config_path.display()))?;

    tracing::info!(
        config = %loaded.config_path.display(),
        entries = loaded.config.entry_count(),
        "Composition loaded"
    );

    let needs_cache = loaded.config.entries().any(|(entry, _)| entry.is_remote());
    let mut cache = if needs_cache {
        Some(open_cache(app)?)
    } else {
        None
    };
    let mut sources = Vec::with_capacity(loaded.config.entry_count());

    for (entry, force_still) in loaded.config.entries() {
        let resolved = match cache.as_mut() {
            Some(cache) if entry.is_remote() => cache.resolve(entry.path.trim()).await?,
            _ => entry.local_path(&loaded.base_dir),
        };

        if !resolved.exists() {
            return Err(VidstackError::FileNotFound { path: resolved }.into());
        }

        if entry.audio_path.is_some() {
            tracing::warn!(
                path = %entry.path,
                "audio_path is ignored; the composite is written without audio"
            );
        }

        sources.push(source_for(entry, resolved, force_still));
    }

    let mut style = loaded.config.text.clone();
    if let Some(font) = &style.font_file {
        if font.is_relative() {
            style.font_file = Some(loaded.base_dir.join(font));
        }
    }

    let mut job = CompositionJob::new(sources, loaded.output_path());
    job.output = loaded.config.output.clone();
    job.style = style;
    job.ffmpeg_binary = PathBuf::from(&app.tools.ffmpeg);
    job.ffprobe_binary = PathBuf::from(&app.tools.ffprobe);
    Ok(job)
}

/// Open the download cache configured in `app`.
pub fn open_cache(app: &AppConfig) -> anyhow::Result<RemoteAssetCache> {
    let max_age = Duration::from_secs(app.cache.max_age_hours.saturating_mul(3600));
    RemoteAssetCache::open(&app.cache.dir, max_age)
        .with_context(|| format!("Failed to open cache at {}", app.cache.dir.display()))
}

/// Source for an entry whose file now lives at `resolved`.
///
/// Share links carry no extension, so their kind is taken from the
/// downloaded file unless the entry says otherwise.
fn source_for(entry: &VideoEntry, resolved: PathBuf, force_still: bool) -> VideoSource {
    let mut source = entry.to_source(resolved, force_still);
    if entry.is_remote() && entry.is_image.is_none() && !force_still {
        source.kind = MediaKind::from_path(&source.path);
    }
    source
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_build_job_resolves_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.mp4"), b"").unwrap();
        std::fs::write(dir.path().join("b.png"), b"").unwrap();
        std::fs::write(
            dir.path().join("demo.toml"),
            r#"
[output]
path = "out/demo.mp4"
pad_mode = "black"

[text]
font_file = "fonts/Inter.ttf"

[[videos]]
path = "a.mp4"
heading = "Left"
audio_path = "a.wav"

[[image]]
path = "b.png"
"#,
        )
        .unwrap();

        let job = build_job(&AppConfig::default(), &dir.path().join("demo.toml"))
            .await
            .unwrap();

        assert_eq!(job.sources.len(), 2);
        assert_eq!(job.sources[0].path, dir.path().join("a.mp4"));
        assert_eq!(job.sources[0].heading(), Some("Left"));
        assert!(!job.sources[0].is_still());
        assert!(job.sources[1].is_still());
        assert_eq!(job.output_path, dir.path().join("out/demo.mp4"));
        assert_eq!(
            job.style.font_file,
            Some(dir.path().join("fonts/Inter.ttf"))
        );
    }

    #[tokio::test]
    async fn test_missing_local_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("demo.toml"),
            "[[videos]]\npath = \"nope.mp4\"\n",
        )
        .unwrap();

        let err = build_job(&AppConfig::default(), &dir.path().join("demo.toml"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("nope.mp4"), "{err}");
    }

    #[test]
    fn test_remote_kind_comes_from_download() {
        let entry = VideoEntry {
            path: "https://drive.google.com/file/d/abc/view".to_string(),
            ..VideoEntry::default()
        };
        let source = source_for(&entry, PathBuf::from("/cache/abc.png"), false);
        assert!(source.is_still());

        let forced = VideoEntry {
            is_image: Some(false),
            ..entry
        };
        let source = source_for(&forced, PathBuf::from("/cache/abc.png"), false);
        assert!(!source.is_still());
    }
}
