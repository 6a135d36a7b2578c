//! Composition document (`*.toml`): output settings, text style, and the
//! ordered list of inputs.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::media::{MediaKind, VideoSource};
use crate::style::TextStyle;

/// Top-level composition file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompositionConfig {
    /// Encoder output settings.
    #[serde(default)]
    pub output: OutputSettings,

    /// Overlay text styling.
    #[serde(default)]
    pub text: TextStyle,

    /// Inputs, left to right.
    #[serde(default)]
    pub videos: Vec<VideoEntry>,

    /// Still images, appended after `videos`.
    #[serde(default, rename = "image")]
    pub images: Vec<VideoEntry>,
}

/// Encoder output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    /// Destination file.
    pub path: PathBuf,

    /// Output frame rate; the first input's rate when unset.
    pub fps: Option<f64>,

    /// x264 preset (ultrafast .. veryslow).
    pub preset: String,

    /// Encoder thread count.
    pub threads: u32,

    /// Video bitrate, ffmpeg syntax (e.g. "5000k").
    pub bitrate: String,

    /// How shorter videos are extended to the canvas duration.
    pub pad_mode: PadMode,

    /// Duration used for still images when no input is a video.
    pub still_duration: f64,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from("output_composite.mp4"),
            fps: None,
            preset: "ultrafast".to_string(),
            threads: 4,
            bitrate: "15000k".to_string(),
            pad_mode: PadMode::Clone,
            still_duration: 5.0,
        }
    }
}

/// Trailer used to extend a short stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PadMode {
    /// Freeze the last frame.
    #[default]
    Clone,
    /// Append black frames.
    Black,
}

/// One `[[videos]]` or `[[image]]` entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoEntry {
    /// Local path (relative to the config file) or a share link.
    pub path: String,
    pub heading: String,
    pub subheading: String,
    /// Accepted for compatibility; the composed output has no audio.
    pub audio_path: Option<String>,
    /// Force still/video; guessed from the extension when unset.
    pub is_image: Option<bool>,
    /// Manual frame count for the frame-count overlay.
    pub frame_count: Option<u64>,
}

impl VideoEntry {
    /// Whether the path is a URL rather than a file.
    pub fn is_remote(&self) -> bool {
        let lower = self.path.trim().to_ascii_lowercase();
        lower.starts_with("http://") || lower.starts_with("https://")
    }

    /// Local path, resolved against `base_dir` when relative.
    pub fn local_path(&self, base_dir: &Path) -> PathBuf {
        let path = PathBuf::from(self.path.trim());
        if path.is_absolute() {
            path
        } else {
            base_dir.join(path)
        }
    }

    /// Build the resolved source for this entry.
    pub fn to_source(&self, resolved: PathBuf, force_still: bool) -> VideoSource {
        let kind = if force_still || self.is_image == Some(true) {
            MediaKind::Still
        } else if self.is_image == Some(false) {
            MediaKind::Video
        } else {
            MediaKind::from_path(Path::new(self.path.trim()))
        };

        let mut source = VideoSource::new(resolved)
            .with_heading(self.heading.clone())
            .with_subheading(self.subheading.clone())
            .with_kind(kind);
        source.frame_count_override = self.frame_count;
        source
    }
}

/// A parsed composition together with where it came from.
#[derive(Debug, Clone)]
pub struct LoadedComposition {
    /// Path of the TOML file.
    pub config_path: PathBuf,

    /// Directory relative paths are resolved against.
    pub base_dir: PathBuf,

    pub config: CompositionConfig,
}

impl CompositionConfig {
    /// Parse a composition document.
    pub fn from_toml_str(content: &str) -> Result<Self, CompositionError> {
        toml::from_str(content).map_err(|e| CompositionError::ParseError {
            path: PathBuf::from("<inline>"),
            message: e.to_string(),
        })
    }

    /// All inputs in placement order, each flagged as forced-still or not.
    pub fn entries(&self) -> impl Iterator<Item = (&VideoEntry, bool)> {
        self.videos
            .iter()
            .map(|entry| (entry, false))
            .chain(self.images.iter().map(|entry| (entry, true)))
    }

    /// Number of inputs.
    pub fn entry_count(&self) -> usize {
        self.videos.len() + self.images.len()
    }

    /// Structural validation. File existence is checked after remote
    /// links have been resolved.
    pub fn validate(&self) -> Result<(), CompositionError> {
        if self.entry_count() == 0 {
            return Err(CompositionError::ValidationError {
                message: "No videos specified in configuration".to_string(),
            });
        }

        for (idx, (entry, _)) in self.entries().enumerate() {
            if entry.path.trim().is_empty() {
                return Err(CompositionError::ValidationError {
                    message: format!("Entry {} has an empty path", idx + 1),
                });
            }
        }

        let text = &self.text;
        if text.heading_font_size == 0 || text.subheading_font_size == 0 {
            return Err(CompositionError::ValidationError {
                message: "Font sizes must be positive".to_string(),
            });
        }
        if text.show_frame_count && text.frame_count_font_size == 0 {
            return Err(CompositionError::ValidationError {
                message: "frame_count_font_size must be positive".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&text.bg_opacity) {
            return Err(CompositionError::ValidationError {
                message: format!("bg_opacity must be within [0, 1], got {}", text.bg_opacity),
            });
        }

        let output = &self.output;
        if output.threads == 0 {
            return Err(CompositionError::ValidationError {
                message: "threads must be at least 1".to_string(),
            });
        }
        if let Some(fps) = output.fps {
            if !fps.is_finite() || fps <= 0.0 {
                return Err(CompositionError::ValidationError {
                    message: format!("fps must be positive, got {fps}"),
                });
            }
        }
        if !output.still_duration.is_finite() || output.still_duration <= 0.0 {
            return Err(CompositionError::ValidationError {
                message: "still_duration must be positive".to_string(),
            });
        }
        if output.bitrate.trim().is_empty() || output.preset.trim().is_empty() {
            return Err(CompositionError::ValidationError {
                message: "bitrate and preset must not be empty".to_string(),
            });
        }

        Ok(())
    }
}

impl LoadedComposition {
    /// Load and validate a composition file.
    pub fn load(config_path: impl AsRef<Path>) -> Result<Self, CompositionError> {
        let config_path = config_path.as_ref().to_path_buf();

        let content =
            std::fs::read_to_string(&config_path).map_err(|e| CompositionError::IoError {
                path: config_path.clone(),
                source: e,
            })?;

        let config: CompositionConfig =
            toml::from_str(&content).map_err(|e| CompositionError::ParseError {
                path: config_path.clone(),
                message: e.to_string(),
            })?;
        config.validate()?;

        let base_dir = config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();

        Ok(Self {
            config_path,
            base_dir,
            config,
        })
    }

    /// Output path, resolved against the config directory when relative.
    pub fn output_path(&self) -> PathBuf {
        if self.config.output.path.is_absolute() {
            self.config.output.path.clone()
        } else {
            self.base_dir.join(&self.config.output.path)
        }
    }
}

/// Resolve a CLI argument to a config file.
///
/// A directory `foo/` maps to the sibling file `foo.toml`.
pub fn resolve_config_path(input: &Path) -> Result<PathBuf, CompositionError> {
    if input.is_dir() {
        let name = input
            .file_name()
            .ok_or_else(|| CompositionError::ValidationError {
                message: format!("Cannot derive a config name from {}", input.display()),
            })?;
        let config_path = input
            .parent()
            .unwrap_or_else(|| Path::new(""))
            .join(format!("{}.toml", name.to_string_lossy()));

        if !config_path.exists() {
            return Err(CompositionError::MissingConfig { path: config_path });
        }
        return Ok(config_path);
    }

    if !input.exists() {
        return Err(CompositionError::MissingConfig {
            path: input.to_path_buf(),
        });
    }
    Ok(input.to_path_buf())
}

/// Annotated starter configuration written by `vidstack init`.
pub const EXAMPLE_CONFIG: &str = r#"# Video composite configuration

# Output settings
[output]
path = "output_composite.mp4"
# fps = 24            # Optional: defaults to the first input's frame rate
preset = "ultrafast"  # ultrafast, superfast, veryfast, faster, fast, medium, slow, slower, veryslow
threads = 4           # Encoder threads
bitrate = "5000k"     # Video bitrate
# pad_mode = "clone"  # Extend shorter videos by freezing the last frame ("clone") or with black ("black")
# still_duration = 5.0  # Duration when every input is an image

# Text styling
[text]
heading_font_size = 60
subheading_font_size = 36
color = "white"
bg_color = [0, 0, 0]  # RGB
bg_opacity = 0.7
# font_file = "/usr/share/fonts/TTF/DejaVuSans.ttf"
# show_frame_count = false
# frame_count_font_size = 24
# Spacing and padding derive from heading_font_size:
#   line spacing = 50%, bottom padding = 60%, top padding = 30%

# Inputs, placed left to right. Images are detected by extension
# (.jpg, .png, ...) or forced with is_image = true.
[[videos]]
path = "video1.mp4"
heading = "First Video"
subheading = "Description for first video"

[[videos]]
path = "https://drive.google.com/file/d/FILE_ID/view"  # Share links are downloaded and cached for 24h
heading = "Second Video"
subheading = "Description for second video"
# frame_count = 240  # Optional: override the frame-count overlay

# Images listed here are appended after all [[videos]] entries.
# [[image]]
# path = "reference.jpg"
# heading = "Reference Image"
"#;

/// Write the example configuration, refusing to overwrite an existing file.
pub fn write_example_config(path: &Path) -> Result<(), CompositionError> {
    if path.exists() {
        return Err(CompositionError::ValidationError {
            message: format!("Refusing to overwrite existing file {}", path.display()),
        });
    }
    std::fs::write(path, EXAMPLE_CONFIG).map_err(|e| CompositionError::IoError {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Errors that can occur when loading a composition.
#[derive(Debug, thiserror::Error)]
pub enum CompositionError {
    #[error("I/O error at {path}: {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Parse error in {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("Configuration file not found: {path}")]
    MissingConfig { path: PathBuf },

    #[error("Invalid composition: {message}")]
    ValidationError { message: String },
}
