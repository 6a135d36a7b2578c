//! Input media types: resolved sources and their probed descriptors.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// File extensions treated as still images when `is_image` is not set.
pub const STILL_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "tiff", "webp"];

/// Whether an input is a moving video or a still image looped for the
/// whole canvas duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    #[default]
    Video,
    Still,
}

impl MediaKind {
    /// Guess the kind from a file extension.
    pub fn from_path(path: &Path) -> Self {
        let is_still = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                let ext = ext.to_ascii_lowercase();
                STILL_EXTENSIONS.contains(&ext.as_str())
            })
            .unwrap_or(false);

        if is_still {
            Self::Still
        } else {
            Self::Video
        }
    }
}

/// A fully resolved input: a local file plus its overlay text.
///
/// Remote links have already been fetched by the time a `VideoSource`
/// exists; the path is always local.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoSource {
    pub path: PathBuf,
    pub heading: Option<String>,
    pub subheading: Option<String>,
    pub kind: MediaKind,
    /// Manual frame count shown by the frame-count overlay.
    pub frame_count_override: Option<u64>,
}

impl VideoSource {
    /// A plain video source without overlay text.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let kind = MediaKind::from_path(&path);
        Self {
            path,
            heading: None,
            subheading: None,
            kind,
            frame_count_override: None,
        }
    }

    pub fn with_heading(mut self, heading: impl Into<String>) -> Self {
        self.heading = non_empty(heading.into());
        self
    }

    pub fn with_subheading(mut self, subheading: impl Into<String>) -> Self {
        self.subheading = non_empty(subheading.into());
        self
    }

    pub fn with_kind(mut self, kind: MediaKind) -> Self {
        self.kind = kind;
        self
    }

    /// Heading text, if present and non-empty.
    pub fn heading(&self) -> Option<&str> {
        self.heading.as_deref().filter(|s| !s.is_empty())
    }

    /// Subheading text, if present and non-empty.
    pub fn subheading(&self) -> Option<&str> {
        self.subheading.as_deref().filter(|s| !s.is_empty())
    }

    /// Whether any overlay text should be drawn.
    pub fn has_text(&self) -> bool {
        self.heading().is_some() || self.subheading().is_some()
    }

    pub fn is_still(&self) -> bool {
        self.kind == MediaKind::Still
    }
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

/// Probed properties of one input.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MediaDescriptor {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Duration in seconds.
    pub duration: f64,
    /// Frames per second.
    pub frame_rate: f64,
    /// Frame count reported by the container, if any.
    #[serde(default)]
    pub frame_count: Option<u64>,
}

impl MediaDescriptor {
    pub fn new(width: u32, height: u32, duration: f64, frame_rate: f64) -> Self {
        Self {
            width,
            height,
            duration,
            frame_rate,
            frame_count: None,
        }
    }

    /// Width divided by height.
    pub fn aspect_ratio(&self) -> f64 {
        self.width as f64 / self.height as f64
    }

    /// Reported frame count, or one derived from duration and rate.
    pub fn effective_frame_count(&self) -> u64 {
        self.frame_count
            .unwrap_or_else(|| (self.duration * self.frame_rate).max(0.0) as u64)
    }
}
