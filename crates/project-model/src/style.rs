//! Text overlay styling.
//!
//! Spacing and padding are derived from the heading font size on demand so
//! they can never drift out of sync with it.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// An RGB color, serialized as a `[r, g, b]` array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const BLACK: Rgb = Rgb(0, 0, 0);

    /// ffmpeg color syntax (`0xRRGGBB`).
    pub fn to_hex(self) -> String {
        format!("0x{:02X}{:02X}{:02X}", self.0, self.1, self.2)
    }
}

/// Styling applied to every heading/subheading overlay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextStyle {
    /// Heading font size in pixels.
    pub heading_font_size: u32,

    /// Subheading font size in pixels.
    pub subheading_font_size: u32,

    /// Text color, any ffmpeg color name or `0xRRGGBB`.
    pub color: String,

    /// Background box color.
    pub bg_color: Rgb,

    /// Background box opacity in `[0.0, 1.0]`.
    pub bg_opacity: f64,

    /// Optional font file for drawtext; fontconfig default otherwise.
    pub font_file: Option<PathBuf>,

    /// Draw a `Frames: N` label in the top-left corner of each video.
    pub show_frame_count: bool,

    /// Font size of the frame-count label.
    pub frame_count_font_size: u32,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            heading_font_size: 60,
            subheading_font_size: 36,
            color: "white".to_string(),
            bg_color: Rgb::BLACK,
            bg_opacity: 0.7,
            font_file: None,
            show_frame_count: false,
            frame_count_font_size: 24,
        }
    }
}

impl TextStyle {
    /// Gap between the heading and the subheading.
    pub fn spacing(&self) -> u32 {
        self.heading_font_size / 2
    }

    /// Padding below the subheading.
    pub fn vertical_padding(&self) -> u32 {
        (self.heading_font_size as f64 * 0.6) as u32
    }

    /// Padding above the heading.
    pub fn top_padding(&self) -> u32 {
        (self.heading_font_size as f64 * 0.3) as u32
    }

    /// Height of the background box holding both text lines.
    pub fn box_height(&self) -> u32 {
        self.top_padding()
            + self.heading_font_size
            + self.spacing()
            + self.subheading_font_size
            + self.vertical_padding()
    }

    /// Background opacity clamped to `[0.0, 1.0]`.
    pub fn opacity(&self) -> f64 {
        self.bg_opacity.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_metrics_follow_heading_size() {
        let style = TextStyle::default();
        assert_eq!(style.spacing(), 30);
        assert_eq!(style.vertical_padding(), 36);
        assert_eq!(style.top_padding(), 18);
        assert_eq!(style.box_height(), 18 + 60 + 30 + 36 + 36);

        let larger = TextStyle {
            heading_font_size: 100,
            ..TextStyle::default()
        };
        assert_eq!(larger.spacing(), 50);
        assert_eq!(larger.vertical_padding(), 60);
        assert_eq!(larger.top_padding(), 30);
    }

    #[test]
    fn test_odd_heading_sizes_truncate() {
        let style = TextStyle {
            heading_font_size: 45,
            ..TextStyle::default()
        };
        assert_eq!(style.spacing(), 22);
        assert_eq!(style.vertical_padding(), 27);
        assert_eq!(style.top_padding(), 13);
    }

    #[test]
    fn test_rgb_hex() {
        assert_eq!(Rgb(0, 0, 0).to_hex(), "0x000000");
        assert_eq!(Rgb(255, 16, 1).to_hex(), "0xFF1001");
    }

    #[test]
    fn test_opacity_clamped() {
        let style = TextStyle {
            bg_opacity: 1.5,
            ..TextStyle::default()
        };
        assert!((style.opacity() - 1.0).abs() < 1e-9);
    }
}
