//! Layout plan: per-video placement plus global canvas geometry.

use serde::{Deserialize, Serialize};

/// Target geometry and duration extension for one input.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VideoLayout {
    pub scaled_width: u32,
    pub scaled_height: u32,
    /// Seconds appended so the stream reaches the canvas duration.
    pub duration_pad: f64,
}

/// The planned canvas. Videos are placed left to right in `videos` order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutPlan {
    pub videos: Vec<VideoLayout>,
    pub canvas_width: u32,
    pub canvas_height: u32,
    pub canvas_duration: f64,
    pub output_frame_rate: f64,
}

impl LayoutPlan {
    pub fn len(&self) -> usize {
        self.videos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.videos.is_empty()
    }

    /// Horizontal offset of each video's left edge on the canvas.
    pub fn x_offsets(&self) -> Vec<u32> {
        self.videos
            .iter()
            .scan(0u32, |x, video| {
                let left = *x;
                *x = x.saturating_add(video.scaled_width);
                Some(left)
            })
            .collect()
    }

    /// Total number of output frames at the output frame rate.
    pub fn total_frames(&self) -> u64 {
        (self.canvas_duration * self.output_frame_rate).ceil() as u64
    }
}
