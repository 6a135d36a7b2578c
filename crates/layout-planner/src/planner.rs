//! Canvas planning.
//!
//! The canvas is as tall as the tallest input and as wide as the sum of all
//! scaled inputs. Input order is placement order, left to right.

use vidstack_common::error::{VidstackError, VidstackResult};
use vidstack_project_model::layout::{LayoutPlan, VideoLayout};
use vidstack_project_model::media::MediaDescriptor;

/// Plan the canvas for `descriptors`, in placement order.
///
/// `explicit_fps` wins when it is positive; otherwise the first input's
/// frame rate is used.
pub fn plan(
    descriptors: &[MediaDescriptor],
    explicit_fps: Option<f64>,
) -> VidstackResult<LayoutPlan> {
    if descriptors.is_empty() {
        return Err(VidstackError::invalid_input(
            "Cannot plan a composition without inputs",
        ));
    }

    for (idx, descriptor) in descriptors.iter().enumerate() {
        validate_descriptor(idx, descriptor)?;
    }

    let canvas_height = descriptors
        .iter()
        .map(|d| d.height)
        .max()
        .unwrap_or_default();

    let canvas_duration = descriptors
        .iter()
        .map(|d| d.duration)
        .fold(0.0f64, f64::max);

    let videos = descriptors
        .iter()
        .enumerate()
        .map(|(idx, d)| {
            let width = scaled_width(d.width, d.height, canvas_height).ok_or_else(|| {
                VidstackError::invalid_input(format!(
                    "Input {} is too wide to scale to height {canvas_height}",
                    idx + 1
                ))
            })?;
            Ok(VideoLayout {
                scaled_width: width,
                scaled_height: canvas_height,
                duration_pad: (canvas_duration - d.duration).max(0.0),
            })
        })
        .collect::<VidstackResult<Vec<VideoLayout>>>()?;

    let canvas_width = videos
        .iter()
        .try_fold(0u32, |total, v| total.checked_add(v.scaled_width))
        .ok_or_else(|| {
            VidstackError::invalid_input("Combined canvas width exceeds the supported maximum")
        })?;

    let output_frame_rate = match explicit_fps {
        Some(fps) if fps.is_finite() && fps > 0.0 => fps,
        _ => descriptors[0].frame_rate,
    };

    tracing::debug!(
        inputs = descriptors.len(),
        canvas_width,
        canvas_height,
        canvas_duration,
        output_frame_rate,
        "Layout planned"
    );

    Ok(LayoutPlan {
        videos,
        canvas_width,
        canvas_height,
        canvas_duration,
        output_frame_rate,
    })
}

/// Width of a `width`x`height` input scaled to `target_height`.
///
/// Rounds to the nearest pixel, then bumps odd results up to the next even
/// value since yuv420p encoders reject odd dimensions. `None` when the even
/// width does not fit in a `u32`.
pub fn scaled_width(width: u32, height: u32, target_height: u32) -> Option<u32> {
    let exact = (width as f64 * target_height as f64 / height as f64).round();
    if !exact.is_finite() || exact > (u32::MAX - 1) as f64 {
        return None;
    }
    let rounded = exact as u32;
    let even = if rounded % 2 == 1 { rounded + 1 } else { rounded };
    Some(even.max(2))
}

fn validate_descriptor(idx: usize, descriptor: &MediaDescriptor) -> VidstackResult<()> {
    if descriptor.width == 0 || descriptor.height == 0 {
        return Err(VidstackError::invalid_input(format!(
            "Input {} has zero-sized dimensions {}x{}",
            idx + 1,
            descriptor.width,
            descriptor.height
        )));
    }
    if !descriptor.duration.is_finite() || descriptor.duration <= 0.0 {
        return Err(VidstackError::invalid_input(format!(
            "Input {} has non-positive duration {}",
            idx + 1,
            descriptor.duration
        )));
    }
    if !descriptor.frame_rate.is_finite() || descriptor.frame_rate <= 0.0 {
        return Err(VidstackError::invalid_input(format!(
            "Input {} has non-positive frame rate {}",
            idx + 1,
            descriptor.frame_rate
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_video_scenario() {
        let descriptors = vec![
            MediaDescriptor::new(1920, 1080, 10.0, 30.0),
            MediaDescriptor::new(1280, 720, 6.0, 25.0),
        ];
        let plan = plan(&descriptors, None).unwrap();

        assert_eq!(plan.canvas_height, 1080);
        assert_eq!(plan.videos[0].scaled_width, 1920);
        assert_eq!(plan.videos[1].scaled_width, 1920);
        assert_eq!(plan.videos[1].scaled_height, 1080);
        assert_eq!(plan.canvas_width, 3840);
        assert!((plan.canvas_duration - 10.0).abs() < 1e-9);
        assert!(plan.videos[0].duration_pad.abs() < 1e-9);
        assert!((plan.videos[1].duration_pad - 4.0).abs() < 1e-9);
        assert!((plan.output_frame_rate - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_portrait_input_gets_even_width() {
        // 1080 * 1080 / 1920 = 607.5 -> 608
        assert_eq!(scaled_width(1080, 1920, 1080), Some(608));
        // 720 * 1080 / 1280 = 607.5 -> 608
        assert_eq!(scaled_width(720, 1280, 1080), Some(608));
        // 640 * 1080 / 481 = 1437.0 -> 1437 -> 1438
        assert_eq!(scaled_width(640, 481, 1080), Some(1438));
    }

    #[test]
    fn test_oversized_scaled_width_is_rejected() {
        // 4e9 * 4 / 2 does not fit in u32
        let descriptors = [
            MediaDescriptor::new(4_000_000_000, 2, 1.0, 30.0),
            MediaDescriptor::new(2, 4, 1.0, 30.0),
        ];
        assert!(matches!(
            plan(&descriptors, None),
            Err(VidstackError::InvalidInput { .. })
        ));
        assert_eq!(scaled_width(u32::MAX, 1, 1), None);
        assert_eq!(scaled_width(u32::MAX - 1, 1, 1), Some(u32::MAX - 1));
    }

    #[test]
    fn test_canvas_width_overflow_is_rejected() {
        let wide = MediaDescriptor::new(3_000_000_000, 1000, 1.0, 30.0);
        assert!(matches!(
            plan(&[wide, wide], None),
            Err(VidstackError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_single_video_is_its_own_canvas() {
        let plan = plan(&[MediaDescriptor::new(1280, 720, 3.5, 24.0)], None).unwrap();
        assert_eq!(plan.len(), 1);
        assert_eq!(plan.canvas_width, 1280);
        assert_eq!(plan.canvas_height, 720);
        assert!((plan.canvas_duration - 3.5).abs() < 1e-9);
        assert!(plan.videos[0].duration_pad.abs() < 1e-9);
    }

    #[test]
    fn test_explicit_fps_overrides_first_input() {
        let descriptors = [MediaDescriptor::new(640, 480, 1.0, 29.97)];
        assert!((plan(&descriptors, Some(60.0)).unwrap().output_frame_rate - 60.0).abs() < 1e-9);
        assert!((plan(&descriptors, Some(0.0)).unwrap().output_frame_rate - 29.97).abs() < 1e-9);
        assert!((plan(&descriptors, None).unwrap().output_frame_rate - 29.97).abs() < 1e-9);
    }

    #[test]
    fn test_empty_input_is_rejected() {
        assert!(matches!(
            plan(&[], None),
            Err(VidstackError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_zero_sized_or_zero_duration_rejected() {
        let good = MediaDescriptor::new(1920, 1080, 10.0, 30.0);
        for bad in [
            MediaDescriptor::new(0, 1080, 10.0, 30.0),
            MediaDescriptor::new(1920, 0, 10.0, 30.0),
            MediaDescriptor::new(1920, 1080, 0.0, 30.0),
            MediaDescriptor::new(1920, 1080, f64::NAN, 30.0),
            MediaDescriptor::new(1920, 1080, 10.0, 0.0),
        ] {
            let result = plan(&[good, bad], None);
            assert!(
                matches!(result, Err(VidstackError::InvalidInput { .. })),
                "expected InvalidInput for {bad:?}"
            );
        }
    }
}
