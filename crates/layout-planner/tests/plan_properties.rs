use proptest::prelude::*;

use vidstack_layout_planner::plan;
use vidstack_project_model::media::MediaDescriptor;

fn descriptor() -> impl Strategy<Value = MediaDescriptor> {
    (16u32..=4096, 16u32..=4096, 0.1f64..600.0, 1.0f64..120.0).prop_map(
        |(width, height, duration, fps)| MediaDescriptor::new(width, height, duration, fps),
    )
}

proptest! {
    #[test]
    fn canvas_height_is_max_input_height(descriptors in prop::collection::vec(descriptor(), 1..8)) {
        let plan = plan(&descriptors, None).unwrap();
        let max_height = descriptors.iter().map(|d| d.height).max().unwrap();

        prop_assert_eq!(plan.canvas_height, max_height);
        for video in &plan.videos {
            prop_assert_eq!(video.scaled_height, max_height);
        }
    }

    #[test]
    fn widths_are_even_and_preserve_aspect(descriptors in prop::collection::vec(descriptor(), 1..8)) {
        let plan = plan(&descriptors, None).unwrap();

        for (d, video) in descriptors.iter().zip(&plan.videos) {
            let exact = d.width as f64 * plan.canvas_height as f64 / d.height as f64;
            prop_assert_eq!(video.scaled_width % 2, 0);
            // Nearest rounding (<= 0.5) plus at most one step up to even.
            prop_assert!((video.scaled_width as f64 - exact).abs() <= 1.5 || video.scaled_width == 2);
        }
    }

    #[test]
    fn canvas_width_is_sum_in_order(descriptors in prop::collection::vec(descriptor(), 1..8)) {
        let plan = plan(&descriptors, None).unwrap();
        let sum: u32 = plan.videos.iter().map(|v| v.scaled_width).sum();
        prop_assert_eq!(plan.canvas_width, sum);

        let mut reversed = descriptors.clone();
        reversed.reverse();
        let reversed_plan = plan_of(&reversed);
        prop_assert_eq!(reversed_plan.canvas_width, plan.canvas_width);

        let forward: Vec<u32> = plan.videos.iter().map(|v| v.scaled_width).collect();
        let mut backward: Vec<u32> = reversed_plan.videos.iter().map(|v| v.scaled_width).collect();
        backward.reverse();
        prop_assert_eq!(forward, backward);
    }

    #[test]
    fn duration_pads_reach_canvas_duration(descriptors in prop::collection::vec(descriptor(), 1..8)) {
        let plan = plan(&descriptors, None).unwrap();
        let max_duration = descriptors.iter().map(|d| d.duration).fold(0.0, f64::max);

        prop_assert!((plan.canvas_duration - max_duration).abs() < 1e-9);
        for (d, video) in descriptors.iter().zip(&plan.videos) {
            prop_assert!(video.duration_pad >= 0.0);
            prop_assert!((d.duration + video.duration_pad - plan.canvas_duration).abs() < 1e-9);
        }
    }

    #[test]
    fn output_rate_defaults_to_first_input(descriptors in prop::collection::vec(descriptor(), 1..8)) {
        let plan = plan(&descriptors, None).unwrap();
        prop_assert!((plan.output_frame_rate - descriptors[0].frame_rate).abs() < 1e-12);
    }
}

fn plan_of(descriptors: &[MediaDescriptor]) -> vidstack_project_model::layout::LayoutPlan {
    plan(descriptors, None).expect("valid descriptors should plan")
}

#[test]
fn reordering_changes_placement_not_width() {
    let wide = MediaDescriptor::new(1920, 1080, 10.0, 30.0);
    let narrow = MediaDescriptor::new(608, 1080, 8.0, 30.0);

    let ab = plan_of(&[wide, narrow]);
    let ba = plan_of(&[narrow, wide]);

    assert_eq!(ab.canvas_width, ba.canvas_width);
    assert_eq!(ab.x_offsets(), vec![0, 1920]);
    assert_eq!(ba.x_offsets(), vec![0, 608]);
    assert_ne!(ab.x_offsets(), ba.x_offsets());
}
