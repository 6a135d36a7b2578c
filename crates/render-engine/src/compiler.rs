//! Filtergraph compilation.
//!
//! Turns a [`LayoutPlan`] plus the per-input sources and descriptors into a
//! validated [`FilterChain`]. Each input gets its own fragment
//! (`[i:v]` -> `[v{i}]`), then a final fragment stacks them into `[vout]`.

use vidstack_common::error::{VidstackError, VidstackResult};
use vidstack_project_model::composition::PadMode;
use vidstack_project_model::layout::{LayoutPlan, VideoLayout};
use vidstack_project_model::media::{MediaDescriptor, VideoSource};
use vidstack_project_model::style::TextStyle;

use crate::escape::validate_text;
use crate::filter_graph::{DrawText, Filter, FilterChain, Fragment, PadLabel, TextX};

/// Label of the composed output pad.
pub const OUTPUT_LABEL: &str = "vout";

/// Offset of the frame-count label from the top-left corner.
const FRAME_COUNT_MARGIN: u32 = 10;

/// Compiles layouts into filter chains.
#[derive(Debug, Clone)]
pub struct FilterGraphCompiler {
    style: TextStyle,
    pad_mode: PadMode,
}

impl FilterGraphCompiler {
    pub fn new(style: TextStyle) -> Self {
        Self {
            style,
            pad_mode: PadMode::default(),
        }
    }

    pub fn with_pad_mode(mut self, pad_mode: PadMode) -> Self {
        self.pad_mode = pad_mode;
        self
    }

    pub fn style(&self) -> &TextStyle {
        &self.style
    }

    /// Compile one fragment per source plus the final stack.
    ///
    /// Fails before building anything if the three inputs disagree in
    /// length, or if any overlay text cannot be escaped.
    pub fn compile(
        &self,
        sources: &[VideoSource],
        descriptors: &[MediaDescriptor],
        plan: &LayoutPlan,
    ) -> VidstackResult<FilterChain> {
        if sources.len() != descriptors.len() {
            return Err(VidstackError::plan_mismatch(format!(
                "{} sources but {} descriptors",
                sources.len(),
                descriptors.len()
            )));
        }
        if plan.videos.len() != sources.len() {
            return Err(VidstackError::plan_mismatch(format!(
                "Plan has {} videos but {} sources were given",
                plan.videos.len(),
                sources.len()
            )));
        }
        if sources.is_empty() {
            return Err(VidstackError::invalid_input(
                "Cannot compile a composition without inputs",
            ));
        }

        for source in sources {
            for text in [source.heading(), source.subheading()].into_iter().flatten() {
                validate_text(text)?;
            }
        }

        let mut fragments = Vec::with_capacity(sources.len() + 1);
        for (idx, ((source, descriptor), layout)) in sources
            .iter()
            .zip(descriptors)
            .zip(&plan.videos)
            .enumerate()
        {
            fragments.push(self.video_fragment(idx, source, descriptor, layout));
        }
        fragments.push(final_fragment(sources.len()));

        let chain = FilterChain::new(fragments);
        chain.validate()?;

        tracing::debug!(
            fragments = chain.fragments().len(),
            pad_mode = ?self.pad_mode,
            "Filter chain compiled"
        );

        Ok(chain)
    }

    fn video_fragment(
        &self,
        idx: usize,
        source: &VideoSource,
        descriptor: &MediaDescriptor,
        layout: &VideoLayout,
    ) -> Fragment {
        let mut fragment = Fragment::new(vec![PadLabel::Input(idx)], video_label(idx));

        fragment.push(Filter::Scale {
            width: layout.scaled_width,
            height: layout.scaled_height,
        });

        if layout.duration_pad > 0.0 {
            fragment.push(Filter::Pad {
                seconds: layout.duration_pad,
                mode: self.pad_mode,
            });
        }

        if source.has_text() {
            self.push_text_overlay(&mut fragment, source, layout);
        }

        if self.style.show_frame_count {
            self.push_frame_count(&mut fragment, source, descriptor);
        }

        fragment
    }

    fn push_text_overlay(
        &self,
        fragment: &mut Fragment,
        source: &VideoSource,
        layout: &VideoLayout,
    ) {
        let style = &self.style;
        let box_height = style.box_height().min(layout.scaled_height);
        let box_y = layout.scaled_height - box_height;

        fragment.push(Filter::DrawBox {
            x: 0,
            y: box_y,
            width: layout.scaled_width,
            height: box_height,
            color: style.bg_color,
            opacity: style.opacity(),
        });

        if let Some(heading) = source.heading() {
            fragment.push(Filter::DrawText(DrawText {
                text: heading.to_string(),
                font_size: style.heading_font_size,
                color: style.color.clone(),
                font_file: style.font_file.clone(),
                x: TextX::Centered,
                y: box_y + style.top_padding(),
            }));
        }

        if let Some(subheading) = source.subheading() {
            let y = layout
                .scaled_height
                .saturating_sub(style.vertical_padding() + style.subheading_font_size);
            fragment.push(Filter::DrawText(DrawText {
                text: subheading.to_string(),
                font_size: style.subheading_font_size,
                color: style.color.clone(),
                font_file: style.font_file.clone(),
                x: TextX::Centered,
                y,
            }));
        }
    }

    fn push_frame_count(
        &self,
        fragment: &mut Fragment,
        source: &VideoSource,
        descriptor: &MediaDescriptor,
    ) {
        let style = &self.style;
        let size = style.frame_count_font_size;
        let frames = source
            .frame_count_override
            .unwrap_or_else(|| descriptor.effective_frame_count());

        fragment.push(Filter::DrawBox {
            x: 0,
            y: 0,
            width: size * 4,
            height: (size as f64 * 1.5) as u32,
            color: style.bg_color,
            opacity: style.opacity(),
        });
        fragment.push(Filter::DrawText(DrawText {
            text: format!("Frames: {frames}"),
            font_size: size,
            color: style.color.clone(),
            font_file: style.font_file.clone(),
            x: TextX::Left(FRAME_COUNT_MARGIN),
            y: FRAME_COUNT_MARGIN,
        }));
    }
}

/// Compile with the default pad mode.
pub fn compile(
    sources: &[VideoSource],
    descriptors: &[MediaDescriptor],
    plan: &LayoutPlan,
    style: &TextStyle,
) -> VidstackResult<FilterChain> {
    FilterGraphCompiler::new(style.clone()).compile(sources, descriptors, plan)
}

fn video_label(idx: usize) -> PadLabel {
    PadLabel::named(format!("v{idx}"))
}

fn final_fragment(count: usize) -> Fragment {
    let inputs = (0..count).map(video_label).collect();
    let mut fragment = Fragment::new(inputs, PadLabel::named(OUTPUT_LABEL));
    if count == 1 {
        fragment.push(Filter::Passthrough);
    } else {
        fragment.push(Filter::Stack { inputs: count });
    }
    fragment
}

#[cfg(test)]
mod tests {
    use super::*;
    use vidstack_layout_planner::plan;

    fn two_inputs() -> (Vec<VideoSource>, Vec<MediaDescriptor>) {
        let sources = vec![
            VideoSource::new("a.mp4")
                .with_heading("First")
                .with_subheading("Take: 1"),
            VideoSource::new("b.mp4"),
        ];
        let descriptors = vec![
            MediaDescriptor::new(1920, 1080, 10.0, 30.0),
            MediaDescriptor::new(1280, 720, 6.0, 25.0),
        ];
        (sources, descriptors)
    }

    #[test]
    fn test_two_video_graph() {
        let (sources, descriptors) = two_inputs();
        let layout = plan(&descriptors, None).unwrap();
        let graph = compile(&sources, &descriptors, &layout, &TextStyle::default())
            .unwrap()
            .to_filter_graph()
            .unwrap();

        // Box: 18 + 60 + 30 + 36 + 36 = 180 tall, top at 900.
        let expected = [
            "[0:v]scale=1920:1080:flags=lanczos,setsar=1,\
             drawbox=x=0:y=900:w=1920:h=180:color=0x000000@0.7:t=fill,\
             drawtext=text=First:fontsize=60:fontcolor=white:x=(w-text_w)/2:y=918,\
             drawtext=text=Take\\\\: 1:fontsize=36:fontcolor=white:x=(w-text_w)/2:y=1008[v0]",
            "[1:v]scale=1920:1080:flags=lanczos,setsar=1,\
             tpad=stop_mode=clone:stop_duration=4.000000[v1]",
            "[v0][v1]hstack=inputs=2[vout]",
        ]
        .join(";");
        assert_eq!(graph, expected);
    }

    #[test]
    fn test_single_video_uses_passthrough() {
        let sources = vec![VideoSource::new("only.mp4")];
        let descriptors = vec![MediaDescriptor::new(1280, 720, 3.0, 24.0)];
        let layout = plan(&descriptors, None).unwrap();
        let chain = compile(&sources, &descriptors, &layout, &TextStyle::default()).unwrap();

        assert_eq!(chain.fragments().len(), 2);
        assert_eq!(
            chain.to_filter_graph().unwrap(),
            "[0:v]scale=1280:720:flags=lanczos,setsar=1[v0];[v0]null[vout]"
        );
    }

    #[test]
    fn test_black_pad_mode() {
        let (sources, descriptors) = two_inputs();
        let layout = plan(&descriptors, None).unwrap();
        let graph = FilterGraphCompiler::new(TextStyle::default())
            .with_pad_mode(PadMode::Black)
            .compile(&sources, &descriptors, &layout)
            .unwrap()
            .to_filter_graph()
            .unwrap();
        assert!(graph.contains("tpad=stop_mode=add:stop_duration=4.000000:color=black[v1]"));
    }

    #[test]
    fn test_subheading_only_still_gets_box() {
        let sources = vec![VideoSource::new("a.mp4").with_subheading("caption")];
        let descriptors = vec![MediaDescriptor::new(1920, 1080, 1.0, 30.0)];
        let layout = plan(&descriptors, None).unwrap();
        let chain = compile(&sources, &descriptors, &layout, &TextStyle::default()).unwrap();

        let filters = &chain.fragments()[0].filters;
        assert_eq!(filters.len(), 3);
        assert_eq!(filters[1].name(), "drawbox");
        assert_eq!(filters[2].name(), "drawtext");
    }

    #[test]
    fn test_box_is_clamped_to_short_frames() {
        let sources = vec![VideoSource::new("tiny.mp4").with_heading("Tiny")];
        let descriptors = vec![MediaDescriptor::new(160, 90, 1.0, 30.0)];
        let layout = plan(&descriptors, None).unwrap();
        let chain = compile(&sources, &descriptors, &layout, &TextStyle::default()).unwrap();

        match &chain.fragments()[0].filters[1] {
            Filter::DrawBox { y, height, .. } => {
                assert_eq!(*y, 0);
                assert_eq!(*height, 90);
            }
            other => panic!("expected drawbox, got {other:?}"),
        }
    }

    #[test]
    fn test_frame_count_overlay() {
        let mut source = VideoSource::new("a.mp4");
        source.frame_count_override = Some(1234);
        let sources = vec![source, VideoSource::new("b.mp4")];
        let mut descriptors = vec![
            MediaDescriptor::new(1920, 1080, 10.0, 30.0),
            MediaDescriptor::new(1920, 1080, 2.0, 30.0),
        ];
        descriptors[1].frame_count = Some(61);
        let layout = plan(&descriptors, None).unwrap();
        let style = TextStyle {
            show_frame_count: true,
            ..TextStyle::default()
        };
        let graph = compile(&sources, &descriptors, &layout, &style)
            .unwrap()
            .to_filter_graph()
            .unwrap();

        assert!(graph.contains("drawbox=x=0:y=0:w=96:h=36:color=0x000000@0.7:t=fill"));
        assert!(graph.contains("text=Frames\\\\: 1234:fontsize=24"));
        assert!(graph.contains("text=Frames\\\\: 61:fontsize=24"));
        assert!(graph.contains(":x=10:y=10"));
    }

    #[test]
    fn test_length_mismatch_is_rejected() {
        let (sources, descriptors) = two_inputs();
        let layout = plan(&descriptors, None).unwrap();

        assert!(matches!(
            compile(&sources[..1], &descriptors, &layout, &TextStyle::default()),
            Err(VidstackError::PlanMismatch { .. })
        ));

        let short_plan = plan(&descriptors[..1], None).unwrap();
        assert!(matches!(
            compile(&sources, &descriptors, &short_plan, &TextStyle::default()),
            Err(VidstackError::PlanMismatch { .. })
        ));
    }

    #[test]
    fn test_unrepresentable_text_is_rejected() {
        let sources = vec![VideoSource::new("a.mp4").with_heading("two\nlines")];
        let descriptors = vec![MediaDescriptor::new(640, 480, 1.0, 30.0)];
        let layout = plan(&descriptors, None).unwrap();
        assert!(matches!(
            compile(&sources, &descriptors, &layout, &TextStyle::default()),
            Err(VidstackError::Escape { .. })
        ));
    }
}
