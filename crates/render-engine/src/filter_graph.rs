//! Typed filtergraph representation.
//!
//! Fragments are built as data and only turned into ffmpeg syntax by
//! [`FilterChain::to_filter_graph`], which is the single place values are
//! formatted and escaped.

use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;

use vidstack_common::error::{VidstackError, VidstackResult};
use vidstack_project_model::composition::PadMode;
use vidstack_project_model::style::Rgb;

use crate::escape::{escape_drawtext, escape_option_value};

/// A labeled pad in the graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PadLabel {
    /// Video stream of the i-th encoder input (`[i:v]`).
    Input(usize),
    /// An intermediate or final pad produced by a fragment.
    Named(String),
}

impl PadLabel {
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }
}

impl fmt::Display for PadLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Input(idx) => write!(f, "[{idx}:v]"),
            Self::Named(name) => write!(f, "[{name}]"),
        }
    }
}

/// Horizontal text placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextX {
    /// Centered within the frame width.
    Centered,
    /// Fixed offset from the left edge.
    Left(u32),
}

/// One drawtext operation.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawText {
    pub text: String,
    pub font_size: u32,
    pub color: String,
    pub font_file: Option<PathBuf>,
    pub x: TextX,
    pub y: u32,
}

/// A single filter inside a fragment.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Resize to an exact size and reset the sample aspect ratio.
    Scale { width: u32, height: u32 },
    /// Extend the stream by `seconds` at its end.
    Pad { seconds: f64, mode: PadMode },
    /// Filled rectangle.
    DrawBox {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        color: Rgb,
        opacity: f64,
    },
    DrawText(DrawText),
    /// Horizontal concatenation of all fragment inputs, left to right.
    Stack { inputs: usize },
    /// Forward the input unchanged.
    Passthrough,
}

impl Filter {
    /// The ffmpeg filter name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Scale { .. } => "scale",
            Self::Pad { .. } => "tpad",
            Self::DrawBox { .. } => "drawbox",
            Self::DrawText(_) => "drawtext",
            Self::Stack { .. } => "hstack",
            Self::Passthrough => "null",
        }
    }

    fn to_filter_string(&self) -> VidstackResult<String> {
        let rendered = match self {
            Self::Scale { width, height } => {
                format!("scale={width}:{height}:flags=lanczos,setsar=1")
            }
            Self::Pad { seconds, mode } => match mode {
                PadMode::Clone => format!("tpad=stop_mode=clone:stop_duration={seconds:.6}"),
                PadMode::Black => {
                    format!("tpad=stop_mode=add:stop_duration={seconds:.6}:color=black")
                }
            },
            Self::DrawBox {
                x,
                y,
                width,
                height,
                color,
                opacity,
            } => format!(
                "drawbox=x={x}:y={y}:w={width}:h={height}:color={color}@{opacity}:t=fill",
                color = color.to_hex(),
                opacity = opacity.clamp(0.0, 1.0),
            ),
            Self::DrawText(text) => {
                let mut options = Vec::with_capacity(6);
                if let Some(font_file) = &text.font_file {
                    options.push(format!(
                        "fontfile={}",
                        escape_option_value(&font_file.to_string_lossy())
                    ));
                }
                options.push(format!("text={}", escape_drawtext(&text.text)?));
                options.push(format!("fontsize={}", text.font_size));
                options.push(format!("fontcolor={}", escape_option_value(&text.color)));
                options.push(match text.x {
                    TextX::Centered => "x=(w-text_w)/2".to_string(),
                    TextX::Left(x) => format!("x={x}"),
                });
                options.push(format!("y={}", text.y));
                format!("drawtext={}", options.join(":"))
            }
            Self::Stack { inputs } => format!("hstack=inputs={inputs}"),
            Self::Passthrough => "null".to_string(),
        };
        Ok(rendered)
    }
}

/// A linear filter chain reading labeled pads and writing one labeled pad.
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    pub inputs: Vec<PadLabel>,
    pub filters: Vec<Filter>,
    pub output: PadLabel,
}

impl Fragment {
    pub fn new(inputs: Vec<PadLabel>, output: PadLabel) -> Self {
        Self {
            inputs,
            filters: Vec::new(),
            output,
        }
    }

    pub fn push(&mut self, filter: Filter) {
        self.filters.push(filter);
    }

    /// This fragment alone, labels included.
    pub fn to_graph_string(&self) -> VidstackResult<String> {
        let inputs: String = self.inputs.iter().map(ToString::to_string).collect();
        let filters = self
            .filters
            .iter()
            .map(Filter::to_filter_string)
            .collect::<VidstackResult<Vec<_>>>()?;
        Ok(format!("{inputs}{}{}", filters.join(","), self.output))
    }
}

/// The complete, ordered filtergraph.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FilterChain {
    fragments: Vec<Fragment>,
}

impl FilterChain {
    pub fn new(fragments: Vec<Fragment>) -> Self {
        Self { fragments }
    }

    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    /// The pad holding the composed result.
    pub fn output_label(&self) -> Option<&PadLabel> {
        self.fragments.last().map(|f| &f.output)
    }

    /// Check pad wiring: every named input is produced earlier and consumed
    /// once, every output is new, and only the last output is left dangling.
    pub fn validate(&self) -> VidstackResult<()> {
        if self.fragments.is_empty() {
            return Err(VidstackError::plan_mismatch("Filter chain has no fragments"));
        }

        let mut produced: HashSet<&PadLabel> = HashSet::new();
        let mut consumed: HashSet<&PadLabel> = HashSet::new();

        for (idx, fragment) in self.fragments.iter().enumerate() {
            if fragment.filters.is_empty() {
                return Err(VidstackError::plan_mismatch(format!(
                    "Fragment {idx} has no filters"
                )));
            }
            if fragment.inputs.is_empty() {
                return Err(VidstackError::plan_mismatch(format!(
                    "Fragment {idx} reads no pads"
                )));
            }

            for input in &fragment.inputs {
                if let PadLabel::Named(_) = input {
                    if !produced.contains(input) {
                        return Err(VidstackError::plan_mismatch(format!(
                            "Fragment {idx} reads {input} before it is produced"
                        )));
                    }
                }
                if !consumed.insert(input) {
                    return Err(VidstackError::plan_mismatch(format!(
                        "Pad {input} is consumed more than once"
                    )));
                }
            }

            match &fragment.output {
                PadLabel::Input(_) => {
                    return Err(VidstackError::plan_mismatch(format!(
                        "Fragment {idx} writes to an input pad"
                    )));
                }
                output => {
                    if !produced.insert(output) {
                        return Err(VidstackError::plan_mismatch(format!(
                            "Pad {output} is produced more than once"
                        )));
                    }
                }
            }
        }

        let dangling: Vec<&PadLabel> = produced
            .iter()
            .copied()
            .filter(|label| !consumed.contains(label))
            .collect();
        if dangling.len() != 1 || Some(dangling[0]) != self.output_label() {
            return Err(VidstackError::plan_mismatch(format!(
                "Filter chain must end in exactly one unconsumed pad, found {}",
                dangling.len()
            )));
        }

        Ok(())
    }

    /// Serialize to `-filter_complex` syntax.
    pub fn to_filter_graph(&self) -> VidstackResult<String> {
        self.validate()?;
        let fragments = self
            .fragments
            .iter()
            .map(Fragment::to_graph_string)
            .collect::<VidstackResult<Vec<_>>>()?;
        Ok(fragments.join(";"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scale_fragment(idx: usize, width: u32) -> Fragment {
        let mut fragment = Fragment::new(
            vec![PadLabel::Input(idx)],
            PadLabel::named(format!("v{idx}")),
        );
        fragment.push(Filter::Scale {
            width,
            height: 1080,
        });
        fragment
    }

    fn stack(count: usize) -> Fragment {
        let mut fragment = Fragment::new(
            (0..count).map(|i| PadLabel::named(format!("v{i}"))).collect(),
            PadLabel::named("vout"),
        );
        fragment.push(Filter::Stack { inputs: count });
        fragment
    }

    #[test]
    fn test_serializes_fragments_in_order() {
        let chain = FilterChain::new(vec![
            scale_fragment(0, 1920),
            scale_fragment(1, 608),
            stack(2),
        ]);
        assert_eq!(
            chain.to_filter_graph().unwrap(),
            "[0:v]scale=1920:1080:flags=lanczos,setsar=1[v0];\
             [1:v]scale=608:1080:flags=lanczos,setsar=1[v1];\
             [v0][v1]hstack=inputs=2[vout]"
        );
        assert_eq!(chain.output_label(), Some(&PadLabel::named("vout")));
    }

    #[test]
    fn test_filter_syntax() {
        assert_eq!(
            Filter::Pad {
                seconds: 4.0,
                mode: PadMode::Clone
            }
            .to_filter_string()
            .unwrap(),
            "tpad=stop_mode=clone:stop_duration=4.000000"
        );
        assert_eq!(
            Filter::Pad {
                seconds: 1.5,
                mode: PadMode::Black
            }
            .to_filter_string()
            .unwrap(),
            "tpad=stop_mode=add:stop_duration=1.500000:color=black"
        );
        assert_eq!(
            Filter::DrawBox {
                x: 0,
                y: 900,
                width: 1920,
                height: 180,
                color: Rgb(0, 0, 0),
                opacity: 0.7,
            }
            .to_filter_string()
            .unwrap(),
            "drawbox=x=0:y=900:w=1920:h=180:color=0x000000@0.7:t=fill"
        );
        assert_eq!(
            Filter::DrawText(DrawText {
                text: "Take 2: final".to_string(),
                font_size: 60,
                color: "white".to_string(),
                font_file: None,
                x: TextX::Centered,
                y: 918,
            })
            .to_filter_string()
            .unwrap(),
            r"drawtext=text=Take 2\\: final:fontsize=60:fontcolor=white:x=(w-text_w)/2:y=918"
        );
        assert_eq!(Filter::Passthrough.to_filter_string().unwrap(), "null");
    }

    #[test]
    fn test_font_file_is_escaped() {
        let rendered = Filter::DrawText(DrawText {
            text: "A".to_string(),
            font_size: 10,
            color: "white".to_string(),
            font_file: Some(PathBuf::from("C:/Fonts/arial.ttf")),
            x: TextX::Left(10),
            y: 10,
        })
        .to_filter_string()
        .unwrap();
        assert!(rendered.starts_with(r"drawtext=fontfile=C\\:/Fonts/arial.ttf:text=A"));
        assert!(rendered.contains(":x=10:y=10"));
    }

    #[test]
    fn test_rejects_use_before_production() {
        let chain = FilterChain::new(vec![stack(2), scale_fragment(0, 10), scale_fragment(1, 10)]);
        assert!(matches!(
            chain.validate(),
            Err(VidstackError::PlanMismatch { .. })
        ));
    }

    #[test]
    fn test_rejects_dangling_pads() {
        let chain = FilterChain::new(vec![scale_fragment(0, 10), scale_fragment(1, 10)]);
        assert!(chain.validate().is_err());
    }

    #[test]
    fn test_rejects_double_consumption() {
        let mut reuse = Fragment::new(
            vec![PadLabel::named("v0"), PadLabel::named("v0")],
            PadLabel::named("vout"),
        );
        reuse.push(Filter::Stack { inputs: 2 });
        let chain = FilterChain::new(vec![scale_fragment(0, 10), reuse]);
        assert!(chain.validate().is_err());
    }

    #[test]
    fn test_rejects_empty_chain() {
        assert!(FilterChain::default().to_filter_graph().is_err());
    }
}
