//! vidstack Render Engine
//!
//! Compiles a planned canvas into an ffmpeg filtergraph and runs the
//! encoder on it.
//!
//! # Pipeline Architecture
//!
//! ```text
//! a.mp4 ──┐
//! b.mp4 ──┼── Probe (ffprobe, parallel)
//! c.png ──┘         │
//!                   ├── Resolve stills
//!                   ▼
//!              Layout plan
//!                   │
//!                   ▼
//!   [i:v] Scale ─ Pad ─ DrawBox ─ DrawText ─ [v{i}]
//!                   │
//!                   ▼
//!           hstack ─ [vout]
//!                   │
//!                   ▼
//!            Encode (H.264)
//!                   │
//!                   ▼
//!             composite.mp4
//! ```

pub mod compiler;
pub mod compose;
pub mod escape;
pub mod export;
pub mod filter_graph;
pub mod probe;

pub use compiler::{compile, FilterGraphCompiler, OUTPUT_LABEL};
pub use compose::{
    compose, prepare, resolve_stills, ComposeOutcome, CompiledComposition, CompositionJob,
};
pub use escape::{escape_drawtext, escape_option_value, unescape_drawtext, unescape_option_value};
pub use export::*;
pub use filter_graph::{DrawText, Filter, FilterChain, Fragment, PadLabel, TextX};
pub use probe::{probe_all, FfprobeProber, MediaProber};
