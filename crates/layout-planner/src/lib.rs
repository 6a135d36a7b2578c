//! vidstack Layout Planner
//!
//! Turns probed input descriptors into a side-by-side canvas:
//! - **Heights:** Every input is scaled to the tallest input's height
//! - **Widths:** Aspect ratio is preserved and widths are kept even
//! - **Durations:** Shorter inputs are padded up to the longest one
//!
//! This crate is pure computation: no I/O and no process spawning.

pub mod planner;

pub use planner::{plan, scaled_width};
