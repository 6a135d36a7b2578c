//! vidstack Project Model
//!
//! Defines the data contracts shared by the composition pipeline:
//! - **Media:** Resolved input sources and their probed descriptors
//! - **Style:** Text overlay styling with derived spacing
//! - **Layout:** The planned canvas and per-video geometry
//! - **Composition:** The TOML document that drives a run
//!
//! Sources are listed left to right; that order is preserved by every
//! stage of the pipeline.

pub mod composition;
pub mod layout;
pub mod media;
pub mod style;

pub use composition::*;
pub use layout::*;
pub use media::*;
pub use style::*;
