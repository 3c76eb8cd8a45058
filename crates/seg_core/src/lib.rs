//! seg_core: shared segmentation interfaces and mask metrics.
//!
//! This crate holds the pieces the rest of the workspace agrees on:
//! - `Mask`: a row-major binary mask,
//! - `TileTensor`: a CHW float tile as handed to a model,
//! - `Segmenter`: the narrow capability interface the external model sits
//!   behind,
//! - `metrics`: pure overlap and boundary-distance statistics.

pub mod interfaces;
pub mod mask;
pub mod metrics;

pub use interfaces::{Segmenter, TileTensor};
pub use mask::Mask;
