//! Manifest-driven tile dataset loading for eelgrass segmentation.
//!
//! This crate provides:
//! - Loading tile samples from a tiling manifest with modality stacking
//! - Augmentation pipelines applied to (input, mask) pairs
//! - Burn-compatible batch iteration (behind the `burn-runtime` feature)
//! - Image/index pair validation for source datasets

pub mod aug;
pub mod loader;
pub mod types;
pub mod validation;

#[cfg(feature = "burn-runtime")]
pub mod batch;

pub use aug::{Transform, TransformPipeline};
pub use loader::{load_sample, ManifestSource};
pub use types::{DatasetConfig, DatasetError, DatasetResult, Modality, TileSample};
pub use validation::{delete_orphans, summarize_pairs, PairKeyOptions, PairReport};

#[cfg(feature = "burn-runtime")]
pub use batch::{BatchIter, BurnBatch};
