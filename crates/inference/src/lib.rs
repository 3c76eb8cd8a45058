//! Checkpoint-backed `Segmenter` construction.
//!
//! The external model is consumed strictly through `seg_core::Segmenter`;
//! this crate owns the checkpoint and backend concerns behind that seam.

pub mod factory;

#[cfg(feature = "backend-wgpu")]
pub type InferenceBackend = burn_wgpu::Wgpu<f32>;
#[cfg(not(feature = "backend-wgpu"))]
pub type InferenceBackend = burn_ndarray::NdArray<f32>;

pub use factory::{SegmenterFactory, SegmenterModel, SegmenterOptions};

#[cfg(test)]
mod tests {
    use super::*;
    use seg_core::{Segmenter, TileTensor};

    #[test]
    fn factory_falls_back_without_weights() {
        let factory = SegmenterFactory;
        let mut segmenter = factory.build(SegmenterOptions::default(), None);
        // 2x2 tile, one dark pixel: the brightness fallback marks it.
        let tile = TileTensor::new(
            3,
            2,
            2,
            vec![
                0.9, 0.9, 0.9, 0.1, // r
                0.9, 0.9, 0.9, 0.1, // g
                0.9, 0.9, 0.9, 0.1, // b
            ],
        );
        let mask = segmenter.predict(&tile);
        assert_eq!((mask.width(), mask.height()), (2, 2));
        assert!(mask.get(1, 1));
        assert!(!mask.get(0, 0));
    }

    #[test]
    fn factory_falls_back_on_unreadable_checkpoint() {
        let factory = SegmenterFactory;
        let mut segmenter = factory.build(
            SegmenterOptions::default(),
            Some(std::path::Path::new("/nonexistent/checkpoint.bin")),
        );
        let tile = TileTensor::new(3, 1, 1, vec![0.0, 0.0, 0.0]);
        assert!(segmenter.predict(&tile).get(0, 0));
    }
}
