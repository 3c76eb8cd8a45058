use crate::InferenceBackend;
use burn::module::Module;
use burn::record::{BinFileRecorder, FullPrecisionSettings};
use burn::tensor::{Tensor, TensorData};
use models::{ConvRefiner, ConvRefinerConfig, PixelProbe, PixelProbeConfig};
use seg_core::{Mask, Segmenter, TileTensor};
use std::path::Path;

/// Which network head a checkpoint holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmenterModel {
    Probe,
    Refiner,
}

#[derive(Debug, Clone, Copy)]
pub struct SegmenterOptions {
    /// Probability threshold for binarizing the predicted mask.
    pub threshold: f32,
    pub model: SegmenterModel,
    /// Channel count the checkpoint was trained with.
    pub in_channels: usize,
}

impl Default for SegmenterOptions {
    fn default() -> Self {
        Self {
            threshold: 0.5,
            model: SegmenterModel::Refiner,
            in_channels: 3,
        }
    }
}

/// Fallback when no usable checkpoint is available: eelgrass reads darker
/// than the surrounding seabed, so threshold mean brightness.
struct BrightnessSegmenter {
    threshold: f32,
}

impl Segmenter for BrightnessSegmenter {
    fn predict(&mut self, tile: &TileTensor) -> Mask {
        Mask::from_fn(tile.width, tile.height, |x, y| {
            let mut sum = 0.0f32;
            for c in 0..tile.channels {
                sum += tile.get(c, x, y);
            }
            sum / tile.channels as f32 <= self.threshold
        })
    }
}

enum LoadedModel {
    Probe(PixelProbe<InferenceBackend>),
    Refiner(ConvRefiner<InferenceBackend>),
}

struct ModelSegmenter {
    model: LoadedModel,
    threshold: f32,
}

impl ModelSegmenter {
    fn tile_to_tensor(&self, tile: &TileTensor) -> Tensor<InferenceBackend, 4> {
        let device = <InferenceBackend as burn::tensor::backend::Backend>::Device::default();
        let data = TensorData::new(
            tile.data.clone(),
            [1, tile.channels, tile.height as usize, tile.width as usize],
        );
        Tensor::from_data(data, &device)
    }
}

impl Segmenter for ModelSegmenter {
    fn predict(&mut self, tile: &TileTensor) -> Mask {
        let input = self.tile_to_tensor(tile);
        let probs = match &self.model {
            LoadedModel::Probe(model) => model.forward_mask(input),
            LoadedModel::Refiner(model) => model.forward_mask(input),
        };
        let values = probs.into_data().to_vec::<f32>().unwrap_or_default();
        let width = tile.width;
        Mask::from_fn(tile.width, tile.height, |x, y| {
            values
                .get((y as usize) * (width as usize) + x as usize)
                .is_some_and(|&p| p > self.threshold)
        })
    }
}

/// Builds a `Segmenter` from an optional checkpoint, falling back to the
/// brightness heuristic when none loads.
pub struct SegmenterFactory;

impl SegmenterFactory {
    pub fn build(
        &self,
        opts: SegmenterOptions,
        weights: Option<&Path>,
    ) -> Box<dyn Segmenter + Send + Sync> {
        if let Some(segmenter) = self.try_load(opts, weights) {
            return segmenter;
        }
        eprintln!("SegmenterFactory: no valid checkpoint provided; using brightness heuristic.");
        Box::new(BrightnessSegmenter {
            threshold: opts.threshold,
        })
    }

    fn try_load(
        &self,
        opts: SegmenterOptions,
        weights: Option<&Path>,
    ) -> Option<Box<dyn Segmenter + Send + Sync>> {
        let path = weights?;
        if !path.exists() {
            return None;
        }
        let device = <InferenceBackend as burn::tensor::backend::Backend>::Device::default();
        let recorder = BinFileRecorder::<FullPrecisionSettings>::new();
        let loaded = match opts.model {
            SegmenterModel::Probe => PixelProbe::<InferenceBackend>::new(
                PixelProbeConfig {
                    in_channels: opts.in_channels,
                    ..Default::default()
                },
                &device,
            )
            .load_file(path, &recorder, &device)
            .map(LoadedModel::Probe),
            SegmenterModel::Refiner => ConvRefiner::<InferenceBackend>::new(
                ConvRefinerConfig {
                    in_channels: opts.in_channels,
                    ..Default::default()
                },
                &device,
            )
            .load_file(path, &recorder, &device)
            .map(LoadedModel::Refiner),
        };
        match loaded {
            Ok(model) => Some(Box::new(ModelSegmenter {
                model,
                threshold: opts.threshold,
            })),
            Err(err) => {
                eprintln!(
                    "Failed to load segmenter checkpoint {:?}: {err}. Falling back to heuristic.",
                    path
                );
                None
            }
        }
    }
}
