//! Burn models for per-pixel eelgrass mask prediction.
//!
//! This crate defines the fine-tunable network heads:
//! - `PixelProbe`: 1x1 convolutions only; a per-pixel spectral probe.
//! - `ConvRefiner`: a 3x3 convolution stack with spatial context.
//!
//! Both take `[B, C, H, W]` inputs and emit `[B, 1, H, W]` logits. They are
//! pure Burn Modules with no awareness of the Segmenter trait; the
//! `inference` crate wraps them for runtime use.

use burn::module::Module;
use burn::nn;
use burn::tensor::activation::{relu, sigmoid};
use burn::tensor::Tensor;

#[derive(Debug, Clone)]
pub struct PixelProbeConfig {
    pub in_channels: usize,
    pub hidden: usize,
}

impl Default for PixelProbeConfig {
    fn default() -> Self {
        Self {
            in_channels: 3,
            hidden: 16,
        }
    }
}

/// Per-pixel probe: classifies each pixel from its own channel vector.
/// Cheap, shape-agnostic, and a strong baseline on spectral imagery.
#[derive(Debug, Module)]
pub struct PixelProbe<B: burn::tensor::backend::Backend> {
    conv1: nn::conv::Conv2d<B>,
    conv2: nn::conv::Conv2d<B>,
}

impl<B: burn::tensor::backend::Backend> PixelProbe<B> {
    pub fn new(cfg: PixelProbeConfig, device: &B::Device) -> Self {
        let conv1 = nn::conv::Conv2dConfig::new([cfg.in_channels, cfg.hidden], [1, 1]).init(device);
        let conv2 = nn::conv::Conv2dConfig::new([cfg.hidden, 1], [1, 1]).init(device);
        Self { conv1, conv2 }
    }

    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = relu(self.conv1.forward(input));
        self.conv2.forward(x)
    }

    /// Forward pass through a sigmoid, for probability masks.
    pub fn forward_mask(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        sigmoid(self.forward(input))
    }
}

#[derive(Debug, Clone)]
pub struct ConvRefinerConfig {
    pub in_channels: usize,
    pub hidden: usize,
    pub depth: usize,
}

impl Default for ConvRefinerConfig {
    fn default() -> Self {
        Self {
            in_channels: 3,
            hidden: 32,
            depth: 3,
        }
    }
}

/// Convolutional refiner: same-padded 3x3 stack, so meadow boundaries see a
/// small spatial neighborhood. Output resolution always matches the input.
#[derive(Debug, Module)]
pub struct ConvRefiner<B: burn::tensor::backend::Backend> {
    stem: nn::conv::Conv2d<B>,
    blocks: Vec<nn::conv::Conv2d<B>>,
    head: nn::conv::Conv2d<B>,
}

impl<B: burn::tensor::backend::Backend> ConvRefiner<B> {
    pub fn new(cfg: ConvRefinerConfig, device: &B::Device) -> Self {
        let stem = nn::conv::Conv2dConfig::new([cfg.in_channels, cfg.hidden], [3, 3])
            .with_padding(nn::PaddingConfig2d::Same)
            .init(device);
        let mut blocks = Vec::new();
        for _ in 0..cfg.depth {
            blocks.push(
                nn::conv::Conv2dConfig::new([cfg.hidden, cfg.hidden], [3, 3])
                    .with_padding(nn::PaddingConfig2d::Same)
                    .init(device),
            );
        }
        let head = nn::conv::Conv2dConfig::new([cfg.hidden, 1], [1, 1]).init(device);
        Self { stem, blocks, head }
    }

    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let mut x = relu(self.stem.forward(input));
        for block in &self.blocks {
            x = relu(block.forward(x));
        }
        self.head.forward(x)
    }

    pub fn forward_mask(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        sigmoid(self.forward(input))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type NdArray = burn_ndarray::NdArray<f32>;

    #[test]
    fn probe_preserves_spatial_shape() {
        let device = Default::default();
        let model = PixelProbe::<NdArray>::new(PixelProbeConfig::default(), &device);
        let input = Tensor::<NdArray, 4>::zeros([2, 3, 8, 8], &device);
        assert_eq!(model.forward(input).dims(), [2, 1, 8, 8]);
    }

    #[test]
    fn refiner_preserves_spatial_shape_for_four_channels() {
        let device = Default::default();
        let cfg = ConvRefinerConfig {
            in_channels: 4,
            hidden: 8,
            depth: 2,
        };
        let model = ConvRefiner::<NdArray>::new(cfg, &device);
        let input = Tensor::<NdArray, 4>::zeros([1, 4, 16, 16], &device);
        let mask = model.forward_mask(input);
        assert_eq!(mask.dims(), [1, 1, 16, 16]);
        let values = mask.into_data().to_vec::<f32>().unwrap();
        assert!(values.iter().all(|v| (0.0..=1.0).contains(v)));
    }
}
