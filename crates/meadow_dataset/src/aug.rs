//! Augmentation pipeline over (input, mask) pairs.
//!
//! Transforms compose in declaration order. Geometric transforms apply to
//! the input tensor and the mask together; photometric transforms touch the
//! input only.

use crate::types::{DatasetConfig, TileSample};
use rand::{Rng, RngCore, SeedableRng};
use seg_core::Mask;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Transform {
    FlipHorizontal { prob: f32 },
    FlipVertical { prob: f32 },
    ColorJitter { prob: f32, strength: f32 },
    Noise { prob: f32, strength: f32 },
}

/// Ordered, seedable transform sequence built once per iterator.
#[derive(Debug, Clone, Default)]
pub struct TransformPipeline {
    steps: Vec<Transform>,
    seed: Option<u64>,
}

impl TransformPipeline {
    pub fn from_config(cfg: &DatasetConfig) -> Self {
        let mut steps = Vec::new();
        if cfg.flip_horizontal_prob > 0.0 {
            steps.push(Transform::FlipHorizontal {
                prob: cfg.flip_horizontal_prob,
            });
        }
        if cfg.flip_vertical_prob > 0.0 {
            steps.push(Transform::FlipVertical {
                prob: cfg.flip_vertical_prob,
            });
        }
        if cfg.color_jitter_prob > 0.0 {
            steps.push(Transform::ColorJitter {
                prob: cfg.color_jitter_prob,
                strength: cfg.color_jitter_strength,
            });
        }
        if cfg.noise_prob > 0.0 {
            steps.push(Transform::Noise {
                prob: cfg.noise_prob,
                strength: cfg.noise_strength,
            });
        }
        Self {
            steps,
            seed: cfg.seed,
        }
    }

    pub fn steps(&self) -> &[Transform] {
        &self.steps
    }

    pub fn is_identity(&self) -> bool {
        self.steps.is_empty()
    }

    /// Apply the sequence in order. `sample_id` mixes into the seed so a
    /// seeded pipeline is deterministic per sample but varies across
    /// samples.
    pub fn apply(&self, sample: &mut TileSample, sample_id: u64) {
        if self.steps.is_empty() {
            return;
        }
        let mut seeded;
        let mut local;
        let rng: &mut dyn RngCore = if let Some(seed) = self.seed {
            seeded = rand::rngs::StdRng::seed_from_u64(seed ^ sample_id);
            &mut seeded
        } else {
            local = rand::rng();
            &mut local
        };

        for step in &self.steps {
            match *step {
                Transform::FlipHorizontal { prob } => {
                    if rng.random::<f32>() < prob {
                        flip_horizontal(sample);
                    }
                }
                Transform::FlipVertical { prob } => {
                    if rng.random::<f32>() < prob {
                        flip_vertical(sample);
                    }
                }
                Transform::ColorJitter { prob, strength } => {
                    if rng.random::<f32>() < prob {
                        let contrast = 1.0 + rng.random_range(-strength..=strength);
                        let brightness = rng.random_range(-strength..=strength);
                        color_jitter(sample, contrast, brightness);
                    }
                }
                Transform::Noise { prob, strength } => {
                    if rng.random::<f32>() < prob {
                        noise(sample, strength, rng);
                    }
                }
            }
        }
    }
}

fn flip_horizontal(sample: &mut TileSample) {
    let w = sample.input.width as usize;
    let h = sample.input.height as usize;
    for c in 0..sample.input.channels {
        for y in 0..h {
            let start = c * w * h + y * w;
            sample.input.data[start..start + w].reverse();
        }
    }
    sample.mask = flip_mask(&sample.mask, true);
}

fn flip_vertical(sample: &mut TileSample) {
    let w = sample.input.width as usize;
    let h = sample.input.height as usize;
    for c in 0..sample.input.channels {
        let plane = &mut sample.input.data[c * w * h..(c + 1) * w * h];
        for y in 0..h / 2 {
            let (top, rest) = plane.split_at_mut((h - 1 - y) * w);
            top[y * w..y * w + w].swap_with_slice(&mut rest[..w]);
        }
    }
    sample.mask = flip_mask(&sample.mask, false);
}

fn flip_mask(mask: &Mask, horizontal: bool) -> Mask {
    let (w, h) = (mask.width(), mask.height());
    Mask::from_fn(w, h, |x, y| {
        if horizontal {
            mask.get(w - 1 - x, y)
        } else {
            mask.get(x, h - 1 - y)
        }
    })
}

fn color_jitter(sample: &mut TileSample, contrast: f32, brightness: f32) {
    for v in &mut sample.input.data {
        *v = ((*v - 0.5) * contrast + 0.5 + brightness).clamp(0.0, 1.0);
    }
}

fn noise(sample: &mut TileSample, strength: f32, rng: &mut dyn RngCore) {
    for v in &mut sample.input.data {
        *v = (*v + rng.random_range(-strength..=strength)).clamp(0.0, 1.0);
    }
}
