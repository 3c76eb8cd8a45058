//! Batch iteration for training and validation.

use crate::aug::TransformPipeline;
use crate::loader::ManifestSource;
use crate::types::{DatasetConfig, DatasetError, DatasetResult, TileSample};
use burn::tensor::{backend::Backend, Tensor, TensorData};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;
use std::path::Path;

pub(crate) const DEFAULT_LOG_EVERY_SAMPLES: usize = 1000;

/// One collated batch: inputs `[B, C, H, W]`, masks `[B, 1, H, W]` as 0/1
/// floats.
#[derive(Debug, Clone)]
pub struct BurnBatch<B: Backend> {
    pub images: Tensor<B, 4>,
    pub masks: Tensor<B, 4>,
}

/// Iterates manifest rows in (optionally shuffled) order, loading and
/// augmenting samples in parallel. In permissive mode a failing sample is
/// skipped and counted instead of aborting the epoch.
pub struct BatchIter {
    source: ManifestSource,
    order: Vec<usize>,
    cursor: usize,
    cfg: DatasetConfig,
    pipeline: TransformPipeline,
    permissive_errors: bool,
    log_every_samples: Option<usize>,
    processed_samples: usize,
    last_logged_samples: usize,
    skipped_errors: usize,
    warned: bool,
}

impl BatchIter {
    pub fn from_manifest(manifest_path: &Path, cfg: DatasetConfig) -> DatasetResult<Self> {
        let source = ManifestSource::open(manifest_path)?;
        Self::from_source(source, cfg)
    }

    pub fn from_source(source: ManifestSource, cfg: DatasetConfig) -> DatasetResult<Self> {
        let mut order: Vec<usize> = (0..source.len()).collect();
        if cfg.shuffle {
            let mut rng = match cfg.seed {
                Some(seed) => rand::rngs::StdRng::seed_from_u64(seed),
                None => rand::rngs::StdRng::from_rng(&mut rand::rng()),
            };
            order.shuffle(&mut rng);
        }
        let log_every_samples = match std::env::var("MEADOW_DATASET_LOG_EVERY") {
            Ok(val) => {
                if val.eq_ignore_ascii_case("off") || val.trim() == "0" {
                    None
                } else {
                    val.parse::<usize>().ok().filter(|v| *v > 0)
                }
            }
            Err(_) => Some(DEFAULT_LOG_EVERY_SAMPLES),
        };
        let permissive_errors = std::env::var("MEADOW_DATASET_PERMISSIVE")
            .ok()
            .map(|v| v.trim().to_ascii_lowercase())
            .map(|v| !(v == "0" || v == "false" || v == "off"))
            .unwrap_or(true);
        let pipeline = TransformPipeline::from_config(&cfg);
        Ok(Self {
            source,
            order,
            cursor: 0,
            cfg,
            pipeline,
            permissive_errors,
            log_every_samples,
            processed_samples: 0,
            last_logged_samples: 0,
            skipped_errors: 0,
            warned: false,
        })
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn skipped_errors(&self) -> usize {
        self.skipped_errors
    }

    /// Restart the epoch, keeping the shuffled order.
    pub fn reset(&mut self) {
        self.cursor = 0;
    }

    fn load_chunk(&mut self, batch_size: usize) -> DatasetResult<Vec<TileSample>> {
        let mut samples = Vec::with_capacity(batch_size);
        while samples.len() < batch_size && self.cursor < self.order.len() {
            let want = batch_size - samples.len();
            let chunk: Vec<(u64, usize)> = self.order[self.cursor..]
                .iter()
                .take(want)
                .map(|&idx| (idx as u64, idx))
                .collect();
            self.cursor += chunk.len();

            let loaded: Vec<(u64, DatasetResult<TileSample>)> = chunk
                .par_iter()
                .map(|&(id, idx)| {
                    let record = &self.source.records()[idx];
                    let result = self.source.load(record, &self.cfg.modalities);
                    (id, result)
                })
                .collect();

            for (id, result) in loaded {
                match result {
                    Ok(mut sample) => {
                        self.pipeline.apply(&mut sample, id);
                        samples.push(sample);
                    }
                    Err(err) if self.permissive_errors => {
                        self.skipped_errors += 1;
                        if !self.warned {
                            eprintln!(
                                "skipping unreadable sample ({err}); further skips are counted silently"
                            );
                            self.warned = true;
                        }
                    }
                    Err(err) => return Err(err),
                }
            }
        }
        Ok(samples)
    }

    fn log_progress(&mut self) {
        if let Some(every) = self.log_every_samples {
            if self.processed_samples - self.last_logged_samples >= every {
                println!(
                    "dataset: {}/{} samples this epoch ({} skipped)",
                    self.processed_samples,
                    self.len(),
                    self.skipped_errors
                );
                self.last_logged_samples = self.processed_samples;
            }
        }
    }

    /// Next collated batch, or `None` at the end of the epoch.
    pub fn next_batch<B: Backend>(
        &mut self,
        batch_size: usize,
        device: &B::Device,
    ) -> DatasetResult<Option<BurnBatch<B>>> {
        let batch_size = batch_size.max(1);
        let samples = self.load_chunk(batch_size)?;
        if samples.is_empty() {
            return Ok(None);
        }
        if self.cfg.drop_last && samples.len() < batch_size {
            return Ok(None);
        }
        self.processed_samples += samples.len();
        self.log_progress();
        Ok(Some(collate::<B>(&samples, device)?))
    }
}

/// Stack samples into one batch; every tile in a manifest shares the run's
/// tile size, so differing dimensions indicate a corrupted tile set.
pub fn collate<B: Backend>(
    samples: &[TileSample],
    device: &B::Device,
) -> DatasetResult<BurnBatch<B>> {
    let first = samples
        .first()
        .ok_or_else(|| DatasetError::Other("cannot collate an empty batch".to_string()))?;
    let (channels, width, height) = (first.input.channels, first.input.width, first.input.height);
    let plane = (width as usize) * (height as usize);

    let batch = samples.len();
    let mut images = Vec::with_capacity(batch * channels * plane);
    let mut masks = Vec::with_capacity(batch * plane);
    for sample in samples {
        if sample.input.channels != channels
            || sample.input.width != width
            || sample.input.height != height
        {
            return Err(DatasetError::Other(format!(
                "tile {}_row{:02}_col{:02} is {}x{}x{}, expected {}x{}x{}",
                sample.basename,
                sample.row,
                sample.col,
                sample.input.channels,
                sample.input.width,
                sample.input.height,
                channels,
                width,
                height,
            )));
        }
        images.extend_from_slice(&sample.input.data);
        for y in 0..height {
            for x in 0..width {
                masks.push(if sample.mask.get(x, y) { 1.0f32 } else { 0.0 });
            }
        }
    }

    let images = Tensor::<B, 4>::from_data(
        TensorData::new(images, [batch, channels, height as usize, width as usize]),
        device,
    );
    let masks = Tensor::<B, 4>::from_data(
        TensorData::new(masks, [batch, 1, height as usize, width as usize]),
        device,
    );
    Ok(BurnBatch { images, masks })
}
