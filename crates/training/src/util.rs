use burn::backend::Autodiff;
use burn::module::Module;
use burn::nn::loss::{MseLoss, Reduction};
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::record::{BinFileRecorder, FullPrecisionSettings, RecorderError};
use burn::tensor::backend::Backend;
use clap::{Parser, ValueEnum};
use cli_support::ModalityArgs;
use meadow_dataset::{BatchIter, DatasetConfig, Modality};
use models::{ConvRefiner, ConvRefinerConfig, PixelProbe, PixelProbeConfig};
use std::fs;
use std::path::{Path, PathBuf};

use crate::TrainBackend;

pub fn load_probe_from_checkpoint<B: Backend, P: AsRef<Path>>(
    path: P,
    in_channels: usize,
    device: &B::Device,
) -> Result<PixelProbe<B>, RecorderError> {
    let recorder = BinFileRecorder::<FullPrecisionSettings>::new();
    PixelProbe::<B>::new(
        PixelProbeConfig {
            in_channels,
            ..Default::default()
        },
        device,
    )
    .load_file(path.as_ref(), &recorder, device)
}

pub fn load_refiner_from_checkpoint<B: Backend, P: AsRef<Path>>(
    path: P,
    in_channels: usize,
    device: &B::Device,
) -> Result<ConvRefiner<B>, RecorderError> {
    let recorder = BinFileRecorder::<FullPrecisionSettings>::new();
    ConvRefiner::<B>::new(
        ConvRefinerConfig {
            in_channels,
            ..Default::default()
        },
        device,
    )
    .load_file(path.as_ref(), &recorder, device)
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum ModelKind {
    Probe,
    Refiner,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum BackendKind {
    NdArray,
    Wgpu,
}

pub fn validate_backend_choice(backend: BackendKind) -> anyhow::Result<()> {
    match backend {
        BackendKind::NdArray => Ok(()),
        BackendKind::Wgpu => {
            if cfg!(feature = "backend-wgpu") {
                Ok(())
            } else {
                anyhow::bail!("wgpu backend requested but the backend-wgpu feature is not enabled")
            }
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "train",
    about = "Fine-tune PixelProbe/ConvRefiner on a tiled eelgrass manifest"
)]
pub struct TrainArgs {
    /// Tile manifest to train on (as written by the tile binary).
    #[arg(long)]
    pub manifest: PathBuf,
    /// Model to train.
    #[arg(long, value_enum, default_value_t = ModelKind::Refiner)]
    pub model: ModelKind,
    /// Backend to use (ndarray or wgpu if enabled).
    #[arg(long, value_enum, default_value_t = BackendKind::NdArray)]
    pub backend: BackendKind,
    #[command(flatten)]
    pub modalities: ModalityArgs,
    /// Number of epochs.
    #[arg(long, default_value_t = 1)]
    pub epochs: usize,
    /// Batch size.
    #[arg(long, default_value_t = 4)]
    pub batch_size: usize,
    /// Learning rate.
    #[arg(long, default_value_t = 1e-3)]
    pub lr: f32,
    /// Seed for shuffling and augmentation.
    #[arg(long)]
    pub seed: Option<u64>,
    /// Probability of a horizontal flip augmentation.
    #[arg(long, default_value_t = 0.5)]
    pub flip_horizontal_prob: f32,
    /// Probability of a vertical flip augmentation.
    #[arg(long, default_value_t = 0.5)]
    pub flip_vertical_prob: f32,
    /// Probability of brightness/contrast jitter.
    #[arg(long, default_value_t = 0.0)]
    pub color_jitter_prob: f32,
    /// Probability of per-channel noise.
    #[arg(long, default_value_t = 0.0)]
    pub noise_prob: f32,
    /// Pretrained checkpoint to fine-tune from.
    #[arg(long)]
    pub checkpoint: Option<PathBuf>,
    /// Checkpoint output path (defaults by model under --out-dir).
    #[arg(long)]
    pub checkpoint_out: Option<PathBuf>,
    /// Output directory for checkpoints.
    #[arg(long, default_value = "checkpoints")]
    pub out_dir: PathBuf,
}

impl TrainArgs {
    fn dataset_config(&self, modalities: Vec<Modality>) -> DatasetConfig {
        DatasetConfig {
            modalities,
            flip_horizontal_prob: self.flip_horizontal_prob,
            flip_vertical_prob: self.flip_vertical_prob,
            color_jitter_prob: self.color_jitter_prob,
            noise_prob: self.noise_prob,
            seed: self.seed,
            ..DatasetConfig::default()
        }
    }

    fn checkpoint_path(&self) -> PathBuf {
        self.checkpoint_out.clone().unwrap_or_else(|| {
            let name = match self.model {
                ModelKind::Probe => "pixel_probe.bin",
                ModelKind::Refiner => "conv_refiner.bin",
            };
            self.out_dir.join(name)
        })
    }
}

type ADBackend = Autodiff<TrainBackend>;

pub fn run_train(args: TrainArgs) -> anyhow::Result<()> {
    validate_backend_choice(args.backend)?;
    let modalities = args.modalities.parse()?;
    let in_channels = Modality::stacked_channels(&modalities);

    let mut iter = BatchIter::from_manifest(&args.manifest, args.dataset_config(modalities))?;
    if iter.is_empty() {
        anyhow::bail!("manifest {} contains no tiles", args.manifest.display());
    }
    println!(
        "training on {} tiles from {} ({in_channels} input channels)",
        iter.len(),
        args.manifest.display()
    );

    let ckpt_path = args.checkpoint_path();
    if let Some(parent) = ckpt_path.parent() {
        fs::create_dir_all(parent)?;
    }

    match args.model {
        ModelKind::Probe => train_probe(&args, &mut iter, in_channels, &ckpt_path)?,
        ModelKind::Refiner => train_refiner(&args, &mut iter, in_channels, &ckpt_path)?,
    }

    println!("Saved checkpoint to {}", ckpt_path.display());
    Ok(())
}

fn train_probe(
    args: &TrainArgs,
    iter: &mut BatchIter,
    in_channels: usize,
    ckpt_path: &Path,
) -> anyhow::Result<()> {
    let device = <ADBackend as Backend>::Device::default();
    let mut model = match &args.checkpoint {
        Some(path) => load_probe_from_checkpoint::<ADBackend, _>(path, in_channels, &device)
            .map_err(|e| anyhow::anyhow!("failed to load checkpoint {}: {e}", path.display()))?,
        None => PixelProbe::<ADBackend>::new(
            PixelProbeConfig {
                in_channels,
                ..Default::default()
            },
            &device,
        ),
    };
    let mut optim = AdamConfig::new().init();

    for epoch in 0..args.epochs {
        iter.reset();
        let mut losses = Vec::new();
        while let Some(batch) = iter.next_batch::<ADBackend>(args.batch_size, &device)? {
            let preds = model.forward_mask(batch.images);
            let loss = MseLoss::new().forward(preds, batch.masks, Reduction::Mean);
            let loss_detached = loss.clone().detach();
            let grads = GradientsParams::from_grads(loss.backward(), &model);
            model = optim.step(args.lr as f64, model, grads);
            losses.push(scalar(loss_detached));
        }
        println!("epoch {epoch}: avg loss {:.4}", mean(&losses));
    }

    let recorder = BinFileRecorder::<FullPrecisionSettings>::new();
    model
        .clone()
        .save_file(ckpt_path, &recorder)
        .map_err(|e| anyhow::anyhow!("failed to save checkpoint: {e}"))?;
    Ok(())
}

fn train_refiner(
    args: &TrainArgs,
    iter: &mut BatchIter,
    in_channels: usize,
    ckpt_path: &Path,
) -> anyhow::Result<()> {
    let device = <ADBackend as Backend>::Device::default();
    let mut model = match &args.checkpoint {
        Some(path) => load_refiner_from_checkpoint::<ADBackend, _>(path, in_channels, &device)
            .map_err(|e| anyhow::anyhow!("failed to load checkpoint {}: {e}", path.display()))?,
        None => ConvRefiner::<ADBackend>::new(
            ConvRefinerConfig {
                in_channels,
                ..Default::default()
            },
            &device,
        ),
    };
    let mut optim = AdamConfig::new().init();

    for epoch in 0..args.epochs {
        iter.reset();
        let mut losses = Vec::new();
        while let Some(batch) = iter.next_batch::<ADBackend>(args.batch_size, &device)? {
            let preds = model.forward_mask(batch.images);
            let loss = MseLoss::new().forward(preds, batch.masks, Reduction::Mean);
            let loss_detached = loss.clone().detach();
            let grads = GradientsParams::from_grads(loss.backward(), &model);
            model = optim.step(args.lr as f64, model, grads);
            losses.push(scalar(loss_detached));
        }
        println!("epoch {epoch}: avg loss {:.4}", mean(&losses));
    }

    let recorder = BinFileRecorder::<FullPrecisionSettings>::new();
    model
        .clone()
        .save_file(ckpt_path, &recorder)
        .map_err(|e| anyhow::anyhow!("failed to save checkpoint: {e}"))?;
    Ok(())
}

fn scalar(loss: burn::tensor::Tensor<ADBackend, 1>) -> f32 {
    loss.into_data()
        .to_vec::<f32>()
        .unwrap_or_default()
        .into_iter()
        .next()
        .unwrap_or(0.0)
}

fn mean(values: &[f32]) -> f32 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f32>() / values.len() as f32
    }
}
