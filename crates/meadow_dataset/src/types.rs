//! Core types and error definitions for meadow_dataset.

use seg_core::{Mask, TileTensor};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

pub type DatasetResult<T> = Result<T, DatasetError>;

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("image decode error at {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error(transparent)]
    Manifest(#[from] data_contracts::ManifestError),
    #[error("modality {modality} requested but tile file {path} is missing")]
    MissingModality { modality: Modality, path: PathBuf },
    #[error("tile {path} is {found_w}x{found_h}, expected {expected_w}x{expected_h}")]
    ShapeMismatch {
        path: PathBuf,
        expected_w: u32,
        expected_h: u32,
        found_w: u32,
        found_h: u32,
    },
    #[error("unknown modality {0:?} (expected rgb or index)")]
    UnknownModality(String),
    #[error("{0}")]
    Other(String),
}

/// One input channel group. Stacking order along the channel axis is the
/// declaration order here, independent of request order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modality {
    /// Three channels from the image tile.
    Rgb,
    /// One channel from the index tile.
    Index,
}

impl Modality {
    pub const ALL: [Modality; 2] = [Modality::Rgb, Modality::Index];

    pub fn channels(&self) -> usize {
        match self {
            Modality::Rgb => 3,
            Modality::Index => 1,
        }
    }

    /// Total channel count for a requested set, in stacking order.
    pub fn stacked_channels(requested: &[Modality]) -> usize {
        Modality::ALL
            .iter()
            .filter(|m| requested.contains(m))
            .map(|m| m.channels())
            .sum()
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Modality::Rgb => write!(f, "rgb"),
            Modality::Index => write!(f, "index"),
        }
    }
}

impl FromStr for Modality {
    type Err = DatasetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rgb" => Ok(Modality::Rgb),
            "index" => Ok(Modality::Index),
            other => Err(DatasetError::UnknownModality(other.to_string())),
        }
    }
}

/// One loaded tile: stacked input channels plus the binary label mask.
#[derive(Debug, Clone)]
pub struct TileSample {
    pub basename: String,
    pub row: u32,
    pub col: u32,
    pub input: TileTensor,
    pub mask: Mask,
}

/// Immutable dataset configuration handed to the loader and batch iterator
/// at construction; no process-wide state.
#[derive(Debug, Clone)]
pub struct DatasetConfig {
    /// Requested input modalities; stacked in `Modality::ALL` order.
    pub modalities: Vec<Modality>,
    /// Probability of a horizontal flip (applied to input and mask).
    pub flip_horizontal_prob: f32,
    /// Probability of a vertical flip (applied to input and mask).
    pub flip_vertical_prob: f32,
    /// Probability of brightness/contrast jitter (input only).
    pub color_jitter_prob: f32,
    /// Max jitter scale for brightness/contrast.
    pub color_jitter_strength: f32,
    /// Probability of adding uniform per-channel noise (input only).
    pub noise_prob: f32,
    /// Max absolute noise added (0-1 range).
    pub noise_strength: f32,
    /// Shuffle manifest rows before iteration.
    pub shuffle: bool,
    /// Seed for reproducible shuffling and per-sample augmentation.
    pub seed: Option<u64>,
    /// Drop the last partial batch.
    pub drop_last: bool,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            modalities: vec![Modality::Rgb],
            flip_horizontal_prob: 0.0,
            flip_vertical_prob: 0.0,
            color_jitter_prob: 0.0,
            color_jitter_strength: 0.1,
            noise_prob: 0.0,
            noise_strength: 0.02,
            shuffle: true,
            seed: None,
            drop_last: false,
        }
    }
}

impl DatasetConfig {
    /// Validation/eval twin: same modalities, no shuffling, no augmentation.
    pub fn eval(modalities: Vec<Modality>) -> Self {
        Self {
            modalities,
            shuffle: false,
            ..Self::default()
        }
    }
}
