//! Loading tile samples from a tiling manifest.
//!
//! The manifest is the single source of truth: tile coordinates and file
//! locations come from its rows only. Paths are resolved relative to the
//! manifest's directory.

use crate::types::{DatasetError, DatasetResult, Modality, TileSample};
use data_contracts::{TileManifest, TileRecord};
use image::GrayImage;
use seg_core::{Mask, TileTensor};
use std::path::{Path, PathBuf};

/// A manifest plus the directory its relative paths resolve against.
#[derive(Debug, Clone)]
pub struct ManifestSource {
    dir: PathBuf,
    records: Vec<TileRecord>,
}

impl ManifestSource {
    pub fn open(manifest_path: &Path) -> DatasetResult<Self> {
        let manifest = TileManifest::load(manifest_path)?;
        let dir = manifest_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .to_path_buf();
        Ok(Self {
            dir,
            records: manifest.records().to_vec(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn records(&self) -> &[TileRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn load(&self, record: &TileRecord, modalities: &[Modality]) -> DatasetResult<TileSample> {
        load_sample(&self.dir, record, modalities)
    }
}

fn modality_path(dir: &Path, record: &TileRecord, modality: Modality) -> PathBuf {
    match modality {
        Modality::Rgb => dir.join(&record.image_path),
        Modality::Index => dir.join(&record.label_path),
    }
}

fn open_checked(
    path: &Path,
    modality: Modality,
) -> DatasetResult<image::DynamicImage> {
    if !path.exists() {
        return Err(DatasetError::MissingModality {
            modality,
            path: path.to_path_buf(),
        });
    }
    image::open(path).map_err(|e| DatasetError::Image {
        path: path.to_path_buf(),
        source: e,
    })
}

fn check_shape(
    path: &Path,
    expected: Option<(u32, u32)>,
    found: (u32, u32),
) -> DatasetResult<(u32, u32)> {
    match expected {
        None => Ok(found),
        Some(exp) if exp == found => Ok(exp),
        Some((expected_w, expected_h)) => Err(DatasetError::ShapeMismatch {
            path: path.to_path_buf(),
            expected_w,
            expected_h,
            found_w: found.0,
            found_h: found.1,
        }),
    }
}

fn load_label_mask(dir: &Path, record: &TileRecord) -> DatasetResult<GrayImage> {
    let path = dir.join(&record.label_path);
    if !path.exists() {
        return Err(DatasetError::Io {
            path,
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "label tile missing"),
        });
    }
    let img = image::open(&path)
        .map_err(|e| DatasetError::Image {
            path: path.clone(),
            source: e,
        })?
        .to_luma8();
    Ok(img)
}

/// Load one manifest row: stack the requested modalities along the channel
/// axis (fixed `Modality::ALL` order) and derive the label mask from the
/// index tile. A missing tile file for a requested modality fails the whole
/// sample; no partial tensor is returned.
pub fn load_sample(
    manifest_dir: &Path,
    record: &TileRecord,
    modalities: &[Modality],
) -> DatasetResult<TileSample> {
    if modalities.is_empty() {
        return Err(DatasetError::Other(
            "at least one modality must be requested".to_string(),
        ));
    }

    let mut shape: Option<(u32, u32)> = None;
    let mut planes: Vec<f32> = Vec::new();
    let mut channels = 0usize;

    for modality in Modality::ALL {
        if !modalities.contains(&modality) {
            continue;
        }
        let path = modality_path(manifest_dir, record, modality);
        let img = open_checked(&path, modality)?;
        match modality {
            Modality::Rgb => {
                let rgb = img.to_rgb8();
                shape = Some(check_shape(&path, shape, rgb.dimensions())?);
                let (w, h) = rgb.dimensions();
                let raw = rgb.as_raw();
                let plane = (w as usize) * (h as usize);
                for c in 0..3 {
                    planes.extend((0..plane).map(|i| raw[i * 3 + c] as f32 / 255.0));
                }
                channels += 3;
            }
            Modality::Index => {
                let gray = img.to_luma8();
                shape = Some(check_shape(&path, shape, gray.dimensions())?);
                planes.extend(gray.as_raw().iter().map(|&v| v as f32 / 255.0));
                channels += 1;
            }
        }
    }

    let label = load_label_mask(manifest_dir, record)?;
    let (width, height) = check_shape(
        &manifest_dir.join(&record.label_path),
        shape,
        label.dimensions(),
    )?;
    let mask = Mask::from_bytes(width, height, label.as_raw(), 0);

    Ok(TileSample {
        basename: record.basename.clone(),
        row: record.row,
        col: record.col,
        input: TileTensor::new(channels, width, height, planes),
        mask,
    })
}
