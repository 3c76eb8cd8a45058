//! Tile extraction: crop raster pairs along a tile grid, write tile files,
//! and append manifest records.

use crate::grid::{TileGrid, TilingConfig};
use data_contracts::{RasterId, RasterReport, TileManifest, TileRecord, TilingRunMeta};
use image::{GrayImage, RgbImage};
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub type TilingResult<T> = Result<T, TilingError>;

#[derive(Debug, Error)]
pub enum TilingError {
    #[error("invalid tiling configuration: {0}")]
    Validation(String),
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("image error at {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("index raster missing for image {path}")]
    MissingIndex { path: PathBuf },
    #[error(
        "raster {basename}: index dimensions {index_w}x{index_h} do not match image {image_w}x{image_h}"
    )]
    ShapeMismatch {
        basename: String,
        image_w: u32,
        image_h: u32,
        index_w: u32,
        index_h: u32,
    },
    #[error("manifest error: {0}")]
    Manifest(#[from] data_contracts::ManifestError),
}

/// One source raster pair discovered on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairPaths {
    pub basename: String,
    pub image_path: PathBuf,
    pub index_path: PathBuf,
}

/// Outcome of tiling one split; failed rasters are reported, not fatal.
#[derive(Debug)]
pub struct SplitOutcome {
    pub split: String,
    pub tiles: usize,
    pub rasters: Vec<RasterReport>,
}

impl SplitOutcome {
    pub fn failed(&self) -> usize {
        self.rasters.iter().filter(|r| r.error.is_some()).count()
    }
}

fn io_err(path: &Path, source: std::io::Error) -> TilingError {
    TilingError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn image_err(path: &Path, source: image::ImageError) -> TilingError {
    TilingError::Image {
        path: path.to_path_buf(),
        source,
    }
}

/// Discover `(image, index)` pairs for one split across all site directories
/// under `root`: `<root>/<site>/<split>/image/*.png` paired with the
/// same-named file under `index/`. Files whose basename does not follow the
/// `<site>_<region>_<year>` convention are skipped with a warning. A missing
/// index file is reported as that raster's failure during extraction, not
/// here.
pub fn discover_pairs(root: &Path, split: &str) -> TilingResult<Vec<PairPaths>> {
    let mut pairs = Vec::new();
    for site in fs::read_dir(root).map_err(|e| io_err(root, e))? {
        let site = site.map_err(|e| io_err(root, e))?;
        if !site.path().is_dir() {
            continue;
        }
        let image_dir = site.path().join(split).join("image");
        if !image_dir.is_dir() {
            continue;
        }
        let index_dir = site.path().join(split).join("index");
        for entry in fs::read_dir(&image_dir).map_err(|e| io_err(&image_dir, e))? {
            let entry = entry.map_err(|e| io_err(&image_dir, e))?;
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) != Some("png") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if let Err(err) = RasterId::parse(stem) {
                eprintln!("skipping {}: {err}", path.display());
                continue;
            }
            pairs.push(PairPaths {
                basename: stem.to_string(),
                image_path: path.clone(),
                index_path: index_dir.join(format!("{stem}.png")),
            });
        }
    }
    pairs.sort_by(|a, b| a.basename.cmp(&b.basename));
    Ok(pairs)
}

fn crop_rgb(src: &RgbImage, x0: u32, y0: u32, tile: u32) -> RgbImage {
    let mut out = RgbImage::new(tile, tile);
    let w = src.width().saturating_sub(x0).min(tile);
    let h = src.height().saturating_sub(y0).min(tile);
    for y in 0..h {
        for x in 0..w {
            out.put_pixel(x, y, *src.get_pixel(x0 + x, y0 + y));
        }
    }
    out
}

fn crop_gray(src: &GrayImage, x0: u32, y0: u32, tile: u32) -> GrayImage {
    let mut out = GrayImage::new(tile, tile);
    let w = src.width().saturating_sub(x0).min(tile);
    let h = src.height().saturating_sub(y0).min(tile);
    for y in 0..h {
        for x in 0..w {
            out.put_pixel(x, y, *src.get_pixel(x0 + x, y0 + y));
        }
    }
    out
}

/// Tile one raster pair into `<split_dir>/{image,index}/<basename>/` and
/// return this raster's manifest records. Existing tiles are overwritten.
pub fn extract_pair(
    pair: &PairPaths,
    config: &TilingConfig,
    split_dir: &Path,
) -> TilingResult<Vec<TileRecord>> {
    if !pair.index_path.exists() {
        return Err(TilingError::MissingIndex {
            path: pair.index_path.clone(),
        });
    }
    let image = image::open(&pair.image_path)
        .map_err(|e| image_err(&pair.image_path, e))?
        .to_rgb8();
    let index = image::open(&pair.index_path)
        .map_err(|e| image_err(&pair.index_path, e))?
        .to_luma8();
    if image.dimensions() != index.dimensions() {
        return Err(TilingError::ShapeMismatch {
            basename: pair.basename.clone(),
            image_w: image.width(),
            image_h: image.height(),
            index_w: index.width(),
            index_h: index.height(),
        });
    }

    let grid = TileGrid::new(image.width(), image.height(), config)?;
    let image_dir = split_dir.join("image").join(&pair.basename);
    let index_dir = split_dir.join("index").join(&pair.basename);
    fs::create_dir_all(&image_dir).map_err(|e| io_err(&image_dir, e))?;
    fs::create_dir_all(&index_dir).map_err(|e| io_err(&index_dir, e))?;

    let tile = config.tile_size;
    let mut records = Vec::with_capacity(grid.len());
    for origin in grid.iter() {
        let name = format!(
            "{}_row{:02}_col{:02}.png",
            pair.basename, origin.row, origin.col
        );
        let image_tile = crop_rgb(&image, origin.x, origin.y, tile);
        let index_tile = crop_gray(&index, origin.x, origin.y, tile);
        let image_out = image_dir.join(&name);
        let index_out = index_dir.join(&name);
        image_tile
            .save(&image_out)
            .map_err(|e| image_err(&image_out, e))?;
        index_tile
            .save(&index_out)
            .map_err(|e| image_err(&index_out, e))?;
        records.push(TileRecord {
            basename: pair.basename.clone(),
            row: origin.row,
            col: origin.col,
            image_path: PathBuf::from("image").join(&pair.basename).join(&name),
            label_path: PathBuf::from("index").join(&pair.basename).join(&name),
        });
    }
    Ok(records)
}

/// Tile every discovered pair of one split, writing tiles, the manifest, and
/// run metadata under `<out_root>/<split>/`. Rasters run in parallel; the
/// manifest keeps basename order regardless. A raster failure is recorded in
/// the outcome and does not abort the remaining rasters.
pub fn tile_split(
    root: &Path,
    split: &str,
    config: &TilingConfig,
    out_root: &Path,
) -> TilingResult<SplitOutcome> {
    config.validate()?;
    let pairs = discover_pairs(root, split)?;
    let split_dir = out_root.join(split);

    let results: Vec<(String, TilingResult<Vec<TileRecord>>)> = pairs
        .par_iter()
        .map(|pair| (pair.basename.clone(), extract_pair(pair, config, &split_dir)))
        .collect();

    let mut manifest = TileManifest::new();
    let mut rasters = Vec::with_capacity(results.len());
    for (basename, result) in results {
        match result {
            Ok(records) => {
                rasters.push(RasterReport {
                    basename,
                    tiles: records.len(),
                    error: None,
                });
                for record in records {
                    manifest.push(record)?;
                }
            }
            Err(err) => {
                eprintln!("tiling failed for {basename}: {err}");
                rasters.push(RasterReport {
                    basename,
                    tiles: 0,
                    error: Some(err.to_string()),
                });
            }
        }
    }

    let tiles = manifest.len();
    manifest.save(&split_dir.join("manifest.csv"))?;

    let code_version = TilingRunMeta::resolve_code_version();
    let meta = TilingRunMeta {
        source_root: root.display().to_string(),
        split: split.to_string(),
        tile_size: config.tile_size,
        overlap: config.overlap,
        stride: config.stride(),
        version: TilingRunMeta::compute_version(
            root,
            split,
            config.tile_size,
            config.overlap,
            &code_version,
        ),
        code_version,
        rasters: rasters.clone(),
    };
    meta.save(&split_dir.join("run.json"))?;

    Ok(SplitOutcome {
        split: split.to_string(),
        tiles,
        rasters,
    })
}
