//! Integration tests: manifest-driven loading, modality stacking, batching.

use data_contracts::{TileManifest, TileRecord};
use image::{GrayImage, Rgb, RgbImage};
use meadow_dataset::{load_sample, BatchIter, DatasetConfig, DatasetError, Modality};
use std::fs;
use std::path::{Path, PathBuf};

type NdArray = burn_ndarray::NdArray<f32>;

/// Write a tiled split with `tiles` tile pairs of the given edge length and
/// return the manifest path.
fn synthetic_split(dir: &Path, tiles: u32, edge: u32) -> PathBuf {
    let basename = "beaufort_middle_2022";
    let mut manifest = TileManifest::new();
    for col in 0..tiles {
        let name = format!("{basename}_row00_col{col:02}.png");
        let image_rel = PathBuf::from("image").join(basename).join(&name);
        let label_rel = PathBuf::from("index").join(basename).join(&name);

        let image = RgbImage::from_fn(edge, edge, |x, y| {
            Rgb([(x + col) as u8, y as u8, 100])
        });
        fs::create_dir_all(dir.join(&image_rel).parent().unwrap()).unwrap();
        image.save(dir.join(&image_rel)).unwrap();

        let label = GrayImage::from_fn(edge, edge, |x, _| {
            image::Luma([if x < edge / 2 { 255 } else { 0 }])
        });
        fs::create_dir_all(dir.join(&label_rel).parent().unwrap()).unwrap();
        label.save(dir.join(&label_rel)).unwrap();

        manifest
            .push(TileRecord {
                basename: basename.to_string(),
                row: 0,
                col,
                image_path: image_rel,
                label_path: label_rel,
            })
            .unwrap();
    }
    let path = dir.join("manifest.csv");
    manifest.save(&path).unwrap();
    path
}

#[test]
fn rgb_sample_has_three_channels_and_a_mask() {
    let tmp = tempfile::tempdir().unwrap();
    let manifest_path = synthetic_split(tmp.path(), 1, 8);
    let manifest = TileManifest::load(&manifest_path).unwrap();

    let sample = load_sample(tmp.path(), &manifest.records()[0], &[Modality::Rgb]).unwrap();
    assert_eq!(sample.input.channels, 3);
    assert_eq!((sample.input.width, sample.input.height), (8, 8));
    // Left half of the label tile is foreground.
    assert_eq!(sample.mask.count(), 32);
    assert!(sample.input.data.iter().all(|v| (0.0..=1.0).contains(v)));
}

#[test]
fn modalities_stack_in_declared_order() {
    let tmp = tempfile::tempdir().unwrap();
    let manifest_path = synthetic_split(tmp.path(), 1, 8);
    let manifest = TileManifest::load(&manifest_path).unwrap();

    // Request order is reversed; stacking order must still be rgb then index.
    let sample = load_sample(
        tmp.path(),
        &manifest.records()[0],
        &[Modality::Index, Modality::Rgb],
    )
    .unwrap();
    assert_eq!(sample.input.channels, 4);
    // Channel 3 is the index plane: 1.0 on the left half, 0.0 on the right.
    assert_eq!(sample.input.get(3, 0, 0), 1.0);
    assert_eq!(sample.input.get(3, 7, 0), 0.0);
    // Channel 1 is green = y / 255.
    assert!((sample.input.get(1, 0, 3) - 3.0 / 255.0).abs() < 1e-6);
}

#[test]
fn missing_modality_file_fails_without_partial_tensor() {
    let tmp = tempfile::tempdir().unwrap();
    let manifest_path = synthetic_split(tmp.path(), 1, 8);
    let manifest = TileManifest::load(&manifest_path).unwrap();
    let record = &manifest.records()[0];

    fs::remove_file(tmp.path().join(&record.label_path)).unwrap();
    let err = load_sample(tmp.path(), record, &[Modality::Rgb, Modality::Index]).unwrap_err();
    assert!(matches!(
        err,
        DatasetError::MissingModality {
            modality: Modality::Index,
            ..
        }
    ));
}

#[test]
fn missing_label_fails_even_without_index_modality() {
    let tmp = tempfile::tempdir().unwrap();
    let manifest_path = synthetic_split(tmp.path(), 1, 8);
    let manifest = TileManifest::load(&manifest_path).unwrap();
    let record = &manifest.records()[0];

    fs::remove_file(tmp.path().join(&record.label_path)).unwrap();
    assert!(load_sample(tmp.path(), record, &[Modality::Rgb]).is_err());
}

#[test]
fn batch_iter_yields_all_tiles_then_none() {
    let tmp = tempfile::tempdir().unwrap();
    let manifest_path = synthetic_split(tmp.path(), 5, 8);

    let cfg = DatasetConfig {
        shuffle: true,
        seed: Some(42),
        ..DatasetConfig::default()
    };
    let mut iter = BatchIter::from_manifest(&manifest_path, cfg).unwrap();
    assert_eq!(iter.len(), 5);

    let device = Default::default();
    let mut seen = 0usize;
    while let Some(batch) = iter.next_batch::<NdArray>(2, &device).unwrap() {
        let dims = batch.images.dims();
        assert_eq!(&dims[1..], &[3, 8, 8]);
        assert_eq!(batch.masks.dims(), [dims[0], 1, 8, 8]);
        seen += dims[0];
    }
    assert_eq!(seen, 5);
    assert_eq!(iter.skipped_errors(), 0);

    iter.reset();
    let again = iter.next_batch::<NdArray>(2, &device).unwrap().unwrap();
    assert_eq!(again.images.dims()[0], 2);
}

#[test]
fn drop_last_skips_the_partial_batch() {
    let tmp = tempfile::tempdir().unwrap();
    let manifest_path = synthetic_split(tmp.path(), 5, 8);

    let cfg = DatasetConfig {
        shuffle: false,
        drop_last: true,
        ..DatasetConfig::default()
    };
    let mut iter = BatchIter::from_manifest(&manifest_path, cfg).unwrap();
    let device = Default::default();
    let mut seen = 0usize;
    while let Some(batch) = iter.next_batch::<NdArray>(2, &device).unwrap() {
        seen += batch.images.dims()[0];
    }
    assert_eq!(seen, 4);
}

#[test]
fn permissive_mode_skips_corrupt_tiles() {
    let tmp = tempfile::tempdir().unwrap();
    let manifest_path = synthetic_split(tmp.path(), 4, 8);
    // Corrupt one image tile.
    fs::write(
        tmp.path()
            .join("image/beaufort_middle_2022/beaufort_middle_2022_row00_col01.png"),
        b"not a png",
    )
    .unwrap();

    let cfg = DatasetConfig::eval(vec![Modality::Rgb]);
    let mut iter = BatchIter::from_manifest(&manifest_path, cfg).unwrap();
    let device = Default::default();
    let mut seen = 0usize;
    while let Some(batch) = iter.next_batch::<NdArray>(2, &device).unwrap() {
        seen += batch.images.dims()[0];
    }
    assert_eq!(seen, 3);
    assert_eq!(iter.skipped_errors(), 1);
}
