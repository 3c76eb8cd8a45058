//! Smoke test: one training epoch on a tiny synthetic manifest.

use cli_support::ModalityArgs;
use data_contracts::{TileManifest, TileRecord};
use image::{GrayImage, Rgb, RgbImage};
use std::fs;
use std::path::{Path, PathBuf};
use training::{run_train, BackendKind, ModelKind, TrainArgs};

fn synthetic_manifest(dir: &Path, tiles: u32, edge: u32) -> PathBuf {
    let basename = "beaufort_middle_2022";
    let mut manifest = TileManifest::new();
    for col in 0..tiles {
        let name = format!("{basename}_row00_col{col:02}.png");
        let image_rel = PathBuf::from("image").join(basename).join(&name);
        let label_rel = PathBuf::from("index").join(basename).join(&name);

        fs::create_dir_all(dir.join(&image_rel).parent().unwrap()).unwrap();
        RgbImage::from_fn(edge, edge, |x, y| Rgb([x as u8 * 20, y as u8 * 20, 128]))
            .save(dir.join(&image_rel))
            .unwrap();
        fs::create_dir_all(dir.join(&label_rel).parent().unwrap()).unwrap();
        GrayImage::from_fn(edge, edge, |x, _| {
            image::Luma([if x < edge / 2 { 255 } else { 0 }])
        })
        .save(dir.join(&label_rel))
        .unwrap();

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

fn args(manifest: PathBuf, out_dir: PathBuf) -> TrainArgs {
    TrainArgs {
        manifest,
        model: ModelKind::Probe,
        backend: BackendKind::NdArray,
        modalities: ModalityArgs {
            modalities: vec!["rgb".to_string()],
        },
        epochs: 1,
        batch_size: 2,
        lr: 1e-2,
        seed: Some(7),
        flip_horizontal_prob: 0.5,
        flip_vertical_prob: 0.0,
        color_jitter_prob: 0.0,
        noise_prob: 0.0,
        checkpoint: None,
        checkpoint_out: None,
        out_dir,
    }
}

#[test]
fn one_epoch_saves_a_checkpoint() {
    let tmp = tempfile::tempdir().unwrap();
    let manifest = synthetic_manifest(tmp.path(), 4, 8);
    let out_dir = tmp.path().join("checkpoints");

    run_train(args(manifest, out_dir.clone())).unwrap();
    assert!(out_dir.join("pixel_probe.bin").exists());
}

#[test]
fn empty_manifest_is_a_fatal_error() {
    let tmp = tempfile::tempdir().unwrap();
    let manifest = synthetic_manifest(tmp.path(), 0, 8);
    let out_dir = tmp.path().join("checkpoints");
    assert!(run_train(args(manifest, out_dir)).is_err());
}

#[test]
fn wgpu_choice_requires_the_feature() {
    let result = training::util::validate_backend_choice(BackendKind::Wgpu);
    assert_eq!(result.is_ok(), cfg!(feature = "backend-wgpu"));
}
