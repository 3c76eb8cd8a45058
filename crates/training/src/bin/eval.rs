use clap::Parser;
use cli_support::ModalityArgs;
use inference::{SegmenterFactory, SegmenterModel, SegmenterOptions};
use meadow_dataset::{ManifestSource, Modality};
use seg_core::metrics;
use serde::Serialize;
use std::fs;
use std::path::PathBuf;
use training::util::validate_backend_choice;
use training::{BackendKind, ModelKind};

#[derive(Parser, Debug)]
#[command(
    name = "eval",
    about = "Evaluate a segmentation checkpoint on a tiled manifest (IoU/Dice/boundary IoU/Hausdorff)"
)]
struct Args {
    /// Tile manifest to evaluate on (as written by the tile binary).
    #[arg(long)]
    manifest: PathBuf,
    /// Checkpoint to load; without one the brightness heuristic is scored.
    #[arg(long)]
    checkpoint: Option<PathBuf>,
    /// Model kind the checkpoint holds.
    #[arg(long, value_enum, default_value_t = ModelKind::Refiner)]
    model: ModelKind,
    /// Backend to use (ndarray or wgpu if enabled).
    #[arg(long, value_enum, default_value_t = BackendKind::NdArray)]
    backend: BackendKind,
    #[command(flatten)]
    modalities: ModalityArgs,
    /// Probability threshold for binarizing predictions.
    #[arg(long, default_value_t = 0.5)]
    threshold: f32,
    /// Boundary band width in pixels for boundary IoU.
    #[arg(long, default_value_t = 2)]
    boundary_band: u32,
    /// Output directory for report.json.
    #[arg(long, default_value = "eval")]
    out_dir: PathBuf,
}

#[derive(Debug, Default, Serialize)]
struct EvalReport {
    tiles: usize,
    threshold: f32,
    boundary_band: u32,
    mean_iou: f64,
    mean_dice: f64,
    mean_boundary_iou: f64,
    /// Mean over tiles where precision is defined (non-empty prediction).
    mean_precision: f64,
    precision_defined: usize,
    /// Mean over tiles where recall is defined (non-empty ground truth).
    mean_recall: f64,
    recall_defined: usize,
    /// Mean over tiles with a finite Hausdorff distance.
    mean_hausdorff: f64,
    hausdorff_infinite: usize,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    validate_backend_choice(args.backend)?;
    let modalities = args.modalities.parse()?;
    let in_channels = Modality::stacked_channels(&modalities);

    let source = ManifestSource::open(&args.manifest)?;
    if source.is_empty() {
        println!("No tiles found in {}", args.manifest.display());
        return Ok(());
    }

    let opts = SegmenterOptions {
        threshold: args.threshold,
        model: match args.model {
            ModelKind::Probe => SegmenterModel::Probe,
            ModelKind::Refiner => SegmenterModel::Refiner,
        },
        in_channels,
    };
    let mut segmenter = SegmenterFactory.build(opts, args.checkpoint.as_deref());

    let mut iou_sum = 0.0f64;
    let mut dice_sum = 0.0f64;
    let mut biou_sum = 0.0f64;
    let mut precision_sum = 0.0f64;
    let mut precision_defined = 0usize;
    let mut recall_sum = 0.0f64;
    let mut recall_defined = 0usize;
    let mut hausdorff_sum = 0.0f64;
    let mut hausdorff_finite = 0usize;
    let mut hausdorff_infinite = 0usize;

    for record in source.records() {
        let sample = source.load(record, &modalities)?;
        let pred = segmenter.predict(&sample.input);

        iou_sum += metrics::iou(&pred, &sample.mask);
        dice_sum += metrics::dice(&pred, &sample.mask);
        biou_sum += metrics::boundary_iou(&pred, &sample.mask, args.boundary_band);
        let precision = metrics::precision(&pred, &sample.mask);
        if !precision.is_nan() {
            precision_sum += precision;
            precision_defined += 1;
        }
        let recall = metrics::recall(&pred, &sample.mask);
        if !recall.is_nan() {
            recall_sum += recall;
            recall_defined += 1;
        }
        let hausdorff = metrics::hausdorff(&pred, &sample.mask);
        if hausdorff.is_finite() {
            hausdorff_sum += hausdorff;
            hausdorff_finite += 1;
        } else {
            hausdorff_infinite += 1;
        }
    }

    let tiles = source.len();
    let ratio = |sum: f64, n: usize| if n == 0 { f64::NAN } else { sum / n as f64 };
    let report = EvalReport {
        tiles,
        threshold: args.threshold,
        boundary_band: args.boundary_band,
        mean_iou: iou_sum / tiles as f64,
        mean_dice: dice_sum / tiles as f64,
        mean_boundary_iou: biou_sum / tiles as f64,
        mean_precision: ratio(precision_sum, precision_defined),
        precision_defined,
        mean_recall: ratio(recall_sum, recall_defined),
        recall_defined,
        mean_hausdorff: ratio(hausdorff_sum, hausdorff_finite),
        hausdorff_infinite,
    };

    fs::create_dir_all(&args.out_dir)?;
    let report_path = args.out_dir.join("report.json");
    fs::write(&report_path, serde_json::to_vec_pretty(&report)?)?;

    println!("evaluated {} tiles from {}", tiles, args.manifest.display());
    println!(
        "iou {:.4}  dice {:.4}  boundary-iou {:.4}",
        report.mean_iou, report.mean_dice, report.mean_boundary_iou
    );
    println!(
        "precision {:.4} ({}/{} defined)  recall {:.4} ({}/{} defined)",
        report.mean_precision, precision_defined, tiles, report.mean_recall, recall_defined, tiles
    );
    println!(
        "hausdorff {:.2}px over {} finite tiles ({} infinite)",
        report.mean_hausdorff, hausdorff_finite, hausdorff_infinite
    );
    println!("report written to {}", report_path.display());
    Ok(())
}
