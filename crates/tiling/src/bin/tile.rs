use clap::Parser;
use std::path::PathBuf;
use tiling::{tile_split, TilingConfig};

#[derive(Parser, Debug)]
#[command(
    name = "tile",
    about = "Tile orthomosaic image/index pairs into overlapping tiles with a manifest per split"
)]
struct Args {
    /// Dataset root containing <site>/<split>/{image,index}/ directories.
    #[arg(long)]
    data_root: PathBuf,
    /// Output root; tiles land under <out-root>/<split>/{image,index}/<basename>/.
    #[arg(long)]
    out_root: PathBuf,
    /// Tile edge length in pixels.
    #[arg(long, default_value_t = 512)]
    tile_size: u32,
    /// Overlap fraction between adjacent tiles, in [0, 1).
    #[arg(long, default_value_t = 0.3)]
    overlap: f32,
    /// Comma-separated splits to tile.
    #[arg(long, default_value = "train,valid,test", value_delimiter = ',')]
    splits: Vec<String>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = TilingConfig::new(args.tile_size, args.overlap);
    config.validate()?;

    let mut failed = 0usize;
    for split in &args.splits {
        let outcome = tile_split(&args.data_root, split, &config, &args.out_root)?;
        if outcome.rasters.is_empty() {
            println!("{split}: no raster pairs found, skipping");
            continue;
        }
        for raster in &outcome.rasters {
            match &raster.error {
                None => println!("{split}/{}: {} tiles", raster.basename, raster.tiles),
                Some(err) => println!("{split}/{}: FAILED ({err})", raster.basename),
            }
        }
        println!(
            "{split}: {} tiles from {} rasters ({} failed), manifest at {}",
            outcome.tiles,
            outcome.rasters.len(),
            outcome.failed(),
            args.out_root.join(split).join("manifest.csv").display()
        );
        failed += outcome.failed();
    }

    if failed > 0 {
        anyhow::bail!("{failed} raster(s) failed to tile");
    }
    Ok(())
}
