use clap::Parser;
use meadow_dataset::{delete_orphans, summarize_pairs, PairKeyOptions};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "check_pairs",
    about = "Report (and optionally delete) image/index files without a partner. Dry-run by default."
)]
struct Args {
    /// Dataset root containing <site>/<split>/{image,index}/ directories.
    #[arg(long)]
    data_root: PathBuf,
    /// Comma-separated splits to check.
    #[arg(long, default_value = "train,valid,test", value_delimiter = ',')]
    splits: Vec<String>,
    /// Compare stems only (same name, different extension counts as paired).
    #[arg(long, default_value_t = false)]
    ignore_ext: bool,
    /// Case-insensitive filename comparison.
    #[arg(long, default_value_t = false)]
    ignore_case: bool,
    /// Actually delete orphans instead of only reporting them.
    #[arg(long, default_value_t = false)]
    delete: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let opts = PairKeyOptions {
        ignore_ext: args.ignore_ext,
        ignore_case: args.ignore_case,
    };
    let reports = summarize_pairs(&args.data_root, &args.splits, opts)?;

    let mut orphans = 0usize;
    for report in &reports {
        if report.is_clean() {
            println!("{}/{}: {} pairs, clean", report.site, report.split, report.paired);
            continue;
        }
        println!(
            "{}/{}: {} pairs, {} orphan image(s), {} orphan index(es)",
            report.site,
            report.split,
            report.paired,
            report.orphan_images.len(),
            report.orphan_indices.len()
        );
        for path in report.orphan_images.iter().chain(&report.orphan_indices) {
            println!("  orphan: {}", path.display());
        }
        orphans += report.orphan_images.len() + report.orphan_indices.len();
    }

    if orphans == 0 {
        println!("all pairs matched");
        return Ok(());
    }
    if args.delete {
        let removed = delete_orphans(&reports)?;
        println!("deleted {removed} orphan file(s)");
    } else {
        println!("{orphans} orphan file(s) found; re-run with --delete to remove them");
    }
    Ok(())
}
