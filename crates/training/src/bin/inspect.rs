use clap::Parser;
use cli_support::{init_logging, DatasetArgs};
use sr_dataset::{check_dataset, save_panels, write_report, Colormap, DatasetMode, SrDataset};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "inspect", about = "Check dataset tiling and optionally preview tiles")]
struct Args {
    #[command(flatten)]
    data: DatasetArgs,
    /// Load unlabeled inputs too (prediction layout).
    #[arg(long, default_value_t = false)]
    pred: bool,
    /// Write the tile report as JSON.
    #[arg(long)]
    report: Option<PathBuf>,
    /// Save input/label montages for the first N tiles.
    #[arg(long, default_value_t = 0)]
    preview: usize,
    #[arg(long, default_value = "inspect")]
    out_dir: PathBuf,
    #[arg(long, default_value = "gray")]
    cmap: String,
}

fn main() -> anyhow::Result<()> {
    init_logging();
    let args = Args::parse();
    let mode = if args.pred {
        DatasetMode::Pred
    } else {
        DatasetMode::Train
    };
    let spec = args.data.to_spec(mode)?;
    let dataset = SrDataset::open(&spec)
        .map_err(|e| anyhow::anyhow!("failed to load dataset: {e}"))?;

    let report = check_dataset(&dataset).map_err(|e| anyhow::anyhow!("check failed: {e}"))?;
    println!(
        "{} tiles of {}x{} (stride {}) from {} images, {} unlabeled",
        report.total_tiles,
        report.tile_size,
        report.tile_size,
        report.stride,
        report.pairs.len(),
        report.unlabeled_tiles
    );
    if let Some(path) = &args.report {
        write_report(&report, path).map_err(|e| anyhow::anyhow!("{e}"))?;
        println!("Report written to {}", path.display());
    }

    if args.preview > 0 {
        let cmap = Colormap::parse(&args.cmap)
            .ok_or_else(|| anyhow::anyhow!("unknown colormap '{}'", args.cmap))?;
        for i in 0..args.preview.min(dataset.len()) {
            let sample = dataset.get(i).map_err(|e| anyhow::anyhow!("{e}"))?;
            let input = sample.input_plane();
            let label = sample.label_plane();
            let mut panels = vec![("input", &input)];
            if let Some(label) = label.as_ref() {
                panels.push(("label", label));
            }
            let out = args.out_dir.join(format!("tile_{i:05}.png"));
            save_panels(&panels, cmap, &out).map_err(|e| anyhow::anyhow!("{e}"))?;
        }
        println!("Previews written to {}", args.out_dir.display());
    }
    Ok(())
}
