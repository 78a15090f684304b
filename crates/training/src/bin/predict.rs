use clap::Parser;
use cli_support::{init_logging, init_worker_pool, DatasetArgs};
use sr_dataset::{Colormap, DatasetMode, SrDataset};
use std::path::PathBuf;
use training::util::{validate_backend_choice, BackendKind};
use training::{load_srcnn_from_checkpoint, predict, SrcnnConfig, TrainBackend};

#[derive(Parser, Debug)]
#[command(
    name = "predict",
    about = "Run an SRCNN checkpoint over dataset tiles and save input/prediction/label previews"
)]
struct Args {
    #[command(flatten)]
    data: DatasetArgs,
    /// Checkpoint to load (e.g. outputs/best.bin).
    #[arg(long)]
    checkpoint: PathBuf,
    /// Tile indices to predict (comma separated); all tiles when omitted.
    #[arg(long, value_delimiter = ',')]
    indices: Vec<usize>,
    /// Directory receiving tile_<index>.png previews.
    #[arg(long, default_value = "predictions")]
    out_dir: PathBuf,
    /// Colormap for previews (gray, viridis, inferno, magma, plasma).
    #[arg(long, default_value = "gray")]
    cmap: String,
    #[arg(short = 'b', long, default_value_t = 8)]
    batch_size: usize,
    /// Optional JSON report with per-tile PSNR.
    #[arg(long)]
    report: Option<PathBuf>,
    #[arg(long, default_value_t = 4)]
    num_workers: usize,
    /// Backend to use (ndarray or wgpu if enabled).
    #[arg(long, value_enum, default_value_t = BackendKind::NdArray)]
    backend: BackendKind,
}

fn main() -> anyhow::Result<()> {
    init_logging();
    let args = Args::parse();
    validate_backend_choice(args.backend)?;
    init_worker_pool(args.num_workers);

    let cmap = Colormap::parse(&args.cmap)
        .ok_or_else(|| anyhow::anyhow!("unknown colormap '{}'", args.cmap))?;
    let spec = args.data.to_spec(DatasetMode::Pred)?;
    let dataset = SrDataset::open(&spec)
        .map_err(|e| anyhow::anyhow!("failed to load dataset: {e}"))?;

    let device = <TrainBackend as burn::tensor::backend::Backend>::Device::default();
    let model = load_srcnn_from_checkpoint::<TrainBackend, _>(
        &SrcnnConfig::new(),
        &args.checkpoint,
        &device,
    )
    .map_err(|e| anyhow::anyhow!("failed to load checkpoint {}: {e}", args.checkpoint.display()))?;

    let report = predict(
        &model,
        &dataset,
        &args.indices,
        args.batch_size,
        &args.out_dir,
        cmap,
        &device,
    )?;
    if let Some(path) = &args.report {
        std::fs::write(path, serde_json::to_vec_pretty(&report)?)?;
    }
    match (report.mean_psnr, report.mean_input_psnr) {
        (Some(p), Some(b)) => println!(
            "Predicted {} tiles: mean psnr {p:.2} (upscaled input {b:.2})",
            report.tiles.len()
        ),
        _ => println!("Predicted {} tiles (no labels)", report.tiles.len()),
    }
    println!("Previews written to {}", args.out_dir.display());
    Ok(())
}
