use burn::backend::Autodiff;
use cli_support::{init_worker_pool, DatasetArgs};
use sr_dataset::{DatasetMode, SrDataset};
use std::path::PathBuf;

use crate::trainer::{train, TrainConfig, TrainSummary};
use crate::TrainBackend;
use clap::{Parser, ValueEnum};

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum BackendKind {
    NdArray,
    Wgpu,
}

#[derive(Parser, Debug)]
#[command(name = "train", about = "Train SRCNN on tiled CT input/label pairs")]
pub struct TrainArgs {
    /// Directory receiving epoch_<n>.bin and best.bin.
    #[arg(long)]
    pub outputs_dir: PathBuf,
    #[command(flatten)]
    pub data: DatasetArgs,
    /// Learning rate (conv1/conv2).
    #[arg(long, default_value_t = 1e-4)]
    pub lr: f64,
    /// conv3 learning rate as a fraction of --lr.
    #[arg(long, default_value_t = 0.1)]
    pub head_lr_scale: f64,
    /// Number of epochs.
    #[arg(long = "num-epochs", visible_aliases = ["ep", "num_epochs"], default_value_t = 100)]
    pub num_epochs: usize,
    /// Batch size.
    #[arg(short = 'b', long, visible_alias = "batch_size", default_value_t = 32)]
    pub batch_size: usize,
    /// Fraction of tiles used for training; the rest is held out for PSNR.
    #[arg(long, default_value_t = 0.8)]
    pub split_factor: f32,
    /// Seed for the split, shuffling and augmentation.
    #[arg(long)]
    pub seed: Option<u64>,
    /// Tile-loading worker threads (0 = one per core).
    #[arg(long, default_value_t = 4)]
    pub num_workers: usize,
    /// Optional metrics output path (JSONL); appends one line per epoch.
    #[arg(long)]
    pub metrics_out: Option<PathBuf>,
    /// Backend to use (ndarray or wgpu if enabled).
    #[arg(long, value_enum, default_value_t = BackendKind::NdArray)]
    pub backend: BackendKind,
    /// Hide the per-epoch progress bar.
    #[arg(long, default_value_t = false)]
    pub no_progress: bool,
}

impl TrainArgs {
    pub fn to_config(&self) -> anyhow::Result<TrainConfig> {
        if !(self.lr.is_finite() && self.lr > 0.0) {
            anyhow::bail!("--lr must be a positive number, got {}", self.lr);
        }
        let mut cfg = TrainConfig::new(&self.outputs_dir);
        cfg.num_epochs = self.num_epochs;
        cfg.batch_size = self.batch_size.max(1);
        cfg.lr = self.lr;
        cfg.head_lr_scale = self.head_lr_scale;
        cfg.split_factor = self.split_factor;
        cfg.seed = self.seed;
        cfg.transform = self.data.transform()?;
        cfg.metrics_out = self.metrics_out.clone();
        cfg.progress = !self.no_progress;
        Ok(cfg)
    }
}

pub fn run_train(args: TrainArgs) -> anyhow::Result<TrainSummary> {
    validate_backend_choice(args.backend)?;
    init_worker_pool(args.num_workers);

    let cfg = args.to_config()?;
    let spec = args.data.to_spec(DatasetMode::Train)?;
    let dataset = SrDataset::open(&spec).map_err(|e| {
        anyhow::anyhow!(
            "failed to load dataset under {}: {e}",
            spec.data_root.display()
        )
    })?;

    let device = <Autodiff<TrainBackend> as burn::tensor::backend::Backend>::Device::default();
    let summary = train::<Autodiff<TrainBackend>>(&dataset, &cfg, &device)?;
    println!(
        "best epoch: {}, psnr: {:.2}",
        summary.best_epoch, summary.best_psnr
    );
    println!("Saved checkpoint to {}", summary.best_checkpoint.display());
    Ok(summary)
}

pub fn validate_backend_choice(kind: BackendKind) -> anyhow::Result<()> {
    let built_wgpu = cfg!(feature = "backend-wgpu");
    match (kind, built_wgpu) {
        (BackendKind::Wgpu, false) => {
            anyhow::bail!("backend-wgpu feature not enabled; rebuild with --features backend-wgpu or choose ndarray backend")
        }
        (BackendKind::NdArray, true) => {
            log::warn!("built with backend-wgpu; training will still use the WGPU backend despite --backend ndarray");
        }
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_mirror_reference_hyperparameters() {
        let args = TrainArgs::parse_from(["train", "--outputs-dir", "out"]);
        assert_eq!(args.data.size, 256);
        assert_eq!(args.lr, 1e-4);
        assert_eq!(args.num_epochs, 100);
        assert_eq!(args.batch_size, 32);
        assert_eq!(args.split_factor, 0.8);
        assert_eq!(args.head_lr_scale, 0.1);
    }

    #[test]
    fn outputs_dir_is_required() {
        assert!(TrainArgs::try_parse_from(["train"]).is_err());
    }

    #[test]
    fn short_flags_parse() {
        let args = TrainArgs::parse_from([
            "train",
            "--outputs-dir",
            "out",
            "-s",
            "64",
            "-b",
            "8",
            "--ep",
            "3",
        ]);
        assert_eq!(args.data.size, 64);
        assert_eq!(args.batch_size, 8);
        assert_eq!(args.num_epochs, 3);
    }

    #[test]
    fn snake_case_flags_still_parse() {
        let args = TrainArgs::parse_from([
            "train",
            "--outputs-dir",
            "out",
            "--num_epochs",
            "7",
            "--batch_size",
            "16",
        ]);
        assert_eq!(args.num_epochs, 7);
        assert_eq!(args.batch_size, 16);
    }

    #[test]
    fn wgpu_requires_feature() {
        if !cfg!(feature = "backend-wgpu") {
            assert!(validate_backend_choice(BackendKind::Wgpu).is_err());
        }
        assert!(validate_backend_choice(BackendKind::NdArray).is_ok());
    }

    #[test]
    fn non_positive_lr_is_rejected() {
        let args = TrainArgs::parse_from(["train", "--outputs-dir", "out", "--lr", "0"]);
        assert!(args.to_config().is_err());
    }
}
