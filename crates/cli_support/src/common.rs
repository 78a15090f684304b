use clap::Args;
use sr_dataset::{
    load_preprocess, load_transform, DatasetMode, DatasetSpec, TransformConfig, PREPROCESS_CONFIG,
    TRANSFORM_CONFIG,
};
use std::path::PathBuf;

/// Dataset location and tiling options shared by train/predict/inspect.
#[derive(Debug, Clone, Args)]
pub struct DatasetArgs {
    /// Root directory; dataset dirs and `configs/` are resolved against it.
    #[arg(long, default_value = ".")]
    pub data_root: PathBuf,
    /// Dataset directory relative to the data root (repeatable).
    #[arg(long = "dataset-dir", default_value = "Dataset/Pristine")]
    pub dataset_dirs: Vec<String>,
    /// Edge length of each square tile, in label pixels.
    #[arg(short = 's', long, default_value_t = 256)]
    pub size: u32,
    /// Preprocess YAML (defaults to `<data_root>/configs/preprocess.yaml` when present).
    #[arg(long)]
    pub preprocess_config: Option<PathBuf>,
    /// Transform YAML (defaults to `<data_root>/configs/transform.yaml` when present).
    #[arg(long)]
    pub transform_config: Option<PathBuf>,
}

impl DatasetArgs {
    pub fn preprocess_path(&self) -> PathBuf {
        self.preprocess_config
            .clone()
            .unwrap_or_else(|| self.data_root.join(PREPROCESS_CONFIG))
    }

    pub fn transform_path(&self) -> PathBuf {
        self.transform_config
            .clone()
            .unwrap_or_else(|| self.data_root.join(TRANSFORM_CONFIG))
    }

    /// Build a dataset spec, reading the preprocess YAML if it exists.
    pub fn to_spec(&self, mode: DatasetMode) -> anyhow::Result<DatasetSpec> {
        let path = self.preprocess_path();
        let preprocess = load_preprocess(&path)
            .map_err(|e| anyhow::anyhow!("failed to load preprocess config: {e}"))?;
        Ok(DatasetSpec {
            data_root: self.data_root.clone(),
            dataset_dirs: self.dataset_dirs.clone(),
            mode,
            tile_size: self.size,
            preprocess,
        })
    }

    /// Augmentation config, or `None` when no transform YAML exists.
    pub fn transform(&self) -> anyhow::Result<Option<TransformConfig>> {
        let path = self.transform_path();
        let cfg = load_transform(&path)
            .map_err(|e| anyhow::anyhow!("failed to load transform config: {e}"))?;
        if cfg.is_none() {
            log::info!("no transform config at {}; augmentation off", path.display());
        }
        Ok(cfg)
    }
}

/// Size the global rayon pool used by the tile loaders. `0` keeps rayon's default.
pub fn init_worker_pool(num_workers: usize) {
    if num_workers == 0 {
        return;
    }
    if let Err(e) = rayon::ThreadPoolBuilder::new()
        .num_threads(num_workers)
        .build_global()
    {
        log::warn!("worker pool already initialized: {e}");
    }
}

/// `env_logger` at `info` unless `RUST_LOG` says otherwise.
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .try_init();
}
