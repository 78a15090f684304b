//! Model checkpoints on disk (`BinFileRecorder`, full precision).

use burn::module::Module;
use burn::record::{BinFileRecorder, FullPrecisionSettings, RecorderError};
use burn::tensor::backend::Backend;
use models::{Srcnn, SrcnnConfig};
use std::fs;
use std::path::{Path, PathBuf};

pub const BEST_CHECKPOINT: &str = "best.bin";

pub fn epoch_checkpoint_path(outputs_dir: &Path, epoch: usize) -> PathBuf {
    outputs_dir.join(format!("epoch_{epoch}.bin"))
}

pub fn best_checkpoint_path(outputs_dir: &Path) -> PathBuf {
    outputs_dir.join(BEST_CHECKPOINT)
}

pub fn save_model<B: Backend>(model: &Srcnn<B>, path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let recorder = BinFileRecorder::<FullPrecisionSettings>::new();
    model
        .clone()
        .save_file(path, &recorder)
        .map_err(|e| anyhow::anyhow!("failed to save checkpoint {}: {e}", path.display()))
}

pub fn load_srcnn_from_checkpoint<B: Backend, P: AsRef<Path>>(
    config: &SrcnnConfig,
    path: P,
    device: &B::Device,
) -> Result<Srcnn<B>, RecorderError> {
    let recorder = BinFileRecorder::<FullPrecisionSettings>::new();
    Srcnn::<B>::new(config, device).load_file(path.as_ref(), &recorder, device)
}
