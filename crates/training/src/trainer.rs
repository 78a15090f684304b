//! Supervised train/eval loop with per-epoch checkpoints and best-PSNR selection.

use crate::checkpoint::{best_checkpoint_path, epoch_checkpoint_path, save_model};
use crate::metrics::{psnr, scalar, AverageMeter};
use burn::module::AutodiffModule;
use burn::nn::loss::{MseLoss, Reduction};
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::tensor::backend::{AutodiffBackend, Backend};
use indicatif::{ProgressBar, ProgressStyle};
use models::{Srcnn, SrcnnConfig};
use serde::{Deserialize, Serialize};
use sr_dataset::{random_split, BatchConfig, BatchIter, SrDataset, TileBatch, TransformConfig};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct TrainConfig {
    pub outputs_dir: PathBuf,
    pub num_epochs: usize,
    pub batch_size: usize,
    /// Learning rate for conv1/conv2.
    pub lr: f64,
    /// conv3 trains at `lr * head_lr_scale`.
    pub head_lr_scale: f64,
    /// Fraction of tiles used for training; the rest is the test split.
    pub split_factor: f32,
    pub seed: Option<u64>,
    pub transform: Option<TransformConfig>,
    /// Append one JSON line per epoch here when set.
    pub metrics_out: Option<PathBuf>,
    pub model: SrcnnConfig,
    /// Draw an indicatif bar during the train phase.
    pub progress: bool,
}

impl TrainConfig {
    pub fn new(outputs_dir: impl Into<PathBuf>) -> Self {
        Self {
            outputs_dir: outputs_dir.into(),
            num_epochs: 100,
            batch_size: 32,
            lr: 1e-4,
            head_lr_scale: 0.1,
            split_factor: 0.8,
            seed: None,
            transform: None,
            metrics_out: None,
            model: SrcnnConfig::new(),
            progress: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochMetrics {
    pub epoch: usize,
    pub train_loss: f32,
    /// `None` when the test split is empty.
    pub eval_psnr: Option<f32>,
    pub best_epoch: usize,
    pub best_psnr: f32,
}

#[derive(Debug, Clone)]
pub struct TrainSummary {
    pub epochs: Vec<EpochMetrics>,
    pub best_epoch: usize,
    pub best_psnr: f32,
    pub best_checkpoint: PathBuf,
    pub train_tiles: usize,
    pub test_tiles: usize,
}

/// Forward, MSE, backward, then two Adam steps: body grads at `lr`, head grads at `head_lr`.
pub fn train_step<B, O>(
    model: Srcnn<B>,
    optim: &mut O,
    batch: TileBatch<B>,
    lr: f64,
    head_lr: f64,
) -> (Srcnn<B>, f32)
where
    B: AutodiffBackend,
    O: Optimizer<Srcnn<B>, B>,
{
    let preds = model.forward(batch.inputs);
    let loss = MseLoss::new().forward(preds, batch.labels, Reduction::Mean);
    let loss_val = scalar(loss.clone().detach());

    let mut grads = loss.backward();
    // Pull the head's grads out first; whatever remains belongs to the body.
    let head_grads = GradientsParams::from_module(&mut grads, model.head());
    let body_grads = GradientsParams::from_grads(grads, &model);
    let model = optim.step(lr, model, body_grads);
    let model = optim.step(head_lr, model, head_grads);
    (model, loss_val)
}

/// Average PSNR over `indices`, each batch weighted by its size. Predictions are clamped to [0, 1].
/// Returns `None` for an empty index set.
pub fn evaluate<B: Backend>(
    model: &Srcnn<B>,
    dataset: &SrDataset,
    indices: &[usize],
    batch_size: usize,
    device: &B::Device,
) -> anyhow::Result<Option<f32>> {
    if indices.is_empty() {
        return Ok(None);
    }
    let mut meter = AverageMeter::new();
    let mut iter = BatchIter::new(dataset, indices.to_vec(), BatchConfig::eval(None));
    while let Some(batch) = iter
        .next_batch::<B>(batch_size, device)
        .map_err(|e| anyhow::anyhow!("failed to load eval batch: {e}"))?
    {
        let n = batch.len();
        let preds = model.forward(batch.inputs).clamp(0.0, 1.0);
        meter.update(psnr(preds, batch.labels), n);
    }
    Ok(Some(meter.avg))
}

fn progress_bar(total: usize, enabled: bool) -> ProgressBar {
    if !enabled {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(total as u64);
    let style = ProgressStyle::with_template(
        "{prefix} {bar:40.cyan/blue} {pos}/{len} [{elapsed_precise}<{eta_precise}] {msg}",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);
    pb
}

fn append_metrics(path: &Path, record: &EpochMetrics) {
    let line = match serde_json::to_string(record) {
        Ok(line) => line,
        Err(e) => {
            log::warn!("failed to encode metrics for epoch {}: {e}", record.epoch);
            return;
        }
    };
    if let Some(parent) = path.parent() {
        if let Err(e) = fs::create_dir_all(parent) {
            log::warn!("failed to create {}: {e}", parent.display());
            return;
        }
    }
    match fs::OpenOptions::new().create(true).append(true).open(path) {
        Ok(mut f) => {
            if let Err(e) = writeln!(f, "{line}") {
                log::warn!("failed to write metrics to {}: {e}", path.display());
            }
        }
        Err(e) => log::warn!("failed to open metrics file {}: {e}", path.display()),
    }
}

/// Train an SRCNN on `dataset`, writing `epoch_<e>.bin` every epoch and `best.bin` at the end.
pub fn train<B: AutodiffBackend>(
    dataset: &SrDataset,
    cfg: &TrainConfig,
    device: &B::Device,
) -> anyhow::Result<TrainSummary> {
    fs::create_dir_all(&cfg.outputs_dir)?;
    let batch_size = cfg.batch_size.max(1);

    let (train_idx, test_idx) = random_split(dataset.len(), cfg.split_factor, cfg.seed)
        .map_err(|e| anyhow::anyhow!("failed to split dataset: {e}"))?;
    if train_idx.is_empty() {
        anyhow::bail!(
            "training split is empty ({} tiles, split factor {})",
            dataset.len(),
            cfg.split_factor
        );
    }
    if test_idx.is_empty() {
        log::warn!("test split is empty; eval PSNR will be skipped and best.bin keeps the initial weights");
    }
    log::info!(
        "split {} tiles -> {} train / {} test",
        dataset.len(),
        train_idx.len(),
        test_idx.len()
    );

    let mut model = cfg.model.init::<B>(device);
    let mut optim = AdamConfig::new().init();
    let head_lr = cfg.lr * cfg.head_lr_scale;

    let mut best_model = model.valid();
    let mut best_epoch = 0usize;
    let mut best_psnr = 0.0f32;
    let mut history = Vec::with_capacity(cfg.num_epochs);
    let last_epoch = cfg.num_epochs.saturating_sub(1);

    for epoch in 0..cfg.num_epochs {
        let mut epoch_losses = AverageMeter::new();
        let train_cfg = BatchConfig {
            shuffle: true,
            seed: cfg.seed.map(|s| s.wrapping_add(epoch as u64)),
            drop_last: false,
            transform: cfg.transform,
        };
        let mut train_iter = BatchIter::new(dataset, train_idx.clone(), train_cfg);

        let pb = progress_bar(train_idx.len() - train_idx.len() % batch_size, cfg.progress);
        pb.set_prefix(format!("epoch: {epoch}/{last_epoch}"));
        while let Some(batch) = train_iter
            .next_batch::<B>(batch_size, device)
            .map_err(|e| anyhow::anyhow!("failed to load train batch: {e}"))?
        {
            let n = batch.len();
            let (next, loss) = train_step(model, &mut optim, batch, cfg.lr, head_lr);
            model = next;
            epoch_losses.update(loss, n);
            pb.set_message(format!("loss={:.6}", epoch_losses.avg));
            pb.inc(n as u64);
        }
        pb.finish();
        log::info!("epoch {epoch}: train loss {:.6}", epoch_losses.avg);

        let ckpt = epoch_checkpoint_path(&cfg.outputs_dir, epoch);
        save_model(&model, &ckpt)?;
        log::debug!("saved {}", ckpt.display());

        let valid = model.valid();
        let eval_psnr = evaluate(&valid, dataset, &test_idx, batch_size, device)?;
        if let Some(p) = eval_psnr {
            log::info!("eval psnr: {p:.2}");
            if p > best_psnr {
                best_epoch = epoch;
                best_psnr = p;
                best_model = valid;
            }
        }

        let record = EpochMetrics {
            epoch,
            train_loss: epoch_losses.avg,
            eval_psnr,
            best_epoch,
            best_psnr,
        };
        if let Some(path) = &cfg.metrics_out {
            append_metrics(path, &record);
        }
        history.push(record);
    }

    log::info!("best epoch: {best_epoch}, psnr: {best_psnr:.2}");
    let best_checkpoint = best_checkpoint_path(&cfg.outputs_dir);
    save_model(&best_model, &best_checkpoint)?;

    Ok(TrainSummary {
        epochs: history,
        best_epoch,
        best_psnr,
        best_checkpoint,
        train_tiles: train_idx.len(),
        test_tiles: test_idx.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(epoch: usize) -> EpochMetrics {
        EpochMetrics {
            epoch,
            train_loss: 0.5,
            eval_psnr: Some(20.0),
            best_epoch: epoch,
            best_psnr: 20.0,
        }
    }

    #[test]
    fn metrics_append_one_json_line_per_epoch() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("runs/a/metrics.jsonl");
        append_metrics(&path, &record(0));
        append_metrics(&path, &record(1));
        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        for (i, line) in lines.iter().enumerate() {
            let back: EpochMetrics = serde_json::from_str(line).unwrap();
            assert_eq!(back, record(i));
        }
    }

    #[test]
    fn unusable_metrics_dir_writes_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join("not_a_dir");
        fs::write(&blocker, b"").unwrap();
        let path = blocker.join("metrics.jsonl");
        append_metrics(&path, &record(0));
        assert!(!path.exists());
        assert_eq!(fs::read(&blocker).unwrap().len(), 0);
    }
}
