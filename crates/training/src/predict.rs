//! Run a trained model over selected tiles and write `input | prediction | label` previews.

use crate::metrics::psnr_from_mse;
use burn::tensor::backend::Backend;
use models::Srcnn;
use serde::{Deserialize, Serialize};
use sr_dataset::{save_panels, subset, BatchConfig, BatchIter, Colormap, Plane, SrDataset};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TilePrediction {
    pub index: usize,
    /// `None` when the tile has no label.
    pub psnr: Option<f32>,
    /// PSNR of the upscaled input against the label, as a baseline.
    pub input_psnr: Option<f32>,
    pub preview: PathBuf,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PredictionReport {
    pub tiles: Vec<TilePrediction>,
    pub mean_psnr: Option<f32>,
    pub mean_input_psnr: Option<f32>,
}

fn mse(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() {
        return 0.0;
    }
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum::<f32>() / a.len() as f32
}

fn mean(values: impl Iterator<Item = f32>) -> Option<f32> {
    let (sum, n) = values.fold((0.0f32, 0usize), |(s, n), v| (s + v, n + 1));
    (n > 0).then(|| sum / n as f32)
}

/// Predict `indices` (all tiles when empty) in batches and save one preview per tile under `out_dir`.
pub fn predict<B: Backend>(
    model: &Srcnn<B>,
    dataset: &SrDataset,
    indices: &[usize],
    batch_size: usize,
    out_dir: &Path,
    cmap: Colormap,
    device: &B::Device,
) -> anyhow::Result<PredictionReport> {
    let selected = if indices.is_empty() {
        (0..dataset.len()).collect()
    } else {
        subset(indices, dataset.len())
    };
    if selected.is_empty() {
        anyhow::bail!("no tiles selected for prediction");
    }
    let size = dataset.tile_size();
    let mut report = PredictionReport::default();
    let mut iter = BatchIter::new(dataset, selected, BatchConfig::eval(None));
    while let Some(batch) = iter
        .next_pred_batch::<B>(batch_size.max(1), device)
        .map_err(|e| anyhow::anyhow!("failed to load prediction batch: {e}"))?
    {
        let preds = model.forward(batch.inputs).clamp(0.0, 1.0);
        let preds = preds
            .into_data()
            .to_vec::<f32>()
            .map_err(|e| anyhow::anyhow!("failed to read predictions: {e:?}"))?;
        let per_tile = (size * size) as usize;
        for (sample, pred) in batch.samples.iter().zip(preds.chunks_exact(per_tile)) {
            let input = sample.input_plane();
            let pred_plane = Plane::new(size, size, pred.to_vec());
            let label = sample.label_plane();
            let preview = out_dir.join(format!("tile_{:05}.png", sample.index));
            let mut panels = vec![("input", &input), ("prediction", &pred_plane)];
            if let Some(label) = label.as_ref() {
                panels.push(("label", label));
            }
            save_panels(&panels, cmap, &preview)
                .map_err(|e| anyhow::anyhow!("failed to write preview: {e}"))?;

            let (psnr, input_psnr) = match sample.label.as_ref() {
                Some(l) => (
                    Some(psnr_from_mse(mse(pred, l))),
                    Some(psnr_from_mse(mse(&sample.input, l))),
                ),
                None => (None, None),
            };
            if let Some(p) = psnr {
                log::info!("tile {}: psnr {p:.2}", sample.index);
            }
            report.tiles.push(TilePrediction {
                index: sample.index,
                psnr,
                input_psnr,
                preview,
            });
        }
    }
    report.mean_psnr = mean(report.tiles.iter().filter_map(|t| t.psnr));
    report.mean_input_psnr = mean(report.tiles.iter().filter_map(|t| t.input_psnr));
    Ok(report)
}
