//! Running averages and PSNR.

use burn::tensor::{backend::Backend, Tensor};
use serde::{Deserialize, Serialize};

/// Lowest MSE used by [`psnr`]; caps PSNR at 100 dB for identical images.
pub const MSE_FLOOR: f32 = 1e-10;

/// Weighted running mean, updated once per batch with the batch size as weight.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AverageMeter {
    pub val: f32,
    pub sum: f32,
    pub count: usize,
    pub avg: f32,
}

impl AverageMeter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, val: f32, n: usize) {
        self.val = val;
        self.sum += val * n as f32;
        self.count += n;
        self.avg = if self.count > 0 {
            self.sum / self.count as f32
        } else {
            0.0
        };
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// PSNR in dB for images scaled to [0, 1]: `10 * log10(1 / mse)`.
pub fn psnr_from_mse(mse: f32) -> f32 {
    let mse = if mse.is_finite() { mse.max(MSE_FLOOR) } else { 1.0 };
    10.0 * (1.0 / mse).log10()
}

/// PSNR over every element of `preds` vs `labels`.
pub fn psnr<B: Backend, const D: usize>(preds: Tensor<B, D>, labels: Tensor<B, D>) -> f32 {
    let mse = (preds - labels).powf_scalar(2.0).mean();
    let mse = scalar(mse);
    psnr_from_mse(mse)
}

/// Pull a single-element tensor back to the host.
pub fn scalar<B: Backend>(t: Tensor<B, 1>) -> f32 {
    t.into_data()
        .to_vec::<f32>()
        .unwrap_or_default()
        .first()
        .copied()
        .unwrap_or(0.0)
}
