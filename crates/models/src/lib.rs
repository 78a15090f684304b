//! Burn super-resolution models for CT tiles.
//!
//! `Srcnn` is the three-layer SRCNN: patch extraction, non-linear mapping and
//! reconstruction. It works on single-channel tiles that were already upscaled
//! to the label resolution, so input and output share `[B, C, H, W]`.
//!
//! The first two convolutions form the "body" and the last one the "head";
//! the trainer steps the head with a reduced learning rate.

use burn::config::Config;
use burn::module::Module;
use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::PaddingConfig2d;
use burn::tensor::activation::relu;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

#[derive(Config, Debug)]
pub struct SrcnnConfig {
    /// Image channels in and out.
    #[config(default = 1)]
    pub channels: usize,
    /// Feature maps after conv1 and conv2.
    #[config(default = "[64, 32]")]
    pub features: [usize; 2],
    /// Square kernel sizes of conv1, conv2, conv3. Must be odd.
    #[config(default = "[9, 5, 5]")]
    pub kernels: [usize; 3],
}

impl SrcnnConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> Srcnn<B> {
        let [f1, f2] = self.features;
        let [k1, k2, k3] = self.kernels;
        Srcnn {
            conv1: same_conv([self.channels, f1], k1, device),
            conv2: same_conv([f1, f2], k2, device),
            conv3: same_conv([f2, self.channels], k3, device),
        }
    }
}

/// Explicit `k / 2` padding keeps H and W for odd kernels.
fn same_conv<B: Backend>(channels: [usize; 2], kernel: usize, device: &B::Device) -> Conv2d<B> {
    let pad = kernel / 2;
    Conv2dConfig::new(channels, [kernel, kernel])
        .with_padding(PaddingConfig2d::Explicit(pad, pad))
        .init(device)
}

#[derive(Module, Debug)]
pub struct Srcnn<B: Backend> {
    conv1: Conv2d<B>,
    conv2: Conv2d<B>,
    conv3: Conv2d<B>,
}

impl<B: Backend> Srcnn<B> {
    pub fn new(config: &SrcnnConfig, device: &B::Device) -> Self {
        config.init(device)
    }

    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = relu(self.conv1.forward(input));
        let x = relu(self.conv2.forward(x));
        self.conv3.forward(x)
    }

    /// Feature layers (conv1, conv2).
    pub fn body(&self) -> (&Conv2d<B>, &Conv2d<B>) {
        (&self.conv1, &self.conv2)
    }

    /// Reconstruction layer (conv3).
    pub fn head(&self) -> &Conv2d<B> {
        &self.conv3
    }
}

pub mod prelude {
    pub use super::{Srcnn, SrcnnConfig};
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::ndarray::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn forward_preserves_shape() {
        let device = Default::default();
        let model = SrcnnConfig::new().init::<TestBackend>(&device);
        let x = Tensor::<TestBackend, 4>::zeros([2, 1, 16, 12], &device);
        assert_eq!(model.forward(x).dims(), [2, 1, 16, 12]);
    }

    #[test]
    fn custom_kernels_still_preserve_shape() {
        let device = Default::default();
        let model = SrcnnConfig::new()
            .with_features([8, 4])
            .with_kernels([3, 1, 3])
            .init::<TestBackend>(&device);
        let x = Tensor::<TestBackend, 4>::ones([1, 1, 5, 5], &device);
        assert_eq!(model.forward(x).dims(), [1, 1, 5, 5]);
    }

    #[test]
    fn default_config_matches_srcnn_915() {
        let cfg = SrcnnConfig::new();
        assert_eq!(cfg.channels, 1);
        assert_eq!(cfg.features, [64, 32]);
        assert_eq!(cfg.kernels, [9, 5, 5]);
    }
}
