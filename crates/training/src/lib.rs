#![recursion_limit = "256"]

pub mod checkpoint;
pub mod metrics;
pub mod predict;
pub mod trainer;
pub mod util;

pub use checkpoint::{
    best_checkpoint_path, epoch_checkpoint_path, load_srcnn_from_checkpoint, save_model,
    BEST_CHECKPOINT,
};
pub use metrics::{psnr, psnr_from_mse, AverageMeter};
pub use models::{Srcnn, SrcnnConfig};
pub use predict::{predict, PredictionReport, TilePrediction};
pub use trainer::{evaluate, train, train_step, EpochMetrics, TrainConfig, TrainSummary};
pub use util::{run_train, TrainArgs};
/// Backend alias for training/eval (NdArray by default; WGPU if enabled).
#[cfg(feature = "backend-wgpu")]
pub type TrainBackend = burn::backend::Wgpu<f32>;
#[cfg(not(feature = "backend-wgpu"))]
pub type TrainBackend = burn::backend::NdArray<f32>;
