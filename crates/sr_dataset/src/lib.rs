//! Dataset loading, splitting, and Burn-compatible batching for CT super-resolution.
//!
//! This crate provides utilities for:
//! - Discovering low-res/high-res image pairs on disk
//! - Normalizing, upscaling and tiling them into fixed-size patches
//! - Seeded train/test splits over tile indices
//! - Paired augmentation and Burn-compatible batch iteration
//! - Inspection reports and PNG previews

pub mod aug;
pub mod config;
pub mod dataset;
pub mod inspect;
pub mod pairs;
pub mod splits;
pub mod types;
pub mod visualize;

#[cfg(feature = "burn-runtime")]
pub mod batch;

pub use config::{
    load_preprocess, load_transform, Normalization, PreprocessConfig, TransformConfig,
    UpscaleFilter, PREPROCESS_CONFIG, TRANSFORM_CONFIG,
};
pub use dataset::{DatasetSpec, SrDataset};
pub use inspect::{check_dataset, write_report};
pub use pairs::{discover_pairs, load_pages, load_plane, resolve_dataset_dir};
pub use splits::{random_split, split_sizes, subset};
pub use types::*;
pub use visualize::{save_panels, Colormap};

#[cfg(feature = "burn-runtime")]
pub use batch::{BatchConfig, BatchIter, PredBatch, TileBatch};
