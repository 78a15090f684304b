//! YAML preprocessing and augmentation configs.
//!
//! Both files are optional: a missing file yields `None` and the caller falls
//! back to defaults (preprocess) or no augmentation (transform).

use crate::types::{DatasetResult, SrDatasetError};
use image::imageops::FilterType;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const PREPROCESS_CONFIG: &str = "configs/preprocess.yaml";
pub const TRANSFORM_CONFIG: &str = "configs/transform.yaml";

/// How raw detector counts are mapped into [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Normalization {
    /// Per-image min/max stretch.
    #[default]
    MinMax,
    /// Per-image percentile clip, e.g. `{low: 0.5, high: 99.5}`.
    Percentile { low: f32, high: f32 },
    /// Fixed window in the image's native [0, 1] scale.
    Fixed { min: f32, max: f32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpscaleFilter {
    Nearest,
    Triangle,
    #[default]
    CatmullRom,
    Gaussian,
    Lanczos3,
}

impl From<UpscaleFilter> for FilterType {
    fn from(f: UpscaleFilter) -> Self {
        match f {
            UpscaleFilter::Nearest => FilterType::Nearest,
            UpscaleFilter::Triangle => FilterType::Triangle,
            UpscaleFilter::CatmullRom => FilterType::CatmullRom,
            UpscaleFilter::Gaussian => FilterType::Gaussian,
            UpscaleFilter::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    /// Directory (relative to each dataset dir) holding the low-res inputs.
    pub input_subdir: String,
    /// Directory (relative to each dataset dir) holding the high-res labels.
    pub label_subdir: String,
    /// Accepted file extensions, case-insensitive.
    pub extensions: Vec<String>,
    pub normalization: Normalization,
    /// Filter used when an input must be resized to its label's dimensions.
    pub upscale_filter: UpscaleFilter,
    /// Step between tile origins; defaults to the tile size (no overlap).
    pub stride: Option<u32>,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            input_subdir: "input".to_string(),
            label_subdir: "label".to_string(),
            extensions: vec!["tif".into(), "tiff".into(), "png".into()],
            normalization: Normalization::MinMax,
            upscale_filter: UpscaleFilter::CatmullRom,
            stride: None,
        }
    }
}

impl PreprocessConfig {
    pub fn accepts(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|a| a.eq_ignore_ascii_case(ext)))
    }
}

/// Paired geometric augmentations applied to training tiles.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformConfig {
    pub flip_horizontal_prob: f32,
    pub flip_vertical_prob: f32,
    pub rotate90_prob: f32,
}

impl TransformConfig {
    pub fn is_identity(&self) -> bool {
        self.flip_horizontal_prob <= 0.0
            && self.flip_vertical_prob <= 0.0
            && self.rotate90_prob <= 0.0
    }
}

fn load_yaml<T: DeserializeOwned>(path: &Path) -> DatasetResult<T> {
    let raw = fs::read_to_string(path).map_err(|e| SrDatasetError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    serde_yaml::from_str(&raw).map_err(|e| SrDatasetError::Yaml {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Load a YAML config if the file exists; a missing file is not an error.
pub fn load_optional<T: DeserializeOwned>(path: &Path) -> DatasetResult<Option<T>> {
    if !path.is_file() {
        log::debug!("config {} not found; using defaults", path.display());
        return Ok(None);
    }
    load_yaml(path).map(Some)
}

pub fn load_preprocess(path: &Path) -> DatasetResult<PreprocessConfig> {
    Ok(load_optional(path)?.unwrap_or_default())
}

pub fn load_transform(path: &Path) -> DatasetResult<Option<TransformConfig>> {
    load_optional(path)
}
