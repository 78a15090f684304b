//! Core types, error definitions, and data structures for sr_dataset.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

pub type DatasetResult<T> = Result<T, SrDatasetError>;

#[derive(Debug, Error)]
pub enum SrDatasetError {
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("yaml parse error at {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("image decode error at {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("tiff decode error at {path}: {source}")]
    Tiff {
        path: PathBuf,
        #[source]
        source: tiff::TiffError,
    },
    #[error("no label image found for input {input}")]
    MissingLabel { input: PathBuf },
    #[error("{input} has {input_pages} pages but its label has {label_pages}")]
    PageCountMismatch {
        input: PathBuf,
        input_pages: usize,
        label_pages: usize,
    },
    #[error("tile {index} has no label image (prediction-only dataset)")]
    UnlabeledTile { index: usize },
    #[error("image {path} is {width}x{height}, smaller than tile size {size}")]
    TooSmall {
        path: PathBuf,
        width: u32,
        height: u32,
        size: u32,
    },
    #[error("index {index} out of range for dataset of {len} tiles")]
    OutOfRange { index: usize, len: usize },
    #[error("{0}")]
    Empty(String),
    #[error("{0}")]
    Other(String),
}

/// Whether every input must come with a label (training) or labels are optional (prediction).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetMode {
    Train,
    Pred,
}

/// One low-res input image and its high-res label on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePair {
    pub input: PathBuf,
    pub label: Option<PathBuf>,
    /// File stem shared by input and label.
    pub stem: String,
}

/// Single-channel image normalized to [0, 1], row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct Plane {
    pub width: u32,
    pub height: u32,
    pub data: Vec<f32>,
}

impl Plane {
    pub fn new(width: u32, height: u32, data: Vec<f32>) -> Self {
        debug_assert_eq!(data.len(), width as usize * height as usize);
        Self {
            width,
            height,
            data,
        }
    }

    pub fn zeros(width: u32, height: u32) -> Self {
        Self::new(width, height, vec![0.0; width as usize * height as usize])
    }

    #[inline]
    pub fn get(&self, x: u32, y: u32) -> f32 {
        self.data[y as usize * self.width as usize + x as usize]
    }

    /// Copy a `size x size` window whose top-left corner is `(x, y)`.
    pub fn crop(&self, x: u32, y: u32, size: u32) -> Vec<f32> {
        let w = self.width as usize;
        let s = size as usize;
        let mut out = Vec::with_capacity(s * s);
        for row in y as usize..y as usize + s {
            let start = row * w + x as usize;
            out.extend_from_slice(&self.data[start..start + s]);
        }
        out
    }
}

/// Position of one tile inside a loaded pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileRef {
    pub pair: usize,
    /// Page of a multi-page stack; 0 for single images.
    pub page: usize,
    pub x: u32,
    pub y: u32,
}

/// A cropped input/label tile, `size x size`, values in [0, 1].
#[derive(Debug, Clone)]
pub struct TileSample {
    pub index: usize,
    pub size: u32,
    pub input: Vec<f32>,
    pub label: Option<Vec<f32>>,
}

impl TileSample {
    pub fn input_plane(&self) -> Plane {
        Plane::new(self.size, self.size, self.input.clone())
    }

    pub fn label_plane(&self) -> Option<Plane> {
        self.label
            .as_ref()
            .map(|l| Plane::new(self.size, self.size, l.clone()))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PairSummary {
    pub stem: String,
    pub input: PathBuf,
    pub label: Option<PathBuf>,
    pub pages: usize,
    pub width: u32,
    pub height: u32,
    pub tiles: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TileShape {
    pub index: usize,
    pub input: [usize; 3],
    pub label: Option<[usize; 3]>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatasetReport {
    pub tile_size: u32,
    pub stride: u32,
    pub total_tiles: usize,
    pub unlabeled_tiles: usize,
    pub pairs: Vec<PairSummary>,
    pub tiles: Vec<TileShape>,
}
