//! In-memory tiled dataset over discovered input/label pairs.

use crate::config::PreprocessConfig;
use crate::pairs::{discover_pairs, load_pages, resize_plane};
use crate::types::{
    DatasetMode, DatasetResult, ImagePair, PairSummary, Plane, SrDatasetError, TileRef, TileSample,
};
use rayon::prelude::*;
use std::path::PathBuf;
use std::time::Instant;

/// Everything needed to build an [`SrDataset`].
#[derive(Debug, Clone)]
pub struct DatasetSpec {
    pub data_root: PathBuf,
    pub dataset_dirs: Vec<String>,
    pub mode: DatasetMode,
    /// Edge length of the square tiles, in label pixels.
    pub tile_size: u32,
    pub preprocess: PreprocessConfig,
}

#[derive(Debug, Clone)]
struct LoadedPage {
    input: Plane,
    label: Option<Plane>,
}

/// One input/label pair; TIFF stacks hold one entry per page.
#[derive(Debug, Clone)]
struct LoadedPair {
    pair: ImagePair,
    pages: Vec<LoadedPage>,
}

/// Eagerly loaded image pairs cut into `tile_size x tile_size` tiles.
///
/// Inputs whose size differs from their label are resized up front, so every
/// tile index addresses the same window in both planes. Page `k` of an input
/// stack pairs with page `k` of its label stack.
#[derive(Debug, Clone)]
pub struct SrDataset {
    pairs: Vec<LoadedPair>,
    tiles: Vec<TileRef>,
    tile_size: u32,
    stride: u32,
    mode: DatasetMode,
}

impl SrDataset {
    pub fn open(spec: &DatasetSpec) -> DatasetResult<Self> {
        let pairs = discover_pairs(
            &spec.data_root,
            &spec.dataset_dirs,
            &spec.preprocess,
            spec.mode,
        )?;
        if pairs.is_empty() {
            return Err(SrDatasetError::Empty(format!(
                "no image pairs found under {} in {:?}",
                spec.data_root.display(),
                spec.dataset_dirs
            )));
        }
        Self::from_pairs(pairs, spec)
    }

    pub fn from_pairs(pairs: Vec<ImagePair>, spec: &DatasetSpec) -> DatasetResult<Self> {
        let size = spec.tile_size;
        if size == 0 {
            return Err(SrDatasetError::Other("tile size must be > 0".to_string()));
        }
        let stride = spec.preprocess.stride.unwrap_or(size).max(1);
        let started = Instant::now();
        let loaded: Vec<LoadedPair> = pairs
            .into_par_iter()
            .map(|pair| load_pair(pair, &spec.preprocess, size))
            .collect::<DatasetResult<_>>()?;

        let mut tiles = Vec::new();
        for (idx, lp) in loaded.iter().enumerate() {
            for (page, lpage) in lp.pages.iter().enumerate() {
                let (w, h) = (lpage.input.width, lpage.input.height);
                for y in (0..=h - size).step_by(stride as usize) {
                    for x in (0..=w - size).step_by(stride as usize) {
                        tiles.push(TileRef {
                            pair: idx,
                            page,
                            x,
                            y,
                        });
                    }
                }
            }
        }
        log::info!(
            "loaded {} pairs ({} pages) -> {} tiles of {}x{} (stride {}) in {:.2}s",
            loaded.len(),
            loaded.iter().map(|lp| lp.pages.len()).sum::<usize>(),
            tiles.len(),
            size,
            size,
            stride,
            started.elapsed().as_secs_f32()
        );
        Ok(Self {
            pairs: loaded,
            tiles,
            tile_size: size,
            stride,
            mode: spec.mode,
        })
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    pub fn stride(&self) -> u32 {
        self.stride
    }

    pub fn mode(&self) -> DatasetMode {
        self.mode
    }

    pub fn tile(&self, index: usize) -> DatasetResult<TileRef> {
        self.tiles
            .get(index)
            .copied()
            .ok_or(SrDatasetError::OutOfRange {
                index,
                len: self.tiles.len(),
            })
    }

    pub fn pair(&self, index: usize) -> Option<&ImagePair> {
        self.pairs.get(index).map(|p| &p.pair)
    }

    pub fn pair_summaries(&self) -> Vec<PairSummary> {
        let mut counts = vec![0usize; self.pairs.len()];
        for t in &self.tiles {
            counts[t.pair] += 1;
        }
        self.pairs
            .iter()
            .zip(counts)
            .map(|(lp, tiles)| {
                let first = &lp.pages[0].input;
                PairSummary {
                    stem: lp.pair.stem.clone(),
                    input: lp.pair.input.clone(),
                    label: lp.pair.label.clone(),
                    pages: lp.pages.len(),
                    width: first.width,
                    height: first.height,
                    tiles,
                }
            })
            .collect()
    }

    /// Crop tile `index` from its input (and label, when present).
    pub fn get(&self, index: usize) -> DatasetResult<TileSample> {
        let t = self.tile(index)?;
        let lp = &self.pairs[t.pair].pages[t.page];
        Ok(TileSample {
            index,
            size: self.tile_size,
            input: lp.input.crop(t.x, t.y, self.tile_size),
            label: lp
                .label
                .as_ref()
                .map(|l| l.crop(t.x, t.y, self.tile_size)),
        })
    }
}

fn load_pair(pair: ImagePair, cfg: &PreprocessConfig, size: u32) -> DatasetResult<LoadedPair> {
    let inputs = load_pages(&pair.input, cfg.normalization)?;
    let labels = match &pair.label {
        Some(path) => {
            let labels = load_pages(path, cfg.normalization)?;
            if labels.len() != inputs.len() {
                return Err(SrDatasetError::PageCountMismatch {
                    input: pair.input.clone(),
                    input_pages: inputs.len(),
                    label_pages: labels.len(),
                });
            }
            labels.into_iter().map(Some).collect()
        }
        None => vec![None; inputs.len()],
    };
    let pages = inputs
        .into_iter()
        .zip(labels)
        .map(|(input, label)| load_page(&pair, input, label, cfg, size))
        .collect::<DatasetResult<Vec<_>>>()?;
    Ok(LoadedPair { pair, pages })
}

fn load_page(
    pair: &ImagePair,
    input: Plane,
    label: Option<Plane>,
    cfg: &PreprocessConfig,
    size: u32,
) -> DatasetResult<LoadedPage> {
    // The label grid wins; without a label the input keeps its own size.
    let (w, h) = label
        .as_ref()
        .map(|l| (l.width, l.height))
        .unwrap_or((input.width, input.height));
    if w < size || h < size {
        let path = pair.label.clone().unwrap_or_else(|| pair.input.clone());
        return Err(SrDatasetError::TooSmall {
            path,
            width: w,
            height: h,
            size,
        });
    }
    let input = if (input.width, input.height) != (w, h) {
        log::debug!(
            "resizing {} from {}x{} to {}x{}",
            pair.input.display(),
            input.width,
            input.height,
            w,
            h
        );
        resize_plane(&input, w, h, cfg.upscale_filter.into())
    } else {
        input
    };
    Ok(LoadedPage { input, label })
}
