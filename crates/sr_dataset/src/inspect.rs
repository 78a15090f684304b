//! Dataset inspection: walk every tile and report shapes.

use crate::dataset::SrDataset;
use crate::types::{DatasetReport, DatasetResult, SrDatasetError, TileShape};
use std::fs;
use std::path::Path;

/// Visit every tile once, logging `index input_shape label_shape`, and collect a report.
pub fn check_dataset(dataset: &SrDataset) -> DatasetResult<DatasetReport> {
    let len = dataset.len();
    log::info!("dataset has {len} tiles");
    let size = dataset.tile_size() as usize;
    let mut tiles = Vec::with_capacity(len);
    let mut unlabeled = 0usize;
    for i in 0..len {
        let sample = dataset.get(i)?;
        let input = [1, size, sample.input.len() / size.max(1)];
        let label = sample
            .label
            .as_ref()
            .map(|l| [1, size, l.len() / size.max(1)]);
        if label.is_none() {
            unlabeled += 1;
        }
        log::info!("{i} {input:?} {label:?}");
        tiles.push(TileShape {
            index: i,
            input,
            label,
        });
    }
    Ok(DatasetReport {
        tile_size: dataset.tile_size(),
        stride: dataset.stride(),
        total_tiles: len,
        unlabeled_tiles: unlabeled,
        pairs: dataset.pair_summaries(),
        tiles,
    })
}

pub fn write_report(report: &DatasetReport, path: &Path) -> DatasetResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| SrDatasetError::Io {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }
    let json = serde_json::to_vec_pretty(report)
        .map_err(|e| SrDatasetError::Other(format!("failed to encode report: {e}")))?;
    fs::write(path, json).map_err(|e| SrDatasetError::Io {
        path: path.to_path_buf(),
        source: e,
    })
}
