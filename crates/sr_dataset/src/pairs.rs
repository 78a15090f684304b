//! Discovering input/label pairs on disk and decoding them into normalized planes.

use crate::config::{Normalization, PreprocessConfig};
use crate::types::{DatasetMode, DatasetResult, ImagePair, Plane, SrDatasetError};
use image::{ImageBuffer, Luma};
use std::collections::BTreeMap;
use std::fs;
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// Resolve a dataset directory against the data root. A leading `/` is treated
/// as root-relative so that `"/Dataset/Pristine"` and `"Dataset/Pristine"` agree.
pub fn resolve_dataset_dir(data_root: &Path, dataset_dir: &str) -> PathBuf {
    let trimmed = dataset_dir.trim_start_matches(['/', '\\']);
    data_root.join(trimmed)
}

fn list_images(dir: &Path, cfg: &PreprocessConfig) -> DatasetResult<BTreeMap<String, PathBuf>> {
    let entries = fs::read_dir(dir).map_err(|e| SrDatasetError::Io {
        path: dir.to_path_buf(),
        source: e,
    })?;
    let mut by_stem = BTreeMap::new();
    for entry in entries {
        let Ok(entry) = entry else { continue };
        let path = entry.path();
        if !path.is_file() || !cfg.accepts(&path) {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        if let Some(prev) = by_stem.insert(stem.to_string(), path.clone()) {
            log::warn!(
                "duplicate stem {stem} in {}: {} shadows {}",
                dir.display(),
                path.display(),
                prev.display()
            );
        }
    }
    Ok(by_stem)
}

/// Scan every dataset dir for `<input_subdir>/<stem>.*` files and match each to
/// `<label_subdir>/<stem>.*`. Pairs come back sorted by dataset dir, then stem.
pub fn discover_pairs(
    data_root: &Path,
    dataset_dirs: &[String],
    cfg: &PreprocessConfig,
    mode: DatasetMode,
) -> DatasetResult<Vec<ImagePair>> {
    let mut pairs = Vec::new();
    for dataset_dir in dataset_dirs {
        let base = resolve_dataset_dir(data_root, dataset_dir);
        let inputs = list_images(&base.join(&cfg.input_subdir), cfg)?;
        let label_dir = base.join(&cfg.label_subdir);
        let labels = if label_dir.is_dir() {
            list_images(&label_dir, cfg)?
        } else if mode == DatasetMode::Train {
            return Err(SrDatasetError::Io {
                path: label_dir,
                source: std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "label directory missing",
                ),
            });
        } else {
            BTreeMap::new()
        };

        for (stem, input) in inputs {
            let label = labels.get(&stem).cloned();
            if label.is_none() && mode == DatasetMode::Train {
                return Err(SrDatasetError::MissingLabel { input });
            }
            pairs.push(ImagePair { input, label, stem });
        }
    }
    Ok(pairs)
}

/// Decode the first page of an image as a single luma channel in [0, 1] and apply `normalization`.
pub fn load_plane(path: &Path, normalization: Normalization) -> DatasetResult<Plane> {
    let mut pages = load_pages(path, normalization)?;
    if pages.len() > 1 {
        log::warn!(
            "{} has {} pages; using the first",
            path.display(),
            pages.len()
        );
    }
    Ok(pages.swap_remove(0))
}

/// Decode every page of an image. TIFF stacks yield one plane per page, other
/// formats a single plane. Each page is normalized on its own.
pub fn load_pages(path: &Path, normalization: Normalization) -> DatasetResult<Vec<Plane>> {
    let mut pages = if is_tiff(path) {
        decode_tiff_pages(path)?
    } else {
        let img = image::open(path).map_err(|e| SrDatasetError::Image {
            path: path.to_path_buf(),
            source: e,
        })?;
        let luma = img.to_luma32f();
        let (width, height) = luma.dimensions();
        vec![Plane::new(width, height, luma.into_raw())]
    };
    for page in &mut pages {
        normalize_in_place(&mut page.data, normalization);
    }
    Ok(pages)
}

fn is_tiff(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("tif") || e.eq_ignore_ascii_case("tiff"))
}

fn decode_tiff_pages(path: &Path) -> DatasetResult<Vec<Plane>> {
    use tiff::decoder::{Decoder, DecodingResult, Limits};

    let tiff_err = |source: tiff::TiffError| SrDatasetError::Tiff {
        path: path.to_path_buf(),
        source,
    };
    let file = fs::File::open(path).map_err(|e| SrDatasetError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    let mut decoder = Decoder::new(BufReader::new(file))
        .map_err(tiff_err)?
        .with_limits(Limits::unlimited());

    let mut pages = Vec::new();
    loop {
        let (width, height) = decoder.dimensions().map_err(tiff_err)?;
        let channels = match decoder.colortype().map_err(tiff_err)? {
            tiff::ColorType::Gray(_) => 1,
            tiff::ColorType::GrayA(_) => 2,
            tiff::ColorType::RGB(_) => 3,
            tiff::ColorType::RGBA(_) => 4,
            other => {
                return Err(SrDatasetError::Other(format!(
                    "{}: unsupported TIFF color type {other:?}",
                    path.display()
                )))
            }
        };
        let samples: Vec<f32> = match decoder.read_image().map_err(tiff_err)? {
            DecodingResult::U8(buf) => buf.iter().map(|&v| v as f32 / u8::MAX as f32).collect(),
            DecodingResult::U16(buf) => buf.iter().map(|&v| v as f32 / u16::MAX as f32).collect(),
            DecodingResult::U32(buf) => buf.iter().map(|&v| v as f32 / u32::MAX as f32).collect(),
            DecodingResult::U64(buf) => buf.iter().map(|&v| v as f32 / u64::MAX as f32).collect(),
            DecodingResult::F32(buf) => buf,
            DecodingResult::F64(buf) => buf.iter().map(|&v| v as f32).collect(),
            _ => {
                return Err(SrDatasetError::Other(format!(
                    "{}: signed integer TIFF samples are not supported",
                    path.display()
                )))
            }
        };
        let expected = width as usize * height as usize * channels;
        if samples.len() != expected {
            return Err(SrDatasetError::Other(format!(
                "{}: page {} has {} samples, expected {expected}",
                path.display(),
                pages.len(),
                samples.len()
            )));
        }
        let data = match channels {
            1 => samples,
            2 => samples.chunks_exact(2).map(|px| px[0]).collect(),
            _ => samples
                .chunks_exact(channels)
                .map(|px| 0.2126 * px[0] + 0.7152 * px[1] + 0.0722 * px[2])
                .collect(),
        };
        pages.push(Plane::new(width, height, data));

        if !decoder.more_images() {
            break;
        }
        decoder.next_image().map_err(tiff_err)?;
    }
    log::debug!("decoded {} page(s) from {}", pages.len(), path.display());
    Ok(pages)
}

pub fn normalize_in_place(data: &mut [f32], normalization: Normalization) {
    let (lo, hi) = match normalization {
        Normalization::MinMax => data
            .iter()
            .filter(|v| v.is_finite())
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            }),
        Normalization::Percentile { low, high } => {
            let mut sorted: Vec<f32> = data.iter().copied().filter(|v| v.is_finite()).collect();
            sorted.sort_by(|a, b| a.total_cmp(b));
            (percentile(&sorted, low), percentile(&sorted, high))
        }
        Normalization::Fixed { min, max } => (min, max),
    };
    let range = hi - lo;
    if !range.is_finite() || range <= f32::EPSILON {
        data.iter_mut().for_each(|v| *v = 0.0);
        return;
    }
    for v in data.iter_mut() {
        *v = if v.is_finite() {
            ((*v - lo) / range).clamp(0.0, 1.0)
        } else {
            0.0
        };
    }
}

fn percentile(sorted: &[f32], pct: f32) -> f32 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = (pct.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f32;
    sorted[rank.round() as usize]
}

/// Resize a plane to `(width, height)` and clamp the result back into [0, 1]
/// (Catmull-Rom and Lanczos overshoot at edges).
pub fn resize_plane(
    plane: &Plane,
    width: u32,
    height: u32,
    filter: image::imageops::FilterType,
) -> Plane {
    if plane.width == width && plane.height == height {
        return plane.clone();
    }
    let buf: ImageBuffer<Luma<f32>, Vec<f32>> =
        match ImageBuffer::from_raw(plane.width, plane.height, plane.data.clone()) {
            Some(buf) => buf,
            None => return Plane::zeros(width, height),
        };
    let resized = image::imageops::resize(&buf, width, height, filter);
    let mut data = resized.into_raw();
    data.iter_mut().for_each(|v| *v = v.clamp(0.0, 1.0));
    Plane::new(width, height, data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leading_slash_is_root_relative() {
        let root = Path::new("/data/root");
        assert_eq!(
            resolve_dataset_dir(root, "/Dataset/Pristine"),
            PathBuf::from("/data/root/Dataset/Pristine")
        );
        assert_eq!(
            resolve_dataset_dir(root, "Dataset/Pristine"),
            PathBuf::from("/data/root/Dataset/Pristine")
        );
    }

    #[test]
    fn min_max_stretches_to_unit_range() {
        let mut data = vec![0.25, 0.5, 0.75];
        normalize_in_place(&mut data, Normalization::MinMax);
        assert_eq!(data, vec![0.0, 0.5, 1.0]);
    }

    #[test]
    fn flat_image_normalizes_to_zero() {
        let mut data = vec![0.3; 4];
        normalize_in_place(&mut data, Normalization::MinMax);
        assert!(data.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn fixed_window_clips() {
        let mut data = vec![0.0, 0.2, 0.6, 1.0];
        normalize_in_place(&mut data, Normalization::Fixed { min: 0.2, max: 0.6 });
        assert_eq!(data, vec![0.0, 0.0, 1.0, 1.0]);
    }

    #[test]
    fn percentile_ignores_outliers() {
        let mut data: Vec<f32> = (0..101).map(|i| i as f32 / 100.0).collect();
        data[100] = 50.0;
        normalize_in_place(
            &mut data,
            Normalization::Percentile {
                low: 0.0,
                high: 99.0,
            },
        );
        assert_eq!(data[0], 0.0);
        assert_eq!(data[100], 1.0);
        assert!(data[50] > 0.49 && data[50] < 0.52);
    }

    #[test]
    fn resize_keeps_values_in_range() {
        let plane = Plane::new(2, 2, vec![0.0, 1.0, 1.0, 0.0]);
        let up = resize_plane(&plane, 8, 8, image::imageops::FilterType::CatmullRom);
        assert_eq!((up.width, up.height), (8, 8));
        assert!(up.data.iter().all(|v| (0.0..=1.0).contains(v)));
    }
}
