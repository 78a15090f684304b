//! Side-by-side tile previews written as PNG.

use crate::types::{DatasetResult, Plane, SrDatasetError};
use image::{Rgb, RgbImage};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Gap between panels, in pixels.
const PANEL_GAP: u32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Colormap {
    #[default]
    Gray,
    Viridis,
    Inferno,
    Magma,
    Plasma,
}

impl Colormap {
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "gray" | "grey" => Some(Colormap::Gray),
            "viridis" => Some(Colormap::Viridis),
            "inferno" => Some(Colormap::Inferno),
            "magma" => Some(Colormap::Magma),
            "plasma" => Some(Colormap::Plasma),
            _ => None,
        }
    }

    pub fn color(self, v: f32) -> Rgb<u8> {
        let v = if v.is_finite() { v.clamp(0.0, 1.0) } else { 0.0 };
        let gradient = match self {
            Colormap::Gray => {
                let g = (v * 255.0).round() as u8;
                return Rgb([g, g, g]);
            }
            Colormap::Viridis => colorous::VIRIDIS,
            Colormap::Inferno => colorous::INFERNO,
            Colormap::Magma => colorous::MAGMA,
            Colormap::Plasma => colorous::PLASMA,
        };
        let c = gradient.eval_continuous(v as f64);
        Rgb([c.r, c.g, c.b])
    }
}

pub fn colorize(plane: &Plane, cmap: Colormap) -> RgbImage {
    RgbImage::from_fn(plane.width, plane.height, |x, y| cmap.color(plane.get(x, y)))
}

fn sanitize(title: &str) -> String {
    title
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

fn save_png(img: &RgbImage, path: &Path) -> DatasetResult<()> {
    img.save(path).map_err(|e| SrDatasetError::Image {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Write `panels` left to right into `out_path`, plus one `<stem>_<title>.png` per panel.
/// Returns every file written, montage first.
pub fn save_panels(
    panels: &[(&str, &Plane)],
    cmap: Colormap,
    out_path: &Path,
) -> DatasetResult<Vec<PathBuf>> {
    if panels.is_empty() {
        return Err(SrDatasetError::Empty("no panels to plot".to_string()));
    }
    if let Some(parent) = out_path.parent() {
        fs::create_dir_all(parent).map_err(|e| SrDatasetError::Io {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }
    let width: u32 = panels.iter().map(|(_, p)| p.width).sum::<u32>()
        + PANEL_GAP * (panels.len() as u32 - 1);
    let height = panels.iter().map(|(_, p)| p.height).max().unwrap_or(0);
    let mut montage = RgbImage::from_pixel(width, height, Rgb([255, 255, 255]));

    let stem = out_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("panel")
        .to_string();
    let dir = out_path.parent().unwrap_or(Path::new("."));
    let mut written = vec![out_path.to_path_buf()];
    let mut x0 = 0u32;
    for (title, plane) in panels {
        let img = colorize(plane, cmap);
        image::imageops::replace(&mut montage, &img, x0 as i64, 0);
        x0 += plane.width + PANEL_GAP;

        let panel_path = dir.join(format!("{stem}_{}.png", sanitize(title)));
        save_png(&img, &panel_path)?;
        written.push(panel_path);
    }
    save_png(&montage, out_path)?;
    log::info!(
        "wrote {} ({})",
        out_path.display(),
        panels
            .iter()
            .map(|(t, _)| *t)
            .collect::<Vec<_>>()
            .join(" | ")
    );
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gray_maps_endpoints() {
        assert_eq!(Colormap::Gray.color(0.0), Rgb([0, 0, 0]));
        assert_eq!(Colormap::Gray.color(1.0), Rgb([255, 255, 255]));
        assert_eq!(Colormap::Gray.color(f32::NAN), Rgb([0, 0, 0]));
    }

    #[test]
    fn parse_names() {
        assert_eq!(Colormap::parse("Grey"), Some(Colormap::Gray));
        assert_eq!(Colormap::parse("viridis"), Some(Colormap::Viridis));
        assert_eq!(Colormap::parse("jet"), None);
    }

    #[test]
    fn montage_width_includes_gaps() {
        let tmp = tempfile::tempdir().unwrap();
        let a = Plane::zeros(4, 4);
        let b = Plane::new(4, 4, vec![1.0; 16]);
        let out = tmp.path().join("tile_0.png");
        let written = save_panels(&[("input", &a), ("label", &b)], Colormap::Gray, &out).unwrap();
        assert_eq!(written.len(), 3);
        let img = image::open(&out).unwrap();
        assert_eq!(img.width(), 4 + PANEL_GAP + 4);
        assert!(tmp.path().join("tile_0_label.png").exists());
    }
}
