//! Paired geometric augmentation for square tiles.
//!
//! Input and label receive the same transform so pixel correspondence is kept.

use crate::config::TransformConfig;
use crate::types::TileSample;
use rand::Rng;

fn flip_horizontal(buf: &mut [f32], size: usize) {
    for row in buf.chunks_exact_mut(size) {
        row.reverse();
    }
}

fn flip_vertical(buf: &mut [f32], size: usize) {
    for y in 0..size / 2 {
        let (top, bottom) = buf.split_at_mut((size - 1 - y) * size);
        top[y * size..(y + 1) * size].swap_with_slice(&mut bottom[..size]);
    }
}

/// Rotate 90 degrees clockwise.
fn rotate90(buf: &[f32], size: usize) -> Vec<f32> {
    let mut out = vec![0.0f32; buf.len()];
    for y in 0..size {
        for x in 0..size {
            out[x * size + (size - 1 - y)] = buf[y * size + x];
        }
    }
    out
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Ops {
    hflip: bool,
    vflip: bool,
    rot90: bool,
}

fn apply_ops(buf: &mut Vec<f32>, size: usize, ops: Ops) {
    if ops.hflip {
        flip_horizontal(buf, size);
    }
    if ops.vflip {
        flip_vertical(buf, size);
    }
    if ops.rot90 {
        *buf = rotate90(buf, size);
    }
}

impl TransformConfig {
    /// Draw one set of ops from `rng` and apply it to both planes of `sample`.
    pub fn apply<R: Rng + ?Sized>(&self, sample: &mut TileSample, rng: &mut R) {
        if self.is_identity() {
            return;
        }
        let ops = Ops {
            hflip: rng.random::<f32>() < self.flip_horizontal_prob,
            vflip: rng.random::<f32>() < self.flip_vertical_prob,
            rot90: rng.random::<f32>() < self.rotate90_prob,
        };
        let size = sample.size as usize;
        apply_ops(&mut sample.input, size, ops);
        if let Some(label) = sample.label.as_mut() {
            apply_ops(label, size, ops);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn grid() -> Vec<f32> {
        (0..9).map(|v| v as f32).collect()
    }

    #[test]
    fn hflip_reverses_rows() {
        let mut b = grid();
        flip_horizontal(&mut b, 3);
        assert_eq!(b, vec![2., 1., 0., 5., 4., 3., 8., 7., 6.]);
    }

    #[test]
    fn vflip_reverses_columns() {
        let mut b = grid();
        flip_vertical(&mut b, 3);
        assert_eq!(b, vec![6., 7., 8., 3., 4., 5., 0., 1., 2.]);
    }

    #[test]
    fn rotate_clockwise() {
        let b = rotate90(&grid(), 3);
        assert_eq!(b, vec![6., 3., 0., 7., 4., 1., 8., 5., 2.]);
    }

    #[test]
    fn input_and_label_move_together() {
        let cfg = TransformConfig {
            flip_horizontal_prob: 1.0,
            flip_vertical_prob: 1.0,
            rotate90_prob: 1.0,
        };
        let mut s = TileSample {
            index: 0,
            size: 3,
            input: grid(),
            label: Some(grid()),
        };
        let mut rng = rand::rngs::StdRng::seed_from_u64(1);
        cfg.apply(&mut s, &mut rng);
        assert_eq!(Some(s.input.clone()), s.label);
        assert_ne!(s.input, grid());
    }
}
