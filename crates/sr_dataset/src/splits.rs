//! Train/test splitting over tile indices.

use crate::types::{DatasetResult, SrDatasetError};
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

pub(crate) fn rng_from_seed(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_rng(&mut rand::rng()),
    }
}

/// Sizes of a `factor` split: `train = floor(factor * len)`, `test = len - train`.
pub fn split_sizes(len: usize, factor: f32) -> DatasetResult<(usize, usize)> {
    if !(0.0..=1.0).contains(&factor) {
        return Err(SrDatasetError::Other(format!(
            "split factor must be within [0, 1], got {factor}"
        )));
    }
    let train = ((factor as f64) * len as f64).floor() as usize;
    let train = train.min(len);
    Ok((train, len - train))
}

/// Randomly partition `0..len` into disjoint train/test index sets.
pub fn random_split(
    len: usize,
    factor: f32,
    seed: Option<u64>,
) -> DatasetResult<(Vec<usize>, Vec<usize>)> {
    let (train_len, _) = split_sizes(len, factor)?;
    let mut indices: Vec<usize> = (0..len).collect();
    let mut rng = rng_from_seed(seed);
    indices.shuffle(&mut rng);
    let test = indices.split_off(train_len);
    Ok((indices, test))
}

/// Keep only indices that are in range; out-of-range entries are reported and dropped.
pub fn subset(indices: &[usize], len: usize) -> Vec<usize> {
    indices
        .iter()
        .copied()
        .filter(|&i| {
            let ok = i < len;
            if !ok {
                log::warn!("subset index {i} out of range (dataset has {len} tiles); skipping");
            }
            ok
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn split_is_a_partition() {
        let (train, test) = random_split(10, 0.8, Some(7)).unwrap();
        assert_eq!(train.len(), 8);
        assert_eq!(test.len(), 2);
        let all: BTreeSet<usize> = train.iter().chain(test.iter()).copied().collect();
        assert_eq!(all, (0..10).collect());
    }

    #[test]
    fn split_floors_train_size() {
        assert_eq!(split_sizes(7, 0.8).unwrap(), (5, 2));
        assert_eq!(split_sizes(0, 0.8).unwrap(), (0, 0));
        assert_eq!(split_sizes(3, 1.0).unwrap(), (3, 0));
    }

    #[test]
    fn seeded_split_is_reproducible() {
        assert_eq!(
            random_split(50, 0.5, Some(3)).unwrap(),
            random_split(50, 0.5, Some(3)).unwrap()
        );
    }

    #[test]
    fn bad_factor_is_rejected() {
        assert!(random_split(10, 1.5, None).is_err());
        assert!(random_split(10, -0.1, None).is_err());
    }

    #[test]
    fn subset_drops_out_of_range() {
        assert_eq!(subset(&[0, 4, 9, 2], 5), vec![0, 4, 2]);
    }
}
