//! Batch iteration over tile indices for training and evaluation.

use crate::config::TransformConfig;
use crate::dataset::SrDataset;
use crate::splits::rng_from_seed;
use crate::types::{DatasetResult, SrDatasetError, TileSample};
use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};
use rayon::prelude::*;
use std::time::{Duration, Instant};

pub(crate) const DEFAULT_LOG_EVERY_SAMPLES: usize = 1000;

#[derive(Debug, Clone, Default)]
pub struct BatchConfig {
    /// Shuffle the index order at construction.
    pub shuffle: bool,
    /// Seed for reproducible shuffling and augmentation.
    pub seed: Option<u64>,
    /// Drop the last partial batch.
    pub drop_last: bool,
    /// Paired augmentation; `None` leaves tiles untouched.
    pub transform: Option<TransformConfig>,
}

impl BatchConfig {
    /// Eval loaders never augment.
    pub fn eval(seed: Option<u64>) -> Self {
        Self {
            shuffle: false,
            seed,
            drop_last: false,
            transform: None,
        }
    }
}

pub struct TileBatch<B: burn::tensor::backend::Backend> {
    /// `[N, 1, S, S]`
    pub inputs: burn::tensor::Tensor<B, 4>,
    /// `[N, 1, S, S]`
    pub labels: burn::tensor::Tensor<B, 4>,
    /// Dataset tile index of every row.
    pub indices: Vec<usize>,
}

impl<B: burn::tensor::backend::Backend> TileBatch<B> {
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// A batch whose labels may be missing (prediction datasets).
pub struct PredBatch<B: burn::tensor::backend::Backend> {
    pub inputs: burn::tensor::Tensor<B, 4>,
    pub samples: Vec<TileSample>,
}

pub struct BatchIter<'a> {
    dataset: &'a SrDataset,
    indices: Vec<usize>,
    cursor: usize,
    cfg: BatchConfig,
    rng: StdRng,
    processed_samples: usize,
    processed_batches: usize,
    started: Instant,
    total_load_time: Duration,
    last_logged_samples: usize,
    log_every_samples: Option<usize>,
    inputs_buf: Vec<f32>,
    labels_buf: Vec<f32>,
}

impl<'a> BatchIter<'a> {
    pub fn new(dataset: &'a SrDataset, mut indices: Vec<usize>, cfg: BatchConfig) -> Self {
        let mut rng = rng_from_seed(cfg.seed);
        if cfg.shuffle {
            indices.shuffle(&mut rng);
        }
        let log_every_samples = match std::env::var("SR_DATASET_LOG_EVERY") {
            Ok(val) => {
                if val.eq_ignore_ascii_case("off") || val.trim() == "0" {
                    None
                } else {
                    val.trim().parse::<usize>().ok().filter(|v| *v > 0)
                }
            }
            Err(_) => Some(DEFAULT_LOG_EVERY_SAMPLES),
        };
        Self {
            dataset,
            indices,
            cursor: 0,
            cfg,
            rng,
            processed_samples: 0,
            processed_batches: 0,
            started: Instant::now(),
            total_load_time: Duration::ZERO,
            last_logged_samples: 0,
            log_every_samples,
            inputs_buf: Vec::new(),
            labels_buf: Vec::new(),
        }
    }

    /// All indices in iteration order.
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Crop (and augment) the next `batch_size` tiles on the rayon pool, in index order.
    fn next_samples(&mut self, batch_size: usize) -> DatasetResult<Option<Vec<TileSample>>> {
        let batch_size = batch_size.max(1);
        if self.cursor >= self.indices.len() {
            return Ok(None);
        }
        let end = (self.cursor + batch_size).min(self.indices.len());
        if self.cfg.drop_last && end - self.cursor < batch_size {
            self.cursor = self.indices.len();
            return Ok(None);
        }
        let slice = &self.indices[self.cursor..end];
        self.cursor = end;

        // One seed per sample keeps augmentation deterministic under parallel loading.
        let seeds: Vec<u64> = slice.iter().map(|_| self.rng.random()).collect();
        let dataset = self.dataset;
        let transform = self.cfg.transform;

        let t_load = Instant::now();
        let samples = slice
            .par_iter()
            .zip(seeds.par_iter())
            .map(|(&idx, &seed)| {
                let mut sample = dataset.get(idx)?;
                if let Some(t) = transform {
                    let mut rng = StdRng::seed_from_u64(seed);
                    t.apply(&mut sample, &mut rng);
                }
                Ok(sample)
            })
            .collect::<DatasetResult<Vec<_>>>()?;
        self.total_load_time += t_load.elapsed();
        self.processed_samples += samples.len();
        self.processed_batches += 1;
        self.maybe_log_progress();
        Ok(Some(samples))
    }

    pub fn next_batch<B: burn::tensor::backend::Backend>(
        &mut self,
        batch_size: usize,
        device: &B::Device,
    ) -> DatasetResult<Option<TileBatch<B>>> {
        let Some(samples) = self.next_samples(batch_size)? else {
            return Ok(None);
        };
        let size = self.dataset.tile_size() as usize;
        let n = samples.len();

        self.inputs_buf.clear();
        self.labels_buf.clear();
        self.inputs_buf.reserve(n * size * size);
        self.labels_buf.reserve(n * size * size);
        let mut indices = Vec::with_capacity(n);
        for sample in &samples {
            let Some(label) = sample.label.as_ref() else {
                return Err(SrDatasetError::UnlabeledTile {
                    index: sample.index,
                });
            };
            self.inputs_buf.extend_from_slice(&sample.input);
            self.labels_buf.extend_from_slice(label);
            indices.push(sample.index);
        }

        let shape = [n, 1, size, size];
        let inputs = burn::tensor::Tensor::<B, 1>::from_floats(self.inputs_buf.as_slice(), device)
            .reshape(shape);
        let labels = burn::tensor::Tensor::<B, 1>::from_floats(self.labels_buf.as_slice(), device)
            .reshape(shape);
        Ok(Some(TileBatch {
            inputs,
            labels,
            indices,
        }))
    }

    /// Like [`Self::next_batch`] but keeps the raw samples and tolerates missing labels.
    pub fn next_pred_batch<B: burn::tensor::backend::Backend>(
        &mut self,
        batch_size: usize,
        device: &B::Device,
    ) -> DatasetResult<Option<PredBatch<B>>> {
        let Some(samples) = self.next_samples(batch_size)? else {
            return Ok(None);
        };
        let size = self.dataset.tile_size() as usize;
        self.inputs_buf.clear();
        for sample in &samples {
            self.inputs_buf.extend_from_slice(&sample.input);
        }
        let inputs = burn::tensor::Tensor::<B, 1>::from_floats(self.inputs_buf.as_slice(), device)
            .reshape([samples.len(), 1, size, size]);
        Ok(Some(PredBatch { inputs, samples }))
    }

    fn maybe_log_progress(&mut self) {
        let Some(threshold) = self.log_every_samples else {
            return;
        };
        if self.processed_samples.saturating_sub(self.last_logged_samples) < threshold {
            return;
        }
        let secs = self.started.elapsed().as_secs_f32().max(0.001);
        let avg_load_ms =
            (self.total_load_time.as_secs_f64() * 1000.0) / self.processed_batches.max(1) as f64;
        log::debug!(
            "[dataset] batches={} samples={} elapsed={:.1}s rate={:.1} tiles/s avg_load_ms={:.2}",
            self.processed_batches,
            self.processed_samples,
            secs,
            self.processed_samples as f32 / secs,
            avg_load_ms
        );
        self.last_logged_samples = self.processed_samples;
    }
}
