//! Short end-to-end runs on tiny synthetic CT pairs.

use burn::backend::ndarray::NdArray;
use burn::backend::Autodiff;
use burn::optim::AdamConfig;
use burn::tensor::{Tensor, TensorData};
use image::{GrayImage, Luma};
use sr_dataset::{Colormap, DatasetMode, DatasetSpec, PreprocessConfig, SrDataset, TileBatch};
use std::fs;
use std::path::Path;
use training::{
    evaluate, load_srcnn_from_checkpoint, predict, train, train_step, SrcnnConfig, TrainConfig,
};

type B = NdArray<f32>;
type AB = Autodiff<B>;

fn tiny_model() -> SrcnnConfig {
    SrcnnConfig::new().with_features([4, 4]).with_kernels([3, 1, 3])
}

fn write_gray(path: &Path, size: u32, seed: u32) -> anyhow::Result<()> {
    let img = GrayImage::from_fn(size, size, |x, y| {
        Luma([((x * 37 + y * 11 + seed * 53) % 256) as u8])
    });
    img.save(path)?;
    Ok(())
}

/// `count` pairs with 8x8 labels and 4x4 inputs. The last `unlabeled` inputs get no label.
fn create_pairs(root: &Path, count: u32, unlabeled: u32) -> anyhow::Result<()> {
    let input_dir = root.join("Dataset/Pristine/input");
    let label_dir = root.join("Dataset/Pristine/label");
    fs::create_dir_all(&input_dir)?;
    fs::create_dir_all(&label_dir)?;
    for i in 0..count {
        let name = format!("slice_{i:03}.png");
        write_gray(&input_dir.join(&name), 4, i)?;
        if i < count - unlabeled {
            write_gray(&label_dir.join(&name), 8, i)?;
        }
    }
    Ok(())
}

fn open(root: &Path, mode: DatasetMode) -> anyhow::Result<SrDataset> {
    let spec = DatasetSpec {
        data_root: root.to_path_buf(),
        dataset_dirs: vec!["Dataset/Pristine".to_string()],
        mode,
        tile_size: 4,
        preprocess: PreprocessConfig::default(),
    };
    Ok(SrDataset::open(&spec)?)
}

fn config(outputs: &Path) -> TrainConfig {
    let mut cfg = TrainConfig::new(outputs);
    cfg.num_epochs = 2;
    cfg.batch_size = 4;
    cfg.seed = Some(7);
    cfg.model = tiny_model();
    cfg.progress = false;
    cfg
}

#[test]
fn train_writes_epoch_and_best_checkpoints() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    create_pairs(tmp.path(), 5, 0)?;
    let ds = open(tmp.path(), DatasetMode::Train)?;
    assert_eq!(ds.len(), 20);

    let outputs = tmp.path().join("outputs");
    let mut cfg = config(&outputs);
    cfg.metrics_out = Some(outputs.join("metrics.jsonl"));
    let device = Default::default();
    let summary = train::<AB>(&ds, &cfg, &device)?;

    assert_eq!(summary.train_tiles, 16);
    assert_eq!(summary.test_tiles, 4);
    assert_eq!(summary.epochs.len(), 2);
    assert!(outputs.join("epoch_0.bin").exists());
    assert!(outputs.join("epoch_1.bin").exists());
    assert!(summary.best_checkpoint.exists());
    assert!(summary.best_epoch < 2);
    assert!(summary.best_psnr > 0.0);
    let best_seen = summary
        .epochs
        .iter()
        .filter_map(|e| e.eval_psnr)
        .fold(0.0f32, f32::max);
    assert_eq!(summary.best_psnr, best_seen);
    for e in &summary.epochs {
        assert!(e.train_loss.is_finite());
    }

    let lines = fs::read_to_string(outputs.join("metrics.jsonl"))?;
    assert_eq!(lines.lines().count(), 2);

    let model =
        load_srcnn_from_checkpoint::<B, _>(&tiny_model(), &summary.best_checkpoint, &device)?;
    let x = Tensor::<B, 4>::zeros([1, 1, 4, 4], &device);
    assert_eq!(model.forward(x).dims(), [1, 1, 4, 4]);
    Ok(())
}

fn conv_weights(model: &training::Srcnn<B>) -> Vec<Vec<f32>> {
    let (conv1, conv2) = model.body();
    [conv1, conv2, model.head()]
        .iter()
        .map(|c| c.weight.val().into_data().to_vec::<f32>().unwrap())
        .collect()
}

#[test]
fn best_checkpoint_holds_best_epoch_weights() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    create_pairs(tmp.path(), 5, 0)?;
    let ds = open(tmp.path(), DatasetMode::Train)?;
    let outputs = tmp.path().join("outputs");
    let mut cfg = config(&outputs);
    cfg.num_epochs = 4;
    cfg.lr = 1e-2;
    let device = Default::default();
    let summary = train::<AB>(&ds, &cfg, &device)?;

    let best =
        load_srcnn_from_checkpoint::<B, _>(&tiny_model(), &summary.best_checkpoint, &device)?;
    let from_epoch = load_srcnn_from_checkpoint::<B, _>(
        &tiny_model(),
        outputs.join(format!("epoch_{}.bin", summary.best_epoch)),
        &device,
    )?;
    assert_eq!(conv_weights(&best), conv_weights(&from_epoch));

    // Training moved the weights, so any other epoch differs from the best one.
    let other = (summary.best_epoch + 1) % cfg.num_epochs;
    let other = load_srcnn_from_checkpoint::<B, _>(
        &tiny_model(),
        outputs.join(format!("epoch_{other}.bin")),
        &device,
    )?;
    assert_ne!(conv_weights(&best), conv_weights(&other));
    Ok(())
}

#[test]
fn empty_train_split_is_an_error() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    create_pairs(tmp.path(), 1, 0)?;
    let ds = open(tmp.path(), DatasetMode::Train)?;
    let mut cfg = config(&tmp.path().join("outputs"));
    cfg.split_factor = 0.0;
    assert!(train::<AB>(&ds, &cfg, &Default::default()).is_err());
    Ok(())
}

#[test]
fn empty_test_split_keeps_initial_weights_as_best() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    create_pairs(tmp.path(), 1, 0)?;
    let ds = open(tmp.path(), DatasetMode::Train)?;
    let mut cfg = config(&tmp.path().join("outputs"));
    cfg.split_factor = 1.0;
    cfg.num_epochs = 1;
    let summary = train::<AB>(&ds, &cfg, &Default::default())?;
    assert_eq!(summary.test_tiles, 0);
    assert_eq!(summary.epochs[0].eval_psnr, None);
    assert_eq!(summary.best_psnr, 0.0);
    assert!(summary.best_checkpoint.exists());
    Ok(())
}

fn weights(t: Tensor<AB, 4>) -> Vec<f32> {
    t.into_data().to_vec::<f32>().unwrap()
}

#[test]
fn zero_head_lr_freezes_conv3_only() {
    let device = Default::default();
    let model = tiny_model().init::<AB>(&device);
    let mut optim = AdamConfig::new().init();
    let inputs = Tensor::<AB, 4>::from_data(
        TensorData::new((0..32).map(|v| v as f32 / 32.0).collect::<Vec<_>>(), [2, 1, 4, 4]),
        &device,
    );
    let batch = TileBatch {
        labels: inputs.clone().mul_scalar(0.5),
        inputs,
        indices: vec![0, 1],
    };
    let head_before = weights(model.head().weight.val());
    let body_before = weights(model.body().0.weight.val());

    let (model, loss) = train_step(model, &mut optim, batch, 1e-2, 0.0);
    assert!(loss.is_finite());
    assert_eq!(weights(model.head().weight.val()), head_before);
    assert_ne!(weights(model.body().0.weight.val()), body_before);
}

#[test]
fn evaluate_skips_empty_index_sets() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    create_pairs(tmp.path(), 2, 0)?;
    let ds = open(tmp.path(), DatasetMode::Train)?;
    let device = Default::default();
    let model = tiny_model().init::<B>(&device);
    assert_eq!(evaluate(&model, &ds, &[], 4, &device)?, None);
    let psnr = evaluate(&model, &ds, &[0, 1, 2, 3, 4], 2, &device)?.unwrap();
    assert!(psnr.is_finite() && psnr > 0.0);
    Ok(())
}

#[test]
fn predict_writes_previews_and_skips_psnr_without_labels() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    create_pairs(tmp.path(), 2, 1)?;
    let ds = open(tmp.path(), DatasetMode::Pred)?;
    // slice_001 has no label, so its 4x4 input is a single tile.
    assert_eq!(ds.len(), 5);
    let device = Default::default();
    let model = tiny_model().init::<B>(&device);
    let out = tmp.path().join("pred");

    let report = predict(&model, &ds, &[], 3, &out, Colormap::Gray, &device)?;
    assert_eq!(report.tiles.len(), 5);
    for t in &report.tiles {
        assert!(t.preview.exists());
    }
    let labelled = report.tiles.iter().filter(|t| t.psnr.is_some()).count();
    assert_eq!(labelled, 4);
    assert!(report.mean_psnr.is_some());
    assert!(out.join("tile_00000_prediction.png").exists());
    assert!(out.join("tile_00000_label.png").exists());
    assert!(out.join("tile_00004_prediction.png").exists());
    assert!(!out.join("tile_00004_label.png").exists());

    let picked = predict(&model, &ds, &[1, 99], 3, &out, Colormap::Viridis, &device)?;
    assert_eq!(picked.tiles.len(), 1);
    assert_eq!(picked.tiles[0].index, 1);
    Ok(())
}
