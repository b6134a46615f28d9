//! Fitting and evaluation.

use std::fmt;

use burn::config::Config;
use burn::data::dataloader::batcher::Batcher;
use burn::data::dataloader::DataLoaderBuilder;
use burn::data::dataset::Dataset;
use burn::nn::loss::{MseLoss, Reduction};
use burn::optim::AdamConfig;
use burn::prelude::*;
use burn::record::CompactRecorder;
use burn::tensor::backend::AutodiffBackend;
use burn::tensor::ElementConversion;
use burn::train::metric::{AccuracyMetric, LossMetric};
use burn::train::LearnerBuilder;

use crate::data::{ImageBatch, ImageBatcher};
use crate::dataset::{ImageItem, RecordDataset};
use crate::model::{Mlp, MlpConfig};

#[derive(Config)]
pub struct TrainingConfig {
    pub optimizer: AdamConfig,
    pub model: MlpConfig,
    #[config(default = 10)]
    pub num_epochs: usize,
    #[config(default = 20)]
    pub batch_size: usize,
    #[config(default = 4)]
    pub num_workers: usize,
    #[config(default = 42)]
    pub seed: u64,
    #[config(default = 1.0e-4)]
    pub learning_rate: f64,
}

/// Fits the classifier on the train record file, validating against the test
/// record file each epoch, and saves the trained model plus the config into
/// `artifact_dir`.
pub fn train<B: AutodiffBackend>(
    artifact_dir: &str,
    config: TrainingConfig,
    train_path: &str,
    test_path: &str,
    device: B::Device,
) -> Mlp<B> {
    std::fs::create_dir_all(artifact_dir).ok();
    config
        .save(format!("{artifact_dir}/config.json"))
        .expect("Config should be saved successfully");

    B::seed(config.seed);

    let dataset_train = RecordDataset::open(train_path).expect("Train record file should open");
    let dataset_test = RecordDataset::open(test_path).expect("Test record file should open");

    let batcher = ImageBatcher::new(config.model.num_classes);

    let dataloader_train = DataLoaderBuilder::<B, _, _>::new(batcher.clone())
        .batch_size(config.batch_size)
        .shuffle(config.seed)
        .num_workers(config.num_workers)
        .build(dataset_train);

    let dataloader_test = DataLoaderBuilder::<B::InnerBackend, _, _>::new(batcher)
        .batch_size(config.batch_size)
        .num_workers(config.num_workers)
        .build(dataset_test);

    let learner = LearnerBuilder::new(artifact_dir)
        .metric_train_numeric(AccuracyMetric::new())
        .metric_valid_numeric(AccuracyMetric::new())
        .metric_train_numeric(LossMetric::new())
        .metric_valid_numeric(LossMetric::new())
        .with_file_checkpointer(CompactRecorder::new())
        .devices(vec![device.clone()])
        .num_epochs(config.num_epochs)
        .summary()
        .build(
            config.model.init::<B>(&device),
            config.optimizer.init(),
            config.learning_rate,
        );

    let model_trained = learner.fit(dataloader_train, dataloader_test);

    model_trained
        .clone()
        .save_file(format!("{artifact_dir}/model"), &CompactRecorder::new())
        .expect("Trained model should be saved successfully");

    model_trained
}

/// Final evaluation metrics, printed by the demo as a name-to-value map.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvalMetrics {
    pub loss: f64,
    pub acc: f64,
}

impl fmt::Display for EvalMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{\"loss\": {:.6}, \"acc\": {:.4}}}", self.loss, self.acc)
    }
}

/// One pass over a dataset computing mean MSE loss and accuracy.
pub fn evaluate<B: Backend, D: Dataset<ImageItem>>(
    model: &Mlp<B>,
    num_classes: usize,
    dataset: &D,
    batch_size: usize,
    device: &B::Device,
) -> EvalMetrics {
    let batcher = ImageBatcher::new(num_classes);
    let items: Vec<ImageItem> = dataset.iter().collect();

    let mut total = 0usize;
    let mut correct = 0i64;
    let mut loss_sum = 0f64;

    for chunk in items.chunks(batch_size) {
        let batch: ImageBatch<B> = batcher.batch(chunk.to_vec(), device);
        let count = batch.labels.dims()[0];

        let logits = model.forward(batch.images);
        let loss = MseLoss::new().forward(logits.clone(), batch.targets, Reduction::Mean);
        loss_sum += loss.into_scalar().elem::<f64>() * count as f64;

        let predictions: Tensor<B, 1, Int> = logits.argmax(1).flatten(0, 1);
        correct += predictions
            .equal(batch.labels)
            .int()
            .sum()
            .into_scalar()
            .elem::<i64>();
        total += count;
    }

    let total = total.max(1);
    EvalMetrics {
        loss: loss_sum / total as f64,
        acc: correct as f64 / total as f64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::data::dataset::InMemDataset;

    #[test]
    fn metrics_print_as_a_map() {
        let metrics = EvalMetrics {
            loss: 0.125,
            acc: 0.5,
        };
        assert_eq!(metrics.to_string(), "{\"loss\": 0.125000, \"acc\": 0.5000}");
    }

    #[test]
    fn evaluate_covers_every_item() {
        let device = Default::default();
        let config = MlpConfig::new()
            .with_image_height(2)
            .with_image_width(2)
            .with_channels(3);
        let model: Mlp<NdArray> = config.init(&device);

        let items: Vec<ImageItem> = (0..5i64)
            .map(|i| ImageItem {
                pixels: vec![0.1 * i as f32; 2 * 2 * 3],
                height: 2,
                width: 2,
                channels: 3,
                label: i % 10,
            })
            .collect();
        let dataset = InMemDataset::new(items);

        let metrics = evaluate(&model, config.num_classes, &dataset, 2, &device);
        assert!(metrics.loss.is_finite());
        assert!((0.0..=1.0).contains(&metrics.acc));
    }
}
