//! The feed-forward classifier of the demo: flatten, two hidden ReLU layers,
//! linear predictions.

use burn::nn::loss::{MseLoss, Reduction};
use burn::nn::{Linear, LinearConfig, Relu};
use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use burn::train::{ClassificationOutput, TrainOutput, TrainStep, ValidStep};

use crate::data::ImageBatch;

#[derive(Config, Debug)]
pub struct MlpConfig {
    #[config(default = 224)]
    pub image_height: usize,
    #[config(default = 224)]
    pub image_width: usize,
    #[config(default = 3)]
    pub channels: usize,
    #[config(default = 64)]
    pub hidden_size: usize,
    #[config(default = 10)]
    pub num_classes: usize,
}

#[derive(Module, Debug)]
pub struct Mlp<B: Backend> {
    dense_1: Linear<B>,
    dense_2: Linear<B>,
    predictions: Linear<B>,
    activation: Relu,
}

impl MlpConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> Mlp<B> {
        let num_features = self.image_height * self.image_width * self.channels;
        Mlp {
            dense_1: LinearConfig::new(num_features, self.hidden_size).init(device),
            dense_2: LinearConfig::new(self.hidden_size, self.hidden_size).init(device),
            predictions: LinearConfig::new(self.hidden_size, self.num_classes).init(device),
            activation: Relu::new(),
        }
    }
}

impl<B: Backend> Mlp<B> {
    /// `[batch, height, width, channels]` images to `[batch, num_classes]`
    /// logits.
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let x: Tensor<B, 2> = images.flatten(1, 3);
        let x = self.activation.forward(self.dense_1.forward(x));
        let x = self.activation.forward(self.dense_2.forward(x));
        self.predictions.forward(x)
    }

    /// Loss is mean squared error between logits and the one-hot targets;
    /// logits and class indices feed the accuracy metric.
    pub fn forward_step(&self, batch: ImageBatch<B>) -> ClassificationOutput<B> {
        let logits = self.forward(batch.images);
        let loss = MseLoss::new().forward(logits.clone(), batch.targets, Reduction::Mean);
        ClassificationOutput::new(loss, logits, batch.labels)
    }
}

impl<B: AutodiffBackend> TrainStep<ImageBatch<B>, ClassificationOutput<B>> for Mlp<B> {
    fn step(&self, batch: ImageBatch<B>) -> TrainOutput<ClassificationOutput<B>> {
        let output = self.forward_step(batch);
        TrainOutput::new(self, output.loss.backward(), output)
    }
}

impl<B: Backend> ValidStep<ImageBatch<B>, ClassificationOutput<B>> for Mlp<B> {
    fn step(&self, batch: ImageBatch<B>) -> ClassificationOutput<B> {
        self.forward_step(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    #[test]
    fn forward_produces_class_logits() {
        let device = Default::default();
        let config = MlpConfig::new()
            .with_image_height(4)
            .with_image_width(4)
            .with_channels(3);
        let model: Mlp<NdArray> = config.init(&device);

        let images = Tensor::zeros([2, 4, 4, 3], &device);
        let logits = model.forward(images);
        assert_eq!(logits.dims(), [2, 10]);
    }

    #[test]
    fn forward_step_reports_scalar_loss() {
        let device = Default::default();
        let config = MlpConfig::new()
            .with_image_height(2)
            .with_image_width(2)
            .with_channels(3);
        let model: Mlp<NdArray> = config.init(&device);

        let batcher = crate::data::ImageBatcher::new(config.num_classes);
        use burn::data::dataloader::batcher::Batcher;
        let batch = batcher.batch(
            vec![crate::dataset::ImageItem {
                pixels: vec![0.5; 2 * 2 * 3],
                height: 2,
                width: 2,
                channels: 3,
                label: 2,
            }],
            &device,
        );

        let output = model.forward_step(batch);
        assert_eq!(output.loss.dims(), [1]);
        assert_eq!(output.output.dims(), [1, 10]);
    }
}
