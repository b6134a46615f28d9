//! Batching of parsed record items.

use burn::data::dataloader::batcher::Batcher;
use burn::prelude::*;
use burn::tensor::ElementConversion;

use crate::dataset::ImageItem;

/// Batches [`ImageItem`]s into tensors.
#[derive(Clone, Debug)]
pub struct ImageBatcher {
    num_classes: usize,
}

#[derive(Clone, Debug)]
pub struct ImageBatch<B: Backend> {
    /// `[batch, height, width, channels]`, values as stored in the record
    /// file (already `[0, 1]` for f32-converted pipelines).
    pub images: Tensor<B, 4>,
    /// One-hot float targets for the mean-squared-error loss.
    pub targets: Tensor<B, 2>,
    /// Class indices for the accuracy metric.
    pub labels: Tensor<B, 1, Int>,
}

impl ImageBatcher {
    pub fn new(num_classes: usize) -> Self {
        Self { num_classes }
    }
}

impl<B: Backend> Batcher<B, ImageItem, ImageBatch<B>> for ImageBatcher {
    fn batch(&self, items: Vec<ImageItem>, device: &B::Device) -> ImageBatch<B> {
        let mut images = Vec::with_capacity(items.len());
        let mut targets = Vec::with_capacity(items.len());
        let mut labels = Vec::with_capacity(items.len());

        for item in items {
            let shape = Shape::new([item.height, item.width, item.channels]);
            let data = TensorData::new(item.pixels, shape);
            images.push(Tensor::<B, 3>::from_data(
                data.convert::<B::FloatElem>(),
                device,
            ));

            let class = usize::try_from(item.label)
                .ok()
                .filter(|&c| c < self.num_classes)
                .unwrap_or_else(|| panic!("label {} outside 0..{}", item.label, self.num_classes));
            let mut one_hot = vec![0f32; self.num_classes];
            one_hot[class] = 1.0;
            targets.push(Tensor::<B, 2>::from_data(
                TensorData::new(one_hot, Shape::new([1, self.num_classes]))
                    .convert::<B::FloatElem>(),
                device,
            ));

            labels.push(Tensor::<B, 1, Int>::from_data(
                TensorData::from([item.label.elem::<B::IntElem>()]),
                device,
            ));
        }

        ImageBatch {
            images: Tensor::stack(images, 0),
            targets: Tensor::cat(targets, 0),
            labels: Tensor::cat(labels, 0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    fn item(label: i64, value: f32) -> ImageItem {
        ImageItem {
            pixels: vec![value; 2 * 2 * 3],
            height: 2,
            width: 2,
            channels: 3,
            label,
        }
    }

    #[test]
    fn batches_to_expected_shapes() {
        let device = Default::default();
        let batch: ImageBatch<NdArray> =
            ImageBatcher::new(10).batch(vec![item(1, 0.5), item(4, 0.25)], &device);

        assert_eq!(batch.images.dims(), [2, 2, 2, 3]);
        assert_eq!(batch.targets.dims(), [2, 10]);
        assert_eq!(batch.labels.dims(), [2]);
    }

    #[test]
    fn targets_are_one_hot() {
        let device = Default::default();
        let batch: ImageBatch<NdArray> =
            ImageBatcher::new(10).batch(vec![item(1, 0.5), item(4, 0.25)], &device);

        // one 1.0 per row, at the label's column
        let row_sums = batch.targets.clone().sum_dim(1);
        row_sums
            .to_data()
            .assert_eq(&TensorData::from([[1f32], [1f32]]), false);
        let argmax = batch.targets.argmax(1);
        argmax
            .to_data()
            .assert_eq(&TensorData::from([[1i64], [4i64]]), false);
    }
}
