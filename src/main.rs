use burn::backend::ndarray::NdArrayDevice;
use burn::backend::{Autodiff, NdArray};
use burn::module::AutodiffModule;
use burn::optim::AdamConfig;

use tarset::convert::TarShardLoader;
use tarset::dataset::RecordDataset;
use tarset::model::MlpConfig;
use tarset::ops::{Convert, DType, Decode, Resize, Select};
use tarset::training::{self, TrainingConfig};

const EPOCHS: usize = 10;
const BATCH_SIZE: usize = 20;

const BUCKET_NAME: &str = "lb";
const PROXY_URL: &str = "http://localhost:8080";

const TRAIN_RECORD: &str = "train.record";
const TEST_RECORD: &str = "test.record";
const ARTIFACT_DIR: &str = "/tmp/tarset-imagenet";

type TrainBackend = Autodiff<NdArray>;

fn main() {
    env_logger::init();

    // Values are extracted from tar records according to
    // Resize(Convert(Decode("jpg"), F32), (224, 224)): bytes under "jpg" are
    // decoded as an image, converted to f32 and resized to 224x224. Labels
    // are the bytes under "cls".
    let loader = TarShardLoader::new(BUCKET_NAME, PROXY_URL)
        .with_output(Resize::new(
            Convert::new(Decode::new("jpg"), DType::F32),
            (224, 224),
        ))
        .with_label(Select::new("cls"));

    loader
        .load_from_tar("train-{0..3}.tar.xz", TRAIN_RECORD)
        .expect("Train shards should convert");
    loader
        .load_from_tar("train-{4..7}.tar.xz", TEST_RECORD)
        .expect("Test shards should convert");

    let device = NdArrayDevice::Cpu;
    let config = TrainingConfig::new(AdamConfig::new(), MlpConfig::new())
        .with_num_epochs(EPOCHS)
        .with_batch_size(BATCH_SIZE);
    let num_classes = config.model.num_classes;
    let batch_size = config.batch_size;

    let model =
        training::train::<TrainBackend>(ARTIFACT_DIR, config, TRAIN_RECORD, TEST_RECORD, device);

    let dataset_test = RecordDataset::open(TEST_RECORD).expect("Test record file should open");
    let metrics = training::evaluate(
        &model.valid(),
        num_classes,
        &dataset_test,
        batch_size,
        &device,
    );
    println!("{metrics}");
}
