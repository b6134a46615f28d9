//! Record-file reading.
//!
//! A record file is a SQLite dataset file in burn's materialized storage
//! format, one row per flattened training example. [`RecordDataset`] composes
//! the framework's SQLite reader with the default record parser that turns
//! the stored pixel bytes back into floats.

use std::path::Path;

use burn::data::dataset::transform::{Mapper, MapperDataset};
use burn::data::dataset::{Dataset, SqliteDataset};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Table every record file stores its rows under.
pub(crate) const RECORD_SPLIT: &str = "records";

#[derive(Error, Debug)]
pub enum RecordError {
    #[error("failed to open record file `{path}`: {reason}")]
    Open { path: String, reason: String },
}

/// One row of a record file: little-endian f32 pixel bytes in HWC order plus
/// the image dimensions and the integer label.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageRecord {
    pub image: Vec<u8>,
    pub height: u32,
    pub width: u32,
    pub channels: u32,
    pub label: i64,
}

/// A parsed training example.
#[derive(Debug, Clone)]
pub struct ImageItem {
    /// Pixel values in HWC order.
    pub pixels: Vec<f32>,
    pub height: usize,
    pub width: usize,
    pub channels: usize,
    pub label: i64,
}

/// Default record parser: stored pixel bytes to floats.
pub struct RecordParser;

impl Mapper<ImageRecord, ImageItem> for RecordParser {
    fn map(&self, record: &ImageRecord) -> ImageItem {
        let pixels = record
            .image
            .chunks_exact(4)
            .map(|bytes| f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
            .collect();
        ImageItem {
            pixels,
            height: record.height as usize,
            width: record.width as usize,
            channels: record.channels as usize,
            label: record.label,
        }
    }
}

type MappedDataset = MapperDataset<SqliteDataset<ImageRecord>, RecordParser, ImageRecord>;

/// Dataset over a record file written by
/// [`TarShardLoader`](crate::convert::TarShardLoader).
pub struct RecordDataset {
    dataset: MappedDataset,
}

impl RecordDataset {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, RecordError> {
        let dataset =
            SqliteDataset::from_db_file(path.as_ref(), RECORD_SPLIT).map_err(|e| {
                RecordError::Open {
                    path: path.as_ref().display().to_string(),
                    reason: e.to_string(),
                }
            })?;
        Ok(Self {
            dataset: MapperDataset::new(dataset, RecordParser),
        })
    }
}

impl Dataset<ImageItem> for RecordDataset {
    fn get(&self, index: usize) -> Option<ImageItem> {
        self.dataset.get(index)
    }

    fn len(&self) -> usize {
        self.dataset.len()
    }
}
