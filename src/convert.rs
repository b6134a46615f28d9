//! Shard-to-record-file conversion.
//!
//! [`TarShardLoader`] pulls tar shards from the storage proxy, extracts their
//! records, runs the conversion pipelines over every record and materializes
//! the result into a record file readable through
//! [`RecordDataset`](crate::dataset::RecordDataset).

use std::path::Path;

use burn::data::dataset::SqliteDatasetWriter;
use log::info;
use thiserror::Error;

use crate::client::{ClientError, StoreClient};
use crate::dataset::{ImageRecord, RECORD_SPLIT};
use crate::ops::{PipelineError, TarOp};
use crate::shard::{self, Compression, ShardError};
use crate::template::{self, TemplateError};

#[derive(Error, Debug)]
pub enum ConvertError {
    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    Shard(#[from] ShardError),

    #[error("no {0} pipeline configured")]
    MissingPipeline(&'static str),

    #[error("record `{key}` in shard `{shard}`: {source}")]
    Sample {
        key: String,
        shard: String,
        #[source]
        source: PipelineError,
    },

    #[error("record `{key}` in shard `{shard}`: output pipeline must yield an image")]
    NotAnImage { key: String, shard: String },

    #[error("record `{key}` in shard `{shard}`: label `{label}` is not an integer")]
    BadLabel {
        key: String,
        shard: String,
        label: String,
    },

    #[error("failed to write record file: {0}")]
    Storage(String),
}

/// Converts tar shards held in one bucket into record files.
///
/// Mirrors the dataset helpers of the framework: construct once with the
/// conversion pipelines, then materialize as many shard ranges as needed.
pub struct TarShardLoader {
    client: StoreClient,
    output: Option<Box<dyn TarOp>>,
    label: Option<Box<dyn TarOp>>,
}

impl TarShardLoader {
    pub fn new(bucket: impl Into<String>, proxy_url: impl Into<String>) -> Self {
        Self {
            client: StoreClient::new(proxy_url, bucket),
            output: None,
            label: None,
        }
    }

    /// Pipeline producing the training input of every record.
    pub fn with_output(mut self, op: impl TarOp + 'static) -> Self {
        self.output = Some(Box::new(op));
        self
    }

    /// Pipeline producing the label of every record.
    pub fn with_label(mut self, op: impl TarOp + 'static) -> Self {
        self.label = Some(Box::new(op));
        self
    }

    /// Expands `template`, fetches every shard, converts its records and
    /// writes them to the record file at `path`. Returns the number of
    /// records written.
    pub fn load_from_tar<P: AsRef<Path>>(
        &self,
        template: &str,
        path: P,
    ) -> Result<usize, ConvertError> {
        let output = self
            .output
            .as_deref()
            .ok_or(ConvertError::MissingPipeline("output"))?;
        let label = self
            .label
            .as_deref()
            .ok_or(ConvertError::MissingPipeline("label"))?;

        let shards = template::expand(template)?;
        let mut writer = SqliteDatasetWriter::<ImageRecord>::new(path.as_ref(), true)
            .map_err(|e| ConvertError::Storage(e.to_string()))?;

        let mut written = 0;
        for name in &shards {
            let compression = Compression::from_name(name)?;
            let bytes = self.client.get_object(name)?;
            let records = shard::read_records(bytes.as_slice(), compression)?;
            info!("shard {name}: {} records", records.len());

            for record in &records {
                let row = materialize(record, output, label, name)?;
                writer
                    .write(RECORD_SPLIT, &row)
                    .map_err(|e| ConvertError::Storage(e.to_string()))?;
                written += 1;
            }
        }
        writer
            .set_completed()
            .map_err(|e| ConvertError::Storage(e.to_string()))?;

        info!(
            "wrote {written} records from {} shard(s) of bucket {} to {}",
            shards.len(),
            self.client.bucket(),
            path.as_ref().display()
        );
        Ok(written)
    }
}

/// Runs both pipelines over one record and flattens the result into a row.
fn materialize(
    record: &shard::TarRecord,
    output: &dyn TarOp,
    label: &dyn TarOp,
    shard: &str,
) -> Result<ImageRecord, ConvertError> {
    let sample = |source| ConvertError::Sample {
        key: record.key().to_string(),
        shard: shard.to_string(),
        source,
    };

    let image = output
        .apply(record)
        .map_err(sample)?
        .into_image()
        .ok_or_else(|| ConvertError::NotAnImage {
            key: record.key().to_string(),
            shard: shard.to_string(),
        })?;
    let (width, height) = (image.width(), image.height());
    let pixels = image.to_rgb32f().into_raw();
    let image = pixels.iter().flat_map(|v| v.to_le_bytes()).collect();

    let label_bytes = label
        .apply(record)
        .map_err(sample)?
        .into_bytes()
        .ok_or_else(|| ConvertError::NotAnImage {
            key: record.key().to_string(),
            shard: shard.to_string(),
        })?;
    let label_text = String::from_utf8_lossy(&label_bytes).trim().to_string();
    let label = label_text
        .parse::<i64>()
        .map_err(|_| ConvertError::BadLabel {
            key: record.key().to_string(),
            shard: shard.to_string(),
            label: label_text.clone(),
        })?;

    Ok(ImageRecord {
        image,
        height,
        width,
        channels: 3,
        label,
    })
}
