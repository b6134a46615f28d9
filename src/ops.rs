//! Declarative per-record conversion ops.
//!
//! A conversion pipeline is built before any shard is fetched, by nesting ops
//! the way the source fields should be transformed, e.g.
//!
//! ```
//! use tarset::ops::{Convert, DType, Decode, Resize, Select};
//!
//! // bytes under "jpg" decoded as an image, converted to f32, resized to 224x224
//! let output = Resize::new(Convert::new(Decode::new("jpg"), DType::F32), (224, 224));
//! // bytes under "cls" taken as the label
//! let label = Select::new("cls");
//! ```

use image::imageops::FilterType;
use image::DynamicImage;
use thiserror::Error;

use crate::shard::TarRecord;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("record has no `{0}` field")]
    MissingField(String),

    #[error("failed to decode `{field}` as an image: {reason}")]
    Decode { field: String, reason: String },

    #[error("`{op}` expects a decoded image, got raw bytes")]
    NotAnImage { op: &'static str },
}

/// Element type a decoded image is converted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DType {
    /// Byte pixels, `0..=255`.
    U8,
    /// Float pixels scaled to `[0, 1]`.
    F32,
}

/// Value flowing between ops: raw field bytes or a decoded image.
#[derive(Debug, Clone)]
pub enum Feature {
    Bytes(Vec<u8>),
    Image(DynamicImage),
}

impl Feature {
    pub fn into_bytes(self) -> Option<Vec<u8>> {
        match self {
            Feature::Bytes(bytes) => Some(bytes),
            Feature::Image(_) => None,
        }
    }

    pub fn into_image(self) -> Option<DynamicImage> {
        match self {
            Feature::Image(image) => Some(image),
            Feature::Bytes(_) => None,
        }
    }
}

/// One step of the conversion pipeline, applied per tar record.
pub trait TarOp: Send + Sync {
    fn apply(&self, record: &TarRecord) -> Result<Feature, PipelineError>;
}

/// Raw bytes of a record field.
pub struct Select {
    field: String,
}

impl Select {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
        }
    }
}

impl TarOp for Select {
    fn apply(&self, record: &TarRecord) -> Result<Feature, PipelineError> {
        record
            .field(&self.field)
            .map(|bytes| Feature::Bytes(bytes.to_vec()))
            .ok_or_else(|| PipelineError::MissingField(self.field.clone()))
    }
}

/// Record field decoded as an image. The format is sniffed from the bytes, so
/// the field name is only the lookup key.
pub struct Decode {
    field: String,
}

impl Decode {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
        }
    }
}

impl TarOp for Decode {
    fn apply(&self, record: &TarRecord) -> Result<Feature, PipelineError> {
        let bytes = record
            .field(&self.field)
            .ok_or_else(|| PipelineError::MissingField(self.field.clone()))?;
        let image = image::load_from_memory(bytes).map_err(|e| PipelineError::Decode {
            field: self.field.clone(),
            reason: e.to_string(),
        })?;
        Ok(Feature::Image(image))
    }
}

/// Converts the inner op's image to the target element type.
pub struct Convert {
    inner: Box<dyn TarOp>,
    dtype: DType,
}

impl Convert {
    pub fn new(inner: impl TarOp + 'static, dtype: DType) -> Self {
        Self {
            inner: Box::new(inner),
            dtype,
        }
    }
}

impl TarOp for Convert {
    fn apply(&self, record: &TarRecord) -> Result<Feature, PipelineError> {
        let image = self
            .inner
            .apply(record)?
            .into_image()
            .ok_or(PipelineError::NotAnImage { op: "Convert" })?;
        let image = match self.dtype {
            DType::U8 => DynamicImage::ImageRgb8(image.to_rgb8()),
            DType::F32 => DynamicImage::ImageRgb32F(image.to_rgb32f()),
        };
        Ok(Feature::Image(image))
    }
}

/// Bilinear resize of the inner op's image to exact target dimensions.
pub struct Resize {
    inner: Box<dyn TarOp>,
    width: u32,
    height: u32,
}

impl Resize {
    pub fn new(inner: impl TarOp + 'static, (width, height): (u32, u32)) -> Self {
        Self {
            inner: Box::new(inner),
            width,
            height,
        }
    }
}

impl TarOp for Resize {
    fn apply(&self, record: &TarRecord) -> Result<Feature, PipelineError> {
        let image = self
            .inner
            .apply(record)?
            .into_image()
            .ok_or(PipelineError::NotAnImage { op: "Resize" })?;
        Ok(Feature::Image(image.resize_exact(
            self.width,
            self.height,
            FilterType::Triangle,
        )))
    }
}
