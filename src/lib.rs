//! Tar shards in object storage to record-file datasets for [burn], plus a
//! small image-classification training demo.
//!
//! The pipeline has two halves:
//!
//! - [`convert::TarShardLoader`] fetches tar shards from an AIS-style storage
//!   proxy, extracts per-sample records, runs a declarative
//!   [`ops`] pipeline (select, decode, convert, resize) over every record and
//!   materializes the result into a record file.
//! - [`dataset::RecordDataset`] reads a record file back as a burn `Dataset`,
//!   ready for shuffling, batching and training.
//!
//! [burn]: https://github.com/tracel-ai/burn

pub mod client;
pub mod convert;
pub mod data;
pub mod dataset;
pub mod model;
pub mod ops;
pub mod shard;
pub mod template;
pub mod training;
