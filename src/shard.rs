//! Tar shard unpacking.
//!
//! A shard is a tar archive whose member files encode one training sample per
//! basename: `0001.jpg` and `0001.cls` together form the record `0001` with
//! fields `jpg` and `cls`. Compression is chosen from the object name suffix.

use std::collections::HashMap;
use std::io::Read;

use flate2::read::GzDecoder;
use thiserror::Error;
use xz2::read::XzDecoder;

#[derive(Error, Debug)]
pub enum ShardError {
    #[error("object `{0}` has an unsupported archive suffix")]
    UnknownSuffix(String),

    #[error("failed to read tar entry: {0}")]
    Io(#[from] std::io::Error),
}

/// Compression applied on top of a tar stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None,
    Gzip,
    Xz,
}

impl Compression {
    /// Picks the compression from an object name (`.tar`, `.tar.gz`/`.tgz`,
    /// `.tar.xz`).
    pub fn from_name(name: &str) -> Result<Self, ShardError> {
        if name.ends_with(".tar") {
            Ok(Compression::None)
        } else if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Ok(Compression::Gzip)
        } else if name.ends_with(".tar.xz") {
            Ok(Compression::Xz)
        } else {
            Err(ShardError::UnknownSuffix(name.to_string()))
        }
    }
}

/// One sample extracted from a shard: the fields of all member files sharing
/// a basename, keyed by their (lower-cased) extension.
#[derive(Debug, Clone)]
pub struct TarRecord {
    key: String,
    fields: HashMap<String, Vec<u8>>,
}

impl TarRecord {
    fn new(key: String) -> Self {
        Self {
            key,
            fields: HashMap::new(),
        }
    }

    /// Sample key, the member path without its extension.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn field(&self, name: &str) -> Option<&[u8]> {
        self.fields.get(name).map(Vec::as_slice)
    }

    #[cfg(test)]
    pub(crate) fn from_fields(key: &str, fields: &[(&str, &[u8])]) -> Self {
        let mut record = Self::new(key.to_string());
        for (name, bytes) in fields {
            record.fields.insert(name.to_string(), bytes.to_vec());
        }
        record
    }
}

/// Reads a (possibly compressed) tar stream and groups its regular files into
/// records, preserving the order in which sample keys first appear.
pub fn read_records<R: Read>(
    reader: R,
    compression: Compression,
) -> Result<Vec<TarRecord>, ShardError> {
    match compression {
        Compression::None => collect(tar::Archive::new(reader)),
        Compression::Gzip => collect(tar::Archive::new(GzDecoder::new(reader))),
        Compression::Xz => collect(tar::Archive::new(XzDecoder::new(reader))),
    }
}

fn collect<R: Read>(mut archive: tar::Archive<R>) -> Result<Vec<TarRecord>, ShardError> {
    let mut order: Vec<String> = Vec::new();
    let mut records: HashMap<String, TarRecord> = HashMap::new();

    for entry in archive.entries()? {
        let mut entry = entry?;
        if !entry.header().entry_type().is_file() {
            continue;
        }
        let name = entry.path()?.to_string_lossy().into_owned();
        let (key, field) = split_field(&name);

        let mut bytes = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut bytes)?;

        let record = records.entry(key.clone()).or_insert_with(|| {
            order.push(key.clone());
            TarRecord::new(key.clone())
        });
        // Duplicate field within a record: last entry wins.
        record.fields.insert(field, bytes);
    }

    Ok(order
        .into_iter()
        .map(|key| records.remove(&key).expect("record was inserted above"))
        .collect())
}

/// Splits a member path into sample key and field name. A path without an
/// extension becomes a record with an empty field name.
fn split_field(path: &str) -> (String, String) {
    match path.rsplit_once('.') {
        Some((key, ext)) if !key.is_empty() => (key.to_string(), ext.to_lowercase()),
        _ => (path.to_string(), String::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use std::io::Write;

    fn tar_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        for (name, data) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, name, *data).unwrap();
        }
        builder.into_inner().unwrap()
    }

    #[test]
    fn groups_entries_into_records() {
        let bytes = tar_bytes(&[
            ("0001.jpg", b"img-1"),
            ("0001.cls", b"3"),
            ("0002.jpg", b"img-2"),
            ("0002.cls", b"7"),
        ]);

        let records = read_records(bytes.as_slice(), Compression::None).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].key(), "0001");
        assert_eq!(records[0].field("jpg"), Some(b"img-1".as_slice()));
        assert_eq!(records[0].field("cls"), Some(b"3".as_slice()));
        assert_eq!(records[1].key(), "0002");
        assert_eq!(records[1].field("cls"), Some(b"7".as_slice()));
    }

    #[test]
    fn preserves_first_seen_order() {
        let bytes = tar_bytes(&[
            ("b.jpg", b"1"),
            ("a.jpg", b"2"),
            ("b.cls", b"3"),
            ("a.cls", b"4"),
        ]);

        let records = read_records(bytes.as_slice(), Compression::None).unwrap();
        let keys: Vec<_> = records.iter().map(TarRecord::key).collect();
        assert_eq!(keys, ["b", "a"]);
    }

    #[test]
    fn uppercase_extension_is_normalized() {
        let bytes = tar_bytes(&[("x.JPG", b"img")]);
        let records = read_records(bytes.as_slice(), Compression::None).unwrap();
        assert_eq!(records[0].field("jpg"), Some(b"img".as_slice()));
    }

    #[test]
    fn path_without_extension_keeps_whole_name_as_key() {
        let bytes = tar_bytes(&[("label", b"5")]);
        let records = read_records(bytes.as_slice(), Compression::None).unwrap();
        assert_eq!(records[0].key(), "label");
        assert_eq!(records[0].field(""), Some(b"5".as_slice()));
    }

    #[test]
    fn nested_paths_keep_directory_in_key() {
        let bytes = tar_bytes(&[("train/0001.jpg", b"img"), ("train/0001.cls", b"1")]);
        let records = read_records(bytes.as_slice(), Compression::None).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].key(), "train/0001");
    }

    #[test]
    fn reads_gzip_compressed_shards() {
        let plain = tar_bytes(&[("0001.jpg", b"img"), ("0001.cls", b"2")]);
        let mut encoder = GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(&plain).unwrap();
        let compressed = encoder.finish().unwrap();

        let records = read_records(compressed.as_slice(), Compression::Gzip).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].field("jpg"), Some(b"img".as_slice()));
    }

    #[test]
    fn picks_compression_from_suffix() {
        assert_eq!(
            Compression::from_name("a.tar").unwrap(),
            Compression::None
        );
        assert_eq!(
            Compression::from_name("a.tar.gz").unwrap(),
            Compression::Gzip
        );
        assert_eq!(Compression::from_name("a.tgz").unwrap(), Compression::Gzip);
        assert_eq!(
            Compression::from_name("train-0.tar.xz").unwrap(),
            Compression::Xz
        );
        assert!(matches!(
            Compression::from_name("a.zip"),
            Err(ShardError::UnknownSuffix(_))
        ));
    }
}
