//! Blocking client for an AIS-style object-storage proxy.
//!
//! The proxy exposes objects under `/v1/objects/{bucket}/{name}`; this client
//! only speaks that GET endpoint. Failures carry the object name and are
//! surfaced to the caller untouched, there are no retries.

use log::debug;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("failed to fetch object `{object}`: {source}")]
    Transport {
        object: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("object `{object}` returned HTTP status {status}")]
    Status { object: String, status: u16 },
}

/// Object GET client for a single bucket behind a storage proxy.
pub struct StoreClient {
    proxy_url: String,
    bucket: String,
    client: reqwest::blocking::Client,
}

impl StoreClient {
    pub fn new(proxy_url: impl Into<String>, bucket: impl Into<String>) -> Self {
        let proxy_url = proxy_url.into().trim_end_matches('/').to_string();
        Self {
            proxy_url,
            bucket: bucket.into(),
            client: reqwest::blocking::Client::new(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Fetches the full body of one object.
    pub fn get_object(&self, name: &str) -> Result<Vec<u8>, ClientError> {
        let url = self.object_url(name);
        debug!("fetching {url}");

        let transport = |source| ClientError::Transport {
            object: name.to_string(),
            source,
        };
        let response = self.client.get(&url).send().map_err(transport)?;
        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Status {
                object: name.to_string(),
                status: status.as_u16(),
            });
        }
        let body = response.bytes().map_err(transport)?;
        debug!("fetched {name} ({} bytes)", body.len());
        Ok(body.to_vec())
    }

    fn object_url(&self, name: &str) -> String {
        format!("{}/v1/objects/{}/{}", self.proxy_url, self.bucket, name)
    }
}
