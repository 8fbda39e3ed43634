use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::Url;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::Serialize;

use crate::config::ObjectStorageConfig;
use crate::error::LookupError;

/// Result of a single existence probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum ProbeOutcome {
    Exists,
    NotFound,
    Failed(String),
}

pub trait ObjectStore: Send + Sync {
    /// Checks that `key` exists in `bucket` without fetching it.
    fn head(&self, bucket: &str, key: &str) -> ProbeOutcome;
}

impl<T: ObjectStore + ?Sized> ObjectStore for Arc<T> {
    fn head(&self, bucket: &str, key: &str) -> ProbeOutcome {
        (**self).head(bucket, key)
    }
}

/// Path-style HEAD requests against an S3-compatible endpoint.
#[derive(Clone)]
pub struct S3HttpClient {
    client: Client,
    endpoint: Url,
}

impl S3HttpClient {
    pub fn new(config: &ObjectStorageConfig) -> Result<Self, LookupError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("neuron-search/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| LookupError::ObjectStorage(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|err| LookupError::ObjectStorage(err.to_string()))?;
        let endpoint = Url::parse(&config.endpoint)
            .map_err(|err| LookupError::ObjectStorage(format!("{}: {err}", config.endpoint)))?;
        if endpoint.cannot_be_a_base() {
            return Err(LookupError::ObjectStorage(format!(
                "{} cannot be used as an endpoint",
                config.endpoint
            )));
        }
        Ok(Self { client, endpoint })
    }

    pub fn object_url(&self, bucket: &str, key: &str) -> Url {
        let mut url = self.endpoint.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(bucket).extend(key.split('/'));
        }
        url
    }
}

impl ObjectStore for S3HttpClient {
    fn head(&self, bucket: &str, key: &str) -> ProbeOutcome {
        let url = self.object_url(bucket, key);
        match self.client.head(url).send() {
            Ok(response) if response.status().is_success() => ProbeOutcome::Exists,
            Ok(response) if response.status() == StatusCode::NOT_FOUND => ProbeOutcome::NotFound,
            Ok(response) => ProbeOutcome::Failed(format!(
                "object storage returned status {}",
                response.status().as_u16()
            )),
            Err(err) if err.is_timeout() => ProbeOutcome::Failed(format!("timed out: {err}")),
            Err(err) => ProbeOutcome::Failed(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_url_encodes_key_segments() {
        let client = S3HttpClient::new(&ObjectStorageConfig::default()).unwrap();
        let url = client.object_url("janelia-flylight-imagery", "Gen1 MCFO/R10A06/sample 1.h5j");
        assert_eq!(
            url.as_str(),
            "https://s3.amazonaws.com/janelia-flylight-imagery/Gen1%20MCFO/R10A06/sample%201.h5j"
        );
    }

    #[test]
    fn rejects_unusable_endpoint() {
        let config = ObjectStorageConfig {
            endpoint: "mailto:nobody".to_string(),
            ..ObjectStorageConfig::default()
        };
        assert!(S3HttpClient::new(&config).is_err());
    }
}
