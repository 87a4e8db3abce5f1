//! Genre lookup against an HTTP endpoint.

use crate::{GenreLookup, RemoteError, parse_annotations};
use std::time::Duration;
use tracing::{debug, info};
use tunesphere_core::GenreAnnotation;
use url::Url;

/// Calls `GET <endpoint>?previewUrl=..&previewUrl=..`
#[derive(Debug, Clone)]
pub struct HttpGenreLookup {
    client: reqwest::blocking::Client,
    endpoint: Url,
}

impl HttpGenreLookup {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, RemoteError> {
        let endpoint = Url::parse(endpoint)?;
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;
        Ok(Self { client, endpoint })
    }

    /// The full request URL for a batch
    pub fn request_url(&self, preview_urls: &[String]) -> Url {
        let mut url = self.endpoint.clone();
        {
            let mut query = url.query_pairs_mut();
            for preview in preview_urls {
                query.append_pair("previewUrl", preview);
            }
        }
        url
    }
}

impl GenreLookup for HttpGenreLookup {
    fn lookup(&self, preview_urls: &[String]) -> Result<Vec<GenreAnnotation>, RemoteError> {
        if preview_urls.is_empty() {
            return Ok(Vec::new());
        }

        let url = self.request_url(preview_urls);
        info!("Requesting genres for {} tracks", preview_urls.len());
        let response = self.client.get(url).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(RemoteError::Status(status.as_u16()));
        }
        let body = response.text()?;
        debug!("Genre endpoint returned {} bytes", body.len());
        parse_annotations(&body)
    }

    fn describe(&self) -> String {
        format!("http {}", self.endpoint)
    }
}
