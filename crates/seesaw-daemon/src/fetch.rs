//! Transport seam between the polling logic and the network.

use std::time::Duration;

use seesaw_error::{Result, SeesawError};
use url::Url;

use crate::manifest::{UpdateManifest, MANIFEST_FILE};

/// Fetches metadata and artifact bytes. The production implementation is
/// [`HttpFetcher`]; tests swap in an in-memory fake.
pub trait UpdateFetcher {
    /// GET and parse `latest.json` under `base`.
    fn fetch_manifest(&self, base: &Url) -> Result<UpdateManifest>;

    /// GET the raw bytes at `url`.
    fn fetch_bytes(&self, url: &Url) -> Result<Vec<u8>>;
}

/// Blocking HTTP fetcher with a bounded per-request timeout, so a hung
/// endpoint costs one cycle, not the daemon.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    /// A fetcher applying `timeout` to every request.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| SeesawError::DownloadFailed {
                url: String::new(),
                detail: format!("cannot build HTTP client: {err}"),
            })?;
        Ok(Self { client })
    }

    fn get(&self, url: &Url) -> Result<reqwest::blocking::Response> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .map_err(|err| classify(url, &err))?;
        response.error_for_status().map_err(|err| {
            SeesawError::DownloadFailed {
                url: url.to_string(),
                detail: err
                    .status()
                    .map_or_else(|| err.to_string(), |code| format!("HTTP {code}")),
            }
        })
    }
}

fn classify(url: &Url, err: &reqwest::Error) -> SeesawError {
    if err.is_timeout() {
        SeesawError::Timeout {
            url: url.to_string(),
        }
    } else {
        SeesawError::DownloadFailed {
            url: url.to_string(),
            detail: err.to_string(),
        }
    }
}

impl UpdateFetcher for HttpFetcher {
    fn fetch_manifest(&self, base: &Url) -> Result<UpdateManifest> {
        let url = base.join(MANIFEST_FILE).map_err(|err| {
            SeesawError::manifest(format!("cannot build manifest URL: {err}"))
        })?;
        let body = self.get(&url)?.bytes().map_err(|err| classify(&url, &err))?;
        serde_json::from_slice(&body)
            .map_err(|err| SeesawError::manifest(err.to_string()))
    }

    fn fetch_bytes(&self, url: &Url) -> Result<Vec<u8>> {
        let body = self.get(url)?.bytes().map_err(|err| classify(url, &err))?;
        Ok(body.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_with_timeout() {
        HttpFetcher::new(Duration::from_secs(5)).unwrap();
    }

    #[test]
    fn unreachable_endpoint_maps_to_transient_error() {
        // Reserved TEST-NET address: connections fail fast without
        // touching a real network.
        let fetcher = HttpFetcher::new(Duration::from_millis(250)).unwrap();
        let base = Url::parse("http://192.0.2.1:9/updates/").unwrap();
        let err = fetcher.fetch_manifest(&base).unwrap_err();
        assert!(err.is_transient(), "got non-transient {err}");
    }
}
