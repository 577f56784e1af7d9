//! ---
//! arb_section: "02-host-capabilities"
//! arb_subsection: "module"
//! arb_type: "source"
//! arb_scope: "code"
//! arb_description: "Vendor signing-key download capability."
//! arb_version: "v0.1.0"
//! arb_owner: "ops"
//! ---
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::StatusCode;
use thiserror::Error;
use tracing::debug;
use url::Url;

/// Key download failure.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("unable to construct HTTP client")]
    Client(#[source] reqwest::Error),
    #[error("request to {url} failed")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} answered HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("{url} returned an empty body")]
    Empty { url: String },
}

impl FetchError {
    /// Whether another attempt may succeed: transport errors, throttling and
    /// server-side failures are transient; other client errors are not.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Client(_) => false,
            FetchError::Transport { .. } | FetchError::Empty { .. } => true,
            FetchError::Status { status, .. } => {
                *status == StatusCode::TOO_MANY_REQUESTS.as_u16()
                    || *status == StatusCode::REQUEST_TIMEOUT.as_u16()
                    || *status >= 500
            }
        }
    }
}

/// Downloads the package repository signing key.
pub trait KeyFetcher {
    fn fetch(&self, url: &Url) -> Result<Vec<u8>, FetchError>;
}

/// [`KeyFetcher`] performing a blocking HTTPS GET.
#[derive(Debug, Clone)]
pub struct HttpKeyFetcher {
    client: Client,
}

impl HttpKeyFetcher {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("arb-deploy/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(FetchError::Client)?;
        Ok(Self { client })
    }
}

impl KeyFetcher for HttpKeyFetcher {
    fn fetch(&self, url: &Url) -> Result<Vec<u8>, FetchError> {
        debug!(%url, "downloading signing key");
        let response = self
            .client
            .get(url.clone())
            .send()
            .map_err(|source| FetchError::Transport {
                url: url.to_string(),
                source,
            })?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        let body = response.bytes().map_err(|source| FetchError::Transport {
            url: url.to_string(),
            source,
        })?;
        if body.is_empty() {
            return Err(FetchError::Empty {
                url: url.to_string(),
            });
        }
        Ok(body.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_and_throttling_are_transient() {
        let url = "https://download.example.invalid/gpg".to_owned();
        for status in [500u16, 502, 503, 429, 408] {
            let err = FetchError::Status {
                url: url.clone(),
                status,
            };
            assert!(err.is_transient(), "{status} should be transient");
        }
        for status in [401u16, 403, 404] {
            let err = FetchError::Status {
                url: url.clone(),
                status,
            };
            assert!(!err.is_transient(), "{status} should be permanent");
        }
        assert!(FetchError::Empty { url }.is_transient());
    }

    #[test]
    fn client_builds_with_timeout() {
        HttpKeyFetcher::new(Duration::from_secs(1)).expect("client builds");
    }
}
