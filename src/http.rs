use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::{header::CONTENT_TYPE, Client, StatusCode};
use tracing::trace;

use crate::{config::BLOCK_SIZE, oracle::check_probe_len, OracleError, PaddingOracle};

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Padding oracle reached over HTTP.
///
/// Probes are POSTed base64 encoded. The server answers 200 for valid padding
/// and 403 for invalid padding. Any other status means the oracle itself is
/// misbehaving and is reported as [`OracleError::UnexpectedStatus`].
///
/// The underlying client pools connections and can be shared between
/// concurrent block decryptions.
#[derive(Debug, Clone)]
pub struct HttpOracle {
    client: Client,
    url: String,
    block_size: usize,
}

impl HttpOracle {
    pub fn new(url: impl Into<String>, request_timeout: Duration) -> Result<Self, OracleError> {
        let client = Client::builder().timeout(request_timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
            block_size: BLOCK_SIZE,
        })
    }

    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl PaddingOracle for HttpOracle {
    async fn test(&self, probe: &[u8]) -> Result<bool, OracleError> {
        check_probe_len(probe, self.block_size)?;
        let response = self
            .client
            .post(&self.url)
            .header(CONTENT_TYPE, "text/plain;charset=utf-8")
            .body(STANDARD.encode(probe))
            .send()
            .await?;
        let status = response.status();
        trace!(%status, "oracle answered");
        match status {
            StatusCode::OK => Ok(true),
            StatusCode::FORBIDDEN => Ok(false),
            status => Err(OracleError::UnexpectedStatus(status)),
        }
    }
}
