//! Fetcher (C1).
//!
//! Generalizes `sources::base::HttpClient` into the pipeline's sole network
//! boundary: bounded retry/backoff, and transparent gzip decompression for
//! files served `.gz`-named but without a `Content-Encoding` header (the
//! common case for MRF blob storage), on top of whatever `reqwest` already
//! decodes via `Content-Encoding`.

use std::io::Read as _;
use std::time::Duration;

use reqwest::{Client, ClientBuilder, Response};
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::error::FetchError;

const MAX_ATTEMPTS: u32 = 3;
const MAX_BACKOFF_SECS: u64 = 10;

/// Shared HTTP client for all payer fetches.
#[derive(Clone)]
pub struct Fetcher {
    client: Client,
}

impl Fetcher {
    pub fn new(user_agent: &str, timeout_secs: u64) -> Result<Self, FetchError> {
        let client = ClientBuilder::new()
            .timeout(Duration::from_secs(timeout_secs))
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .user_agent(user_agent)
            .pool_max_idle_per_host(64)
            .tcp_nodelay(true)
            .build()?;

        Ok(Self { client })
    }

    /// `GET` with bounded retry/backoff. Retries server errors and transport
    /// failures up to `MAX_ATTEMPTS` times with exponential backoff capped at
    /// `MAX_BACKOFF_SECS`; a `429` surfaces immediately as `RateLimited` so
    /// the caller can decide whether to wait and retry the whole file.
    pub async fn get(&self, url: &str) -> Result<Response, FetchError> {
        let mut attempt = 0;
        loop {
            debug!(url, attempt, "fetch attempt");
            match self.client.get(url).send().await {
                Ok(resp) if resp.status().is_success() => return Ok(resp),
                Ok(resp) if resp.status().as_u16() == 429 => {
                    let retry_after = resp
                        .headers()
                        .get("retry-after")
                        .and_then(|v| v.to_str().ok())
                        .and_then(|v| v.parse::<u64>().ok())
                        .unwrap_or(60);
                    return Err(FetchError::RateLimited(retry_after));
                }
                Ok(resp) if resp.status().is_server_error() && attempt < MAX_ATTEMPTS => {
                    warn!(url, status = %resp.status(), "server error, retrying");
                    attempt += 1;
                    sleep(backoff(attempt)).await;
                }
                Ok(resp) => {
                    return Err(FetchError::Permanent { status: resp.status().as_u16(), url: url.to_string() });
                }
                Err(e) if attempt < MAX_ATTEMPTS => {
                    warn!(url, error = %e, "request failed, retrying");
                    attempt += 1;
                    sleep(backoff(attempt)).await;
                }
                Err(e) => {
                    return Err(FetchError::Transient { url: url.to_string(), source: Box::new(FetchError::Http(e)) });
                }
            }
        }
    }

    /// Fetch and fully materialize a small document (table-of-contents,
    /// provider reference file), transparently gunzipping `.gz`-named URLs
    /// whose response was not already decoded by `Content-Encoding`.
    pub async fn get_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let resp = self.get(url).await?;
        let body = resp.bytes().await?.to_vec();
        decompress_if_needed(url, body)
    }

    /// Open a streaming reader over a (possibly gzip-named) URL for the
    /// Streaming Parser to consume without buffering the whole body.
    pub async fn open_stream(&self, url: &str) -> Result<Box<dyn std::io::Read + Send>, FetchError> {
        let bytes = self.get_bytes(url).await?;
        Ok(Box::new(std::io::Cursor::new(bytes)))
    }
}

fn backoff(attempt: u32) -> Duration {
    Duration::from_secs(2u64.saturating_pow(attempt).min(MAX_BACKOFF_SECS))
}

fn decompress_if_needed(url: &str, body: Vec<u8>) -> Result<Vec<u8>, FetchError> {
    let looks_gz = url.to_lowercase().ends_with(".gz") || url.to_lowercase().ends_with(".gzip");
    let already_json = body.starts_with(b"{") || body.starts_with(b"[");
    if looks_gz && !already_json {
        let mut decoder = flate2::read::MultiGzDecoder::new(body.as_slice());
        let mut out = Vec::new();
        decoder.read_to_end(&mut out)?;
        Ok(out)
    } else {
        Ok(body)
    }
}
