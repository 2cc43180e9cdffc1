use std::io::Read;

use anyhow::{Context, Result};
use common::FetchConfig;
use reqwest::header::{self, HeaderMap};
use reqwest::Client;
use tracing::{debug, info, warn};

/// A fetched feed body together with the response metadata the report needs.
#[derive(Debug, Clone)]
pub struct FetchedFeed {
    /// Final URL after redirects
    pub url: String,
    pub status: u16,
    /// Header lookups on a `HeaderMap` are case-insensitive.
    pub headers: HeaderMap,
    pub body: String,
}

impl FetchedFeed {
    /// Returns the value of a header, if present and valid text.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header(header::CONTENT_TYPE.as_str())
    }

    pub fn content_encoding(&self) -> Option<&str> {
        self.header(header::CONTENT_ENCODING.as_str())
    }

    /// Length of the body in characters, the unit used throughout the comparison.
    pub fn char_len(&self) -> usize {
        self.body.chars().count()
    }
}

/// Source of feed bodies. The HTTP implementation is `HttpFetcher`;
/// tests substitute their own.
#[async_trait::async_trait]
pub trait Fetch: Send + Sync {
    /// Fetch `url` and return its decoded body.
    /// Any error means the body is unavailable and the run cannot continue.
    async fn fetch(&self, url: &str) -> Result<FetchedFeed>;
}

/// Fetches feeds over HTTP(S) with a single GET, no retries.
pub struct HttpFetcher {
    client: Client,
    timeout_secs: u64,
}

impl HttpFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let timeout = config.timeout();
        let mut builder = Client::builder()
            .timeout(timeout)
            .user_agent(config.user_agent());

        if config.insecure_tls() {
            warn!("TLS certificate and hostname verification disabled");
            builder = builder.danger_accept_invalid_certs(true);
        }

        let client = builder.build().context("failed to build reqwest client")?;

        Ok(Self {
            client,
            timeout_secs: timeout.as_secs(),
        })
    }

    fn describe(&self, url: &str, err: reqwest::Error) -> anyhow::Error {
        if err.is_timeout() {
            anyhow::anyhow!("request to {} timed out after {}s", url, self.timeout_secs)
        } else {
            anyhow::Error::new(err).context(format!("network error while fetching {}", url))
        }
    }
}

#[async_trait::async_trait]
impl Fetch for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedFeed> {
        debug!(%url, "sending feed request");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| self.describe(url, e))?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("feed fetch failed with status: {}", status);
        }

        let final_url = response.url().to_string();
        if final_url != url {
            debug!(%url, %final_url, "request was redirected");
        }

        let headers = response.headers().clone();
        let bytes = response.bytes().await.map_err(|e| self.describe(url, e))?;
        let encoding = headers
            .get(header::CONTENT_ENCODING)
            .and_then(|v| v.to_str().ok());
        let decoded = decode_content(&bytes, encoding)
            .with_context(|| format!("could not decode response body from {}", url))?;
        let body = String::from_utf8(decoded)
            .with_context(|| format!("response body from {} is not valid UTF-8", url))?;

        info!(%url, status = status.as_u16(), bytes = bytes.len(), ?encoding, "feed fetched");

        Ok(FetchedFeed {
            url: final_url,
            status: status.as_u16(),
            headers,
            body,
        })
    }
}

/// Undo the transfer compression named by `Content-Encoding`. The client
/// does not decompress on its own, so the header stays visible to the report.
fn decode_content(bytes: &[u8], content_encoding: Option<&str>) -> Result<Vec<u8>> {
    let encoding = content_encoding.map(|e| e.trim().to_ascii_lowercase());
    let mut decoded = Vec::new();

    match encoding.as_deref() {
        None | Some("") | Some("identity") => return Ok(bytes.to_vec()),
        Some("gzip") | Some("x-gzip") => {
            flate2::read::GzDecoder::new(bytes)
                .read_to_end(&mut decoded)
                .context("invalid gzip data")?;
        }
        Some("deflate") => {
            // Servers send both zlib-wrapped and raw deflate under this name
            if flate2::read::ZlibDecoder::new(bytes)
                .read_to_end(&mut decoded)
                .is_err()
            {
                decoded.clear();
                flate2::read::DeflateDecoder::new(bytes)
                    .read_to_end(&mut decoded)
                    .context("invalid deflate data")?;
            }
        }
        Some("br") => {
            brotli::Decompressor::new(bytes, 4096)
                .read_to_end(&mut decoded)
                .context("invalid brotli data")?;
        }
        Some(other) => anyhow::bail!("unsupported content encoding: {}", other),
    }

    Ok(decoded)
}
