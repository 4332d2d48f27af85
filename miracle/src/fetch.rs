//! HTTP document fetcher.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use miracle::fetch::Fetcher;
//!
//! let fetcher = Fetcher::from_env()?;
//! let fetched = fetcher.fetch("https://example.org/feed.xml").await?;
//! let record = extractor.extract_bytes(fetched.format(), &fetched.bytes)?;
//! ```

use std::env;
use std::path::Path;
use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use tracing::{debug, warn};

use crate::error::FetchError;
use crate::pipeline::Format;

/// Default number of retries after the first attempt
const DEFAULT_MAX_RETRIES: u32 = 3;

/// Delay between retries in milliseconds
const RETRY_DELAY_MS: u64 = 1000;

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// HTTP client settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOptions {
    pub timeout: Duration,
    pub retries: u32,
    pub retry_delay: Duration,
    pub user_agent: String,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            retries: DEFAULT_MAX_RETRIES,
            retry_delay: Duration::from_millis(RETRY_DELAY_MS),
            user_agent: format!("miracle/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, raw: Option<String>) -> Result<Option<T>, FetchError> {
    match raw {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| FetchError::Config(format!("{} has an invalid value '{}'", name, value))),
    }
}

impl FetchOptions {
    /// Defaults overridden by `MIRACLE_HTTP_TIMEOUT_SECS`, `MIRACLE_HTTP_RETRIES`
    /// and `MIRACLE_USER_AGENT`.
    pub fn from_env() -> Result<Self, FetchError> {
        let mut options = Self::default();

        if let Some(secs) = parse_var::<u64>("MIRACLE_HTTP_TIMEOUT_SECS", env::var("MIRACLE_HTTP_TIMEOUT_SECS").ok())? {
            options.timeout = Duration::from_secs(secs);
        }
        if let Some(retries) = parse_var::<u32>("MIRACLE_HTTP_RETRIES", env::var("MIRACLE_HTTP_RETRIES").ok())? {
            options.retries = retries;
        }
        if let Ok(agent) = env::var("MIRACLE_USER_AGENT") {
            options.user_agent = agent;
        }

        Ok(options)
    }
}

/// A downloaded document.
#[derive(Debug, Clone)]
pub struct Fetched {
    pub url: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl Fetched {
    /// Format from the `Content-Type` header, then the URL path, then the content.
    pub fn format(&self) -> Option<Format> {
        self.content_type
            .as_deref()
            .and_then(Format::from_content_type)
            .or_else(|| {
                let path = url_path(&self.url);
                Format::detect(Some(Path::new(&path)), &self.bytes)
            })
    }
}

/// Path part of a URL, without query or fragment.
fn url_path(url: &str) -> String {
    match reqwest::Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url
            .split(|c| c == '?' || c == '#')
            .next()
            .unwrap_or(url)
            .to_string(),
    }
}

impl FetchError {
    /// Whether another attempt could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Request(e) => !e.is_builder() && !e.is_decode(),
            FetchError::Status { status, .. } => *status == 429 || *status >= 500,
            FetchError::Config(_) => false,
        }
    }
}

/// HTTP client with bounded retries
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: reqwest::Client,
    options: FetchOptions,
}

impl Fetcher {
    pub fn new(options: FetchOptions) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(options.timeout)
            .user_agent(options.user_agent.clone())
            .build()?;
        Ok(Self { client, options })
    }

    pub fn from_env() -> Result<Self, FetchError> {
        Self::new(FetchOptions::from_env()?)
    }

    pub fn options(&self) -> &FetchOptions {
        &self.options
    }

    /// Download `url`, retrying transient failures.
    pub async fn fetch(&self, url: &str) -> Result<Fetched, FetchError> {
        let attempts = self.options.retries.saturating_add(1);
        let mut attempt = 1;

        loop {
            match self.try_fetch(url).await {
                Ok(fetched) => return Ok(fetched),
                Err(e) if attempt < attempts && e.is_transient() => {
                    warn!(url, attempt, attempts, error = %e, "fetch failed, retrying");
                    tokio::time::sleep(self.options.retry_delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn try_fetch(&self, url: &str) -> Result<Fetched, FetchError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response.bytes().await?.to_vec();
        debug!(url, bytes = bytes.len(), content_type = ?content_type, "fetched document");

        Ok(Fetched {
            url: url.to_string(),
            content_type,
            bytes,
        })
    }
}
