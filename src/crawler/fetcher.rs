//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for a scrape job, including:
//! - Building the HTTP client with the configured user agent and deadlines
//! - GET requests for listing pages
//! - Bounded retry with exponential backoff for transient failures
//! - Error classification into timeout and fetch failures

use crate::config::{ScraperConfig, UserAgentConfig};
use crate::PageError;
use reqwest::{Client, StatusCode};
use scraper::Html;
use std::sync::Arc;
use url::Url;

/// A fetched and parsed listing page
///
/// The document is not `Send`; extract from it before the next await point.
pub struct Page {
    /// The URL the page was requested from
    pub url: Url,

    /// Parsed HTML document
    pub document: Html,
}

impl Page {
    /// Parses a page body into a traversable document
    pub fn parse(url: Url, body: &str) -> Self {
        Self {
            url,
            document: Html::parse_document(body),
        }
    }
}

/// How a single attempt failed
#[derive(Debug)]
enum AttemptError {
    /// The deadline elapsed; never retried
    Timeout,

    /// Worth another attempt (connection reset, truncated body, 5xx)
    Transient(String),

    /// Retrying cannot help (4xx, invalid request)
    Permanent(String),
}

/// Builds an HTTP client with proper configuration
///
/// # Example
///
/// ```no_run
/// use motoscrape::config::{ScraperConfig, UserAgentConfig};
/// use motoscrape::crawler::build_http_client;
///
/// let client = build_http_client(&UserAgentConfig::default(), &ScraperConfig::default()).unwrap();
/// ```
pub fn build_http_client(
    user_agent: &UserAgentConfig,
    scraper: &ScraperConfig,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent.header_value())
        .timeout(scraper.request_timeout())
        .connect_timeout(scraper.connect_timeout())
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches listing pages for one scrape job
///
/// Cloning is cheap; clones share the HTTP client and its connection pool.
///
/// # Retry Logic
///
/// | Condition | Action |
/// |-----------|--------|
/// | Timeout | Immediate → `PageError::Timeout` |
/// | Connection error, truncated body | Retry up to `max_retries`, exponential backoff |
/// | HTTP 5xx | Retry up to `max_retries`, exponential backoff |
/// | HTTP 4xx | Immediate → `PageError::Fetch` |
#[derive(Clone)]
pub struct PageFetcher {
    client: Client,
    config: Arc<ScraperConfig>,
}

impl PageFetcher {
    pub fn new(client: Client, config: Arc<ScraperConfig>) -> Self {
        Self { client, config }
    }

    /// Builds a fetcher with its own client from configuration
    pub fn from_config(
        user_agent: &UserAgentConfig,
        scraper: &ScraperConfig,
    ) -> Result<Self, reqwest::Error> {
        let client = build_http_client(user_agent, scraper)?;
        Ok(Self::new(client, Arc::new(scraper.clone())))
    }

    /// Fetches and parses one page
    pub async fn fetch_page(&self, url: &Url) -> Result<Page, PageError> {
        let body = self.fetch_body(url).await?;
        Ok(Page::parse(url.clone(), &body))
    }

    /// Fetches the decoded text body of one page, retrying transient failures
    pub async fn fetch_body(&self, url: &Url) -> Result<String, PageError> {
        let max_attempts = self.config.max_retries + 1;
        let mut attempt = 1;

        loop {
            match self.attempt(url).await {
                Ok(body) => {
                    tracing::debug!("Fetched {} ({} bytes, attempt {})", url, body.len(), attempt);
                    return Ok(body);
                }
                Err(AttemptError::Timeout) => {
                    tracing::warn!("Request timeout for {}", url);
                    return Err(PageError::Timeout {
                        url: url.to_string(),
                    });
                }
                Err(AttemptError::Permanent(message)) => {
                    return Err(PageError::Fetch {
                        url: url.to_string(),
                        attempts: attempt,
                        message,
                    });
                }
                Err(AttemptError::Transient(message)) => {
                    if attempt >= max_attempts {
                        return Err(PageError::Fetch {
                            url: url.to_string(),
                            attempts: attempt,
                            message,
                        });
                    }

                    let delay = self.config.backoff_for(attempt);
                    tracing::warn!(
                        "Transient failure for {} (attempt {}/{}): {}; retrying in {:?}",
                        url,
                        attempt,
                        max_attempts,
                        message,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Performs a single GET request
    async fn attempt(&self, url: &Url) -> Result<String, AttemptError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(classify_error)?;

        let status = response.status();
        if status.is_server_error() {
            return Err(AttemptError::Transient(format!("HTTP {}", status.as_u16())));
        }
        if !status.is_success() {
            return Err(AttemptError::Permanent(describe_status(status)));
        }

        response.text().await.map_err(classify_error)
    }
}

/// Sorts a reqwest error into the retry classes
fn classify_error(error: reqwest::Error) -> AttemptError {
    if error.is_timeout() {
        AttemptError::Timeout
    } else if error.is_connect() || error.is_body() || error.is_decode() || error.is_request() {
        AttemptError::Transient(error.to_string())
    } else {
        AttemptError::Permanent(error.to_string())
    }
}

fn describe_status(status: StatusCode) -> String {
    match status.canonical_reason() {
        Some(reason) => format!("HTTP {} {}", status.as_u16(), reason),
        None => format!("HTTP {}", status.as_u16()),
    }
}
