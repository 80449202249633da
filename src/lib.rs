//! Motoscrape: a concurrent vehicle-listing scraper
//!
//! This crate harvests offer records from a paginated listing site. It resolves
//! the page count, fetches pages with a bounded worker pool, extracts every
//! offer field independently and reports partial failures instead of aborting.

pub mod config;
pub mod crawler;
pub mod model;
pub mod output;
pub mod state;
pub mod url;

use thiserror::Error;

/// Main error type for Motoscrape operations
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to resolve pagination: {0}")]
    Resolution(#[from] ResolutionError),

    #[error("Scrape cancelled after collecting {} offers", .partial.len())]
    Cancelled { partial: Vec<model::Offer> },

    #[error("Invalid state transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: state::JobState,
        to: state::JobState,
    },

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),
}

/// Errors that make the page count or offer count unknowable
#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("Could not fetch first page: {0}")]
    Page(#[from] PageError),

    #[error("Offer counter missing on {url}")]
    MissingOfferCount { url: String },

    #[error("Unreadable offer counter '{text}' on {url}")]
    InvalidOfferCount { url: String, text: String },

    #[error("Unreadable pagination label '{label}' on {url}")]
    InvalidPageLabel { url: String, label: String },
}

/// Failures confined to a single page
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PageError {
    #[error("Request timeout for {url}")]
    Timeout { url: String },

    #[error("Fetch failed for {url} after {attempts} attempt(s): {message}")]
    Fetch {
        url: String,
        attempts: u32,
        message: String,
    },

    #[error("Page worker aborted before finishing {url}")]
    Aborted { url: String },
}

impl PageError {
    /// Returns true for deadline failures
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,
}

/// Flat export errors
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Delimiter must be a single ASCII character, got '{0}'")]
    Delimiter(String),
}

/// Result type alias for Motoscrape operations
pub type Result<T> = std::result::Result<T, ScrapeError>;

// Re-export commonly used types
pub use config::Config;
pub use model::Offer;
pub use crawler::{scrape, PageFailure, ProgressTracker, ScrapeCoordinator, ScrapeReport};
pub use state::JobState;
