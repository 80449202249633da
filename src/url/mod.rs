//! URL handling module for Motoscrape
//!
//! This module validates listing URLs and applies the site's pagination
//! convention, where page N is requested with a `page=N` query parameter.

mod page;

// Re-export main functions
pub use page::{page_url, page_urls, parse_base_url, PAGE_PARAM};
