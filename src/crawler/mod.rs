//! Crawler module for listing page fetching and offer extraction
//!
//! This module contains the core scraping logic, including:
//! - HTTP fetching with timeout and bounded retry
//! - Pagination resolution from the first listing page
//! - Null-tolerant field and record extraction
//! - A shared progress counter
//! - Overall job coordination with a bounded worker pool

mod coordinator;
mod extract;
mod fetcher;
mod pagination;
mod progress;

pub use coordinator::{scrape, PageFailure, ScrapeCoordinator, ScrapeReport};
pub use extract::{
    extract_capacity, extract_fuel, extract_location, extract_mileage, extract_price,
    extract_year, Field, RecordExtractor, OFFER_SELECTOR,
};
pub use fetcher::{build_http_client, Page, PageFetcher};
pub use pagination::{
    read_offer_count, read_page_count, read_pagination, FirstPage, Pagination,
    PaginationResolver,
};
pub use progress::{Progress, ProgressTracker};
