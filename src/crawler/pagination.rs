//! Page count and offer count resolution
//!
//! The listing's first page carries both numbers: the pagination widget
//! (`span.page` labels) and the offer counter (`#tabs-container span.counter`).

use crate::crawler::extract::RecordExtractor;
use crate::crawler::fetcher::{Page, PageFetcher};
use crate::model::Offer;
use crate::url::page_url;
use crate::ResolutionError;
use scraper::{Html, Selector};
use url::Url;

const PAGE_LABEL_SELECTOR: &str = "span.page";
const COUNTER_CONTAINER_SELECTOR: &str = "#tabs-container";
const COUNTER_SELECTOR: &str = "span.counter";

/// Size of a listing as announced by its first page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    /// Number of pages, at least 1
    pub page_count: u32,

    /// Number of offers the listing claims to hold
    pub expected_offers: u64,
}

/// Pagination together with the offers already present on page 1
#[derive(Debug, Clone, PartialEq)]
pub struct FirstPage {
    pub pagination: Pagination,
    pub offers: Vec<Offer>,
}

/// Determines how many pages a listing has
#[derive(Clone)]
pub struct PaginationResolver {
    fetcher: PageFetcher,
}

impl PaginationResolver {
    pub fn new(fetcher: PageFetcher) -> Self {
        Self { fetcher }
    }

    /// Fetches page 1 of the listing and reads both counts from it
    pub async fn resolve(&self, base_url: &Url) -> Result<Pagination, ResolutionError> {
        let page = self.fetch_first(base_url).await?;
        read_pagination(&page.document, page.url.as_str())
    }

    /// Like [`PaginationResolver::resolve`], but also extracts the offers of
    /// page 1 so the page is downloaded only once per job
    pub async fn resolve_with_offers(
        &self,
        base_url: &Url,
        extractor: &RecordExtractor,
    ) -> Result<FirstPage, ResolutionError> {
        let page = self.fetch_first(base_url).await?;
        let pagination = read_pagination(&page.document, page.url.as_str())?;
        let offers = extractor.extract_all(&page.document);
        tracing::debug!("Page 1: {} offers", offers.len());

        Ok(FirstPage { pagination, offers })
    }

    async fn fetch_first(&self, base_url: &Url) -> Result<Page, ResolutionError> {
        let first = page_url(base_url, 1);
        tracing::debug!("Resolving pagination from {}", first);
        Ok(self.fetcher.fetch_page(&first).await?)
    }
}

/// Reads page count and offer count from a parsed first page
pub fn read_pagination(document: &Html, url: &str) -> Result<Pagination, ResolutionError> {
    let pagination = Pagination {
        page_count: read_page_count(document, url)?,
        expected_offers: read_offer_count(document, url)?,
    };

    tracing::info!(
        "Listing has {} page(s), {} offer(s) expected",
        pagination.page_count,
        pagination.expected_offers
    );
    Ok(pagination)
}

/// Reads the last page number from the pagination widget
///
/// The widget ends with a "next" control, so the second-to-last label is the
/// highest page number. No widget means a single page.
pub fn read_page_count(document: &Html, url: &str) -> Result<u32, ResolutionError> {
    let Ok(selector) = Selector::parse(PAGE_LABEL_SELECTOR) else {
        return Ok(1);
    };

    let labels: Vec<String> = document
        .select(&selector)
        .map(|element| element.text().flat_map(str::split_whitespace).collect())
        .collect();

    let label = match labels.len() {
        0 => return Ok(1),
        1 => &labels[0],
        n => &labels[n - 2],
    };

    match label.parse::<u32>() {
        Ok(count) if count >= 1 => Ok(count),
        _ => Err(ResolutionError::InvalidPageLabel {
            url: url.to_string(),
            label: label.clone(),
        }),
    }
}

/// Reads the total offer count, e.g. `(1 234)` → 1234
pub fn read_offer_count(document: &Html, url: &str) -> Result<u64, ResolutionError> {
    let missing = || ResolutionError::MissingOfferCount {
        url: url.to_string(),
    };

    let container_selector = Selector::parse(COUNTER_CONTAINER_SELECTOR).map_err(|_| missing())?;
    let counter_selector = Selector::parse(COUNTER_SELECTOR).map_err(|_| missing())?;

    let counter = document
        .select(&container_selector)
        .next()
        .and_then(|container| container.select(&counter_selector).next())
        .ok_or_else(missing)?;

    let text: String = counter.text().flat_map(str::split_whitespace).collect();
    let digits = text.trim_start_matches('(').trim_end_matches(')');

    digits
        .parse()
        .map_err(|_| ResolutionError::InvalidOfferCount {
            url: url.to_string(),
            text,
        })
}
