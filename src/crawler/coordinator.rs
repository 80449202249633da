//! Scrape coordinator - main job orchestration logic
//!
//! This module drives one scrape job through its lifecycle:
//! - Resolving the page count and expected offer count
//! - Queueing one task per remaining page for a bounded pool of workers
//! - Collecting per-page offers and per-page failures
//! - Honouring an external cancellation signal
//! - Merging everything into a single report

use crate::config::{validate, Config, ScraperConfig};
use crate::crawler::extract::RecordExtractor;
use crate::crawler::fetcher::PageFetcher;
use crate::crawler::pagination::{FirstPage, Pagination, PaginationResolver};
use crate::crawler::progress::ProgressTracker;
use crate::model::Offer;
use crate::state::JobState;
use crate::url::{page_urls, parse_base_url};
use crate::{PageError, ScrapeError};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use url::Url;

/// A page that could not be scraped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageFailure {
    /// 1-based page number
    pub page: u32,

    /// The page URL
    pub url: String,

    /// Why the page failed
    pub error: PageError,
}

/// Outcome of a finished scrape job
#[derive(Debug, Clone)]
pub struct ScrapeReport {
    pub base_url: String,
    pub page_count: u32,
    pub expected_offers: u64,

    /// Offers from every page that succeeded; no global order
    pub offers: Vec<Offer>,

    /// Pages that failed, sorted by page number
    pub failed_pages: Vec<PageFailure>,

    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl ScrapeReport {
    pub fn offer_count(&self) -> usize {
        self.offers.len()
    }

    pub fn failed_page_count(&self) -> usize {
        self.failed_pages.len()
    }

    pub fn failed_urls(&self) -> Vec<&str> {
        self.failed_pages.iter().map(|f| f.url.as_str()).collect()
    }

    /// Returns true if every page was scraped
    pub fn is_complete(&self) -> bool {
        self.failed_pages.is_empty()
    }

    pub fn duration(&self) -> Duration {
        (self.finished_at - self.started_at)
            .to_std()
            .unwrap_or_default()
    }
}

/// One page queued for a worker
#[derive(Debug, Clone)]
struct PageTask {
    page: u32,
    url: Url,
}

/// What a worker learned about one page
#[derive(Debug)]
struct PageOutcome {
    page: u32,
    url: Url,
    result: Result<Vec<Offer>, PageError>,
}

/// Everything a single run owns; dropped when the run returns
struct ScrapeJob {
    base_url: Url,
    pagination: Pagination,

    /// Offers of page 1, extracted during resolution
    first_page: Vec<Offer>,

    /// Pages 2..=page_count
    tasks: Vec<PageTask>,
    started_at: DateTime<Utc>,
}

/// Main scrape coordinator structure
///
/// A coordinator runs at most one job. Take the [`ProgressTracker`] and the
/// [`CancellationToken`] before calling [`ScrapeCoordinator::run`] to observe or
/// stop the job from elsewhere.
pub struct ScrapeCoordinator {
    config: Arc<ScraperConfig>,
    fetcher: PageFetcher,
    progress: ProgressTracker,
    cancel: CancellationToken,
    state: JobState,
}

impl ScrapeCoordinator {
    /// Creates a new coordinator with its own HTTP client
    ///
    /// The configuration is validated first, so overrides applied after
    /// loading cannot slip past the limits.
    pub fn new(config: &Config) -> Result<Self, ScrapeError> {
        validate(config)?;
        let fetcher = PageFetcher::from_config(&config.user_agent, &config.scraper)?;
        Ok(Self::with_fetcher(config.scraper.clone(), fetcher))
    }

    /// Creates a coordinator around an existing fetcher
    pub fn with_fetcher(config: ScraperConfig, fetcher: PageFetcher) -> Self {
        Self {
            config: Arc::new(config),
            fetcher,
            progress: ProgressTracker::new(),
            cancel: CancellationToken::new(),
            state: JobState::Idle,
        }
    }

    /// Handle for reading progress while the job runs
    pub fn progress(&self) -> ProgressTracker {
        self.progress.clone()
    }

    /// Token that stops the job when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    /// Resolves the listing size without fetching any further pages
    pub async fn resolve(&self, base_url: &str) -> Result<Pagination, ScrapeError> {
        let base = parse_base_url(base_url)?;
        let resolver = PaginationResolver::new(self.fetcher.clone());
        Ok(resolver.resolve(&base).await?)
    }

    /// Runs a complete scrape job
    ///
    /// # Returns
    ///
    /// * `Ok(ScrapeReport)` - All pages were attempted; failed pages are listed in the report
    /// * `Err(ScrapeError::Resolution)` - The page count could not be established
    /// * `Err(ScrapeError::Cancelled)` - The token was cancelled; carries the offers collected so far
    pub async fn run(&mut self, base_url: &str) -> Result<ScrapeReport, ScrapeError> {
        self.transition(JobState::Resolving)?;
        let started_at = Utc::now();

        let job = match self.prepare(base_url, started_at).await {
            Ok(job) => job,
            Err(e) => {
                tracing::error!("Scrape of {} stopped before fetching: {}", base_url, e);
                self.transition(JobState::Failed)?;
                return Err(e);
            }
        };

        self.transition(JobState::Fetching)?;
        let outcomes = self.fetch_pages(&job).await;

        if self.cancel.is_cancelled() {
            self.transition(JobState::Failed)?;
            let partial = merge(job, outcomes).offers;
            tracing::warn!("Scrape cancelled with {} offers collected", partial.len());
            return Err(ScrapeError::Cancelled { partial });
        }

        self.transition(JobState::Merging)?;
        let report = merge(job, outcomes);
        if report.is_complete() && report.offer_count() as u64 != report.expected_offers {
            tracing::warn!(
                "Listing announced {} offers but {} were collected",
                report.expected_offers,
                report.offer_count()
            );
        }

        self.transition(JobState::Done)?;
        tracing::info!(
            "Scrape completed: {} offers from {}/{} pages in {:?}",
            report.offer_count(),
            report.page_count as usize - report.failed_page_count(),
            report.page_count,
            report.duration()
        );

        Ok(report)
    }

    fn transition(&mut self, next: JobState) -> Result<(), ScrapeError> {
        if !self.state.can_transition_to(next) {
            return Err(ScrapeError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        tracing::debug!("Job state {} -> {}", self.state, next);
        self.state = next;
        Ok(())
    }

    /// Parses the base URL and resolves pagination, unless cancelled first
    async fn prepare(
        &self,
        base_url: &str,
        started_at: DateTime<Utc>,
    ) -> Result<ScrapeJob, ScrapeError> {
        let base_url = parse_base_url(base_url)?;
        let resolver = PaginationResolver::new(self.fetcher.clone());
        let extractor = RecordExtractor::new(self.progress.clone());

        let FirstPage { pagination, offers } = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                return Err(ScrapeError::Cancelled { partial: Vec::new() });
            }
            result = resolver.resolve_with_offers(&base_url, &extractor) => result?,
        };

        self.progress.set_total(pagination.expected_offers);

        Ok(ScrapeJob {
            tasks: page_tasks(&base_url, pagination.page_count),
            base_url,
            pagination,
            first_page: offers,
            started_at,
        })
    }

    /// Fans the page tasks out to a bounded worker pool
    async fn fetch_pages(&self, job: &ScrapeJob) -> Vec<PageOutcome> {
        if job.tasks.is_empty() {
            tracing::debug!("Single-page listing, nothing left to fetch");
            return Vec::new();
        }

        let worker_count = (self.config.max_workers as usize).min(job.tasks.len());

        let (sender, receiver) = mpsc::channel(job.tasks.len());
        for task in &job.tasks {
            // Capacity covers every task and the receiver is alive
            if sender.send(task.clone()).await.is_err() {
                break;
            }
        }
        drop(sender);

        tracing::info!(
            "Fetching {} page(s) with {} worker(s)",
            job.tasks.len(),
            worker_count
        );

        let queue = Arc::new(Mutex::new(receiver));
        let mut workers = JoinSet::new();
        for worker in 0..worker_count {
            workers.spawn(run_worker(
                worker,
                Arc::clone(&queue),
                self.fetcher.clone(),
                RecordExtractor::new(self.progress.clone()),
                self.cancel.clone(),
            ));
        }

        let mut outcomes = Vec::with_capacity(job.tasks.len());
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(mut batch) => outcomes.append(&mut batch),
                Err(e) => tracing::error!("Page worker failed: {}", e),
            }
        }

        outcomes
    }
}

/// Pulls page tasks from the shared queue until it drains or the job is cancelled
async fn run_worker(
    worker: usize,
    queue: Arc<Mutex<mpsc::Receiver<PageTask>>>,
    fetcher: PageFetcher,
    extractor: RecordExtractor,
    cancel: CancellationToken,
) -> Vec<PageOutcome> {
    let mut outcomes = Vec::new();

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            task = async { queue.lock().await.recv().await } => task,
        };

        let Some(task) = next else {
            tracing::trace!("Worker {} finished", worker);
            break;
        };

        tracing::debug!("Worker {} fetching page {}", worker, task.page);

        let fetched = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!("Worker {} abandoned page {}", worker, task.page);
                break;
            }
            fetched = fetcher.fetch_page(&task.url) => fetched,
        };

        let result = fetched.map(|page| extractor.extract_all(&page.document));
        match &result {
            Ok(offers) => tracing::debug!("Page {}: {} offers", task.page, offers.len()),
            Err(e) => tracing::warn!("Page {} failed: {}", task.page, e),
        }

        outcomes.push(PageOutcome {
            page: task.page,
            url: task.url,
            result,
        });
    }

    outcomes
}

/// One task per page after the first, which resolution already covered
fn page_tasks(base_url: &Url, page_count: u32) -> Vec<PageTask> {
    page_urls(base_url, page_count)
        .into_iter()
        .zip(1..)
        .skip(1)
        .map(|(url, page)| PageTask { page, url })
        .collect()
}

/// Concatenates per-page offers and collects failures
///
/// Pages with no outcome at all (a worker panicked) are reported as aborted.
fn merge(job: ScrapeJob, outcomes: Vec<PageOutcome>) -> ScrapeReport {
    let mut offers = job.first_page;
    let mut failed_pages = Vec::new();
    let mut seen = HashSet::new();

    for outcome in outcomes {
        seen.insert(outcome.page);
        match outcome.result {
            Ok(mut page_offers) => offers.append(&mut page_offers),
            Err(error) => failed_pages.push(PageFailure {
                page: outcome.page,
                url: outcome.url.to_string(),
                error,
            }),
        }
    }

    for task in &job.tasks {
        if !seen.contains(&task.page) {
            failed_pages.push(PageFailure {
                page: task.page,
                url: task.url.to_string(),
                error: PageError::Aborted {
                    url: task.url.to_string(),
                },
            });
        }
    }

    failed_pages.sort_by_key(|failure| failure.page);

    ScrapeReport {
        base_url: job.base_url.to_string(),
        page_count: job.pagination.page_count,
        expected_offers: job.pagination.expected_offers,
        offers,
        failed_pages,
        started_at: job.started_at,
        finished_at: Utc::now(),
    }
}

/// Runs a complete scrape job with a fresh coordinator
///
/// This is the entry point for embedding callers such as a web handler.
///
/// # Example
///
/// ```no_run
/// use motoscrape::config::Config;
/// use motoscrape::crawler::scrape;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let report = scrape(&Config::default(), "https://example.com/osobowe?search=1").await?;
/// println!("{} offers", report.offer_count());
/// # Ok(())
/// # }
/// ```
pub async fn scrape(config: &Config, base_url: &str) -> Result<ScrapeReport, ScrapeError> {
    let mut coordinator = ScrapeCoordinator::new(config)?;
    coordinator.run(base_url).await
}
