//! Integration tests for the scrape coordinator
//!
//! These tests use wiremock to serve a paginated listing and exercise the
//! full job: resolution, concurrent page fetches, failures and cancellation.

use motoscrape::config::{Config, ScraperConfig};
use motoscrape::crawler::ScrapeCoordinator;
use motoscrape::output::{export_offers, read_offers};
use motoscrape::{JobState, PageError, ResolutionError, ScrapeError};
use std::time::{Duration, Instant};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const LISTING_PATH: &str = "/osobowe";

/// Creates a test configuration with short deadlines and backoff
fn create_test_config(max_workers: u32) -> Config {
    Config {
        scraper: ScraperConfig {
            max_workers,
            request_timeout_ms: 2_000,
            connect_timeout_ms: 1_000,
            max_retries: 2,
            retry_backoff_ms: 10,
        },
        ..Default::default()
    }
}

fn listing_url(server: &MockServer) -> String {
    format!("{}{}?search%5Bfilter_enum_make%5D=audi", server.uri(), LISTING_PATH)
}

fn page_url(server: &MockServer, page: u32) -> String {
    format!("{}&page={}", listing_url(server), page)
}

/// One offer fragment whose price identifies page and position
fn offer_html(page: u32, index: usize) -> String {
    format!(
        r#"<div class="offer-item__content">
            <ul class="offer-item__params">
                <li class="offer-item__params-item" data-code="year"><span>{year}</span></li>
                <li class="offer-item__params-item" data-code="mileage"><span>{mileage} km</span></li>
                <li class="offer-item__params-item" data-code="engine_capacity"><span>1 968 cm3</span></li>
                <li class="offer-item__params-item" data-code="fuel_type"><span>Diesel</span></li>
            </ul>
            <span class="offer-item__location"><span>Poznań</span> <span>(Wielkopolskie)</span></span>
            <span class="offer-price__number">{price} PLN</span>
        </div>"#,
        year = 2000 + index,
        mileage = 1000 * page,
        price = page * 1000 + index as u32,
    )
}

/// A listing page with `offers` offers, a pagination widget and the offer counter
fn listing_page(page: u32, offers: usize, page_count: u32, total: u64) -> String {
    let widget = if page_count > 1 {
        let mut labels: String = (1..=page_count)
            .map(|n| format!(r#"<li><span class="page">{}</span></li>"#, n))
            .collect();
        labels.push_str(r#"<li><span class="page">Następna</span></li>"#);
        format!(r#"<ul class="om-pager">{}</ul>"#, labels)
    } else {
        String::new()
    };

    let items: String = (0..offers).map(|i| offer_html(page, i)).collect();

    format!(
        r#"<html><head><title>Listing</title></head><body>
            <div id="tabs-container"><span class="counter">({total})</span><span class="counter">(2)</span></div>
            <div class="offers list">{items}</div>
            {widget}
        </body></html>"#
    )
}

fn html(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_string(body)
        .insert_header("content-type", "text/html; charset=utf-8")
}

/// Mounts pages 1..=offers_per_page.len(), each with the given number of offers
async fn mount_listing(server: &MockServer, offers_per_page: &[usize]) {
    let page_count = offers_per_page.len() as u32;
    let total: u64 = offers_per_page.iter().map(|&n| n as u64).sum();

    for (page, &offers) in (1..).zip(offers_per_page) {
        Mock::given(method("GET"))
            .and(path(LISTING_PATH))
            .and(query_param("page", page.to_string()))
            .respond_with(html(listing_page(page, offers, page_count, total)))
            .mount(server)
            .await;
    }
}

async fn requests_for_page(server: &MockServer, page: u32) -> usize {
    let marker = format!("page={}", page);
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|request| request.url.query().map_or(false, |q| q.contains(&marker)))
        .count()
}

#[tokio::test]
async fn test_full_scrape_collects_every_page() {
    let server = MockServer::start().await;
    mount_listing(&server, &[3, 5, 2, 4]).await;

    let mut coordinator = ScrapeCoordinator::new(&create_test_config(3)).unwrap();
    let progress = coordinator.progress();

    let report = coordinator
        .run(&listing_url(&server))
        .await
        .expect("scrape failed");

    assert_eq!(report.page_count, 4);
    assert_eq!(report.expected_offers, 14);
    assert_eq!(report.offer_count(), 14);
    assert!(report.is_complete());
    assert_eq!(coordinator.state(), JobState::Done);

    assert_eq!(progress.processed(), 14);
    assert_eq!(progress.total(), 14);

    // Every offer is fully populated
    assert!(report.offers.iter().all(|offer| offer.populated_fields() == 6));

    // Page 2 contributed prices 2000..2005
    let mut page_two: Vec<i64> = report
        .offers
        .iter()
        .filter_map(|offer| offer.price)
        .filter(|price| (2000..3000).contains(price))
        .collect();
    page_two.sort_unstable();
    assert_eq!(page_two, vec![2000, 2001, 2002, 2003, 2004]);

    // Page 1 is fetched once, during resolution
    for page in 1..=4 {
        assert_eq!(requests_for_page(&server, page).await, 1, "page {}", page);
    }
}

#[tokio::test]
async fn test_failing_page_is_reported_not_raised() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(LISTING_PATH))
        .and(query_param("page", "3"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let page_count = 5;
    for page in [1u32, 2, 4, 5] {
        Mock::given(method("GET"))
            .and(path(LISTING_PATH))
            .and(query_param("page", page.to_string()))
            .respond_with(html(listing_page(page, 2, page_count, 10)))
            .mount(&server)
            .await;
    }

    let mut coordinator = ScrapeCoordinator::new(&create_test_config(4)).unwrap();
    let report = coordinator
        .run(&listing_url(&server))
        .await
        .expect("page failure must not abort the job");

    assert_eq!(report.offer_count(), 8);
    assert_eq!(report.failed_urls(), vec![page_url(&server, 3).as_str()]);
    assert!(matches!(
        &report.failed_pages[0].error,
        PageError::Fetch { attempts: 3, .. }
    ));
    assert_eq!(coordinator.state(), JobState::Done);

    // One attempt plus two retries
    assert_eq!(requests_for_page(&server, 3).await, 3);
}

#[tokio::test]
async fn test_transient_failure_recovers_on_retry() {
    let server = MockServer::start().await;
    let page_count = 3;

    Mock::given(method("GET"))
        .and(path(LISTING_PATH))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    for page in 1..=page_count {
        Mock::given(method("GET"))
            .and(path(LISTING_PATH))
            .and(query_param("page", page.to_string()))
            .respond_with(html(listing_page(page, 3, page_count, 9)))
            .mount(&server)
            .await;
    }

    let mut coordinator = ScrapeCoordinator::new(&create_test_config(2)).unwrap();
    let progress = coordinator.progress();
    let report = coordinator.run(&listing_url(&server)).await.unwrap();

    assert!(report.is_complete(), "failed: {:?}", report.failed_pages);
    assert_eq!(report.offer_count(), 9);
    assert_eq!(progress.processed(), 9);

    let recovered = report
        .offers
        .iter()
        .filter(|offer| offer.price.map_or(false, |price| (2000..3000).contains(&price)))
        .count();
    assert_eq!(recovered, 3);

    // The 503 plus one successful retry
    assert_eq!(requests_for_page(&server, 2).await, 2);
}

#[tokio::test]
async fn test_client_error_is_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(LISTING_PATH))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(LISTING_PATH))
        .and(query_param("page", "1"))
        .respond_with(html(listing_page(1, 3, 2, 6)))
        .mount(&server)
        .await;

    let mut coordinator = ScrapeCoordinator::new(&create_test_config(2)).unwrap();
    let report = coordinator.run(&listing_url(&server)).await.unwrap();

    assert_eq!(report.offer_count(), 3);
    assert!(matches!(
        &report.failed_pages[0].error,
        PageError::Fetch { attempts: 1, message, .. } if message.contains("404")
    ));
    assert_eq!(requests_for_page(&server, 2).await, 1);
}

#[tokio::test]
async fn test_timeout_fails_only_that_page() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(LISTING_PATH))
        .and(query_param("page", "2"))
        .respond_with(html(listing_page(2, 4, 3, 12)).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;
    for page in [1u32, 3] {
        Mock::given(method("GET"))
            .and(path(LISTING_PATH))
            .and(query_param("page", page.to_string()))
            .respond_with(html(listing_page(page, 4, 3, 12)))
            .mount(&server)
            .await;
    }

    let mut config = create_test_config(3);
    config.scraper.request_timeout_ms = 300;

    let mut coordinator = ScrapeCoordinator::new(&config).unwrap();
    let report = coordinator.run(&listing_url(&server)).await.unwrap();

    assert_eq!(report.offer_count(), 8);
    assert_eq!(report.failed_page_count(), 1);
    assert!(report.failed_pages[0].error.is_timeout());
    assert_eq!(report.failed_pages[0].page, 2);

    // Timeouts are surfaced, never retried
    assert_eq!(requests_for_page(&server, 2).await, 1);
}

#[tokio::test]
async fn test_single_page_listing() {
    let server = MockServer::start().await;
    mount_listing(&server, &[7]).await;

    let mut coordinator = ScrapeCoordinator::new(&create_test_config(8)).unwrap();
    let report = coordinator.run(&listing_url(&server)).await.unwrap();

    assert_eq!(report.page_count, 1);
    assert_eq!(report.offer_count(), 7);
    assert_eq!(server.received_requests().await.unwrap_or_default().len(), 1);
}

#[tokio::test]
async fn test_single_worker_fetches_every_page() {
    let server = MockServer::start().await;
    mount_listing(&server, &[1, 1, 1, 1, 1, 1]).await;

    let mut coordinator = ScrapeCoordinator::new(&create_test_config(1)).unwrap();
    let report = coordinator.run(&listing_url(&server)).await.unwrap();

    assert_eq!(report.offer_count(), 6);
    assert!(report.is_complete());
}

#[tokio::test]
async fn test_unreachable_first_page_is_fatal() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(LISTING_PATH))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let mut coordinator = ScrapeCoordinator::new(&create_test_config(2)).unwrap();
    let result = coordinator.run(&listing_url(&server)).await;

    assert!(matches!(
        result,
        Err(ScrapeError::Resolution(ResolutionError::Page(PageError::Fetch { .. })))
    ));
    assert_eq!(coordinator.state(), JobState::Failed);
}

#[tokio::test]
async fn test_missing_offer_counter_is_fatal() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(LISTING_PATH))
        .respond_with(html(
            "<html><body><div class=\"offers list\"></div></body></html>".to_string(),
        ))
        .mount(&server)
        .await;

    let mut coordinator = ScrapeCoordinator::new(&create_test_config(2)).unwrap();
    let result = coordinator.run(&listing_url(&server)).await;

    assert!(matches!(
        result,
        Err(ScrapeError::Resolution(ResolutionError::MissingOfferCount { .. }))
    ));
}

#[tokio::test]
async fn test_cancellation_stops_job_promptly() {
    let server = MockServer::start().await;
    let page_count = 6;

    Mock::given(method("GET"))
        .and(path(LISTING_PATH))
        .and(query_param("page", "1"))
        .respond_with(html(listing_page(1, 2, page_count, 12)))
        .mount(&server)
        .await;
    for page in 2..=page_count {
        Mock::given(method("GET"))
            .and(path(LISTING_PATH))
            .and(query_param("page", page.to_string()))
            .respond_with(
                html(listing_page(page, 2, page_count, 12)).set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;
    }

    let mut config = create_test_config(2);
    config.scraper.request_timeout_ms = 30_000;

    let mut coordinator = ScrapeCoordinator::new(&config).unwrap();
    let cancel = coordinator.cancellation_token();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        cancel.cancel();
    });

    let started = Instant::now();
    let result = coordinator.run(&listing_url(&server)).await;
    let elapsed = started.elapsed();

    assert!(elapsed < Duration::from_secs(3), "took {:?}", elapsed);
    match result {
        Err(ScrapeError::Cancelled { partial }) => assert!(partial.len() <= 2),
        other => panic!("expected cancellation, got {:?}", other.map(|r| r.offer_count())),
    }
    assert_eq!(coordinator.state(), JobState::Failed);
}

#[tokio::test]
async fn test_concurrent_jobs_do_not_interfere() {
    let first_server = MockServer::start().await;
    let second_server = MockServer::start().await;
    mount_listing(&first_server, &[4, 4, 4]).await;
    mount_listing(&second_server, &[1, 2]).await;

    let config = create_test_config(2);
    let mut first = ScrapeCoordinator::new(&config).unwrap();
    let mut second = ScrapeCoordinator::new(&config).unwrap();
    let first_progress = first.progress();
    let second_progress = second.progress();

    let first_url = listing_url(&first_server);
    let second_url = listing_url(&second_server);
    let (first_report, second_report) = tokio::join!(first.run(&first_url), second.run(&second_url));

    assert_eq!(first_report.unwrap().offer_count(), 12);
    assert_eq!(second_report.unwrap().offer_count(), 3);
    assert_eq!(first_progress.processed(), 12);
    assert_eq!(second_progress.processed(), 3);
}

#[tokio::test]
async fn test_scrape_then_export_round_trip() {
    let server = MockServer::start().await;
    mount_listing(&server, &[2, 3]).await;

    let report = motoscrape::scrape(&create_test_config(2), &listing_url(&server))
        .await
        .unwrap();

    let file = tempfile::NamedTempFile::new().unwrap();
    let written = export_offers(file.path(), &report.offers, b',').unwrap();
    let read = read_offers(file.path(), b',').unwrap();

    assert_eq!(written, 5);
    assert_eq!(read, report.offers);
}
