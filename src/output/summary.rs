//! Human-readable run summary
//!
//! Formats a finished [`ScrapeReport`] for the terminal.

use crate::crawler::ScrapeReport;
use std::fmt::Write;

/// Formats a report as plain text
pub fn format_summary(report: &ScrapeReport) -> String {
    let mut out = String::new();
    let succeeded = report.page_count as usize - report.failed_page_count();

    let _ = writeln!(out, "=== Scrape Summary ===\n");
    let _ = writeln!(out, "Listing: {}", report.base_url);
    let _ = writeln!(
        out,
        "Pages: {} / {} scraped",
        succeeded, report.page_count
    );
    let _ = writeln!(
        out,
        "Offers: {} collected ({} announced)",
        report.offer_count(),
        report.expected_offers
    );

    if !report.failed_pages.is_empty() {
        let _ = writeln!(out, "\nFailed Pages ({}):", report.failed_page_count());
        for failure in &report.failed_pages {
            let _ = writeln!(out, "  - page {}: {}", failure.page, failure.error);
        }
    }

    let _ = writeln!(
        out,
        "\n{} records\nprocessed in: {:.2} sec",
        report.offer_count(),
        report.duration().as_secs_f64()
    );

    out
}

/// Prints a report to stdout
pub fn print_summary(report: &ScrapeReport) {
    print!("{}", format_summary(report));
}
