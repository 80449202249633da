//! Output module for scrape results
//!
//! This module handles:
//! - Writing offers to a flat delimited file and reading them back
//! - Formatting a run summary for the terminal

mod export;
mod summary;

pub use export::{delimiter_byte, export_offers, read_offers};
pub use summary::{format_summary, print_summary};
