//! Flat delimited export of offers
//!
//! The file starts with a header row naming the six fields in the order
//! `price, year, mileage, capacity, fuel, location`. Null fields are written
//! as empty fields and read back as null.

use crate::model::Offer;
use crate::ExportError;
use csv::{ReaderBuilder, WriterBuilder};
use std::path::Path;

/// Converts a one-character delimiter string to the byte the csv crate expects
pub fn delimiter_byte(delimiter: &str) -> Result<u8, ExportError> {
    match delimiter.as_bytes() {
        [byte] if byte.is_ascii() => Ok(*byte),
        _ => Err(ExportError::Delimiter(delimiter.to_string())),
    }
}

/// Writes offers to `path`, replacing any existing file
///
/// # Returns
///
/// * `Ok(usize)` - Number of data rows written
/// * `Err(ExportError)` - Failed to create or write the file
pub fn export_offers(path: &Path, offers: &[Offer], delimiter: u8) -> Result<usize, ExportError> {
    let mut writer = WriterBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .from_path(path)?;

    // Written explicitly so an empty export still has its header
    writer.write_record(Offer::FIELDS)?;
    for offer in offers {
        writer.serialize(offer)?;
    }
    writer.flush()?;

    tracing::info!("Exported {} offers to {}", offers.len(), path.display());
    Ok(offers.len())
}

/// Reads offers back from a file written by [`export_offers`]
pub fn read_offers(path: &Path, delimiter: u8) -> Result<Vec<Offer>, ExportError> {
    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .from_path(path)?;

    let offers = reader
        .deserialize()
        .collect::<Result<Vec<Offer>, csv::Error>>()?;
    Ok(offers)
}
