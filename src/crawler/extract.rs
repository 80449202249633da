//! Field and record extraction from offer markup
//!
//! Each offer field is located and normalized on its own. A field that is
//! missing or unreadable becomes `None`; it never affects the other fields or
//! the record as a whole.
//!
//! # Selectors
//!
//! | Field | Element |
//! |-------|---------|
//! | price | `span.offer-price__number` |
//! | year | `li.offer-item__params-item[data-code="year"]` |
//! | mileage | `li.offer-item__params-item[data-code="mileage"]` |
//! | capacity | `li.offer-item__params-item[data-code="engine_capacity"]` |
//! | fuel | `li.offer-item__params-item[data-code="fuel_type"]` |
//! | location | `span.offer-item__location` |

use crate::crawler::progress::ProgressTracker;
use crate::model::Offer;
use scraper::{ElementRef, Html, Selector};
use std::fmt;
use std::str::FromStr;

/// Selector matching one offer inside a listing page
pub const OFFER_SELECTOR: &str = "div.offer-item__content";

/// Why a field could not be read
///
/// Never leaves this module: every variant is turned into a null field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum FieldParseError {
    /// The selector matched nothing in the fragment
    MissingElement,

    /// The element had no usable text
    Empty,

    /// The text could not be converted to the field's type
    Unparseable(String),
}

/// The six offer fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Price,
    Year,
    Mileage,
    Capacity,
    Fuel,
    Location,
}

impl Field {
    pub const ALL: [Field; 6] = [
        Self::Price,
        Self::Year,
        Self::Mileage,
        Self::Capacity,
        Self::Fuel,
        Self::Location,
    ];

    /// Column name of the field
    pub fn name(&self) -> &'static str {
        match self {
            Self::Price => "price",
            Self::Year => "year",
            Self::Mileage => "mileage",
            Self::Capacity => "capacity",
            Self::Fuel => "fuel",
            Self::Location => "location",
        }
    }

    /// The site's field code, for fields listed as offer parameters
    pub fn code(&self) -> Option<&'static str> {
        match self {
            Self::Year => Some("year"),
            Self::Mileage => Some("mileage"),
            Self::Capacity => Some("engine_capacity"),
            Self::Fuel => Some("fuel_type"),
            Self::Price | Self::Location => None,
        }
    }

    /// CSS selector locating the field inside an offer fragment
    pub fn selector(&self) -> String {
        match (self, self.code()) {
            (Self::Price, _) => "span.offer-price__number".to_string(),
            (Self::Location, _) => "span.offer-item__location".to_string(),
            (_, Some(code)) => format!("li.offer-item__params-item[data-code=\"{}\"]", code),
            (_, None) => String::new(),
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Extracts the price; `"45,900 PLN"` yields `45`
pub fn extract_price(fragment: ElementRef<'_>) -> Option<i64> {
    coalesce(Field::Price, field_text(fragment, Field::Price).and_then(|t| parse_price(&t)))
}

pub fn extract_year(fragment: ElementRef<'_>) -> Option<i32> {
    coalesce(Field::Year, field_text(fragment, Field::Year).and_then(|t| parse_year(&t)))
}

pub fn extract_mileage(fragment: ElementRef<'_>) -> Option<u64> {
    coalesce(
        Field::Mileage,
        field_text(fragment, Field::Mileage).and_then(|t| parse_mileage(&t)),
    )
}

pub fn extract_capacity(fragment: ElementRef<'_>) -> Option<u32> {
    coalesce(
        Field::Capacity,
        field_text(fragment, Field::Capacity).and_then(|t| parse_capacity(&t)),
    )
}

pub fn extract_fuel(fragment: ElementRef<'_>) -> Option<String> {
    coalesce(Field::Fuel, field_text(fragment, Field::Fuel).and_then(|t| parse_label(&t)))
}

/// Extracts the administrative region of the offer
pub fn extract_location(fragment: ElementRef<'_>) -> Option<String> {
    coalesce(
        Field::Location,
        field_text(fragment, Field::Location).and_then(|t| parse_location(&t)),
    )
}

/// Assembles offers from offer fragments
///
/// Every processed fragment produces exactly one offer and exactly one
/// progress increment, however many of its fields were null.
#[derive(Debug, Clone)]
pub struct RecordExtractor {
    progress: ProgressTracker,
}

impl RecordExtractor {
    pub fn new(progress: ProgressTracker) -> Self {
        Self { progress }
    }

    /// Builds one offer from one fragment
    pub fn extract(&self, fragment: ElementRef<'_>) -> Offer {
        let offer = Offer {
            price: extract_price(fragment),
            year: extract_year(fragment),
            mileage: extract_mileage(fragment),
            capacity: extract_capacity(fragment),
            fuel: extract_fuel(fragment),
            location: extract_location(fragment),
        };
        self.progress.record();
        offer
    }

    /// Builds offers from every fragment of a document, in markup order
    pub fn extract_all(&self, document: &Html) -> Vec<Offer> {
        let Ok(selector) = Selector::parse(OFFER_SELECTOR) else {
            return Vec::new();
        };

        document
            .select(&selector)
            .map(|fragment| self.extract(fragment))
            .collect()
    }
}

/// Turns a field result into a nullable value, logging why it was dropped
fn coalesce<T>(field: Field, result: Result<T, FieldParseError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(FieldParseError::MissingElement) => {
            tracing::trace!("Field {} absent", field);
            None
        }
        Err(FieldParseError::Empty) => {
            tracing::debug!("Field {} has no text", field);
            None
        }
        Err(FieldParseError::Unparseable(text)) => {
            tracing::debug!("Field {} unreadable: '{}'", field, text);
            None
        }
    }
}

/// Collects the raw text of a field's element
fn field_text(fragment: ElementRef<'_>, field: Field) -> Result<String, FieldParseError> {
    let selector =
        Selector::parse(&field.selector()).map_err(|_| FieldParseError::MissingElement)?;

    fragment
        .select(&selector)
        .next()
        .map(|element| element.text().collect::<Vec<_>>().join(" "))
        .ok_or(FieldParseError::MissingElement)
}

/// Removes all whitespace, joining the tokens together
fn compact(text: &str) -> String {
    text.split_whitespace().collect()
}

fn parse_number<T: FromStr>(text: &str) -> Result<T, FieldParseError> {
    if text.is_empty() {
        return Err(FieldParseError::Empty);
    }
    text.parse()
        .map_err(|_| FieldParseError::Unparseable(text.to_string()))
}

/// Currency markers are dropped and everything from the first comma on is cut.
///
/// NOTE: the site renders `45,900 PLN`, so the cut keeps `45`. This pins the
/// observed behavior; whether the comma is a thousands separator is unresolved.
pub(crate) fn parse_price(text: &str) -> Result<i64, FieldParseError> {
    let compacted = compact(text).replace("PLN", "").replace("EUR", "");
    let integer_part = compacted.split(',').next().unwrap_or_default();
    parse_number(integer_part)
}

pub(crate) fn parse_year(text: &str) -> Result<i32, FieldParseError> {
    parse_number(&compact(text))
}

/// A unit with no digits means the site left the value out, read as zero
pub(crate) fn parse_mileage(text: &str) -> Result<u64, FieldParseError> {
    parse_with_unit(text, &["km"])
}

pub(crate) fn parse_capacity(text: &str) -> Result<u32, FieldParseError> {
    parse_with_unit(text, &["cm3", "cm³"])
}

fn parse_with_unit<T: FromStr + Default>(
    text: &str,
    units: &[&str],
) -> Result<T, FieldParseError> {
    let compacted = compact(text);
    if compacted.is_empty() {
        return Err(FieldParseError::Empty);
    }

    let stripped = units
        .iter()
        .find_map(|unit| compacted.strip_suffix(unit))
        .unwrap_or(&compacted);

    if stripped.is_empty() {
        return Ok(T::default());
    }
    parse_number(stripped)
}

pub(crate) fn parse_label(text: &str) -> Result<String, FieldParseError> {
    let label = compact(text);
    if label.is_empty() {
        return Err(FieldParseError::Empty);
    }
    Ok(label)
}

/// `Warszawa (Mazowieckie)` → `Mazowieckie`; text without parentheses is kept whole
pub(crate) fn parse_location(text: &str) -> Result<String, FieldParseError> {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");

    let region = collapsed
        .rfind('(')
        .and_then(|open| {
            let inner = &collapsed[open + 1..];
            inner.find(')').map(|close| inner[..close].trim())
        })
        .filter(|region| !region.is_empty())
        .unwrap_or(collapsed.as_str());

    if region.is_empty() {
        return Err(FieldParseError::Empty);
    }
    Ok(region.to_string())
}
