//! Offer record definitions

use serde::{Deserialize, Serialize};

/// One normalized vehicle-listing record
///
/// Every field is independently nullable. An offer is always constructed in
/// full, even when every field failed to extract.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offer {
    /// Price with currency markers removed
    pub price: Option<i64>,

    /// Production year
    pub year: Option<i32>,

    /// Mileage in kilometres
    pub mileage: Option<u64>,

    /// Engine capacity in cubic centimetres
    pub capacity: Option<u32>,

    /// Fuel type label
    pub fuel: Option<String>,

    /// Administrative region
    pub location: Option<String>,
}

impl Offer {
    /// Column names in export order
    pub const FIELDS: [&'static str; 6] =
        ["price", "year", "mileage", "capacity", "fuel", "location"];

    /// Returns true if no field could be extracted
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Number of populated fields
    pub fn populated_fields(&self) -> usize {
        [
            self.price.is_some(),
            self.year.is_some(),
            self.mileage.is_some(),
            self.capacity.is_some(),
            self.fuel.is_some(),
            self.location.is_some(),
        ]
        .iter()
        .filter(|present| **present)
        .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_offer_is_empty() {
        let offer = Offer::default();
        assert!(offer.is_empty());
        assert_eq!(offer.populated_fields(), 0);
    }

    #[test]
    fn test_populated_fields() {
        let offer = Offer {
            price: Some(45),
            year: Some(2015),
            fuel: Some("Diesel".to_string()),
            ..Default::default()
        };
        assert!(!offer.is_empty());
        assert_eq!(offer.populated_fields(), 3);
    }
}
