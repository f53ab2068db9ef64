use rust_decimal::Decimal;
use serde_json::Map;
use typed_builder::TypedBuilder;

use super::error::{ConversionError, ValueResult};
use super::percentage::Percentage;
use super::price::Price;
use super::quantity::Quantity;
use super::value::{readable_text, Readable};

const DEFAULT_QUANTITY: &str = "1";
const DEFAULT_UNIT_PRICE: &str = "0.00 €";
const DEFAULT_VAT: &str = "0 %";

/// A single invoice line: something sold `quantity` times at `unit_price`, taxed with `vat`.
///
/// In a stored document a posting is a mapping:
///
/// ```text
/// - title: Consulting
///   comment: on-site workshop
///   quantity: 1:45 h
///   unit_price: 80.00 €
///   vat: 19 %
/// ```
#[derive(Clone, Debug, PartialEq, TypedBuilder)]
pub struct Posting {
    #[builder(default)]
    pub title: String,

    #[builder(default)]
    pub comment: String,

    pub quantity: Quantity,

    pub unit_price: Price,

    #[builder(default)]
    pub vat: Percentage,
}

impl Posting {
    /// `unit_price × quantity`, in the currency of the unit price. Fails when the product does
    /// not fit a decimal.
    pub fn total(&self) -> ValueResult<Price> {
        self.unit_price.checked_mul(&self.quantity)
    }

    pub fn vat_amount(&self) -> ValueResult<Price> {
        self.total()?.checked_mul(&self.vat)
    }

    pub fn total_with_vat(&self) -> ValueResult<Price> {
        let total = self.total()?;
        let vat = total.checked_mul(&self.vat)?;
        total.checked_add(vat)
    }

    pub fn from_readable(readable: &Readable) -> Result<Posting, ConversionError> {
        let map = match readable {
            Readable::Object(map) => map,
            other => return Err(ConversionError::mismatch("posting mapping", other)),
        };
        let text = |key: &str, default: &str| -> Result<String, ConversionError> {
            match map.get(key) {
                None | Some(Readable::Null) => Ok(default.to_string()),
                Some(value) => {
                    readable_text(value).ok_or_else(|| ConversionError::mismatch("scalar", value))
                }
            }
        };
        Ok(Posting {
            title: text("title", "")?,
            comment: text("comment", "")?,
            quantity: Quantity::parse(&text("quantity", DEFAULT_QUANTITY)?)?,
            unit_price: Price::parse(&text("unit_price", DEFAULT_UNIT_PRICE)?)?,
            vat: Percentage::parse(&text("vat", DEFAULT_VAT)?)?,
        })
    }

    pub fn to_readable(&self) -> Readable {
        let mut map = Map::new();
        map.insert("title".to_string(), Readable::String(self.title.clone()));
        map.insert("comment".to_string(), Readable::String(self.comment.clone()));
        map.insert("quantity".to_string(), Readable::String(self.quantity.format()));
        map.insert("unit_price".to_string(), Readable::String(self.unit_price.format()));
        map.insert("vat".to_string(), Readable::String(self.vat.format()));
        Readable::Object(map)
    }
}

/// Sum of the net totals of `postings`, in the currency of the first one.
pub fn postings_total(postings: &[Posting]) -> ValueResult<Price> {
    let start = match postings.first() {
        Some(first) => Price::new(Decimal::ZERO, first.unit_price.currency()),
        None => Price::default(),
    };
    postings
        .iter()
        .try_fold(start, |sum, posting| sum.checked_add(posting.total()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValueError;
    use serde_json::json;
    use std::str::FromStr;

    #[test]
    fn totals() {
        let posting = Posting::builder()
            .title("Consulting".to_string())
            .quantity(Quantity::parse("1:45 h").unwrap())
            .unit_price(Price::parse("80 €").unwrap())
            .vat(Percentage::parse("19 %").unwrap())
            .build();
        assert_eq!(posting.total().unwrap().format(), "140.00 €");
        assert_eq!(posting.vat_amount().unwrap().format(), "26.60 €");
        assert_eq!(posting.total_with_vat().unwrap().format(), "166.60 €");
    }

    #[test]
    fn readable_defaults() {
        let posting = Posting::from_readable(&json!({ "title": "Setup", "unit_price": 50 })).unwrap();
        assert_eq!(posting.quantity.value(), Decimal::ONE);
        assert_eq!(posting.unit_price.format(), "50.00");
        assert_eq!(posting.vat.format(), "0 %");
        assert_eq!(
            posting.to_readable(),
            json!({
                "title": "Setup",
                "comment": "",
                "quantity": "1",
                "unit_price": "50.00",
                "vat": "0 %"
            })
        );
    }

    #[test]
    fn rejects_bad_postings() {
        assert!(Posting::from_readable(&json!("just text")).is_err());
        assert!(Posting::from_readable(&json!({ "quantity": "lots" })).is_err());
        assert!(Posting::from_readable(&json!({ "title": ["a"] })).is_err());
    }

    #[test]
    fn sum_of_postings() {
        let postings: Vec<Posting> = vec![
            Posting::from_readable(&json!({ "quantity": "2 h", "unit_price": "10.50 €" })).unwrap(),
            Posting::from_readable(&json!({ "quantity": "0:30 h", "unit_price": "60 €" })).unwrap(),
        ];
        let total = postings_total(&postings).unwrap();
        assert_eq!(total.value(), Decimal::from_str("51.00").unwrap());
        assert_eq!(total.format(), "51.00 €");
        assert_eq!(postings_total(&[]).unwrap().format(), "0.00");
    }

    #[test]
    fn overflowing_totals_are_errors() {
        let huge = json!({ "quantity": "2", "unit_price": "39614081257132168796771975168 €" });
        let posting = Posting::from_readable(&huge).unwrap();
        assert!(matches!(posting.total(), Err(ValueError::Format { .. })));
        assert!(posting.total_with_vat().is_err());

        let half = json!({ "quantity": "1", "unit_price": "49614081257132168796771975168 €" });
        let postings = vec![
            Posting::from_readable(&half).unwrap(),
            Posting::from_readable(&half).unwrap(),
        ];
        assert!(postings[0].total().is_ok());
        assert!(postings_total(&postings).is_err());
    }
}
