use std::sync::Arc;

use tracing::trace;

use super::conversion::FieldConversionManager;
use super::error::FieldError;
use super::value::{Readable, ReadableMap, Value, ValueMap};

/// A document's data: the fields its schema declares, in internal form, plus any additional
/// fields the document carries, kept verbatim in readable form.
///
/// A name is either fixed or additional, never both. Names unknown to the schema are routed to
/// the additional fields automatically.
#[derive(Clone, Debug)]
pub struct Record {
    manager: Arc<FieldConversionManager>,
    fixed: ValueMap,
    additional: ReadableMap,
}

impl Record {
    /// A record with every fixed field at its default.
    pub fn new(manager: Arc<FieldConversionManager>) -> Result<Self, FieldError> {
        Record::from_readable(manager, &ReadableMap::new())
    }

    pub fn from_readable(
        manager: Arc<FieldConversionManager>,
        data: &ReadableMap,
    ) -> Result<Self, FieldError> {
        let fixed = manager.convert_to_internal(data)?;
        let additional: ReadableMap = data
            .iter()
            .filter(|(field, _)| !manager.is_known(field))
            .map(|(field, value)| (field.clone(), value.clone()))
            .collect();
        trace!(
            fixed = fixed.len(),
            additional = additional.len(),
            "record loaded"
        );
        Ok(Record {
            manager,
            fixed,
            additional,
        })
    }

    /// Fixed fields in schema order followed by the additional fields in insertion order.
    pub fn to_readable(&self) -> ReadableMap {
        let mut readable = self.manager.convert_to_readable(&self.fixed);
        readable.extend(
            self.additional
                .iter()
                .map(|(field, value)| (field.clone(), value.clone())),
        );
        readable
    }

    pub fn manager(&self) -> &Arc<FieldConversionManager> {
        &self.manager
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fixed
            .keys()
            .chain(self.additional.keys())
            .map(String::as_str)
    }

    pub fn is_fixed(&self, field: &str) -> bool {
        self.manager.is_known(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fixed.contains_key(field) || self.additional.contains_key(field)
    }

    /// The internal value of `field`. Additional fields are converted structurally.
    pub fn get(&self, field: &str) -> Option<Value> {
        match self.fixed.get(field) {
            Some(value) => Some(value.clone()),
            None => self.additional.get(field).map(Value::from_untyped),
        }
    }

    pub fn get_readable(&self, field: &str) -> Option<Readable> {
        match self.fixed.get(field) {
            Some(value) => self.manager.field_to_readable(field, value).ok(),
            None => self.additional.get(field).cloned(),
        }
    }

    pub fn fixed(&self, field: &str) -> Option<&Value> {
        self.fixed.get(field)
    }

    pub fn additional(&self, field: &str) -> Option<&Readable> {
        self.additional.get(field)
    }

    pub fn additional_fields(&self) -> &ReadableMap {
        &self.additional
    }

    /// Sets `field` from an internal value. Fixed fields are normalised through their type, so
    /// `Value::Text("2 h")` stored in a quantity field becomes a quantity.
    pub fn set<V: Into<Value>>(&mut self, field: &str, value: V) -> Result<(), FieldError> {
        let value = value.into();
        if self.manager.is_known(field) {
            let readable = self.manager.field_to_readable(field, &value)?;
            let internal = self.manager.field_to_internal(field, &readable)?;
            self.fixed.insert(field.to_string(), internal);
        } else {
            self.additional.insert(field.to_string(), value.to_readable());
        }
        Ok(())
    }

    /// Sets `field` from a readable value. On a conversion error the previous value is kept.
    pub fn set_readable(&mut self, field: &str, readable: Readable) -> Result<(), FieldError> {
        if self.manager.is_known(field) {
            let internal = self.manager.field_to_internal(field, &readable)?;
            self.fixed.insert(field.to_string(), internal);
        } else {
            self.additional.insert(field.to_string(), readable);
        }
        Ok(())
    }

    /// Puts a fixed field back to its default.
    pub fn reset(&mut self, field: &str) -> Result<(), FieldError> {
        let default = self.manager.default_internal(field)?;
        self.fixed.insert(field.to_string(), default);
        Ok(())
    }

    pub fn remove_additional(&mut self, field: &str) -> Option<Readable> {
        self.additional.shift_remove(field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Posting, Price, Quantity, Schema, TypeRegistry};
    use serde_json::json;

    fn client_manager() -> Arc<FieldConversionManager> {
        let schema: Schema = serde_json::from_value(json!({
            "name": { "type": "str", "default": "" },
            "rate": { "type": "Price", "default": "50.00 €" },
            "hours": { "type": "Quantity", "default": "0:00 h" },
            "postings": { "type": "Postings", "default": [] }
        }))
        .unwrap();
        Arc::new(FieldConversionManager::with_registry(
            &TypeRegistry::with_builtins(),
            schema,
        ))
    }

    fn readable(json: Readable) -> ReadableMap {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn routes_fixed_and_additional() {
        let record = Record::from_readable(
            client_manager(),
            &readable(json!({ "name": "ACME", "phone": "555-0100", "hours": "2:30 h" })),
        )
        .unwrap();

        assert_eq!(
            record.field_names().collect::<Vec<_>>(),
            vec!["name", "rate", "hours", "postings", "phone"]
        );
        assert!(record.fixed("phone").is_none());
        assert!(record.additional("name").is_none());
        assert_eq!(record.additional("phone"), Some(&json!("555-0100")));
        assert_eq!(record.get("phone"), Some(Value::from("555-0100")));
        assert_eq!(record.get_readable("rate"), Some(json!("50.00 €")));
        assert_eq!(
            record.get("hours").and_then(|v| v.as_quantity().map(Quantity::value)),
            Some("2.5".parse().unwrap())
        );
        assert_eq!(record.get("missing"), None);
    }

    #[test]
    fn readable_export_keeps_order() {
        let data = readable(json!({
            "zip": "12345",
            "name": "ACME",
            "hours": "1:45 h",
            "city": "Springfield"
        }));
        let record = Record::from_readable(client_manager(), &data).unwrap();
        let exported = record.to_readable();
        assert_eq!(
            exported.keys().collect::<Vec<_>>(),
            vec!["name", "rate", "hours", "postings", "zip", "city"]
        );
        assert_eq!(exported["hours"], json!("1:45 h"));
        assert_eq!(exported["postings"], json!([]));
    }

    #[test]
    fn setters_convert() {
        let mut record = Record::new(client_manager()).unwrap();
        record.set("hours", "3 h").unwrap();
        assert_eq!(
            record.fixed("hours"),
            Some(&Value::Quantity(Quantity::parse("3").unwrap()))
        );

        record.set("rate", Price::parse("61.505 €").unwrap()).unwrap();
        assert_eq!(record.get_readable("rate"), Some(json!("61.51 €")));

        record.set_readable("note", json!("call first")).unwrap();
        assert_eq!(record.additional("note"), Some(&json!("call first")));

        record
            .set_readable("postings", json!([{ "title": "A", "quantity": "2", "unit_price": "5 €" }]))
            .unwrap();
        let postings = record.fixed("postings").and_then(Value::as_postings).unwrap();
        assert_eq!(postings.len(), 1);
        assert_eq!(postings[0].total().unwrap().format(), "10.00 €");
    }

    #[test]
    fn failed_set_keeps_previous_value() {
        let mut record =
            Record::from_readable(client_manager(), &readable(json!({ "hours": "1 h" }))).unwrap();
        assert!(record.set_readable("hours", json!("soon")).is_err());
        assert_eq!(record.get_readable("hours"), Some(json!("1 h")));
    }

    #[test]
    fn reset_and_remove() {
        let mut record =
            Record::from_readable(client_manager(), &readable(json!({ "rate": "90 €", "x": 1 })))
                .unwrap();
        record.reset("rate").unwrap();
        assert_eq!(record.get_readable("rate"), Some(json!("50.00 €")));
        assert!(record.reset("x").is_err());
        assert_eq!(record.remove_additional("x"), Some(json!(1)));
        assert!(!record.contains("x"));
    }

    #[test]
    fn postings_value() {
        let posting: Posting = Posting::from_readable(&json!({ "quantity": "1" })).unwrap();
        let mut record = Record::new(client_manager()).unwrap();
        record.set("postings", vec![posting.clone(), posting]).unwrap();
        assert_eq!(
            record.get_readable("postings").and_then(|p| p.as_array().map(Vec::len)),
            Some(2)
        );
    }
}
