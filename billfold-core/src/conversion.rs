use std::collections::HashMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{trace, warn};
use typed_builder::TypedBuilder;

use super::error::FieldError;
use super::registry::{global_registry, FieldTypeDescriptor, TypeRegistry};
use super::value::{Readable, ReadableMap, Value, ValueMap};

/// Declaration of one field of a document type.
///
/// In a schema document it reads `{"type": "Price", "default": "0.00 €"}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, TypedBuilder)]
pub struct FieldDescriptor {
    /// Name of the field type in the [`TypeRegistry`].
    #[serde(rename = "type")]
    pub type_name: String,

    /// The readable value used when a document does not set the field.
    #[serde(default)]
    #[builder(default)]
    pub default: Readable,
}

impl FieldDescriptor {
    pub fn new<S: Into<String>>(type_name: S, default: Readable) -> Self {
        FieldDescriptor {
            type_name: type_name.into(),
            default,
        }
    }
}

/// Field name to declaration, in document order.
pub type Schema = IndexMap<String, FieldDescriptor>;

/// Converts the fields of one document type between readable and internal form.
///
/// Fields whose type is not registered stay known to the manager but are inert: their values
/// pass through untouched and their default is used verbatim.
#[derive(Clone, Debug, Default)]
pub struct FieldConversionManager {
    descriptor: Schema,
    converters: HashMap<String, FieldTypeDescriptor>,
}

impl FieldConversionManager {
    /// A manager for `schema`, resolving types in the process-wide registry.
    pub fn new(schema: Schema) -> Self {
        let mut manager = FieldConversionManager::default();
        manager.set_descriptor(schema);
        manager
    }

    pub fn with_registry(registry: &TypeRegistry, schema: Schema) -> Self {
        let mut manager = FieldConversionManager::default();
        manager.set_descriptor_with(registry, schema);
        manager
    }

    /// Replaces the whole schema, resolving types in the process-wide registry.
    pub fn set_descriptor(&mut self, schema: Schema) {
        let registry = global_registry();
        self.set_descriptor_with(&registry, schema);
    }

    pub fn set_descriptor_with(&mut self, registry: &TypeRegistry, schema: Schema) {
        self.converters.clear();
        for (field, declaration) in &schema {
            match registry.get(&declaration.type_name) {
                Some(ty) => {
                    self.converters.insert(field.clone(), ty.clone());
                }
                None => warn!(
                    field = %field,
                    type_name = %declaration.type_name,
                    "unknown field type, values pass through unconverted"
                ),
            }
        }
        self.descriptor = schema;
    }

    pub fn descriptor(&self) -> &Schema {
        &self.descriptor
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.descriptor.keys().map(String::as_str)
    }

    pub fn is_known(&self, field: &str) -> bool {
        self.descriptor.contains_key(field)
    }

    pub fn has_converter(&self, field: &str) -> bool {
        self.converters.contains_key(field)
    }

    pub fn type_name(&self, field: &str) -> Option<&str> {
        self.descriptor.get(field).map(|d| d.type_name.as_str())
    }

    pub fn default_readable(&self, field: &str) -> Option<&Readable> {
        self.descriptor.get(field).map(|d| &d.default)
    }

    pub fn default_internal(&self, field: &str) -> Result<Value, FieldError> {
        let default = self
            .default_readable(field)
            .ok_or_else(|| FieldError::UnknownField(field.to_string()))?;
        self.convert_internal(field, default)
    }

    /// Converts one readable value of `field`. `Null` stands for "not set" and yields the default.
    pub fn field_to_internal(&self, field: &str, readable: &Readable) -> Result<Value, FieldError> {
        let declaration = self
            .descriptor
            .get(field)
            .ok_or_else(|| FieldError::UnknownField(field.to_string()))?;
        if readable.is_null() {
            return self.convert_internal(field, &declaration.default);
        }
        self.convert_internal(field, readable)
    }

    pub fn field_to_readable(&self, field: &str, value: &Value) -> Result<Readable, FieldError> {
        let declaration = self
            .descriptor
            .get(field)
            .ok_or_else(|| FieldError::UnknownField(field.to_string()))?;
        if value.is_null() {
            return Ok(declaration.default.clone());
        }
        Ok(match self.converters.get(field) {
            Some(ty) => ty.to_readable(value),
            None => value.to_readable(),
        })
    }

    /// Converts the known fields of `data`, filling in defaults for the absent ones. Keys that
    /// are not part of the schema are left out of the result.
    pub fn convert_to_internal(&self, data: &ReadableMap) -> Result<ValueMap, FieldError> {
        let mut converted = ValueMap::with_capacity(self.descriptor.len());
        for field in self.descriptor.keys() {
            let value = match data.get(field) {
                Some(readable) => self.field_to_internal(field, readable)?,
                None => self.default_internal(field)?,
            };
            converted.insert(field.clone(), value);
        }
        trace!(fields = converted.len(), "converted to internal form");
        Ok(converted)
    }

    /// Converts the known fields of `data` to readable form. Absent fields take their readable
    /// default as is.
    pub fn convert_to_readable(&self, data: &ValueMap) -> ReadableMap {
        self.descriptor
            .iter()
            .map(|(field, declaration)| {
                let readable = match data.get(field) {
                    Some(value) => self
                        .field_to_readable(field, value)
                        .unwrap_or_else(|_| declaration.default.clone()),
                    None => declaration.default.clone(),
                };
                (field.clone(), readable)
            })
            .collect()
    }

    fn convert_internal(&self, field: &str, readable: &Readable) -> Result<Value, FieldError> {
        match self.converters.get(field) {
            Some(ty) => ty
                .to_internal(readable)
                .map_err(|e| FieldError::conversion(field, e)),
            None => Ok(Value::from_untyped(readable)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConversionError;
    use crate::{Percentage, Price, Quantity};
    use serde_json::json;

    fn schema(json: Readable) -> Schema {
        serde_json::from_value(json).unwrap()
    }

    fn invoice_manager() -> FieldConversionManager {
        FieldConversionManager::with_registry(
            &TypeRegistry::with_builtins(),
            schema(json!({
                "title": { "type": "str", "default": "Invoice" },
                "hours": { "type": "Quantity", "default": "0:00 h" },
                "rate": { "type": "Price", "default": "0.00 €" },
                "vat": { "type": "Percentage", "default": "19 %" },
                "paid": { "type": "bool" },
                "legacy": { "type": "Frobnicator", "default": "as is" }
            })),
        )
    }

    #[test]
    fn default_fill() {
        let manager = FieldConversionManager::with_registry(
            &TypeRegistry::with_builtins(),
            schema(json!({ "age": { "type": "int", "default": 9 } })),
        );
        let converted = manager.convert_to_internal(&ReadableMap::new()).unwrap();
        assert_eq!(converted.get("age"), Some(&Value::Int(9)));
        assert_eq!(converted.len(), 1);
    }

    #[test]
    fn to_internal() {
        let manager = invoice_manager();
        let mut data = ReadableMap::new();
        data.insert("hours".into(), json!("1:30 h"));
        data.insert("rate".into(), json!("80 €"));
        data.insert("note".into(), json!("dropped"));
        data.insert("legacy".into(), json!([1, 2]));

        let converted = manager.convert_to_internal(&data).unwrap();
        assert_eq!(
            converted.keys().collect::<Vec<_>>(),
            vec!["title", "hours", "rate", "vat", "paid", "legacy"]
        );
        assert_eq!(converted["title"], Value::from("Invoice"));
        assert_eq!(converted["hours"], Value::Quantity(Quantity::parse("1.5").unwrap()));
        assert_eq!(converted["rate"], Value::Price(Price::parse("80").unwrap()));
        assert_eq!(converted["vat"], Value::Percentage(Percentage::parse("19").unwrap()));
        assert_eq!(converted["paid"], Value::Bool(false));
        assert_eq!(converted["legacy"], Value::List(vec![Value::Int(1), Value::Int(2)]));
        assert!(!converted.contains_key("note"));
    }

    #[test]
    fn null_means_default() {
        let manager = invoice_manager();
        let value = manager.field_to_internal("vat", &Readable::Null).unwrap();
        assert_eq!(value.as_percentage().map(|p| p.format()), Some("19 %".to_string()));
        assert_eq!(
            manager.field_to_readable("hours", &Value::Null).unwrap(),
            json!("0:00 h")
        );
    }

    #[test]
    fn to_readable() {
        let manager = invoice_manager();
        let mut data = ValueMap::new();
        data.insert("hours".into(), Value::Quantity(Quantity::parse("2:15 h").unwrap()));
        data.insert("rate".into(), Value::Price(Price::parse("12.5 €").unwrap()));
        data.insert("legacy".into(), Value::from("kept"));

        let readable = manager.convert_to_readable(&data);
        assert_eq!(readable["title"], json!("Invoice"));
        assert_eq!(readable["hours"], json!("2:15 h"));
        assert_eq!(readable["rate"], json!("12.50 €"));
        assert_eq!(readable["vat"], json!("19 %"));
        assert_eq!(readable["paid"], Readable::Null);
        assert_eq!(readable["legacy"], json!("kept"));
    }

    #[test]
    fn readable_round_trip() {
        let manager = invoice_manager();
        let mut data = ReadableMap::new();
        data.insert("hours".into(), json!("1:45   h"));
        data.insert("rate".into(), json!("99.999 €"));
        data.insert("vat".into(), json!(7));
        let once = manager.convert_to_readable(&manager.convert_to_internal(&data).unwrap());
        let twice = manager.convert_to_readable(&manager.convert_to_internal(&once).unwrap());
        assert_eq!(once, twice);
        assert_eq!(once["hours"], json!("1:45   h"));
        assert_eq!(once["rate"], json!("100.00 €"));
        assert_eq!(once["vat"], json!("7 %"));
    }

    #[test]
    fn unknown_type_is_inert() {
        let manager = invoice_manager();
        assert!(manager.is_known("legacy"));
        assert!(!manager.has_converter("legacy"));
        assert_eq!(manager.default_internal("legacy"), Ok(Value::from("as is")));
    }

    #[test]
    fn errors_name_the_field() {
        let manager = invoice_manager();
        let mut data = ReadableMap::new();
        data.insert("hours".into(), json!("many"));
        match manager.convert_to_internal(&data) {
            Err(FieldError::Conversion { field, source: ConversionError::Value(_) }) => {
                assert_eq!(field, "hours")
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(
            manager.field_to_internal("nope", &json!(1)),
            Err(FieldError::UnknownField("nope".into()))
        );
    }

    #[test]
    fn set_descriptor_replaces_schema() {
        let registry = TypeRegistry::with_builtins();
        let mut manager = invoice_manager();
        manager.set_descriptor_with(
            &registry,
            schema(json!({ "count": { "type": "int", "default": 1 } })),
        );
        assert_eq!(manager.field_names().collect::<Vec<_>>(), vec!["count"]);
        assert!(!manager.is_known("hours"));
        assert!(!manager.has_converter("hours"));
    }
}
