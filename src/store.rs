use std::collections::HashMap;

use billfold_core::{ReadableMap, Schema};
use indexmap::IndexMap;
use thiserror::Error;
use tracing::trace;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("no schema for document type '{0}'")]
    UnknownDocumentType(String),
    #[error("no record named '{0}'")]
    RecordNotFound(String),
    #[error("storage backend failed")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Where document schemas come from.
pub trait SchemaSource {
    fn load_schema(&self, document_type: &str) -> Result<Schema, StoreError>;
}

/// Where records are kept, in readable form.
pub trait RecordStore {
    fn load_raw_record(&self, name: &str) -> Result<ReadableMap, StoreError>;
    fn save_raw_record(&mut self, name: &str, data: ReadableMap) -> Result<(), StoreError>;
}

/// Schemas and records held in memory.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    schemas: HashMap<String, Schema>,
    records: IndexMap<String, ReadableMap>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_schema<S: Into<String>>(mut self, document_type: S, schema: Schema) -> Self {
        self.insert_schema(document_type, schema);
        self
    }

    pub fn insert_schema<S: Into<String>>(&mut self, document_type: S, schema: Schema) {
        self.schemas.insert(document_type.into(), schema);
    }

    pub fn insert_record<S: Into<String>>(&mut self, name: S, data: ReadableMap) {
        self.records.insert(name.into(), data);
    }

    pub fn record(&self, name: &str) -> Option<&ReadableMap> {
        self.records.get(name)
    }

    /// Record names in the order they were first stored.
    pub fn record_names(&self) -> impl Iterator<Item = &str> {
        self.records.keys().map(String::as_str)
    }
}

impl SchemaSource for MemoryStore {
    fn load_schema(&self, document_type: &str) -> Result<Schema, StoreError> {
        self.schemas
            .get(document_type)
            .cloned()
            .ok_or_else(|| StoreError::UnknownDocumentType(document_type.to_string()))
    }
}

impl RecordStore for MemoryStore {
    fn load_raw_record(&self, name: &str) -> Result<ReadableMap, StoreError> {
        self.records
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::RecordNotFound(name.to_string()))
    }

    fn save_raw_record(&mut self, name: &str, data: ReadableMap) -> Result<(), StoreError> {
        trace!(name, fields = data.len(), "saving record");
        self.records.insert(name.to_string(), data);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn round_trip() {
        let mut store = MemoryStore::new();
        assert!(matches!(
            store.load_raw_record("inv-1"),
            Err(StoreError::RecordNotFound(_))
        ));

        let data: ReadableMap = serde_json::from_value(json!({ "b": 1, "a": 2 })).unwrap();
        store.save_raw_record("inv-1", data.clone()).unwrap();
        store.save_raw_record("inv-0", ReadableMap::new()).unwrap();

        let loaded = store.load_raw_record("inv-1").unwrap();
        assert_eq!(loaded.keys().collect::<Vec<_>>(), vec!["b", "a"]);
        assert_eq!(store.record_names().collect::<Vec<_>>(), vec!["inv-1", "inv-0"]);
    }

    #[test]
    fn schemas() {
        let schema: Schema =
            serde_json::from_value(json!({ "title": { "type": "str" } })).unwrap();
        let store = MemoryStore::new().with_schema("Invoice", schema.clone());
        assert_eq!(store.load_schema("Invoice").unwrap(), schema);
        assert!(matches!(
            store.load_schema("Letter"),
            Err(StoreError::UnknownDocumentType(name)) if name == "Letter"
        ));
    }
}
