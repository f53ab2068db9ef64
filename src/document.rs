use std::collections::HashMap;
use std::sync::Arc;

use billfold_core::{
    FieldConversionManager, FieldError, Price, ReadableMap, Record, Schema, TypeRegistry,
};
use billfold_render::{PopulateReport, Populator};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::Settings;
use crate::store::{RecordStore, SchemaSource, StoreError};

#[derive(Error, Debug)]
pub enum DocumentError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("invalid field data in '{name}'")]
    Field {
        name: String,
        #[source]
        source: FieldError,
    },
}

/// Loads, populates and saves the records of a store.
///
/// Conversion managers are built once per document type and shared by every record of that
/// type.
pub struct Documents<S> {
    store: S,
    settings: Settings,
    populator: Populator,
    registry: Option<TypeRegistry>,
    managers: HashMap<String, Arc<FieldConversionManager>>,
}

impl<S> Documents<S>
where
    S: SchemaSource + RecordStore,
{
    /// Resolves field types in the process-wide registry.
    pub fn new(store: S, settings: Settings) -> Self {
        let populator = settings.populator();
        Documents {
            store,
            settings,
            populator,
            registry: None,
            managers: HashMap::new(),
        }
    }

    pub fn with_registry(store: S, settings: Settings, registry: TypeRegistry) -> Self {
        let mut documents = Documents::new(store, settings);
        documents.registry = Some(registry);
        documents
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    pub fn manager(
        &mut self,
        document_type: &str,
    ) -> Result<Arc<FieldConversionManager>, DocumentError> {
        if let Some(manager) = self.managers.get(document_type) {
            return Ok(manager.clone());
        }

        let schema = self.with_default_currency(self.store.load_schema(document_type)?);
        let manager = Arc::new(match &self.registry {
            Some(registry) => FieldConversionManager::with_registry(registry, schema),
            None => FieldConversionManager::new(schema),
        });
        debug!(document_type, fields = manager.descriptor().len(), "schema loaded");
        self.managers
            .insert(document_type.to_string(), manager.clone());
        Ok(manager)
    }

    /// A new record of `document_type` with every field at its default.
    pub fn create(&mut self, document_type: &str) -> Result<Record, DocumentError> {
        let manager = self.manager(document_type)?;
        Record::new(manager).map_err(|source| DocumentError::Field {
            name: document_type.to_string(),
            source,
        })
    }

    pub fn load(&mut self, document_type: &str, name: &str) -> Result<Record, DocumentError> {
        let manager = self.manager(document_type)?;
        let data = self.store.load_raw_record(name)?;
        Record::from_readable(manager, &data).map_err(|source| DocumentError::Field {
            name: name.to_string(),
            source,
        })
    }

    pub fn populate(&self, record: &mut Record) -> PopulateReport {
        self.populate_with(record, &ReadableMap::new())
    }

    /// Populates with `extra` bindings on top of the configured ones.
    pub fn populate_with(&self, record: &mut Record, extra: &ReadableMap) -> PopulateReport {
        let report = self.populator.populate(record, extra);
        for error in &report.errors {
            warn!(error = %error, "field not populated");
        }
        for notice in &report.notices {
            debug!(notice = %notice, "population notice");
        }
        report
    }

    pub fn save(&mut self, name: &str, record: &Record) -> Result<(), DocumentError> {
        self.store.save_raw_record(name, record.to_readable())?;
        debug!(name, "record saved");
        Ok(())
    }

    /// Populates `record` and saves it, unless a field could not be populated.
    pub fn populate_and_save(
        &mut self,
        name: &str,
        record: &mut Record,
    ) -> Result<PopulateReport, DocumentError> {
        let report = self.populate(record);
        if report.is_success() {
            self.save(name, record)?;
        } else {
            warn!(name, errors = report.errors.len(), "record not saved");
        }
        Ok(report)
    }

    /// `Price` fields without a declared default start at zero in the configured currency.
    fn with_default_currency(&self, mut schema: Schema) -> Schema {
        for declaration in schema.values_mut() {
            if declaration.type_name == "Price" && declaration.default.is_null() {
                let mut zero = Price::default();
                zero.set_currency(self.settings.default_currency.as_str());
                declaration.default = zero.format().into();
            }
        }
        schema
    }
}
