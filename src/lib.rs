//! Typed document fields with placeholder population, for invoices, offers and letters kept
//! as plain data.
//!
//! The workspace is split into three crates, re-exported here:
//!
//! * [`billfold_core`]: value types (`Quantity`, `Price`, `Percentage`, `Posting`), the field type
//!   registry and the conversion of records between readable and internal form.
//! * [`billfold_parser`]: the template syntax of field values.
//! * [`billfold_render`]: expansion of `{{ ... }}` placeholders across the fields of a record.
//!
//! This crate adds settings, storage traits and the [`Documents`] service tying them together.

pub use billfold_core;
pub use billfold_parser;
pub use billfold_render;

pub use billfold_core::{
    FieldConversionManager, FieldDescriptor, Percentage, Posting, Price, Quantity, Readable,
    ReadableMap, Record, Schema, Value,
};
pub use billfold_render::{CyclePolicy, PopulateReport, Populator};
pub use config::{ConfigError, Settings};
pub use document::{DocumentError, Documents};
pub use store::{MemoryStore, RecordStore, SchemaSource, StoreError};

pub mod config;
pub mod document;
pub mod store;
