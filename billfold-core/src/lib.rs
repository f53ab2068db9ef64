//! Data representation for billfold documents: the numeric value types, the registry of field
//! types and the conversion of document fields between their readable and internal forms.

pub use conversion::{FieldConversionManager, FieldDescriptor, Schema};
pub use error::{ConversionError, FieldError, ValueError, ValueResult};
pub use percentage::Percentage;
pub use posting::{postings_total, Posting};
pub use price::Price;
pub use quantity::{Magnitude, Quantity};
pub use record::Record;
pub use registry::{
    global_registry, register_type, FieldConverter, FieldTypeDescriptor, TypeRegistry,
};
pub use value::{Readable, ReadableMap, Value, ValueMap};

pub mod conversion;
pub mod error;
pub mod percentage;
pub mod posting;
pub mod price;
pub mod quantity;
pub mod record;
pub mod registry;
pub mod value;
