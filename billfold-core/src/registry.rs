use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};

use chrono::NaiveDate;
use lazy_static::lazy_static;
use rust_decimal::Decimal;
use tracing::debug;

use super::error::{ConversionError, ValueError};
use super::percentage::Percentage;
use super::posting::Posting;
use super::price::Price;
use super::quantity::Quantity;
use super::value::{readable_text, Readable, Value, ValueMap, DATE_FORMAT};

pub type ToInternal = Arc<dyn Fn(&Readable) -> Result<Value, ConversionError> + Send + Sync>;
pub type ToReadable = Arc<dyn Fn(&Value) -> Readable + Send + Sync>;

mod sealed {
    pub trait Sealed {}
}

/// Conversion between the readable and the internal form of one built-in value kind.
///
/// Implemented for the closed set of kinds `billfold` knows about. Other types are added at
/// runtime through [`TypeRegistry::register_type`].
pub trait FieldConverter: sealed::Sealed {
    /// The name documents use to refer to this type.
    const TYPE_NAME: &'static str;

    fn to_internal(readable: &Readable) -> Result<Value, ConversionError>;

    fn to_readable(value: &Value) -> Readable;

    fn readable_default() -> Readable;
}

macro_rules! field_converter {
    (
        $ty:ty, $name:expr, default = $default:expr,
        to_internal($r:ident) $to_internal:block
        to_readable $variant:ident($v:ident) => $to_readable:expr
    ) => {
        impl sealed::Sealed for $ty {}

        impl FieldConverter for $ty {
            const TYPE_NAME: &'static str = $name;

            fn to_internal($r: &Readable) -> Result<Value, ConversionError> {
                if $r.is_null() {
                    let default = Self::readable_default();
                    if default.is_null() {
                        return Ok(Value::Null);
                    }
                    return Self::to_internal(&default);
                }
                $to_internal
            }

            fn to_readable(value: &Value) -> Readable {
                match value {
                    Value::$variant($v) => $to_readable,
                    Value::Null => Self::readable_default(),
                    other => other.to_readable(),
                }
            }

            fn readable_default() -> Readable {
                $default
            }
        }
    };
}

/// A float that holds an integer `i64` can represent exactly.
fn is_whole_i64(f: f64) -> bool {
    f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64
}

fn scalar_text(readable: &Readable, expected: &'static str) -> Result<String, ConversionError> {
    readable_text(readable).ok_or_else(|| ConversionError::mismatch(expected, readable))
}

field_converter! {
    String, "str", default = Readable::String(String::new()),
    to_internal(readable) {
        scalar_text(readable, "text").map(Value::Text)
    }
    to_readable Text(s) => Readable::String(s.clone())
}

field_converter! {
    i64, "int", default = Readable::from(0),
    to_internal(readable) {
        let parsed = match readable {
            Readable::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| is_whole_i64(*f)).map(|f| f as i64)),
            Readable::String(s) => s.trim().parse().ok(),
            _ => None,
        };
        parsed
            .map(Value::Int)
            .ok_or_else(|| ConversionError::mismatch("integer", readable))
    }
    to_readable Int(i) => Readable::from(*i)
}

field_converter! {
    f64, "float", default = Readable::from(0.0),
    to_internal(readable) {
        let parsed = match readable {
            Readable::Number(n) => n.as_f64(),
            Readable::String(s) => s.trim().parse().ok(),
            _ => None,
        };
        parsed
            .map(Value::Float)
            .ok_or_else(|| ConversionError::mismatch("number", readable))
    }
    to_readable Float(f) => Value::Float(*f).to_readable()
}

field_converter! {
    bool, "bool", default = Readable::Bool(false),
    to_internal(readable) {
        let parsed = match readable {
            Readable::Bool(b) => Some(*b),
            Readable::String(s) => match s.trim().to_lowercase().as_str() {
                "true" | "yes" | "on" | "1" => Some(true),
                "false" | "no" | "off" | "0" | "" => Some(false),
                _ => None,
            },
            Readable::Number(n) => n.as_i64().map(|i| i != 0),
            _ => None,
        };
        parsed
            .map(Value::Bool)
            .ok_or_else(|| ConversionError::mismatch("boolean", readable))
    }
    to_readable Bool(b) => Readable::Bool(*b)
}

field_converter! {
    Decimal, "Decimal", default = Readable::String("0".to_string()),
    to_internal(readable) {
        let text = scalar_text(readable, "decimal number")?;
        Decimal::from_str(text.trim())
            .map(Value::Decimal)
            .map_err(|e| ValueError::format(&text, e).into())
    }
    to_readable Decimal(d) => Readable::String(d.to_string())
}

field_converter! {
    NaiveDate, "date", default = Readable::Null,
    to_internal(readable) {
        let text = scalar_text(readable, "date")?;
        NaiveDate::parse_from_str(text.trim(), DATE_FORMAT)
            .map(Value::Date)
            .map_err(|_| ConversionError::mismatch("date (YYYY-MM-DD)", text))
    }
    to_readable Date(d) => Readable::String(d.format(DATE_FORMAT).to_string())
}

field_converter! {
    Quantity, "Quantity", default = Readable::String("0".to_string()),
    to_internal(readable) {
        let text = scalar_text(readable, "quantity")?;
        Ok(Value::Quantity(Quantity::parse(&text)?))
    }
    to_readable Quantity(q) => Readable::String(q.format())
}

field_converter! {
    Price, "Price", default = Readable::String("0.00 €".to_string()),
    to_internal(readable) {
        let text = scalar_text(readable, "price")?;
        Ok(Value::Price(Price::parse(&text)?))
    }
    to_readable Price(p) => Readable::String(p.format())
}

field_converter! {
    Percentage, "Percentage", default = Readable::String("0 %".to_string()),
    to_internal(readable) {
        let text = scalar_text(readable, "percentage")?;
        Ok(Value::Percentage(Percentage::parse(&text)?))
    }
    to_readable Percentage(p) => Readable::String(p.format())
}

field_converter! {
    Vec<Posting>, "Postings", default = Readable::Array(Vec::new()),
    to_internal(readable) {
        match readable {
            Readable::Array(items) => items
                .iter()
                .map(Posting::from_readable)
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Postings),
            other => Err(ConversionError::mismatch("list of postings", other)),
        }
    }
    to_readable Postings(p) => Readable::Array(p.iter().map(Posting::to_readable).collect())
}

field_converter! {
    Vec<Value>, "list", default = Readable::Array(Vec::new()),
    to_internal(readable) {
        match readable {
            Readable::Array(_) => Ok(Value::from_untyped(readable)),
            other => Err(ConversionError::mismatch("list", other)),
        }
    }
    to_readable List(items) => Readable::Array(items.iter().map(Value::to_readable).collect())
}

field_converter! {
    ValueMap, "dict", default = Readable::Object(serde_json::Map::new()),
    to_internal(readable) {
        match readable {
            Readable::Object(_) => Ok(Value::from_untyped(readable)),
            other => Err(ConversionError::mismatch("mapping", other)),
        }
    }
    to_readable Map(map) => Readable::Object(
        map.iter().map(|(k, v)| (k.clone(), v.to_readable())).collect()
    )
}

/// A named field type: how to convert its values in both directions, plus the readable value a
/// field of this type takes when a document does not set it.
#[derive(Clone)]
pub struct FieldTypeDescriptor {
    name: String,
    to_internal: ToInternal,
    to_readable: ToReadable,
    readable_default: Readable,
}

impl FieldTypeDescriptor {
    pub fn new<S, I, R>(name: S, to_internal: I, to_readable: R, readable_default: Readable) -> Self
    where
        S: Into<String>,
        I: Fn(&Readable) -> Result<Value, ConversionError> + Send + Sync + 'static,
        R: Fn(&Value) -> Readable + Send + Sync + 'static,
    {
        FieldTypeDescriptor {
            name: name.into(),
            to_internal: Arc::new(to_internal),
            to_readable: Arc::new(to_readable),
            readable_default,
        }
    }

    /// The descriptor of a built-in kind.
    pub fn of<C: FieldConverter + 'static>() -> Self {
        FieldTypeDescriptor::new(
            C::TYPE_NAME,
            C::to_internal,
            C::to_readable,
            C::readable_default(),
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn readable_default(&self) -> &Readable {
        &self.readable_default
    }

    pub fn to_internal(&self, readable: &Readable) -> Result<Value, ConversionError> {
        (self.to_internal)(readable)
    }

    pub fn to_readable(&self, value: &Value) -> Readable {
        (self.to_readable)(value)
    }
}

impl fmt::Debug for FieldTypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldTypeDescriptor")
            .field("name", &self.name)
            .field("readable_default", &self.readable_default)
            .finish()
    }
}

/// Maps type names to their [`FieldTypeDescriptor`].
#[derive(Clone, Debug, Default)]
pub struct TypeRegistry {
    types: HashMap<String, FieldTypeDescriptor>,
}

impl TypeRegistry {
    /// An empty registry; see [`TypeRegistry::with_builtins`] for the usual starting point.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builtins() -> Self {
        let mut registry = TypeRegistry::new();
        registry.register(FieldTypeDescriptor::of::<String>());
        registry.register(FieldTypeDescriptor::of::<i64>());
        registry.register(FieldTypeDescriptor::of::<f64>());
        registry.register(FieldTypeDescriptor::of::<bool>());
        registry.register(FieldTypeDescriptor::of::<Decimal>());
        registry.register(FieldTypeDescriptor::of::<NaiveDate>());
        registry.register(FieldTypeDescriptor::of::<Quantity>());
        registry.register(FieldTypeDescriptor::of::<Price>());
        registry.register(FieldTypeDescriptor::of::<Percentage>());
        registry.register(FieldTypeDescriptor::of::<Vec<Posting>>());
        registry.register(FieldTypeDescriptor::of::<Vec<Value>>());
        registry.register(FieldTypeDescriptor::of::<ValueMap>());
        registry
    }

    /// Adds `descriptor`, replacing any type registered under the same name.
    pub fn register(&mut self, descriptor: FieldTypeDescriptor) {
        debug!(type_name = %descriptor.name, "registering field type");
        self.types.insert(descriptor.name.clone(), descriptor);
    }

    pub fn register_type<S, I, R>(
        &mut self,
        name: S,
        to_internal: I,
        to_readable: R,
        readable_default: Readable,
    ) where
        S: Into<String>,
        I: Fn(&Readable) -> Result<Value, ConversionError> + Send + Sync + 'static,
        R: Fn(&Value) -> Readable + Send + Sync + 'static,
    {
        self.register(FieldTypeDescriptor::new(
            name,
            to_internal,
            to_readable,
            readable_default,
        ));
    }

    pub fn get(&self, name: &str) -> Option<&FieldTypeDescriptor> {
        self.types.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }
}

lazy_static! {
    static ref GLOBAL_REGISTRY: RwLock<TypeRegistry> = RwLock::new(TypeRegistry::with_builtins());
}

/// The process-wide registry, pre-filled with the built-in types.
///
/// Register custom types during start-up; afterwards the registry is only read.
pub fn global_registry() -> RwLockReadGuard<'static, TypeRegistry> {
    GLOBAL_REGISTRY
        .read()
        .unwrap_or_else(PoisonError::into_inner)
}

/// Registers a type in the process-wide registry, replacing one of the same name.
pub fn register_type<S, I, R>(name: S, to_internal: I, to_readable: R, readable_default: Readable)
where
    S: Into<String>,
    I: Fn(&Readable) -> Result<Value, ConversionError> + Send + Sync + 'static,
    R: Fn(&Value) -> Readable + Send + Sync + 'static,
{
    GLOBAL_REGISTRY
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .register_type(name, to_internal, to_readable, readable_default);
}
