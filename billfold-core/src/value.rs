use chrono::NaiveDate;
use indexmap::IndexMap;
use rust_decimal::Decimal;

use super::percentage::Percentage;
use super::posting::Posting;
use super::price::Price;
use super::quantity::Quantity;

/// The readable form of a field: the scalar, list or mapping found in a stored document.
pub type Readable = serde_json::Value;

/// Readable fields in document order.
pub type ReadableMap = IndexMap<String, Readable>;

/// Internal field values in document order.
pub type ValueMap = IndexMap<String, Value>;

/// Format used for dates in readable form.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// The internal, computable form of a field value.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Decimal(Decimal),
    Text(String),
    Date(NaiveDate),
    Quantity(Quantity),
    Price(Price),
    Percentage(Percentage),
    Postings(Vec<Posting>),
    List(Vec<Value>),
    Map(ValueMap),
}

impl Default for Value {
    fn default() -> Self {
        Value::Null
    }
}

impl Value {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Decimal(_) => "Decimal",
            Value::Text(_) => "str",
            Value::Date(_) => "date",
            Value::Quantity(_) => "Quantity",
            Value::Price(_) => "Price",
            Value::Percentage(_) => "Percentage",
            Value::Postings(_) => "Postings",
            Value::List(_) => "list",
            Value::Map(_) => "dict",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Structural conversion without a field type, used for fields whose type is unknown.
    pub fn from_untyped(readable: &Readable) -> Value {
        match readable {
            Readable::Null => Value::Null,
            Readable::Bool(b) => Value::Bool(*b),
            Readable::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => n.as_f64().map(Value::Float).unwrap_or(Value::Null),
            },
            Readable::String(s) => Value::Text(s.clone()),
            Readable::Array(items) => Value::List(items.iter().map(Value::from_untyped).collect()),
            Readable::Object(map) => Value::Map(
                map.iter()
                    .map(|(k, v)| (k.clone(), Value::from_untyped(v)))
                    .collect(),
            ),
        }
    }

    /// The readable form of this value. Typed values are written in their string notation.
    pub fn to_readable(&self) -> Readable {
        match self {
            Value::Null => Readable::Null,
            Value::Bool(b) => Readable::Bool(*b),
            Value::Int(i) => Readable::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(Readable::Number)
                .unwrap_or(Readable::Null),
            Value::Decimal(d) => Readable::String(d.to_string()),
            Value::Text(s) => Readable::String(s.clone()),
            Value::Date(d) => Readable::String(d.format(DATE_FORMAT).to_string()),
            Value::Quantity(q) => Readable::String(q.format()),
            Value::Price(p) => Readable::String(p.format()),
            Value::Percentage(p) => Readable::String(p.format()),
            Value::Postings(postings) => {
                Readable::Array(postings.iter().map(Posting::to_readable).collect())
            }
            Value::List(items) => Readable::Array(items.iter().map(Value::to_readable).collect()),
            Value::Map(map) => Readable::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_readable()))
                    .collect(),
            ),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_quantity(&self) -> Option<&Quantity> {
        match self {
            Value::Quantity(q) => Some(q),
            _ => None,
        }
    }

    pub fn as_price(&self) -> Option<&Price> {
        match self {
            Value::Price(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_percentage(&self) -> Option<&Percentage> {
        match self {
            Value::Percentage(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_postings(&self) -> Option<&[Posting]> {
        match self {
            Value::Postings(p) => Some(p),
            _ => None,
        }
    }
}

/// The text of a scalar readable value; numbers and booleans are written out.
pub(crate) fn readable_text(readable: &Readable) -> Option<String> {
    match readable {
        Readable::String(s) => Some(s.clone()),
        Readable::Number(n) => Some(n.to_string()),
        Readable::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

macro_rules! value_from {
    ( $($ty:ty => $variant:ident),* $(,)? ) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v)
                }
            }
        )*
    };
}

value_from! {
    bool => Bool,
    i64 => Int,
    f64 => Float,
    Decimal => Decimal,
    String => Text,
    NaiveDate => Date,
    Quantity => Quantity,
    Price => Price,
    Percentage => Percentage,
    Vec<Posting> => Postings,
    ValueMap => Map,
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}
